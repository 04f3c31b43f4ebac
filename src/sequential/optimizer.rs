use serde::{Deserialize, Serialize};

use super::tensor::Tensor;

pub trait Optimizer {
    /// Apply one update. `params` pairs each trainable tensor with its gradient,
    /// in the same order on every call.
    fn step(&mut self, params: Vec<(&mut Tensor, &Tensor)>);
    fn clone_box(&self) -> Box<dyn Optimizer>;
}

// SGD

#[derive(Clone, Debug)]
pub struct SGD {
    learning_rate: f32,
}

impl SGD {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: Vec<(&mut Tensor, &Tensor)>) {
        let lr = self.learning_rate;
        for (param, grad) in params {
            *param = param.map2(grad, |w, dw| w - lr * dw);
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

// Adam

#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: i32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<(&mut Tensor, &Tensor)>) {
        // moments are created lazily, one slot per parameter tensor
        if self.m.len() != params.len() {
            self.m = params.iter().map(|(p, _)| vec![0.0; p.data.len()]).collect();
            self.v = self.m.clone();
            self.t = 0;
        }
        self.t = self.t.saturating_add(1);
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);

        for ((param, grad), (m, v)) in params.into_iter().zip(self.m.iter_mut().zip(self.v.iter_mut())) {
            for (((w, &g), m), v) in param.data.iter_mut().zip(&grad.data).zip(m.iter_mut()).zip(v.iter_mut()) {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *w -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f32) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd => Box::new(SGD::new(learning_rate)),
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
        }
    }
}
