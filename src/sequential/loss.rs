use serde::{Deserialize, Serialize};

use super::tensor::Tensor;

pub trait Loss {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32;
    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor;
    fn clone_box(&self) -> Box<dyn Loss>;
}

// mean squared error, averaged over every element

#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let n = y_pred.data.len().max(1) as f32;
        let diff = y_pred.map2(y_true, |pred, target| pred - target);
        diff.data.iter().map(|x| x * x).sum::<f32>() / n
    }

    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        let n = y_pred.data.len().max(1) as f32;
        y_pred.map2(y_true, move |pred, target| 2.0 * (pred - target) / n)
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }
}

// huber loss: quadratic within `delta`, linear outside

#[derive(Clone, Copy, Debug)]
pub struct Huber {
    pub delta: f32,
}

impl Default for Huber {
    fn default() -> Self {
        Self { delta: 1.0 }
    }
}

impl Loss for Huber {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let n = y_pred.data.len().max(1) as f32;
        let delta = self.delta;
        let losses = y_pred.map2(y_true, move |pred, target| {
            let e = (pred - target).abs();
            if e <= delta { 0.5 * e * e } else { delta * (e - 0.5 * delta) }
        });
        losses.data.iter().sum::<f32>() / n
    }

    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        let n = y_pred.data.len().max(1) as f32;
        let delta = self.delta;
        y_pred.map2(y_true, move |pred, target| (pred - target).clamp(-delta, delta) / n)
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    Huber,
}

impl LossKind {
    pub fn build(self) -> Box<dyn Loss> {
        match self {
            LossKind::Mse => Box::new(MeanSquaredError),
            LossKind::Huber => Box::new(Huber::default()),
        }
    }
}
