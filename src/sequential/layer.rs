use rand::Rng;

use super::tensor::Tensor;

pub trait Layer {
    fn forward(&mut self, input: &Tensor) -> Tensor;
    fn backward(&mut self, d_output: &Tensor) -> Tensor;

    /// Trainable tensors in a fixed order.
    fn params(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn params_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Each trainable tensor with its last computed gradient; empty before `backward`.
    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        Vec::new()
    }

    fn clone_box(&self) -> Box<dyn Layer>;
}

// dense layer

#[derive(Clone)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    cached_input: Option<Tensor>, // for back propagation
    pub d_weights: Option<Tensor>,
    pub d_biases: Option<Tensor>,
}

impl Dense {
    /// He-normal initialization, suited to the ReLU layers that follow.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let std = (2.0 / input_size.max(1) as f32).sqrt();
        Self {
            weights: Tensor::random(input_size, output_size, std, rng),
            biases: Tensor::zeros(1, output_size),
            cached_input: None,
            d_weights: None,
            d_biases: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols()
    }
}

impl Layer for Dense {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        let mut output = input.matmul(&self.weights);
        output.add_row(&self.biases);
        output
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };

        // dL/dW = input.T @ dL/dY
        self.d_weights = Some(cached_input.transpose().matmul(d_output));
        // dL/db = dL/dY summed over the batch
        self.d_biases = Some(d_output.sum_rows());
        // dL/dX = dL/dY @ weights.T
        d_output.matmul(&self.weights.transpose())
    }

    fn params(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.biases]
    }

    fn params_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights, &mut self.biases]
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        match (&self.d_weights, &self.d_biases) {
            (Some(d_weights), Some(d_biases)) => {
                vec![(&mut self.weights, d_weights), (&mut self.biases, d_biases)]
            }
            _ => Vec::new(),
        }
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}

// relu layer

#[derive(Clone, Default)]
pub struct ReLU {
    cached_input: Option<Tensor>,
}

impl ReLU {
    pub fn new() -> Self {
        Self { cached_input: None }
    }
}

impl Layer for ReLU {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        input.map(|x| x.max(0.0))
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };
        cached_input.map2(d_output, |input_val, output_val| {
            if input_val > 0.0 { output_val } else { 0.0 }
        })
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        let tolerance = 1e-6;
        assert_eq!(a.len(), b.len(), "vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tolerance, "mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    fn dense(weights: Vec<f32>, biases: Vec<f32>, shape: [usize; 2]) -> Dense {
        let mut layer = Dense::new(shape[0], shape[1], &mut StdRng::seed_from_u64(0));
        layer.weights = Tensor::from_vec(weights, shape);
        layer.biases = Tensor::from_vec(biases, [1, shape[1]]);
        layer
    }

    #[test]
    fn test_dense_forward() {
        let mut layer = dense(vec![1.0, 2.0, 3.0, 4.0], vec![0.5, -0.5], [2, 2]);
        let input = Tensor::from_vec(vec![1.0, 1.0, 2.0, 0.0], [2, 2]);
        let output = layer.forward(&input);
        assert_vec_approx_eq(&output.data, &[4.5, 5.5, 2.5, 3.5]);
    }

    #[test]
    fn test_dense_backward() {
        let mut layer = dense(vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 0.0], [2, 2]);
        let input = Tensor::from_vec(vec![1.0, 2.0], [1, 2]);
        layer.forward(&input);

        let d_output = Tensor::from_vec(vec![1.0, -1.0], [1, 2]);
        let d_input = layer.backward(&d_output);

        // dW = x.T @ dY
        assert_vec_approx_eq(&layer.d_weights.as_ref().unwrap().data, &[1.0, -1.0, 2.0, -2.0]);
        assert_vec_approx_eq(&layer.d_biases.as_ref().unwrap().data, &[1.0, -1.0]);
        // dX = dY @ W.T
        assert_vec_approx_eq(&d_input.data, &[-1.0, -1.0]);
        assert_eq!(layer.params_and_grads().len(), 2);
    }

    #[test]
    fn test_dense_has_no_grads_before_backward() {
        let mut layer = Dense::new(3, 2, &mut StdRng::seed_from_u64(1));
        assert!(layer.params_and_grads().is_empty());
        assert_eq!(layer.params().len(), 2);
        assert_eq!((layer.input_size(), layer.output_size()), (3, 2));
    }

    #[test]
    fn test_relu_forward_backward() {
        let mut relu = ReLU::new();
        let input = Tensor::from_vec(vec![-1.0, 0.0, 2.0], [1, 3]);
        assert_eq!(relu.forward(&input).data, vec![0.0, 0.0, 2.0]);
        let d_input = relu.backward(&Tensor::from_vec(vec![5.0, 5.0, 5.0], [1, 3]));
        assert_eq!(d_input.data, vec![0.0, 0.0, 5.0]);
        assert!(relu.params().is_empty());
    }

    #[test]
    #[should_panic(expected = "complete forward pass first.")]
    fn test_backward_without_forward_panics() {
        let mut relu = ReLU::new();
        relu.backward(&Tensor::zeros(1, 1));
    }
}
