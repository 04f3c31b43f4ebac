pub mod layer;
pub mod loss;
pub mod optimizer;
pub mod tensor;

use layer::{Dense, Layer, ReLU};
use loss::Loss;
use optimizer::Optimizer;
use rand::Rng;
use tensor::Tensor;

use crate::{
    config::DqnConfig,
    error::{Error, Result},
    estimator::{ParamBlock, Parameters, QEstimator, check_batch},
};

/// Feed-forward network trained with a pluggable loss and optimizer.
pub struct Sequential {
    pub layers: Vec<Box<dyn Layer>>,
    pub loss: Box<dyn Loss>,
    pub optimizer: Box<dyn Optimizer>,
    input_size: usize,
    output_size: usize,
}

impl Sequential {
    pub fn new(
        layers: Vec<Box<dyn Layer>>,
        loss: Box<dyn Loss>,
        optimizer: Box<dyn Optimizer>,
        input_size: usize,
        output_size: usize,
    ) -> Self {
        Self {
            layers,
            loss,
            optimizer,
            input_size,
            output_size,
        }
    }

    /// Dense/ReLU stack: `input -> hidden[0] -> ... -> output`, linear output layer.
    pub fn mlp<R: Rng + ?Sized>(
        input_size: usize,
        hidden: &[usize],
        output_size: usize,
        loss: Box<dyn Loss>,
        optimizer: Box<dyn Optimizer>,
        rng: &mut R,
    ) -> Self {
        let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(hidden.len() * 2 + 1);
        let mut width = input_size;
        for &next in hidden {
            layers.push(Box::new(Dense::new(width, next, rng)));
            layers.push(Box::new(ReLU::new()));
            width = next;
        }
        layers.push(Box::new(Dense::new(width, output_size, rng)));

        Self::new(layers, loss, optimizer, input_size, output_size)
    }

    /// Q-network for `input_size` features and `output_size` actions as configured.
    pub fn from_config<R: Rng + ?Sized>(config: &DqnConfig, input_size: usize, output_size: usize, rng: &mut R) -> Self {
        Self::mlp(
            input_size,
            &config.hidden_layers,
            output_size,
            config.loss.build(),
            config.optimizer.build(config.learning_rate),
            rng,
        )
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    pub fn train_on_batch(&mut self, x_batch: &Tensor, y_batch: &Tensor) -> f32 {
        let y_pred = self.forward(x_batch);
        let loss = self.loss.calculate(&y_pred, y_batch);

        let mut d_output = self.loss.gradient(&y_pred, y_batch);
        for layer in self.layers.iter_mut().rev() {
            d_output = layer.backward(&d_output);
        }

        let params: Vec<(&mut Tensor, &Tensor)> = self
            .layers
            .iter_mut()
            .flat_map(|layer| layer.params_and_grads())
            .collect();
        self.optimizer.step(params);

        loss
    }

    pub fn layout(&self) -> Vec<[usize; 2]> {
        self.layers
            .iter()
            .flat_map(|layer| layer.params())
            .map(|tensor| tensor.shape)
            .collect()
    }

    fn to_tensor(&self, operation: &'static str, rows: &[Vec<f32>], width: usize) -> Result<Tensor> {
        check_batch(operation, rows, width)?;
        Tensor::from_rows(rows).ok_or_else(|| Error::BatchShape {
            message: format!("{operation}: ragged batch"),
        })
    }
}

impl QEstimator for Sequential {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn predict(&mut self, states: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let input = self.to_tensor("predict", states, self.input_size)?;
        Ok(self.forward(&input).to_rows())
    }

    fn fit_batch(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32> {
        if states.len() != targets.len() {
            return Err(Error::BatchShape {
                message: format!("{} states but {} targets", states.len(), targets.len()),
            });
        }
        let x = self.to_tensor("fit", states, self.input_size)?;
        let y = self.to_tensor("fit", targets, self.output_size)?;
        Ok(self.train_on_batch(&x, &y))
    }

    fn parameters(&self) -> Parameters {
        let blocks = self
            .layers
            .iter()
            .flat_map(|layer| layer.params())
            .map(|tensor| ParamBlock {
                shape: tensor.shape,
                values: tensor.data.clone(),
            })
            .collect();
        Parameters { blocks }
    }

    fn set_parameters(&mut self, parameters: &Parameters) -> Result<()> {
        parameters.check_layout(&self.layout())?;
        let targets = self.layers.iter_mut().flat_map(|layer| layer.params_mut());
        for (tensor, block) in targets.zip(&parameters.blocks) {
            tensor.data.copy_from_slice(&block.values);
        }
        Ok(())
    }
}

impl Clone for Sequential {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.iter().map(|layer| layer.clone_box()).collect(),
            loss: self.loss.clone_box(),
            optimizer: self.optimizer.clone_box(),
            input_size: self.input_size,
            output_size: self.output_size,
        }
    }
}
