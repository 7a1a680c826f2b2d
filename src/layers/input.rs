use rand::rngs::StdRng;

use super::Layer;
use crate::tensors::Ten32;

/// The pipeline head: declares the sample shape and passes data through
/// unchanged.
#[derive(Debug)]
pub struct Input {
    shape: Vec<usize>,
    last_activation: Option<Ten32>,
}

impl Input {
    /// Declares the shape every sample fed to the model will have.
    pub fn new(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            shape: shape.into(),
            last_activation: None,
        }
    }
}

impl Layer for Input {
    fn compile(&mut self, _in_shape: &[usize], _rng: &mut StdRng) {
        // the head's output shape is its declared sample shape
    }

    fn out_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&mut self, input: &Ten32, training: bool) -> Ten32 {
        if training {
            self.last_activation = Some(input.clone());
        }
        input.clone()
    }

    fn backward(&mut self, delta: Ten32, _prev_activation: &Ten32) -> Ten32 {
        // terminal: the head has no predecessor to route a delta to
        delta
    }

    fn last_activation(&self) -> &Ten32 {
        self.last_activation
            .as_ref()
            .expect("no training forward pass recorded")
    }
}
