use rand::rngs::StdRng;

use super::{Activation, Layer};
use crate::tensors::{Ten32, Tensor};

/// A fully-connected layer: `a = f(W·x + b)`.
///
/// Activations flow through the pipeline as `(n, 1)` column matrices so
/// the forward pass is a plain matrix product.
#[derive(Debug)]
pub struct Dense {
    neurons: usize,
    activation: Activation,
    state: Option<State>,
    cache: Option<Cache>,
}

#[derive(Debug)]
struct State {
    out_shape: Vec<usize>,
    weights: Ten32,
    biases: Ten32,
    grad_weights: Ten32,
    grad_biases: Ten32,
}

#[derive(Debug)]
struct Cache {
    activation: Ten32,
    preactivation: Ten32,
}

impl Dense {
    /// A dense layer of `neurons` outputs with the given activation.
    pub fn new(neurons: usize, activation: Activation) -> Self {
        assert!(neurons > 0, "dense layer needs at least one neuron");
        Self {
            neurons,
            activation,
            state: None,
            cache: None,
        }
    }

    fn state(&self) -> &State {
        self.state
            .as_ref()
            .expect("dense layer not compiled; call Model::compile first")
    }

    /// The weight matrix `(neurons, in_features)`, available after compile.
    pub fn weights(&self) -> &Ten32 {
        &self.state().weights
    }

    /// Mutable weight access, e.g. to load known parameters in tests.
    pub fn weights_mut(&mut self) -> &mut Ten32 {
        &mut self
            .state
            .as_mut()
            .expect("dense layer not compiled; call Model::compile first")
            .weights
    }

    /// The bias column `(neurons, 1)`, available after compile.
    pub fn biases(&self) -> &Ten32 {
        &self.state().biases
    }

    /// Mutable bias access.
    pub fn biases_mut(&mut self) -> &mut Ten32 {
        &mut self
            .state
            .as_mut()
            .expect("dense layer not compiled; call Model::compile first")
            .biases
    }

    /// The per-batch weight-gradient accumulator.
    pub fn grad_weights(&self) -> &Ten32 {
        &self.state().grad_weights
    }

    /// The per-batch bias-gradient accumulator.
    pub fn grad_biases(&self) -> &Ten32 {
        &self.state().grad_biases
    }
}

impl Layer for Dense {
    fn compile(&mut self, in_shape: &[usize], rng: &mut StdRng) {
        assert!(
            !in_shape.is_empty(),
            "dense layer cannot be the pipeline head"
        );
        let in_features = in_shape[0];

        let mut weights = Tensor::zeros(vec![self.neurons, in_features]);
        let mut biases = Tensor::zeros(vec![self.neurons, 1]);
        weights.fill_random(rng);
        biases.fill_random(rng);

        self.state = Some(State {
            out_shape: vec![self.neurons],
            grad_weights: Tensor::zeros(weights.shape().to_vec()),
            grad_biases: Tensor::zeros(biases.shape().to_vec()),
            weights,
            biases,
        });
        self.cache = None;
    }

    fn out_shape(&self) -> &[usize] {
        &self.state().out_shape
    }

    fn forward(&mut self, input: &Ten32, training: bool) -> Ten32 {
        let state = self
            .state
            .as_ref()
            .expect("dense layer not compiled; call Model::compile first");

        let mut z = state.weights.matmul(input);
        z += &state.biases;
        let activation = self.activation;
        let a = z.map(|x| activation.apply(x));

        if training {
            self.cache = Some(Cache {
                activation: a.clone(),
                preactivation: z,
            });
        }
        a
    }

    fn backward(&mut self, mut delta: Ten32, prev_activation: &Ten32) -> Ten32 {
        let state = self
            .state
            .as_mut()
            .expect("dense layer not compiled; call Model::compile first");
        let cache = self
            .cache
            .as_mut()
            .expect("no training forward pass recorded");

        // delta arrives as dL/da; fold in this layer's own f'(z)
        let activation = self.activation;
        cache.preactivation.map_inplace(|x| activation.derivative(x));
        delta *= &cache.preactivation;

        state.grad_biases += &delta;
        state.grad_weights += &delta.matmul(&prev_activation.transpose());

        state.weights.transpose().matmul(&delta)
    }

    fn update(&mut self, learning_rate: f32) {
        let state = self
            .state
            .as_mut()
            .expect("dense layer not compiled; call Model::compile first");

        state
            .weights
            .zip_map_inplace(&state.grad_weights, |w, g| w - learning_rate * g);
        state
            .biases
            .zip_map_inplace(&state.grad_biases, |b, g| b - learning_rate * g);
        state.grad_weights.fill_value(0.0);
        state.grad_biases.fill_value(0.0);
    }

    fn param_count(&self) -> usize {
        let state = self.state();
        state.weights.size() + state.biases.size()
    }

    fn last_activation(&self) -> &Ten32 {
        &self
            .cache
            .as_ref()
            .expect("no training forward pass recorded")
            .activation
    }
}
