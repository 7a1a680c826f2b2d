//! The model orchestrator: wires layers into a linear pipeline and runs
//! mini-batch gradient descent.
//!
//! # Model
//!
//! A [`Model`] owns an ordered sequence of boxed [`Layer`]s. `compile`
//! walks the sequence once, feeding each layer the output shape of the one
//! before it; `predict` folds a sample through the pipeline; `train` runs
//! the epoch/batch loop with gradient accumulation and per-batch SGD
//! updates.
//!
//! Samples and labels are column-major: a sample for a dense pipeline is a
//! `(features, 1)` tensor, a label a `(outputs, 1)` tensor; convolutional
//! pipelines take `(channels, height, width)` samples.
//!
//! The loss is fixed quadratic: training seeds backpropagation with
//! `delta = prediction - label`, and each layer folds its own activation
//! derivative into the delta as it passes through.
//!
//! ## Example
//!
//! ```rust
//! use neurite::layers::{Activation, Dense, Input};
//! use neurite::model::Model;
//! use neurite::tensor;
//!
//! let mut model = Model::with_seed(42);
//! model
//!     .add(Input::new(vec![2]))
//!     .add(Dense::new(2, Activation::sigmoid()))
//!     .add(Dense::new(1, Activation::sigmoid()));
//! model.compile();
//!
//! let out = model.predict(&tensor!([[0.0], [1.0]]));
//! assert_eq!(out.shape(), &[1, 1]);
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::layers::Layer;
use crate::tensors::Ten32;

/// Default learning rate for a freshly constructed model.
const DEFAULT_LEARNING_RATE: f32 = 0.5;

/// A linear pipeline of layers trained with mini-batch gradient descent.
pub struct Model {
    layers: Vec<Box<dyn Layer>>,
    learning_rate: f32,
    compiled: bool,
    rng: StdRng,
}

impl Model {
    /// An empty model whose parameter initialization draws from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// An empty model with a deterministic parameter initialization stream.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            layers: Vec::new(),
            learning_rate: DEFAULT_LEARNING_RATE,
            compiled: false,
            rng,
        }
    }

    /// Appends a layer to the pipeline and invalidates compilation.
    pub fn add(&mut self, layer: impl Layer + 'static) -> &mut Self {
        self.compiled = false;
        self.layers.push(Box::new(layer));
        self
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Sets the learning rate used by subsequent batches.
    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Total number of trainable scalars across the pipeline.
    pub fn param_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.param_count()).sum()
    }

    /// Links the pipeline: every layer is compiled against the output
    /// shape of the one before it, allocating weights and gradient
    /// accumulators.
    ///
    /// # Panics
    /// Panics if the model holds fewer than two layers.
    pub fn compile(&mut self) {
        assert!(
            self.layers.len() >= 2,
            "model must be composed of at least 2 layers"
        );

        self.layers[0].compile(&[], &mut self.rng);
        for i in 1..self.layers.len() {
            let prev_shape = self.layers[i - 1].out_shape().to_vec();
            self.layers[i].compile(&prev_shape, &mut self.rng);
        }
        self.compiled = true;
    }

    /// Folds one sample through the pipeline.
    fn forward(&mut self, sample: &Ten32, training: bool) -> Ten32 {
        let mut activation = sample.clone();
        for layer in &mut self.layers {
            activation = layer.forward(&activation, training);
        }
        activation
    }

    /// Runs a sample through the pipeline and returns the tail's output.
    /// Compiles first if needed.
    pub fn predict(&mut self, sample: &Ten32) -> Ten32 {
        if !self.compiled {
            self.compile();
        }
        self.forward(sample, false)
    }

    /// Trains with mini-batch gradient descent for `epochs` passes over
    /// the data, accumulating gradients over batches of `batch_size`
    /// samples before each parameter update.
    ///
    /// Returns the mean squared error of the final epoch, so callers can
    /// watch convergence without the core printing anything.
    ///
    /// # Panics
    /// Panics if the sample and label counts differ, `batch_size` is zero,
    /// or the pipeline holds fewer than two layers.
    pub fn train(
        &mut self,
        samples: &[Ten32],
        labels: &[Ten32],
        epochs: usize,
        batch_size: usize,
    ) -> f32 {
        assert_eq!(
            samples.len(),
            labels.len(),
            "sample/label count mismatch: {} vs {}",
            samples.len(),
            labels.len()
        );
        assert!(batch_size > 0, "batch size must be nonzero");
        if !self.compiled {
            self.compile();
        }

        let batch_count = samples.len().div_ceil(batch_size);
        let mut epoch_mse = 0.0;

        for _epoch in 0..epochs {
            let mut squared_error = 0.0f32;
            let mut error_terms = 0usize;

            for batch in 0..batch_count {
                let begin = batch * batch_size;
                let end = usize::min(begin + batch_size, samples.len());

                for sample in begin..end {
                    self.forward(&samples[sample], true);

                    // quadratic loss seed: dL/da = prediction - label
                    let tail = self.layers.len() - 1;
                    let mut delta = self.layers[tail].last_activation().clone();
                    delta -= &labels[sample];

                    squared_error += delta.data().iter().map(|d| d * d).sum::<f32>();
                    error_terms += delta.size();

                    for i in (1..=tail).rev() {
                        let (before, rest) = self.layers.split_at_mut(i);
                        delta = rest[0].backward(delta, before[i - 1].last_activation());
                    }
                }

                // batch boundary: apply and reset every accumulator
                for layer in &mut self.layers {
                    layer.update(self.learning_rate);
                }
            }

            if error_terms > 0 {
                epoch_mse = squared_error / error_terms as f32;
            }
        }

        epoch_mse
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
