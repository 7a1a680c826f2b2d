//! The layer hierarchy: polymorphic pipeline nodes with manual
//! forward/backward passes.
//!
//! # Layers
//!
//! A model is a strictly linear pipeline of [`Layer`] implementations:
//! [`Input`], [`Dense`], [`Conv2D`], [`MaxPooling2D`] and [`Flatten`].
//! Every layer owns its parameters and per-batch gradient accumulators;
//! none of them hold references to their neighbours. The
//! [`Model`](crate::model::Model) drives the chain by index, handing each
//! layer the previous layer's cached activation during backpropagation.
//!
//! ## Layer lifecycle
//!
//! 1. Construct with hyperparameters (neuron count, kernel shape, ...).
//! 2. `compile` against the previous layer's output shape: binds the output
//!    shape and allocates weights (uniform random in [-1, 1]) and zeroed
//!    gradient accumulators.
//! 3. `forward` transforms one sample; with `training == true` the layer
//!    caches the tensors its backward pass will need.
//! 4. `backward` consumes the upstream delta, accumulates local gradients,
//!    and returns the delta for the layer before it.
//! 5. `update` applies the accumulated gradients (`w -= lr * grad`) and
//!    resets the accumulators; called once per batch.
//!
//! Gradients are hand-derived per layer type; there is no autodiff graph.

use rand::rngs::StdRng;

use crate::tensors::Ten32;

mod conv2d;
mod dense;
mod flatten;
mod input;
mod max_pooling2d;

pub use self::conv2d::Conv2D;
pub use self::dense::Dense;
pub use self::flatten::Flatten;
pub use self::input::Input;
pub use self::max_pooling2d::MaxPooling2D;

/// A pipeline node. See the [module docs](self) for the lifecycle.
pub trait Layer {
    /// Binds shape-dependent state once the previous layer's output shape
    /// is known. The pipeline head receives an empty `in_shape`.
    ///
    /// Parameterized layers draw their initial weights from `rng`.
    fn compile(&mut self, in_shape: &[usize], rng: &mut StdRng);

    /// The shape of this layer's output, available after `compile`.
    ///
    /// # Panics
    /// Panics if the layer has not been compiled.
    fn out_shape(&self) -> &[usize];

    /// Transforms one sample. With `training == true`, caches whatever the
    /// backward pass needs (activations, pre-activations, masks).
    fn forward(&mut self, input: &Ten32, training: bool) -> Ten32;

    /// Consumes the upstream delta (`∂L/∂a` of this layer), accumulates
    /// local parameter gradients, and returns the delta for the previous
    /// layer. `prev_activation` is the previous layer's cached activation
    /// from the same training forward pass.
    ///
    /// # Panics
    /// Panics if no training forward pass has been recorded.
    fn backward(&mut self, delta: Ten32, prev_activation: &Ten32) -> Ten32;

    /// Applies accumulated gradients (`w -= lr * grad`) and resets the
    /// accumulators to zero. No-op for parameterless layers. Must be called
    /// exactly once per batch, after every sample's `backward`.
    fn update(&mut self, _learning_rate: f32) {}

    /// Number of trainable scalars (0 for parameterless layers).
    fn param_count(&self) -> usize {
        0
    }

    /// The activation cached by the last training forward pass.
    ///
    /// # Panics
    /// Panics if no training forward pass has been recorded.
    fn last_activation(&self) -> &Ten32;
}

/// An activation function as a pair of pure scalar functions: `f` and its
/// derivative `f'` with respect to the pre-activation.
///
/// The layers consume nothing else of an activation; bring your own by
/// pairing two `fn(f32) -> f32`s with [`Activation::new`].
#[derive(Clone, Copy)]
pub struct Activation {
    f: fn(f32) -> f32,
    fd: fn(f32) -> f32,
}

impl Activation {
    /// Pairs an activation function with its derivative.
    pub fn new(f: fn(f32) -> f32, fd: fn(f32) -> f32) -> Self {
        Self { f, fd }
    }

    /// The logistic function `1 / (1 + e^-x)`.
    pub fn sigmoid() -> Self {
        fn f(x: f32) -> f32 {
            1.0 / (1.0 + (-x).exp())
        }
        fn fd(x: f32) -> f32 {
            f(x) * (1.0 - f(x))
        }
        Self::new(f, fd)
    }

    /// The identity function.
    pub fn linear() -> Self {
        Self::new(|x| x, |_| 1.0)
    }

    /// The rectified linear unit `max(0, x)`.
    pub fn relu() -> Self {
        Self::new(
            |x| if x > 0.0 { x } else { 0.0 },
            |x| if x > 0.0 { 1.0 } else { 0.0 },
        )
    }

    /// Applies `f`.
    pub fn apply(&self, x: f32) -> f32 {
        (self.f)(x)
    }

    /// Applies `f'`.
    pub fn derivative(&self, x: f32) -> f32 {
        (self.fd)(x)
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Activation").finish_non_exhaustive()
    }
}
