//! neurite: a small from-scratch neural network training engine in Rust.
//!
//! Designed around three tightly coupled pieces: a strided N-dimensional
//! tensor engine, a layer hierarchy with hand-derived forward/backward
//! passes, and a model orchestrator running mini-batch gradient descent.
//!
//! # Features
//!
//! - N-dimensional tensors with bounds-checked indexing, elementwise
//!   arithmetic, axis reduction, matrix transpose/multiply, and the
//!   im2col/col2im pair that turns 2D convolution into matrix
//!   multiplication.
//! - Five layer kinds (input, fully-connected, 2D convolution, 2D
//!   max-pooling, flatten), each with a manually derived backward pass.
//! - A linear pipeline orchestrator: batching, gradient accumulation,
//!   per-batch SGD updates.
//!
//! # Goals
//!
//! - Prioritize correctness, explicitness, and a readable training loop
//!   over black-box abstraction.
//! - Keep ownership honest: tensor clones are snapshots, views are
//!   borrow-checked, and randomness is explicit state, not a global.
//!
//! # Non-goals
//!
//! - No GPU execution, no autodiff graph (gradients are hand-derived per
//!   layer), no non-linear layer graphs, and no numerical-stability
//!   guarantees beyond naive float arithmetic.
//!
//! # Modules
//!
//! - [`tensors`]: core tensor data structures and operations.
//! - [`ops`]: the dense compute kernels (matmul, transpose, im2col/col2im).
//! - [`layers`]: the layer hierarchy and the activation adapter.
//! - [`model`]: the pipeline orchestrator and training loop.
//! - [`approx`]: float comparison helpers for tests and callers.
//!
//! # Example
//!
//! ```rust
//! use neurite::prelude::*;
//!
//! let mut model = Model::with_seed(7);
//! model
//!     .add(Input::new(vec![2]))
//!     .add(Dense::new(2, Activation::sigmoid()))
//!     .add(Dense::new(1, Activation::sigmoid()));
//! model.compile();
//! ```

pub mod approx;
pub mod layers;
pub mod model;
pub mod ops;
pub mod tensors;

/// One-stop imports for building and training models.
pub mod prelude {
    pub use crate::layers::{Activation, Conv2D, Dense, Flatten, Input, Layer, MaxPooling2D};
    pub use crate::model::Model;
    pub use crate::tensor;
    pub use crate::tensors::{Fill, Ten32, Tensor};
}
