//! Tensor compute kernels.
//!
//! The layer implementations never loop over raw buffers themselves; all of
//! the heavy lifting (dense matrix product, rank-2 transpose, and the
//! im2col/col2im pair that turns convolution into matrix multiplication)
//! lives here, behind the `Tensor` methods that delegate to it.

pub mod cpu;
