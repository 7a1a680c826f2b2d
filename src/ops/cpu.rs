//! Parallel CPU tensor kernels.
//!
//! # CPU Kernels
//!
//! High-performance CPU implementations of the dense operations used in
//! training and inference. These are the functions behind
//! [`Ten32::matmul`], [`Ten32::transpose`], [`Ten32::im2col`] and
//! [`Ten32::col2im`].
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon) where the
//!   output decomposes into disjoint chunks (matmul rows, patch-matrix
//!   rows, output channels)
//! - Pure safe Rust, deterministic results
//!
//! ## Safety
//!
//! All kernels validate operand ranks and shapes up front and panic with a
//! descriptive message on mismatch; these are programmer errors, not
//! recoverable conditions.

use rayon::prelude::*;

use crate::tensors::{Ten32, Tensor};

/// Performs a matrix multiplication `C = A × B` on two rank-2 tensors
/// (`A: m×k`, `B: k×n`).
///
/// # Returns
/// Output tensor of shape `[m, n]`.
///
/// # Optimizations
/// Uses `rayon` for parallel row computation.
///
/// # Panics
/// Panics if either operand is not rank 2, or if the inner dimensions of
/// `A` and `B` do not match.
///
/// # Example
/// ```rust
/// use neurite::tensor;
///
/// let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
/// let c = a.matmul(&b);
/// assert_eq!(c.shape(), &[2, 2]);
/// ```
pub fn matmul(a: &Ten32, b: &Ten32) -> Ten32 {
    assert_eq!(a.shape().len(), 2, "matmul requires rank-2 operands");
    assert_eq!(b.shape().len(), 2, "matmul requires rank-2 operands");

    let m = a.shape()[0];
    let k = a.shape()[1];
    let n = b.shape()[1];
    assert_eq!(
        k,
        b.shape()[0],
        "matmul shape mismatch: {:?} x {:?}",
        a.shape(),
        b.shape()
    );

    let a_data = a.data();
    let b_data = b.data();

    let mut out_data = vec![0.0f32; m * n];
    out_data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, slot) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for l in 0..k {
                sum += a_data[i * k + l] * b_data[l * n + j];
            }
            *slot = sum;
        }
    });

    Tensor::new(vec![m, n], out_data)
}

/// Transposes a rank-2 tensor, relaying out the data accordingly.
///
/// # Panics
/// Panics if the operand is not rank 2.
pub fn transpose(t: &Ten32) -> Ten32 {
    assert_eq!(
        t.shape().len(),
        2,
        "transpose requires a rank-2 tensor, got shape {:?}",
        t.shape()
    );

    let rows = t.shape()[0];
    let cols = t.shape()[1];
    let data = t.data();

    let mut out = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = data[i * cols + j];
        }
    }

    Tensor::new(vec![cols, rows], out)
}

/// Spatial extent after sliding a kernel over a padded axis.
///
/// `1 + (extent + 2*padding - kernel) / stride`, integer division.
pub(crate) fn conv_out_extent(extent: usize, kernel: usize, padding: usize, stride: usize) -> usize {
    assert!(stride > 0, "stride must be nonzero");
    assert!(
        extent + 2 * padding >= kernel,
        "kernel {kernel} larger than padded extent {}",
        extent + 2 * padding
    );
    1 + (extent + 2 * padding - kernel) / stride
}

/// Unrolls a rank-3 `(channels, height, width)` tensor into a rank-2 patch
/// matrix of shape `(channels*kernel_h*kernel_w, out_h*out_w)`.
///
/// Column `i*out_w + j` holds the flattened receptive field whose top-left
/// corner sits at `(i*stride - padding, j*stride - padding)`; positions
/// outside the spatial extent contribute zero. Rows are ordered
/// channel-major, then kernel-row, then kernel-col, matching the flattening
/// of a `(filters, channels, kh, kw)` weight tensor so that
/// `weights_flat.matmul(&im2col(input))` computes the convolution.
///
/// # Panics
/// Panics if the input is not rank 3 or the kernel oversteps the padded
/// extent.
pub fn im2col(input: &Ten32, kernel_h: usize, kernel_w: usize, padding: usize, stride: usize) -> Ten32 {
    assert_eq!(
        input.shape().len(),
        3,
        "im2col requires a (channels, height, width) tensor, got shape {:?}",
        input.shape()
    );

    let channels = input.shape()[0];
    let height = input.shape()[1];
    let width = input.shape()[2];
    let out_h = conv_out_extent(height, kernel_h, padding, stride);
    let out_w = conv_out_extent(width, kernel_w, padding, stride);

    let rows = channels * kernel_h * kernel_w;
    let cols = out_h * out_w;
    let data = input.data();

    let mut out = vec![0.0f32; rows * cols];
    out.par_chunks_mut(cols).enumerate().for_each(|(row, line)| {
        let c = row / (kernel_h * kernel_w);
        let k = row % (kernel_h * kernel_w);
        let ky = k / kernel_w;
        let kx = k % kernel_w;

        for i in 0..out_h {
            let y = (i * stride + ky) as isize - padding as isize;
            for j in 0..out_w {
                let x = (j * stride + kx) as isize - padding as isize;
                if y < 0 || y as usize >= height || x < 0 || x as usize >= width {
                    continue;
                }
                line[i * out_w + j] =
                    data[c * height * width + y as usize * width + x as usize];
            }
        }
    });

    Tensor::new(vec![rows, cols], out)
}

/// Scatter-adds a patch matrix back into a `(channels, height, width)`
/// accumulator; the exact adjoint of [`im2col`] for the same kernel,
/// padding and stride.
///
/// Every patch-matrix entry is added at the input position it was read
/// from; positions that fell in the zero padding are dropped. Used to
/// route gradients back through convolution.
///
/// # Panics
/// Panics if `col` is not rank 2, `target_shape` is not rank 3, or the
/// patch-matrix dimensions are inconsistent with the target and kernel.
pub fn col2im(
    col: &Ten32,
    target_shape: &[usize],
    kernel_h: usize,
    kernel_w: usize,
    padding: usize,
    stride: usize,
) -> Ten32 {
    assert_eq!(col.shape().len(), 2, "col2im requires a rank-2 patch matrix");
    assert_eq!(
        target_shape.len(),
        3,
        "col2im target must be (channels, height, width), got {target_shape:?}"
    );

    let channels = target_shape[0];
    let height = target_shape[1];
    let width = target_shape[2];
    let out_h = conv_out_extent(height, kernel_h, padding, stride);
    let out_w = conv_out_extent(width, kernel_w, padding, stride);

    assert_eq!(
        col.shape(),
        &[channels * kernel_h * kernel_w, out_h * out_w],
        "patch matrix shape {:?} inconsistent with target {target_shape:?}",
        col.shape()
    );

    let cols = out_h * out_w;
    let col_data = col.data();

    // Rows of a given channel scatter only into that channel's plane, so
    // parallelizing over channels keeps the writes disjoint.
    let mut out = vec![0.0f32; channels * height * width];
    out.par_chunks_mut(height * width)
        .enumerate()
        .for_each(|(c, plane)| {
            for k in 0..kernel_h * kernel_w {
                let row = c * kernel_h * kernel_w + k;
                let ky = k / kernel_w;
                let kx = k % kernel_w;

                for i in 0..out_h {
                    let y = (i * stride + ky) as isize - padding as isize;
                    for j in 0..out_w {
                        let x = (j * stride + kx) as isize - padding as isize;
                        if y < 0 || y as usize >= height || x < 0 || x as usize >= width {
                            continue;
                        }
                        plane[y as usize * width + x as usize] +=
                            col_data[row * cols + i * out_w + j];
                    }
                }
            }
        });

    Tensor::new(target_shape.to_vec(), out)
}
