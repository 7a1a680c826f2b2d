//! Core tensor data structures and operations.
//!
//! # Core Tensor Utilities
//!
//! This module defines the core logic for representing, manipulating, and
//! computing with multi-dimensional arrays, or tensors.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Fill strategies (zeros, ones, sequence, uniform random, custom generators)
//! - Bounds-checked coordinate indexing
//! - Elementwise arithmetic and scalar maps
//! - Axis reduction (`reduce` / `sum_axes`)
//! - Size-preserving reshape and owned/borrowed sub-tensor extraction
//! - Compile-time tensor literals via the `tensor!` macro
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type; the
//!   compute kernels operate on [`Ten32`] (`Tensor<f32>`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - `Clone` is a deep snapshot; aliasing views are the borrow-checked
//!   [`Tensor::slice`] / [`Tensor::slice_mut`], so a cached tensor can never
//!   be mutated behind your back
//! - Random fills draw from an explicitly passed generator, never a global one
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting: elementwise operations require identical shapes
//!
//! ## Example
//!
//! ```rust
//! use neurite::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape(), &[2, 3]);
//! ```

use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

use rand::Rng;

/// The tensor type used by every compute kernel and layer (`f32`, matching
/// single-precision training).
pub type Ten32 = Tensor<f32>;

/// Bulk fill strategies for [`Tensor::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Every element set to `0.0`.
    Zeros,
    /// Every element set to `1.0`.
    Ones,
    /// Element `i` set to `i as f32` (flat row-major order).
    Sequence,
}

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the shape is empty or the number of elements in `data` does
    /// not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert!(!shape.is_empty(), "tensor rank must be at least 1");
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// The extent of every axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements (product of the shape).
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The flat row-major buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the flat row-major buffer.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Reinterprets the buffer with a new shape, in place. No data moves.
    ///
    /// # Panics
    /// Panics if the new shape does not conserve the element count.
    pub fn reshape(&mut self, new_shape: impl Into<Vec<usize>>) {
        let new_shape = new_shape.into();
        assert!(!new_shape.is_empty(), "tensor rank must be at least 1");
        assert_eq!(
            new_shape.iter().product::<usize>(),
            self.data.len(),
            "cannot reshape {:?} ({} elements) into {:?}",
            self.shape,
            self.data.len(),
            new_shape
        );
        self.shape = new_shape;
    }

    /// Consuming variant of [`Tensor::reshape`], handy in expression position.
    #[must_use]
    pub fn into_reshaped(mut self, new_shape: impl Into<Vec<usize>>) -> Self {
        self.reshape(new_shape);
        self
    }

    /// Overwrites every element with `value`.
    pub fn fill_value(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value);
    }

    /// Overwrites every element with successive results of `generator`,
    /// in flat row-major order.
    pub fn fill_with(&mut self, mut generator: impl FnMut() -> T) {
        for slot in &mut self.data {
            *slot = generator();
        }
    }

    /// Row-major linearization of a full-rank coordinate tuple.
    ///
    /// # Panics
    /// Panics if the coordinate count differs from the rank or any
    /// coordinate is out of range for its axis.
    fn coord_to_index(&self, coords: &[usize]) -> usize {
        assert_eq!(
            coords.len(),
            self.shape.len(),
            "expected {} coordinates for shape {:?}, got {}",
            self.shape.len(),
            self.shape,
            coords.len()
        );
        let mut index = 0;
        let mut stride = 1;
        for (axis, &c) in coords.iter().enumerate().rev() {
            let extent = self.shape[axis];
            assert!(
                c < extent,
                "coordinate {c} out of range for axis {axis} (extent {extent})"
            );
            index += c * stride;
            stride *= extent;
        }
        index
    }

    /// Flat offset and length of the block selected by a leading coordinate
    /// prefix.
    fn prefix_block(&self, prefix: &[usize]) -> (usize, usize) {
        assert!(
            prefix.len() <= self.shape.len(),
            "prefix {:?} is longer than shape {:?}",
            prefix,
            self.shape
        );
        let block: usize = self.shape[prefix.len()..].iter().product();
        let mut offset = 0;
        let mut stride = block;
        for (axis, &c) in prefix.iter().enumerate().rev() {
            let extent = self.shape[axis];
            assert!(
                c < extent,
                "coordinate {c} out of range for axis {axis} (extent {extent})"
            );
            offset += c * stride;
            stride *= extent;
        }
        (offset, block)
    }

    /// Borrowed view of the trailing block selected by a leading coordinate
    /// prefix. This is the aliasing "view" of the design made safe: the
    /// borrow checker rules out concurrent mutation.
    pub fn slice(&self, prefix: &[usize]) -> &[T] {
        let (offset, block) = self.prefix_block(prefix);
        &self.data[offset..offset + block]
    }

    /// Mutable view of the trailing block selected by a leading coordinate
    /// prefix.
    pub fn slice_mut(&mut self, prefix: &[usize]) -> &mut [T] {
        let (offset, block) = self.prefix_block(prefix);
        &mut self.data[offset..offset + block]
    }

    /// Owned copy of the trailing block selected by a leading coordinate
    /// prefix, shaped as the unselected trailing axes (or `[1]` when all
    /// axes are consumed).
    #[must_use]
    pub fn extract(&self, prefix: &[usize]) -> Self
    where
        T: Clone,
    {
        let block = self.slice(prefix).to_vec();
        let trailing = &self.shape[prefix.len()..];
        let shape = if trailing.is_empty() {
            vec![1]
        } else {
            trailing.to_vec()
        };
        Self::new(shape, block)
    }

    /// Returns a new tensor with `f` applied to every element.
    #[must_use]
    pub fn map(&self, f: impl Fn(T) -> T) -> Self
    where
        T: Copy,
    {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Applies `f` to every element in place.
    pub fn map_inplace(&mut self, mut f: impl FnMut(T) -> T)
    where
        T: Copy,
    {
        for x in &mut self.data {
            *x = f(*x);
        }
    }

    /// Combines two identically shaped tensors elementwise into a new one.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    #[must_use]
    pub fn zip_map(&self, right: &Self, f: impl Fn(T, T) -> T) -> Self
    where
        T: Copy,
    {
        assert_eq!(
            self.shape, right.shape,
            "elementwise op requires identical shapes"
        );
        Self {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(&right.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// In-place variant of [`Tensor::zip_map`].
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn zip_map_inplace(&mut self, right: &Self, f: impl Fn(T, T) -> T)
    where
        T: Copy,
    {
        assert_eq!(
            self.shape, right.shape,
            "elementwise op requires identical shapes"
        );
        for (a, &b) in self.data.iter_mut().zip(&right.data) {
            *a = f(*a, b);
        }
    }

    /// Collapses `axes` by folding with `combine`, starting from `neutral`.
    ///
    /// Duplicate axes are deduplicated; axes are processed highest-index
    /// first so that lower axis numbers stay valid while reducing.
    /// Reducing away every axis yields a `[1]`-shaped tensor.
    ///
    /// # Panics
    /// Panics if any axis is out of range.
    #[must_use]
    pub fn reduce(&self, axes: &[usize], neutral: T, combine: impl Fn(T, T) -> T) -> Self
    where
        T: Copy,
    {
        let mut axes: Vec<usize> = axes.to_vec();
        axes.sort_unstable();
        axes.dedup();
        for &axis in &axes {
            assert!(
                axis < self.shape.len(),
                "reduce axis {axis} out of range for shape {:?}",
                self.shape
            );
        }

        let mut result = self.clone();
        for &axis in axes.iter().rev() {
            result = result.reduce_axis(axis, neutral, &combine);
        }
        result
    }

    /// Collapses a single axis.
    fn reduce_axis(&self, axis: usize, neutral: T, combine: &impl Fn(T, T) -> T) -> Self
    where
        T: Copy,
    {
        let extent = self.shape[axis];
        let step: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();

        let mut out_shape: Vec<usize> = self
            .shape
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != axis)
            .map(|(_, &d)| d)
            .collect();
        if out_shape.is_empty() {
            out_shape = vec![1];
        }

        let mut data = Vec::with_capacity(outer * step);
        for i in 0..outer {
            let begin = i * step * extent;
            for s in 0..step {
                let mut acc = neutral;
                for j in 0..extent {
                    acc = combine(acc, self.data[begin + j * step + s]);
                }
                data.push(acc);
            }
        }
        Self::new(out_shape, data)
    }
}

impl<T: Clone + Default> Tensor<T> {
    /// Allocates a tensor of the given shape, filled with `T::default()`.
    ///
    /// # Panics
    /// Panics if the shape is empty.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        assert!(!shape.is_empty(), "tensor rank must be at least 1");
        let size = shape.iter().product();
        Self {
            shape,
            data: vec![T::default(); size],
        }
    }
}

impl Tensor<f32> {
    /// Overwrites every element according to the chosen [`Fill`] strategy.
    pub fn fill(&mut self, fill: Fill) {
        match fill {
            Fill::Zeros => self.data.fill(0.0),
            Fill::Ones => self.data.fill(1.0),
            Fill::Sequence => {
                for (i, x) in self.data.iter_mut().enumerate() {
                    *x = i as f32;
                }
            }
        }
    }

    /// Overwrites every element with an i.i.d. uniform draw from [-1, 1].
    ///
    /// Used for parameter initialization; the generator is explicit state
    /// passed by the caller, never a process-wide source.
    pub fn fill_random(&mut self, rng: &mut impl Rng) {
        for x in &mut self.data {
            *x = rng.random_range(-1.0..=1.0);
        }
    }

    /// Sum over the listed axes. See [`Tensor::reduce`].
    #[must_use]
    pub fn sum_axes(&self, axes: &[usize]) -> Self {
        self.reduce(axes, 0.0, |a, b| a + b)
    }

    /// Transposes a rank-2 tensor. See [`crate::ops::cpu::transpose`].
    #[must_use]
    pub fn transpose(&self) -> Self {
        crate::ops::cpu::transpose(self)
    }

    /// Dense matrix product of two rank-2 tensors.
    /// See [`crate::ops::cpu::matmul`].
    #[must_use]
    pub fn matmul(&self, right: &Self) -> Self {
        crate::ops::cpu::matmul(self, right)
    }

    /// Unrolls a `(channels, height, width)` tensor into a patch matrix.
    /// See [`crate::ops::cpu::im2col`].
    #[must_use]
    pub fn im2col(&self, kernel_h: usize, kernel_w: usize, padding: usize, stride: usize) -> Self {
        crate::ops::cpu::im2col(self, kernel_h, kernel_w, padding, stride)
    }

    /// Scatter-adds a patch matrix back into a spatial tensor; the exact
    /// adjoint of [`Tensor::im2col`]. See [`crate::ops::cpu::col2im`].
    #[must_use]
    pub fn col2im(
        &self,
        target_shape: &[usize],
        kernel_h: usize,
        kernel_w: usize,
        padding: usize,
        stride: usize,
    ) -> Self {
        crate::ops::cpu::col2im(self, target_shape, kernel_h, kernel_w, padding, stride)
    }
}

impl<T> Index<&[usize]> for Tensor<T> {
    type Output = T;

    fn index(&self, coords: &[usize]) -> &T {
        &self.data[self.coord_to_index(coords)]
    }
}

impl<T> IndexMut<&[usize]> for Tensor<T> {
    fn index_mut(&mut self, coords: &[usize]) -> &mut T {
        let index = self.coord_to_index(coords);
        &mut self.data[index]
    }
}

impl<T, const N: usize> Index<[usize; N]> for Tensor<T> {
    type Output = T;

    fn index(&self, coords: [usize; N]) -> &T {
        &self[&coords[..]]
    }
}

impl<T, const N: usize> IndexMut<[usize; N]> for Tensor<T> {
    fn index_mut(&mut self, coords: [usize; N]) -> &mut T {
        &mut self[&coords[..]]
    }
}

macro_rules! elementwise_ops {
    ($( $op_trait:ident :: $op_fn:ident / $assign_trait:ident :: $assign_fn:ident ),+ $(,)?) => {
        $(
            impl<T: Copy + $op_trait<Output = T>> $op_trait for &Tensor<T> {
                type Output = Tensor<T>;

                fn $op_fn(self, right: &Tensor<T>) -> Tensor<T> {
                    self.zip_map(right, |a, b| $op_trait::$op_fn(a, b))
                }
            }

            impl<T: Copy + $op_trait<Output = T>> $assign_trait<&Tensor<T>> for Tensor<T> {
                fn $assign_fn(&mut self, right: &Tensor<T>) {
                    self.zip_map_inplace(right, |a, b| $op_trait::$op_fn(a, b));
                }
            }
        )+
    };
}

elementwise_ops!(
    Add::add / AddAssign::add_assign,
    Sub::sub / SubAssign::sub_assign,
    Mul::mul / MulAssign::mul_assign,
    Div::div / DivAssign::div_assign,
);

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in
/// shape: every nesting level contributes one axis, so
/// `tensor!([[1.0], [0.0]])` is a `[2, 1]` column. A bare literal
/// produces a `[1]`-shaped tensor.
///
/// # Example
/// ```
/// use neurite::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape(), &[2, 2]);
///
/// let column = tensor!([[1.0], [-1.0]]);
/// assert_eq!(column.shape(), &[2, 1]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(vec![1usize], vec![$lit])
    };

    // innermost axis: a flat list of literals (signs included)
    ([ $( $lit:literal ),+ $(,)? ]) => {{
        let data = vec![ $( $lit ),+ ];
        let shape = vec![data.len()];
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = children[0].shape().to_vec();
        assert!(children.iter().all(|c| c.shape() == &first_shape[..]),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(&first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].size());
        for c in children {
            data.extend_from_slice(c.data());
        }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
