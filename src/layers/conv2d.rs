use rand::rngs::StdRng;

use super::{Activation, Layer};
use crate::ops::cpu::conv_out_extent;
use crate::tensors::{Ten32, Tensor};

/// A 2D convolution layer over `(channels, height, width)` tensors.
///
/// The convolution is computed as a matrix product: the weight tensor
/// `(filters, in_channels, kh, kw)` is flattened to
/// `(filters, in_channels*kh*kw)` and multiplied against the
/// [`im2col`](crate::ops::cpu::im2col) patch matrix of the input, which
/// makes the backward pass a pair of matrix products plus a
/// [`col2im`](crate::ops::cpu::col2im) scatter.
#[derive(Debug)]
pub struct Conv2D {
    filters: usize,
    kernel: (usize, usize),
    padding: usize,
    stride: usize,
    activation: Activation,
    state: Option<State>,
    cache: Option<Cache>,
}

#[derive(Debug)]
struct State {
    in_shape: Vec<usize>,
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
    patches: Ten32,
}

impl Conv2D {
    /// A convolution of `filters` kernels of shape `(kh, kw)`, with
    /// symmetric zero `padding` and square `stride`.
    pub fn new(
        filters: usize,
        kernel: (usize, usize),
        padding: usize,
        stride: usize,
        activation: Activation,
    ) -> Self {
        assert!(filters > 0, "conv layer needs at least one filter");
        assert!(
            kernel.0 > 0 && kernel.1 > 0,
            "kernel extents must be nonzero"
        );
        assert!(stride > 0, "stride must be nonzero");
        Self {
            filters,
            kernel,
            padding,
            stride,
            activation,
            state: None,
            cache: None,
        }
    }

    fn state(&self) -> &State {
        self.state
            .as_ref()
            .expect("conv layer not compiled; call Model::compile first")
    }

    /// The weight tensor `(filters, in_channels, kh, kw)`, after compile.
    pub fn weights(&self) -> &Ten32 {
        &self.state().weights
    }

    /// Mutable weight access, e.g. to load known kernels in tests.
    pub fn weights_mut(&mut self) -> &mut Ten32 {
        &mut self
            .state
            .as_mut()
            .expect("conv layer not compiled; call Model::compile first")
            .weights
    }

    /// The per-filter bias vector `(filters,)`, after compile.
    pub fn biases(&self) -> &Ten32 {
        &self.state().biases
    }

    /// The per-batch weight-gradient accumulator.
    pub fn grad_weights(&self) -> &Ten32 {
        &self.state().grad_weights
    }

    /// The per-batch bias-gradient accumulator.
    pub fn grad_biases(&self) -> &Ten32 {
        &self.state().grad_biases
    }

    /// Weight tensor reshaped to `(filters, in_channels*kh*kw)`.
    fn flat_weights(state: &State, kernel: (usize, usize)) -> Ten32 {
        let in_channels = state.in_shape[0];
        state
            .weights
            .clone()
            .into_reshaped(vec![state.out_shape[0], in_channels * kernel.0 * kernel.1])
    }
}

impl Layer for Conv2D {
    fn compile(&mut self, in_shape: &[usize], rng: &mut StdRng) {
        assert_eq!(
            in_shape.len(),
            3,
            "conv layer expects a (channels, height, width) input, got {in_shape:?}"
        );
        let (kh, kw) = self.kernel;
        let out_h = conv_out_extent(in_shape[1], kh, self.padding, self.stride);
        let out_w = conv_out_extent(in_shape[2], kw, self.padding, self.stride);

        let mut weights = Tensor::zeros(vec![self.filters, in_shape[0], kh, kw]);
        weights.fill_random(rng);
        // per-filter biases start at zero
        let biases = Tensor::zeros(vec![self.filters]);

        self.state = Some(State {
            in_shape: in_shape.to_vec(),
            out_shape: vec![self.filters, out_h, out_w],
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
            .expect("conv layer not compiled; call Model::compile first");
        let (kh, kw) = self.kernel;

        let weights_flat = Self::flat_weights(state, self.kernel);
        let patches = input.im2col(kh, kw, self.padding, self.stride);

        let mut z = weights_flat
            .matmul(&patches)
            .into_reshaped(state.out_shape.clone());
        for f in 0..self.filters {
            let bias = state.biases[[f]];
            for slot in z.slice_mut(&[f]) {
                *slot += bias;
            }
        }

        let activation = self.activation;
        let a = z.map(|x| activation.apply(x));

        if training {
            self.cache = Some(Cache {
                activation: a.clone(),
                preactivation: z,
                patches,
            });
        }
        a
    }

    fn backward(&mut self, mut delta: Ten32, _prev_activation: &Ten32) -> Ten32 {
        let state = self
            .state
            .as_mut()
            .expect("conv layer not compiled; call Model::compile first");
        let cache = self
            .cache
            .as_mut()
            .expect("no training forward pass recorded");
        let (kh, kw) = self.kernel;

        let activation = self.activation;
        cache.preactivation.map_inplace(|x| activation.derivative(x));
        delta *= &cache.preactivation;

        // db: collapse the spatial axes
        state.grad_biases += &delta.sum_axes(&[1, 2]);

        // dw: delta (as filters × positions) against the cached patches
        let out_h = state.out_shape[1];
        let out_w = state.out_shape[2];
        let delta_flat = delta
            .clone()
            .into_reshaped(vec![self.filters, out_h * out_w]);
        let dw = delta_flat
            .matmul(&cache.patches.transpose())
            .into_reshaped(state.weights.shape().to_vec());
        state.grad_weights += &dw;

        // delta for the previous layer: back through the matmul, then
        // scatter the patch columns to their spatial origins
        let weights_flat = Self::flat_weights(state, self.kernel);
        let delta_col = weights_flat.transpose().matmul(&delta_flat);
        delta_col.col2im(&state.in_shape, kh, kw, self.padding, self.stride)
    }

    fn update(&mut self, learning_rate: f32) {
        let state = self
            .state
            .as_mut()
            .expect("conv layer not compiled; call Model::compile first");

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
