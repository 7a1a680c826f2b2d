use rand::rngs::StdRng;

use super::Layer;
use crate::ops::cpu::conv_out_extent;
use crate::tensors::{Ten32, Tensor};

/// A 2D max-pooling layer over `(channels, height, width)` tensors.
///
/// No parameters. The forward pass records, per output cell, the input
/// coordinate that won the window (ties break to the first maximum in scan
/// order); the backward pass scatter-adds each upstream delta into exactly
/// that coordinate, so the total gradient mass is conserved even when
/// windows overlap.
#[derive(Debug)]
pub struct MaxPooling2D {
    kernel: (usize, usize),
    padding: usize,
    stride: usize,
    state: Option<State>,
    cache: Option<Cache>,
}

#[derive(Debug)]
struct State {
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
}

#[derive(Debug)]
struct Cache {
    activation: Ten32,
    /// Winning input coordinate per output cell, in output scan order.
    /// `None` when the whole window fell in the zero padding.
    winners: Vec<Option<[usize; 3]>>,
}

impl MaxPooling2D {
    /// A pooling window of shape `(kh, kw)` with symmetric zero `padding`
    /// and square `stride`.
    pub fn new(kernel: (usize, usize), padding: usize, stride: usize) -> Self {
        assert!(
            kernel.0 > 0 && kernel.1 > 0,
            "pooling window extents must be nonzero"
        );
        assert!(stride > 0, "stride must be nonzero");
        Self {
            kernel,
            padding,
            stride,
            state: None,
            cache: None,
        }
    }

    fn state(&self) -> &State {
        self.state
            .as_ref()
            .expect("pooling layer not compiled; call Model::compile first")
    }
}

impl Layer for MaxPooling2D {
    fn compile(&mut self, in_shape: &[usize], _rng: &mut StdRng) {
        assert_eq!(
            in_shape.len(),
            3,
            "pooling layer expects a (channels, height, width) input, got {in_shape:?}"
        );
        let out_h = conv_out_extent(in_shape[1], self.kernel.0, self.padding, self.stride);
        let out_w = conv_out_extent(in_shape[2], self.kernel.1, self.padding, self.stride);

        self.state = Some(State {
            in_shape: in_shape.to_vec(),
            out_shape: vec![in_shape[0], out_h, out_w],
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
            .expect("pooling layer not compiled; call Model::compile first");

        let channels = input.shape()[0];
        let height = input.shape()[1];
        let width = input.shape()[2];
        let (kh, kw) = self.kernel;
        let out_h = state.out_shape[1];
        let out_w = state.out_shape[2];

        let mut out = Tensor::zeros(state.out_shape.clone());
        let mut winners = Vec::with_capacity(channels * out_h * out_w);

        for c in 0..channels {
            for i in 0..out_h {
                for j in 0..out_w {
                    let mut best: Option<(f32, [usize; 3])> = None;
                    for k in 0..kh * kw {
                        let y = (i * self.stride + k / kw) as isize - self.padding as isize;
                        let x = (j * self.stride + k % kw) as isize - self.padding as isize;
                        if y < 0 || y as usize >= height || x < 0 || x as usize >= width {
                            continue;
                        }
                        let value = input[[c, y as usize, x as usize]];
                        // strict comparison: first maximum in scan order wins
                        if best.is_none_or(|(max, _)| value > max) {
                            best = Some((value, [c, y as usize, x as usize]));
                        }
                    }
                    out[[c, i, j]] = best.map_or(0.0, |(max, _)| max);
                    winners.push(best.map(|(_, coords)| coords));
                }
            }
        }

        if training {
            self.cache = Some(Cache {
                activation: out.clone(),
                winners,
            });
        }
        out
    }

    fn backward(&mut self, delta: Ten32, _prev_activation: &Ten32) -> Ten32 {
        let state = self
            .state
            .as_ref()
            .expect("pooling layer not compiled; call Model::compile first");
        let cache = self
            .cache
            .as_ref()
            .expect("no training forward pass recorded");
        assert_eq!(
            delta.shape(),
            &state.out_shape[..],
            "pooling delta shape mismatch"
        );

        let mut new_delta = Tensor::zeros(state.in_shape.clone());
        for (cell, winner) in cache.winners.iter().enumerate() {
            if let Some(coords) = winner {
                new_delta[&coords[..]] += delta.data()[cell];
            }
        }
        new_delta
    }

    fn last_activation(&self) -> &Ten32 {
        &self
            .cache
            .as_ref()
            .expect("no training forward pass recorded")
            .activation
    }
}
