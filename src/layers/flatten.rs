use rand::rngs::StdRng;

use super::Layer;
use crate::tensors::Ten32;

/// Reshapes whatever comes in to a `(size, 1)` column, so spatial layers
/// can feed [`Dense`](super::Dense). Pure bookkeeping: no data moves.
#[derive(Debug)]
pub struct Flatten {
    state: Option<State>,
    cache: Option<Ten32>,
}

#[derive(Debug)]
struct State {
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
}

impl Flatten {
    pub fn new() -> Self {
        Self {
            state: None,
            cache: None,
        }
    }

    fn state(&self) -> &State {
        self.state
            .as_ref()
            .expect("flatten layer not compiled; call Model::compile first")
    }
}

impl Default for Flatten {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Flatten {
    fn compile(&mut self, in_shape: &[usize], _rng: &mut StdRng) {
        assert!(
            !in_shape.is_empty(),
            "flatten layer cannot be the pipeline head"
        );
        let size = in_shape.iter().product();
        self.state = Some(State {
            in_shape: in_shape.to_vec(),
            out_shape: vec![size, 1],
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
            .expect("flatten layer not compiled; call Model::compile first");

        let out = input.clone().into_reshaped(state.out_shape.clone());
        if training {
            self.cache = Some(out.clone());
        }
        out
    }

    fn backward(&mut self, delta: Ten32, _prev_activation: &Ten32) -> Ten32 {
        let state = self
            .state
            .as_ref()
            .expect("flatten layer not compiled; call Model::compile first");

        delta.into_reshaped(state.in_shape.clone())
    }

    fn last_activation(&self) -> &Ten32 {
        self.cache
            .as_ref()
            .expect("no training forward pass recorded")
    }
}
