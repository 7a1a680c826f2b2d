use neurite::approx::{ApproxEq, F32_MAX_ERROR};
use neurite::layers::{Activation, Conv2D, Dense, Layer, MaxPooling2D};
use neurite::tensors::{Fill, Ten32, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sequence(shape: &[usize]) -> Ten32 {
    let mut t = Tensor::zeros(shape.to_vec());
    t.fill(Fill::Sequence);
    t
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

#[test]
fn test_im2col_shape_and_first_column() {
    let input = sequence(&[1, 4, 4]);
    let col = input.im2col(3, 3, 0, 1);

    // 1 channel * 3*3 kernel rows, 2*2 output positions
    assert_eq!(col.shape(), &[9, 4]);

    // column 0 is the window anchored at (0, 0), read row by row
    let expected = [0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 8.0, 9.0, 10.0];
    for (row, want) in expected.iter().enumerate() {
        assert_eq!(col[[row, 0]], *want);
    }
}

#[test]
fn test_im2col_zero_padding() {
    let input = sequence(&[1, 2, 2]);
    let col = input.im2col(3, 3, 1, 1);
    assert_eq!(col.shape(), &[9, 4]);

    // window anchored over the top-left corner: five taps fall in padding
    let expected = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 3.0];
    for (row, want) in expected.iter().enumerate() {
        assert_eq!(col[[row, 0]], *want);
    }
}

#[test]
fn test_im2col_rejects_non_rank_three() {
    let result = std::panic::catch_unwind(|| sequence(&[4, 4]).im2col(2, 2, 0, 1));
    assert!(result.is_err());
}

#[test]
fn test_col2im_inverts_non_overlapping_im2col() {
    // stride == kernel: every input element lands in exactly one column
    let input = sequence(&[2, 4, 4]);
    let col = input.im2col(2, 2, 0, 2);
    let back = col.col2im(&[2, 4, 4], 2, 2, 0, 2);
    assert_eq!(back, input);
}

#[test]
fn test_col2im_is_adjoint_of_im2col() {
    // <im2col(x), y> == <x, col2im(y)> for any x and y
    let mut r = rng();
    let mut x: Ten32 = Tensor::zeros(vec![2, 5, 5]);
    x.fill_random(&mut r);

    let col_shape = x.im2col(3, 3, 1, 2).shape().to_vec();
    let mut y: Ten32 = Tensor::zeros(col_shape);
    y.fill_random(&mut r);

    let lhs: f32 = x
        .im2col(3, 3, 1, 2)
        .data()
        .iter()
        .zip(y.data())
        .map(|(a, b)| a * b)
        .sum();
    let rhs: f32 = x
        .data()
        .iter()
        .zip(y.col2im(&[2, 5, 5], 3, 3, 1, 2).data())
        .map(|(a, b)| a * b)
        .sum();

    assert!(lhs.approx_eq(&rhs, F32_MAX_ERROR), "{lhs} vs {rhs}");
}

#[test]
fn test_conv_forward_ones_kernel() {
    let mut conv = Conv2D::new(1, (3, 3), 0, 1, Activation::linear());
    conv.compile(&[1, 4, 4], &mut rng());
    conv.weights_mut().fill(Fill::Ones);

    let out = conv.forward(&sequence(&[1, 4, 4]), false);
    assert_eq!(out.shape(), &[1, 2, 2]);
    // each output is the sum of a 3x3 window of the 0..16 ramp
    assert_eq!(out.data(), &[45.0, 54.0, 81.0, 90.0]);
}

#[test]
fn test_conv_forward_custom_kernel() {
    let mut conv = Conv2D::new(1, (2, 2), 0, 1, Activation::linear());
    conv.compile(&[1, 3, 3], &mut rng());
    *conv.weights_mut() = Tensor::new(vec![1, 1, 2, 2], vec![1.0, 0.0, 0.0, -1.0]);

    // out[i][j] = in[i][j] - in[i+1][j+1], constant -4 on a ramp
    let out = conv.forward(&sequence(&[1, 3, 3]), false);
    assert_eq!(out.data(), &[-4.0, -4.0, -4.0, -4.0]);
}

#[test]
fn test_conv_backward_accumulates_gradients() {
    let input = sequence(&[1, 3, 3]);
    let mut conv = Conv2D::new(1, (2, 2), 0, 1, Activation::linear());
    conv.compile(&[1, 3, 3], &mut rng());
    conv.weights_mut().fill(Fill::Ones);

    conv.forward(&input, true);
    let delta = Tensor::new(vec![1, 2, 2], vec![1.0; 4]);
    let back = conv.backward(delta, &input);

    // db = sum of the delta plane
    assert_eq!(conv.grad_biases().data(), &[4.0]);

    // dw[ky][kx] = sum over output positions of input[i+ky][j+kx]
    // for a unit delta, that is the sum of a shifted 2x2 block of the ramp
    assert_eq!(conv.grad_weights().data(), &[8.0, 12.0, 20.0, 24.0]);

    // with a ones kernel the input delta counts window coverage per cell
    assert_eq!(back.shape(), &[1, 3, 3]);
    assert_eq!(
        back.data(),
        &[1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]
    );
}

#[test]
fn test_conv_update_applies_and_resets() {
    let input = sequence(&[1, 3, 3]);
    let mut conv = Conv2D::new(1, (2, 2), 0, 1, Activation::linear());
    conv.compile(&[1, 3, 3], &mut rng());
    conv.weights_mut().fill(Fill::Ones);

    conv.forward(&input, true);
    conv.backward(Tensor::new(vec![1, 2, 2], vec![1.0; 4]), &input);
    conv.update(0.5);

    assert_eq!(conv.weights().data(), &[-3.0, -5.0, -9.0, -11.0]);
    assert_eq!(conv.biases().data(), &[-2.0]);
    assert_eq!(conv.grad_weights().data(), &[0.0; 4]);
    assert_eq!(conv.grad_biases().data(), &[0.0]);
}

#[test]
fn test_conv_param_count() {
    let mut conv = Conv2D::new(4, (3, 3), 1, 1, Activation::relu());
    conv.compile(&[2, 8, 8], &mut rng());
    // 4 filters * 2 channels * 3*3 weights, plus 4 biases
    assert_eq!(conv.param_count(), 76);
    assert_eq!(conv.out_shape(), &[4, 8, 8]);
}

#[test]
fn test_maxpool_forward() {
    let mut pool = MaxPooling2D::new((2, 2), 0, 2);
    pool.compile(&[1, 4, 4], &mut rng());

    let out = pool.forward(&sequence(&[1, 4, 4]), false);
    assert_eq!(out.shape(), &[1, 2, 2]);
    assert_eq!(out.data(), &[5.0, 7.0, 13.0, 15.0]);
}

#[test]
fn test_maxpool_backward_routes_to_winners() {
    let input = sequence(&[1, 4, 4]);
    let mut pool = MaxPooling2D::new((2, 2), 0, 2);
    pool.compile(&[1, 4, 4], &mut rng());

    pool.forward(&input, true);
    let delta = Tensor::new(vec![1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let back = pool.backward(delta, &input);

    assert_eq!(back.shape(), &[1, 4, 4]);
    assert_eq!(back[[0, 1, 1]], 1.0);
    assert_eq!(back[[0, 1, 3]], 2.0);
    assert_eq!(back[[0, 3, 1]], 3.0);
    assert_eq!(back[[0, 3, 3]], 4.0);
    assert_eq!(back.data().iter().sum::<f32>(), 10.0);
}

#[test]
fn test_maxpool_overlapping_windows_conserve_gradient() {
    // stride 1 windows overlap; scatter-adds must not lose mass
    let input = sequence(&[1, 3, 3]);
    let mut pool = MaxPooling2D::new((2, 2), 0, 1);
    pool.compile(&[1, 3, 3], &mut rng());

    pool.forward(&input, true);
    let delta = Tensor::new(vec![1, 2, 2], vec![1.0; 4]);
    let back = pool.backward(delta, &input);

    assert_eq!(back.data().iter().sum::<f32>(), 4.0);
    // on a ramp every window's max is its bottom-right corner
    assert_eq!(back[[0, 1, 1]], 1.0);
    assert_eq!(back[[0, 1, 2]], 1.0);
    assert_eq!(back[[0, 2, 1]], 1.0);
    assert_eq!(back[[0, 2, 2]], 1.0);
}

#[test]
fn test_maxpool_tie_breaks_to_first_in_scan_order() {
    let mut input: Ten32 = Tensor::zeros(vec![1, 2, 2]);
    input.fill(Fill::Ones);

    let mut pool = MaxPooling2D::new((2, 2), 0, 2);
    pool.compile(&[1, 2, 2], &mut rng());
    pool.forward(&input, true);

    let back = pool.backward(Tensor::new(vec![1, 1, 1], vec![5.0]), &input);
    assert_eq!(back[[0, 0, 0]], 5.0);
    assert_eq!(back.data().iter().sum::<f32>(), 5.0);
}

#[test]
fn test_maxpool_has_no_parameters() {
    let mut pool = MaxPooling2D::new((2, 2), 0, 2);
    pool.compile(&[3, 8, 8], &mut rng());
    assert_eq!(pool.param_count(), 0);
    assert_eq!(pool.out_shape(), &[3, 4, 4]);
}

#[test]
fn test_dense_forward_known_values() {
    let mut dense = Dense::new(2, Activation::linear());
    dense.compile(&[2], &mut rng());
    *dense.weights_mut() = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    *dense.biases_mut() = Tensor::new(vec![2, 1], vec![0.5, -0.5]);

    let out = dense.forward(&Tensor::new(vec![2, 1], vec![1.0, 2.0]), false);
    assert_eq!(out.shape(), &[2, 1]);
    assert_eq!(out.data(), &[5.5, 10.5]);
}

#[test]
fn test_dense_backward_and_update() {
    let input = Tensor::new(vec![2, 1], vec![1.0, 2.0]);
    let mut dense = Dense::new(2, Activation::linear());
    dense.compile(&[2], &mut rng());
    *dense.weights_mut() = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    *dense.biases_mut() = Tensor::new(vec![2, 1], vec![0.5, -0.5]);

    dense.forward(&input, true);
    let back = dense.backward(Tensor::new(vec![2, 1], vec![1.0, 1.0]), &input);

    assert_eq!(dense.grad_biases().data(), &[1.0, 1.0]);
    assert_eq!(dense.grad_weights().data(), &[1.0, 2.0, 1.0, 2.0]);
    // W^T . delta
    assert_eq!(back.data(), &[4.0, 6.0]);

    dense.update(0.1);
    assert_eq!(dense.weights().data(), &[0.9, 1.8, 2.9, 3.8]);
    assert_eq!(dense.biases().data(), &[0.4, -0.6]);
    assert_eq!(dense.grad_weights().data(), &[0.0; 4]);
    assert_eq!(dense.grad_biases().data(), &[0.0, 0.0]);
}

#[test]
fn test_dense_sigmoid_folds_derivative_into_delta() {
    let input = Tensor::new(vec![1, 1], vec![0.0]);
    let mut dense = Dense::new(1, Activation::sigmoid());
    dense.compile(&[1], &mut rng());
    *dense.weights_mut() = Tensor::new(vec![1, 1], vec![1.0]);
    *dense.biases_mut() = Tensor::new(vec![1, 1], vec![0.0]);

    // z = 0, sigma(0) = 0.5, sigma'(0) = 0.25
    let out = dense.forward(&input, true);
    assert!(out.data()[0].approx_eq(&0.5, F32_MAX_ERROR));

    dense.backward(Tensor::new(vec![1, 1], vec![1.0]), &input);
    assert!(dense.grad_biases().data()[0].approx_eq(&0.25, F32_MAX_ERROR));
}

#[test]
fn test_uncompiled_layer_panics() {
    let result = std::panic::catch_unwind(|| {
        let mut dense = Dense::new(2, Activation::sigmoid());
        dense.forward(&Tensor::new(vec![2, 1], vec![0.0, 0.0]), false);
    });
    assert!(result.is_err());
}
