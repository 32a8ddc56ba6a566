use burn::{
    prelude::*,
    tensor::{
        module::{interpolate, max_pool2d},
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::config::InterpolateKind;

const fn interpolate_mode(kind: &InterpolateKind) -> InterpolateMode {
    match kind {
        InterpolateKind::Bilinear => InterpolateMode::Bilinear,
        InterpolateKind::Nearest => InterpolateMode::Nearest,
    }
}

/// Resize a feature map to the target spatial size.
///
/// Equal sizes pass through unchanged. Burn's `interpolate` exposes no
/// corner-alignment flag, so only the sampling mode is honored.
pub fn resize<B: Backend>(
    x: Tensor<B, 4>,
    size: [usize; 2],
    mode: &InterpolateKind,
) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    if [h, w] == size {
        return x;
    }
    interpolate(x, size, InterpolateOptions::new(interpolate_mode(mode)))
}

/// Resize policy of the reversed-pyramid fusion nodes.
///
/// Growing inputs are interpolated to the target size. Shrinking inputs are
/// replication-padded to even extents and halved with a 2x2 max-pool; a
/// single call therefore reduces by at most 2x, and callers are expected to
/// pass scale ratios that are exact powers of two.
pub fn resize_or_pool<B: Backend>(
    x: Tensor<B, 4>,
    size: [usize; 2],
    mode: &InterpolateKind,
) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    if [h, w] == size {
        x
    } else if (h, w) < (size[0], size[1]) {
        interpolate(x, size, InterpolateOptions::new(interpolate_mode(mode)))
    } else {
        let x = pad_replicate_bottom_right(x, h % 2, w % 2);
        max_pool2d(x, [2, 2], [2, 2], [0, 0], [1, 1])
    }
}

/// Pad the bottom/right borders by replicating the last row/column.
fn pad_replicate_bottom_right<B: Backend>(
    x: Tensor<B, 4>,
    pad_h: usize,
    pad_w: usize,
) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    let x = if pad_w > 0 {
        let last_col = x.clone().slice([0..b, 0..c, 0..h, w - 1..w]);
        let mut parts = vec![x];
        parts.resize(1 + pad_w, last_col);
        Tensor::cat(parts, 3)
    } else {
        x
    };
    let [b, c, h, w] = x.dims();
    if pad_h > 0 {
        let last_row = x.clone().slice([0..b, 0..c, h - 1..h, 0..w]);
        let mut parts = vec![x];
        parts.resize(1 + pad_h, last_row);
        Tensor::cat(parts, 2)
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn equal_size_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 8, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = resize_or_pool(x.clone(), [8, 8], &InterpolateKind::Bilinear);
        assert_eq!(x.into_data(), y.into_data());
    }

    #[test]
    fn smaller_input_is_upsampled() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 4, 4],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = resize_or_pool(x, [8, 8], &InterpolateKind::Bilinear);
        assert_eq!(y.dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn larger_input_is_halved() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 16, 16],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = resize_or_pool(x, [8, 8], &InterpolateKind::Bilinear);
        assert_eq!(y.dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn odd_input_rounds_up_through_padding() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 2, 9, 7],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = resize_or_pool(x, [5, 4], &InterpolateKind::Bilinear);
        assert_eq!(y.dims(), [1, 2, 5, 4]);
    }

    #[test]
    fn nearest_mode_upsamples() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 1, 2, 2],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = resize(x, [4, 4], &InterpolateKind::Nearest);
        assert_eq!(y.dims(), [1, 1, 4, 4]);
    }
}
