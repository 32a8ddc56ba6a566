use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};

/// Configuration for the [`LargeKernelAttn`] module.
#[derive(Config, Debug)]
pub struct LargeKernelAttnConfig {
    /// Number of channels (preserved).
    channels: usize,
}

impl LargeKernelAttnConfig {
    /// Initializes a [`LargeKernelAttn`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> LargeKernelAttn<B> {
        let conv_dw = Conv2dConfig::new([self.channels, self.channels], [5, 5])
            .with_padding(PaddingConfig2d::Explicit(2, 2))
            .with_groups(self.channels)
            .init(device);
        let conv_dilated = Conv2dConfig::new([self.channels, self.channels], [7, 7])
            .with_padding(PaddingConfig2d::Explicit(9, 9))
            .with_dilation([3, 3])
            .with_groups(self.channels)
            .init(device);
        let conv_point = Conv2dConfig::new([self.channels, self.channels], [1, 1]).init(device);

        LargeKernelAttn {
            conv_dw,
            conv_dilated,
            conv_point,
        }
    }
}

/// Large-kernel spatial attention.
///
/// A depthwise 5x5, a dilated depthwise 7x7 (dilation 3) and a pointwise
/// 1x1 decompose a 21x21 receptive field; the resulting map multiplies the
/// input. Shape preserving.
#[derive(Module, Debug)]
pub struct LargeKernelAttn<B: Backend> {
    conv_dw: Conv2d<B>,
    conv_dilated: Conv2d<B>,
    conv_point: Conv2d<B>,
}

impl<B: Backend> LargeKernelAttn<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let attn = self.conv_dw.forward(x.clone());
        let attn = self.conv_dilated.forward(attn);
        let attn = self.conv_point.forward(attn);
        x * attn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn attention_preserves_shape() {
        let device = Default::default();
        let lka = LargeKernelAttnConfig::new(16).init::<TestBackend>(&device);

        let x = Tensor::random([2, 16, 12, 9], Distribution::Normal(0.0, 1.0), &device);
        let y = lka.forward(x);

        assert_eq!(y.dims(), [2, 16, 12, 9]);
    }
}
