use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};

fn strip_conv<B: Backend>(channels: usize, k: usize, horizontal: bool, device: &Device<B>) -> Conv2d<B> {
    let (kernel, padding) = if horizontal {
        ([1, k], PaddingConfig2d::Explicit(0, k / 2))
    } else {
        ([k, 1], PaddingConfig2d::Explicit(k / 2, 0))
    };
    Conv2dConfig::new([channels, channels], kernel)
        .with_padding(padding)
        .with_groups(channels)
        .init(device)
}

/// Configuration for the [`MultiScaleStripAttn`] module.
#[derive(Config, Debug)]
pub struct MultiScaleStripAttnConfig {
    /// Number of channels (preserved).
    channels: usize,
}

impl MultiScaleStripAttnConfig {
    /// Initializes a [`MultiScaleStripAttn`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> MultiScaleStripAttn<B> {
        let conv_base = Conv2dConfig::new([self.channels, self.channels], [5, 5])
            .with_padding(PaddingConfig2d::Explicit(2, 2))
            .with_groups(self.channels)
            .init(device);

        MultiScaleStripAttn {
            conv_base,
            conv_h7: strip_conv(self.channels, 7, true, device),
            conv_v7: strip_conv(self.channels, 7, false, device),
            conv_h11: strip_conv(self.channels, 11, true, device),
            conv_v11: strip_conv(self.channels, 11, false, device),
            conv_h21: strip_conv(self.channels, 21, true, device),
            conv_v21: strip_conv(self.channels, 21, false, device),
            conv_mix: Conv2dConfig::new([self.channels, self.channels], [1, 1]).init(device),
        }
    }
}

/// Multi-scale strip attention.
///
/// A depthwise 5x5 base is refined by three depthwise strip-pair branches
/// (7, 11 and 21 wide) approximating large square kernels at strip cost;
/// the summed maps pass through a 1x1 mixing convolution and multiply the
/// input. Shape preserving.
#[derive(Module, Debug)]
pub struct MultiScaleStripAttn<B: Backend> {
    conv_base: Conv2d<B>,
    conv_h7: Conv2d<B>,
    conv_v7: Conv2d<B>,
    conv_h11: Conv2d<B>,
    conv_v11: Conv2d<B>,
    conv_h21: Conv2d<B>,
    conv_v21: Conv2d<B>,
    conv_mix: Conv2d<B>,
}

impl<B: Backend> MultiScaleStripAttn<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let base = self.conv_base.forward(x.clone());
        let branch7 = self.conv_v7.forward(self.conv_h7.forward(base.clone()));
        let branch11 = self.conv_v11.forward(self.conv_h11.forward(base.clone()));
        let branch21 = self.conv_v21.forward(self.conv_h21.forward(base.clone()));
        let attn = base + branch7 + branch11 + branch21;
        let attn = self.conv_mix.forward(attn);
        x * attn
    }
}
