use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Configuration for the [`ConvBlock`] module.
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels.
    out_channels: usize,
    /// Square kernel size.
    #[config(default = "1")]
    kernel_size: usize,
    /// Convolution stride.
    #[config(default = "1")]
    stride: usize,
    /// Symmetric zero padding.
    #[config(default = "0")]
    padding: usize,
    /// Attach a BatchNorm layer. The convolution bias is dropped when set.
    #[config(default = "true")]
    norm: bool,
    /// Attach a ReLU activation.
    #[config(default = "true")]
    act: bool,
    /// Run the activation before the convolution (act-conv-norm order)
    /// instead of after the normalization (conv-norm-act order).
    #[config(default = "false")]
    pre_activate: bool,
    /// Initialize the convolution weight with uniform Xavier instead of the
    /// Burn default.
    #[config(default = "false")]
    xavier_uniform: bool,
}

impl ConvBlockConfig {
    /// Initializes a [`ConvBlock`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvBlock<B> {
        let mut conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
        .with_bias(!self.norm);
        if self.xavier_uniform {
            conv = conv.with_initializer(Initializer::XavierUniform { gain: 1.0 });
        }
        let conv = conv.init(device);
        let bn = self
            .norm
            .then(|| BatchNormConfig::new(self.out_channels).init(device));
        let relu = self.act.then(Relu::new);

        ConvBlock {
            conv,
            bn,
            relu,
            pre_activate: self.pre_activate,
        }
    }
}

/// A convolution with optional normalization and activation.
///
/// Covers the two operation orders used across the heads: conv-norm-act
/// (projectors, fusion convolutions) and act-conv-norm (the pre/post fusion
/// convolutions inside reversed-pyramid fusion nodes).
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: Option<BatchNorm<B, 2>>,
    relu: Option<Relu>,
    pre_activate: bool,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.pre_activate {
            let x = match &self.relu {
                Some(relu) => relu.forward(x),
                None => x,
            };
            let x = self.conv.forward(x);
            match &self.bn {
                Some(bn) => bn.forward(x),
                None => x,
            }
        } else {
            let x = self.conv.forward(x);
            let x = match &self.bn {
                Some(bn) => bn.forward(x),
                None => x,
            };
            match &self.relu {
                Some(relu) => relu.forward(x),
                None => x,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn conv_norm_act_preserves_spatial_size() {
        let device = Default::default();
        let block = ConvBlockConfig::new(8, 16)
            .with_kernel_size(3)
            .with_padding(1)
            .init::<TestBackend>(&device);

        let x = Tensor::random([2, 8, 14, 14], Distribution::Normal(0.0, 1.0), &device);
        let y = block.forward(x);

        assert_eq!(y.dims(), [2, 16, 14, 14]);
    }

    #[test]
    fn pre_activation_order_matches_output_shape() {
        let device = Default::default();
        let block = ConvBlockConfig::new(8, 8)
            .with_kernel_size(3)
            .with_padding(1)
            .with_pre_activate(true)
            .with_xavier_uniform(true)
            .init::<TestBackend>(&device);

        let x = Tensor::random([1, 8, 10, 12], Distribution::Normal(0.0, 1.0), &device);
        let y = block.forward(x);

        assert_eq!(y.dims(), [1, 8, 10, 12]);
    }

    #[test]
    fn strided_block_halves_resolution() {
        let device = Default::default();
        let block = ConvBlockConfig::new(4, 4)
            .with_kernel_size(2)
            .with_stride(2)
            .with_norm(false)
            .with_act(false)
            .init::<TestBackend>(&device);

        let x = Tensor::random([1, 4, 16, 16], Distribution::Normal(0.0, 1.0), &device);
        let y = block.forward(x);

        assert_eq!(y.dims(), [1, 4, 8, 8]);
    }
}
