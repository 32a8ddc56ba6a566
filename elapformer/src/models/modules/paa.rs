use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::activation::sigmoid,
};

/// A small conv + BatchNorm + ReLU unit with arbitrary kernel geometry,
/// used throughout the axial-attention encoder.
#[derive(Module, Debug)]
struct PaaConv<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> PaaConv<B> {
    fn init(
        in_channels: usize,
        out_channels: usize,
        kernel: [usize; 2],
        padding: [usize; 2],
        device: &Device<B>,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], kernel)
            .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        Self {
            conv,
            bn,
            relu: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.bn.forward(self.conv.forward(x)))
    }
}

/// Configuration for the [`AxialAttention`] module.
#[derive(Config, Debug)]
pub struct AxialAttentionConfig {
    /// Number of channels (preserved).
    channels: usize,
    /// Attend along the height axis when true, the width axis otherwise.
    #[config(default = "true")]
    along_height: bool,
}

impl AxialAttentionConfig {
    /// Initializes an [`AxialAttention`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> AxialAttention<B> {
        let qk_channels = (self.channels / 8).max(1);
        AxialAttention {
            query: Conv2dConfig::new([self.channels, qk_channels], [1, 1]).init(device),
            key: Conv2dConfig::new([self.channels, qk_channels], [1, 1]).init(device),
            value: Conv2dConfig::new([self.channels, self.channels], [1, 1]).init(device),
            gamma: Param::from_tensor(Tensor::zeros([1], device)),
            along_height: self.along_height,
        }
    }
}

/// Single-head attention along one spatial axis.
///
/// The orthogonal axis is folded into the batch dimension, queries and keys
/// live at 1/8 channel width, and the sigmoid attention map gates a learned
/// residual whose scale starts at zero (identity at initialization).
#[derive(Module, Debug)]
pub struct AxialAttention<B: Backend> {
    query: Conv2d<B>,
    key: Conv2d<B>,
    value: Conv2d<B>,
    gamma: Param<Tensor<B, 1>>,
    along_height: bool,
}

impl<B: Backend> AxialAttention<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [b, c, h, w] = x.dims();
        let q = self.query.forward(x.clone());
        let k = self.key.forward(x.clone());
        let v = self.value.forward(x.clone());
        let qk = q.dims()[1];

        let out = if self.along_height {
            // (B, C, H, W) -> (B*W, H, C'): attend over rows.
            let q = q.permute([0, 3, 2, 1]).reshape([b * w, h, qk]);
            let k = k.permute([0, 3, 2, 1]).reshape([b * w, h, qk]);
            let v = v.permute([0, 3, 2, 1]).reshape([b * w, h, c]);
            let attn = sigmoid(q.matmul(k.transpose()));
            attn.matmul(v).reshape([b, w, h, c]).permute([0, 3, 2, 1])
        } else {
            // (B, C, H, W) -> (B*H, W, C'): attend over columns.
            let q = q.permute([0, 2, 3, 1]).reshape([b * h, w, qk]);
            let k = k.permute([0, 2, 3, 1]).reshape([b * h, w, qk]);
            let v = v.permute([0, 2, 3, 1]).reshape([b * h, w, c]);
            let attn = sigmoid(q.matmul(k.transpose()));
            attn.matmul(v).reshape([b, h, w, c]).permute([0, 3, 1, 2])
        };

        let gamma = self.gamma.val().reshape([1, 1, 1, 1]);
        out * gamma + x
    }
}

/// A strip-convolution branch refined by axial attention along both axes.
#[derive(Module, Debug)]
struct PaaKernel<B: Backend> {
    conv_in: PaaConv<B>,
    conv_strip_h: PaaConv<B>,
    conv_strip_v: PaaConv<B>,
    attn_h: AxialAttention<B>,
    attn_w: AxialAttention<B>,
    conv_out: PaaConv<B>,
}

impl<B: Backend> PaaKernel<B> {
    fn init(in_channels: usize, out_channels: usize, k: usize, device: &Device<B>) -> Self {
        Self {
            conv_in: PaaConv::init(in_channels, out_channels, [1, 1], [0, 0], device),
            conv_strip_h: PaaConv::init(out_channels, out_channels, [1, k], [0, k / 2], device),
            conv_strip_v: PaaConv::init(out_channels, out_channels, [k, 1], [k / 2, 0], device),
            attn_h: AxialAttentionConfig::new(out_channels).init(device),
            attn_w: AxialAttentionConfig::new(out_channels)
                .with_along_height(false)
                .init(device),
            conv_out: PaaConv::init(out_channels, out_channels, [3, 3], [1, 1], device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv_in.forward(x);
        let x = self.conv_strip_h.forward(x);
        let x = self.conv_strip_v.forward(x);
        let hx = self.attn_h.forward(x.clone());
        let wx = self.attn_w.forward(x);
        self.conv_out.forward(hx + wx)
    }
}

/// Configuration for the [`PaaEncoder`] module.
#[derive(Config, Debug)]
pub struct PaaEncoderConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels.
    out_channels: usize,
}

impl PaaEncoderConfig {
    /// Initializes a [`PaaEncoder`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PaaEncoder<B> {
        PaaEncoder {
            branch0: PaaConv::init(self.in_channels, self.out_channels, [1, 1], [0, 0], device),
            branch1: PaaKernel::init(self.in_channels, self.out_channels, 3, device),
            branch2: PaaKernel::init(self.in_channels, self.out_channels, 5, device),
            branch3: PaaKernel::init(self.in_channels, self.out_channels, 7, device),
            conv_cat: PaaConv::init(
                self.out_channels * 4,
                self.out_channels,
                [3, 3],
                [1, 1],
                device,
            ),
            conv_res: PaaConv::init(self.in_channels, self.out_channels, [1, 1], [0, 0], device),
            relu: Relu::new(),
        }
    }
}

/// Attention-augmented lateral projection.
///
/// Four parallel branches (a plain 1x1 and three axial-attention strip
/// kernels) are concatenated, fused by a 3x3 convolution and summed with a
/// 1x1 residual projection of the input.
#[derive(Module, Debug)]
pub struct PaaEncoder<B: Backend> {
    branch0: PaaConv<B>,
    branch1: PaaKernel<B>,
    branch2: PaaKernel<B>,
    branch3: PaaKernel<B>,
    conv_cat: PaaConv<B>,
    conv_res: PaaConv<B>,
    relu: Relu,
}

impl<B: Backend> PaaEncoder<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b0 = self.branch0.forward(x.clone());
        let b1 = self.branch1.forward(x.clone());
        let b2 = self.branch2.forward(x.clone());
        let b3 = self.branch3.forward(x.clone());
        let fused = self.conv_cat.forward(Tensor::cat(vec![b0, b1, b2, b3], 1));
        self.relu.forward(fused + self.conv_res.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn axial_attention_preserves_shape() {
        let device = Default::default();
        let attn = AxialAttentionConfig::new(16).init::<TestBackend>(&device);

        let x = Tensor::random([2, 16, 7, 5], Distribution::Normal(0.0, 1.0), &device);
        let y = attn.forward(x);

        assert_eq!(y.dims(), [2, 16, 7, 5]);
    }

    #[test]
    fn axial_attention_is_identity_at_init() {
        let device = Default::default();
        let attn = AxialAttentionConfig::new(8)
            .with_along_height(false)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random(
            [1, 8, 4, 6],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let y = attn.forward(x.clone());

        // gamma starts at zero, so the residual path dominates exactly.
        assert_eq!(x.into_data(), y.into_data());
    }

    #[test]
    fn encoder_projects_channel_width() {
        let device = Default::default();
        let paa = PaaEncoderConfig::new(24, 8).init::<TestBackend>(&device);

        let x = Tensor::random([1, 24, 10, 10], Distribution::Normal(0.0, 1.0), &device);
        let y = paa.forward(x);

        assert_eq!(y.dims(), [1, 8, 10, 10]);
    }
}
