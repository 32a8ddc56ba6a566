use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::{activation::softmax, module::adaptive_avg_pool2d},
};

/// Configuration for the [`ScaleBranch`] module.
#[derive(Config, Debug)]
pub struct ScaleBranchConfig {
    /// Number of channels of each stacked level.
    in_channels: usize,
    /// Width of the produced context descriptor.
    out_channels: usize,
}

impl ScaleBranchConfig {
    /// Initializes a [`ScaleBranch`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ScaleBranch<B> {
        ScaleBranch {
            channel_agg: Conv2dConfig::new([self.in_channels, 1], [1, 1]).init(device),
            trans: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1]).init(device),
        }
    }
}

/// Global scale-context descriptor over a stack of pyramid levels.
///
/// Consumes a `[batch, levels, channels, height, width]` stack of
/// resolution-aligned features and attends over the level axis: each level
/// is spatially averaged, a 1x1 aggregation scores the levels, and the
/// softmax-weighted average is projected to the output width. Output shape
/// is `[batch, out_channels, 1, 1]`.
#[derive(Module, Debug)]
pub struct ScaleBranch<B: Backend> {
    channel_agg: Conv2d<B>,
    trans: Conv2d<B>,
}

impl<B: Backend> ScaleBranch<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 4> {
        let [b, l, c, _, _] = x.dims();
        // Collapse each level to its channel descriptor: [B, C, L, 1].
        let pooled = x
            .mean_dim(4)
            .mean_dim(3)
            .reshape([b, l, c])
            .swap_dims(1, 2)
            .reshape([b, c, l, 1]);

        let weights = self.channel_agg.forward(pooled.clone());
        let weights = softmax(weights.reshape([b, 1, l]), 2)
            .mul_scalar(l as f64)
            .reshape([b, 1, l, 1]);

        let context = adaptive_avg_pool2d(pooled * weights, [1, 1]);
        self.trans.forward(context)
    }
}

/// Configuration for the [`SpatialBranch`] module.
#[derive(Config, Debug)]
pub struct SpatialBranchConfig {
    /// Number of channels of each stacked level.
    in_channels: usize,
    /// Width of the produced context descriptor.
    out_channels: usize,
}

impl SpatialBranchConfig {
    /// Initializes a [`SpatialBranch`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SpatialBranch<B> {
        SpatialBranch {
            channel_agg: Conv2dConfig::new([self.in_channels, 1], [1, 1]).init(device),
            trans: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1]).init(device),
        }
    }
}

/// Global spatial-context descriptor over a stack of pyramid levels.
///
/// Averages the level axis away, scores positions with a 1x1 aggregation
/// and softmax over all pixels, and projects the attention-weighted global
/// average to the output width. Output shape is
/// `[batch, out_channels, 1, 1]`.
#[derive(Module, Debug)]
pub struct SpatialBranch<B: Backend> {
    channel_agg: Conv2d<B>,
    trans: Conv2d<B>,
}

impl<B: Backend> SpatialBranch<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 4> {
        let [b, _, c, h, w] = x.dims();
        let merged = x.mean_dim(1).reshape([b, c, h, w]);

        let weights = self.channel_agg.forward(merged.clone());
        let weights = softmax(weights.reshape([b, 1, h * w]), 2)
            .mul_scalar((h * w) as f64)
            .reshape([b, 1, h, w]);

        let context = adaptive_avg_pool2d(merged * weights, [1, 1]);
        self.trans.forward(context)
    }
}
