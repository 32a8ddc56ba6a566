use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Relu,
    },
    prelude::*,
    tensor::{activation::sigmoid, module::adaptive_avg_pool2d},
};

/// Configuration for the [`SELayer`] module.
#[derive(Config, Debug)]
pub struct SELayerConfig {
    /// Number of channels to gate.
    channels: usize,
    /// Bottleneck reduction ratio.
    #[config(default = "16")]
    reduction: usize,
}

impl SELayerConfig {
    /// Initializes a [`SELayer`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SELayer<B> {
        let bottleneck = (self.channels / self.reduction).max(1);
        let conv_reduce = Conv2dConfig::new([self.channels, bottleneck], [1, 1]).init(device);
        let conv_expand = Conv2dConfig::new([bottleneck, self.channels], [1, 1]).init(device);

        SELayer {
            conv_reduce,
            relu: Relu::new(),
            conv_expand,
        }
    }
}

/// Squeeze-excitation channel gating.
///
/// Reweights channels by a learned global-context vector; the sigmoid keeps
/// every scale factor in (0, 1], so the gate is shape preserving and finite
/// for finite inputs.
#[derive(Module, Debug)]
pub struct SELayer<B: Backend> {
    conv_reduce: Conv2d<B>,
    relu: Relu,
    conv_expand: Conv2d<B>,
}

impl<B: Backend> SELayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let scale = adaptive_avg_pool2d(x.clone(), [1, 1]);
        let scale = self.conv_reduce.forward(scale);
        let scale = self.relu.forward(scale);
        let scale = sigmoid(self.conv_expand.forward(scale));
        x * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn gate_preserves_shape() {
        let device = Default::default();
        let se = SELayerConfig::new(32).init::<TestBackend>(&device);

        let x = Tensor::random([2, 32, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        let y = se.forward(x);

        assert_eq!(y.dims(), [2, 32, 8, 8]);
    }

    #[test]
    fn zero_input_stays_finite() {
        let device = Default::default();
        let se = SELayerConfig::new(8).with_reduction(4).init::<TestBackend>(&device);

        let x = Tensor::zeros([1, 8, 4, 4], &device);
        let y = se.forward(x);

        assert!(!y.to_data().as_slice::<f32>().unwrap().iter().any(|v| v.is_nan()));
    }
}
