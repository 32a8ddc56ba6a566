//! Shared decode-head plumbing: backbone-output selection and the final
//! per-pixel classifier.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, PaddingConfig2d,
    },
    prelude::*,
};

/// Select backbone outputs by index (`multiple_select` input transform).
///
/// The selection order follows `in_index`, finest level first. Indices out
/// of range panic, as would any downstream shape mismatch.
pub fn select_inputs<B: Backend>(
    inputs: &[Tensor<B, 4>],
    in_index: &[usize],
) -> Vec<Tensor<B, 4>> {
    in_index.iter().map(|&i| inputs[i].clone()).collect()
}

/// Configuration for the [`Classifier`] module.
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Number of fused feature channels.
    channels: usize,
    /// Number of output classes.
    num_classes: usize,
    /// Dropout probability; zero disables the layer.
    #[config(default = "0.1")]
    dropout_ratio: f64,
}

impl ClassifierConfig {
    /// Initializes a [`Classifier`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Classifier<B> {
        let dropout = (self.dropout_ratio > 0.0)
            .then(|| DropoutConfig::new(self.dropout_ratio).init());
        let conv_seg = Conv2dConfig::new([self.channels, self.num_classes], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Classifier { dropout, conv_seg }
    }
}

/// The per-pixel classification head: dropout followed by a 1x1
/// convolution mapping fused features to class logits.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    dropout: Option<Dropout>,
    conv_seg: Conv2d<B>,
}

impl<B: Backend> Classifier<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        self.conv_seg.forward(x)
    }
}
