//! Reversed pyramid fusion network head.
//!
//! Backbone levels pass through attention-augmented lateral encoders and a
//! fixed chain of fusion nodes running finest to coarsest, the reverse of
//! the usual top-down pyramid. Each node gates its operands with a feature
//! selection module before summing them.

use burn::{
    module::Ignored,
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::{activation::sigmoid, module::adaptive_avg_pool2d},
};

use super::{
    decode_head::{select_inputs, Classifier, ClassifierConfig},
    modules::{
        resize_or_pool, ConvBlock, ConvBlockConfig, PaaEncoder, PaaEncoderConfig,
    },
};
use crate::{
    config::{InterpolateKind, RpfnHeadConfig},
    error::{ElapFormerError, ElapFormerResult},
};

/// Feature selection module.
///
/// A global-pooled channel gate is added back onto the input before a 1x1
/// projection; both convolutions are bias-free.
#[derive(Module, Debug)]
pub struct Fsm<B: Backend> {
    conv_atten: Conv2d<B>,
    conv: Conv2d<B>,
}

impl<B: Backend> Fsm<B> {
    fn init(channels: usize, device: &Device<B>) -> Self {
        Self {
            conv_atten: Conv2dConfig::new([channels, channels], [1, 1])
                .with_bias(false)
                .init(device),
            conv: Conv2dConfig::new([channels, channels], [1, 1])
                .with_bias(false)
                .init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let atten = sigmoid(self.conv_atten.forward(adaptive_avg_pool2d(x.clone(), [1, 1])));
        let x = x.clone() + x * atten;
        self.conv.forward(x)
    }
}

/// Configuration for the [`FusionNode`] module.
#[derive(Config, Debug)]
pub struct FusionNodeConfig {
    /// Channel width of every operand and of the output.
    channels: usize,
    /// Number of operands the node fuses (2 or 3).
    #[config(default = "2")]
    op_num: usize,
    /// Interpolation mode for growing operands.
    #[config(default = "InterpolateKind::Bilinear")]
    interpolate_mode: InterpolateKind,
}

impl FusionNodeConfig {
    /// Initializes a [`FusionNode`] module.
    ///
    /// # Errors
    ///
    /// Returns [`ElapFormerError::UnsupportedOperandCount`] unless `op_num`
    /// is 2 or 3.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ElapFormerResult<FusionNode<B>> {
        if self.op_num != 2 && self.op_num != 3 {
            return Err(ElapFormerError::UnsupportedOperandCount {
                op_num: self.op_num,
            });
        }

        let fusion_conv = || {
            ConvBlockConfig::new(self.channels, self.channels)
                .with_kernel_size(3)
                .with_padding(1)
                .with_pre_activate(true)
                .with_xavier_uniform(true)
                .init(device)
        };
        // Two gates regardless of arity: the third operand of a 3-operand
        // node shares the second operand's gate.
        let weights = (0..2).map(|_| Fsm::init(self.channels, device)).collect();
        let pre_fusion = (self.op_num == 3).then(fusion_conv);
        let post_fusion = fusion_conv();

        Ok(FusionNode {
            weights,
            pre_fusion,
            post_fusion,
            op_num: self.op_num,
            interpolate_mode: Ignored(self.interpolate_mode.clone()),
        })
    }
}

/// A node of the reversed fusion chain.
///
/// Operands are brought to the output size (interpolation upward, padded
/// 2x2 max-pooling downward), individually gated by a [`Fsm`] and summed.
/// Three-operand nodes fuse the first pair, refine it with a pre-fusion
/// convolution and add the third operand, which shares the second operand's
/// gate.
#[derive(Module, Debug)]
pub struct FusionNode<B: Backend> {
    weights: Vec<Fsm<B>>,
    pre_fusion: Option<ConvBlock<B>>,
    post_fusion: ConvBlock<B>,
    op_num: usize,
    interpolate_mode: Ignored<InterpolateKind>,
}

impl<B: Backend> FusionNode<B> {
    /// Fuses `inputs` into a single feature map of spatial size `out_size`.
    pub fn forward(&self, inputs: Vec<Tensor<B, 4>>, out_size: [usize; 2]) -> Tensor<B, 4> {
        assert_eq!(
            inputs.len(),
            self.op_num,
            "operand count must match the node arity"
        );
        let mode = &self.interpolate_mode.0;
        let inputs: Vec<Tensor<B, 4>> = inputs
            .into_iter()
            .map(|x| resize_or_pool(x, out_size, mode))
            .collect();

        let mut result = self.weights[0].forward(inputs[0].clone())
            + self.weights[1].forward(inputs[1].clone());

        // The third operand shares the second operand's selection gate.
        if let Some(pre_fusion) = &self.pre_fusion {
            let third = self.weights[1].forward(inputs[2].clone());
            result = pre_fusion.forward(result) + third;
        }

        self.post_fusion.forward(result)
    }
}

impl RpfnHeadConfig {
    /// Initializes an [`RpfnHead`] module.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid (see
    /// [`RpfnHeadConfig::validate`]).
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ElapFormerResult<RpfnHead<B>> {
        self.validate()?;
        let channels = self.head.channels;

        let lateral_convs = self.head.in_channels[self.start_level..]
            .iter()
            .map(|&c_in| PaaEncoderConfig::new(c_in, channels).init(device))
            .collect();

        let node = |op_num| {
            FusionNodeConfig::new(channels)
                .with_op_num(op_num)
                .with_interpolate_mode(self.head.interpolate_mode.clone())
                .init(device)
        };
        let node_p3 = node(2)?;
        let node_p4 = node(3)?;
        let node_p5 = node(3)?;
        let node_p6 = node(2)?;

        let fusion_conv = ConvBlockConfig::new(channels * Self::NUM_LEVELS, channels).init(device);
        let classifier = ClassifierConfig::new(channels, self.head.num_classes)
            .with_dropout_ratio(self.head.dropout_ratio)
            .init(device);

        Ok(RpfnHead {
            lateral_convs,
            node_p3,
            node_p4,
            node_p5,
            node_p6,
            fusion_conv,
            classifier,
            in_index: self.head.in_index.clone(),
            start_level: self.start_level,
            interpolate_mode: Ignored(self.head.interpolate_mode.clone()),
        })
    }
}

/// Reversed pyramid fusion decode head.
///
/// The chain runs `p3 = fuse(c3, c4)`, `p4 = fuse(c4, c5, p3)`,
/// `p5 = fuse(c5, c6, p4)`, `p6 = fuse(c6, p5)`, so every node sees the
/// previously fused (finer) result alongside its own and the next coarser
/// lateral. All four outputs are brought to the finest resolution,
/// concatenated, fused by a 1x1 convolution and classified.
#[derive(Module, Debug)]
pub struct RpfnHead<B: Backend> {
    lateral_convs: Vec<PaaEncoder<B>>,
    node_p3: FusionNode<B>,
    node_p4: FusionNode<B>,
    node_p5: FusionNode<B>,
    node_p6: FusionNode<B>,
    fusion_conv: ConvBlock<B>,
    classifier: Classifier<B>,
    in_index: Vec<usize>,
    start_level: usize,
    interpolate_mode: Ignored<InterpolateKind>,
}

impl<B: Backend> RpfnHead<B> {
    /// Forward pass over the backbone feature pyramid.
    ///
    /// Returns the per-pixel class logits at the resolution of the finest
    /// consumed level, as a one-element list.
    pub fn forward(&self, inputs: &[Tensor<B, 4>]) -> Vec<Tensor<B, 4>> {
        let mode = &self.interpolate_mode.0;
        let feats: Vec<Tensor<B, 4>> = select_inputs(inputs, &self.in_index)
            .into_iter()
            .skip(self.start_level)
            .zip(&self.lateral_convs)
            .map(|(x, lateral_conv)| lateral_conv.forward(x))
            .collect();
        let (c3, c4, c5, c6) = (
            feats[0].clone(),
            feats[1].clone(),
            feats[2].clone(),
            feats[3].clone(),
        );
        let size_of = |t: &Tensor<B, 4>| {
            let [_, _, h, w] = t.dims();
            [h, w]
        };
        let s3 = size_of(&c3);

        let p3 = self.node_p3.forward(vec![c3, c4.clone()], s3);
        let p4 = self
            .node_p4
            .forward(vec![c4.clone(), c5.clone(), p3.clone()], size_of(&c4));
        let p5 = self
            .node_p5
            .forward(vec![c5.clone(), c6.clone(), p4.clone()], size_of(&c5));
        let p6 = self.node_p6.forward(vec![c6.clone(), p5.clone()], size_of(&c6));

        let p4 = resize_or_pool(p4, s3, mode);
        let p5 = resize_or_pool(p5, s3, mode);
        let p6 = resize_or_pool(p6, s3, mode);

        let output = self
            .fusion_conv
            .forward(Tensor::cat(vec![p3, p4, p5, p6], 1));
        vec![self.classifier.forward(output)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeHeadConfig;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn head_predicts_at_finest_resolution() {
        let device = Default::default();
        let config = RpfnHeadConfig::new(DecodeHeadConfig::new(
            vec![4, 8, 16, 32],
            vec![0, 1, 2, 3],
            8,
            5,
        ));
        let head = config.init::<TestBackend>(&device).unwrap();

        let inputs: Vec<Tensor<TestBackend, 4>> = [
            [2, 4, 32, 32],
            [2, 8, 16, 16],
            [2, 16, 8, 8],
            [2, 32, 4, 4],
        ]
        .iter()
        .map(|&s| Tensor::random(s, Distribution::Normal(0.0, 1.0), &device))
        .collect();

        let outputs = head.forward(&inputs);

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].dims(), [2, 5, 32, 32]);
    }

    #[test]
    fn start_level_skips_finer_inputs() {
        let device = Default::default();
        let config = RpfnHeadConfig::new(DecodeHeadConfig::new(
            vec![2, 4, 8, 16, 32],
            vec![0, 1, 2, 3, 4],
            8,
            3,
        ))
        .with_start_level(1);
        let head = config.init::<TestBackend>(&device).unwrap();

        let inputs: Vec<Tensor<TestBackend, 4>> = [
            [1, 2, 64, 64],
            [1, 4, 32, 32],
            [1, 8, 16, 16],
            [1, 16, 8, 8],
            [1, 32, 4, 4],
        ]
        .iter()
        .map(|&s| Tensor::random(s, Distribution::Normal(0.0, 1.0), &device))
        .collect();

        let outputs = head.forward(&inputs);

        assert_eq!(outputs[0].dims(), [1, 3, 32, 32]);
    }

    #[test]
    fn fusion_node_downscales_finer_operands() {
        let device = Default::default();
        let node = FusionNodeConfig::new(8)
            .init::<TestBackend>(&device)
            .unwrap();

        let coarse = Tensor::random([1, 8, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        let fine = Tensor::random([1, 8, 16, 16], Distribution::Normal(0.0, 1.0), &device);
        let fused = node.forward(vec![coarse, fine], [8, 8]);

        assert_eq!(fused.dims(), [1, 8, 8, 8]);
    }

    #[test]
    fn three_operand_node_requires_pre_fusion() {
        let device = Default::default();
        let node = FusionNodeConfig::new(4)
            .with_op_num(3)
            .init::<TestBackend>(&device)
            .unwrap();

        let xs = (0..3)
            .map(|_| Tensor::random([1, 4, 6, 6], Distribution::Normal(0.0, 1.0), &device))
            .collect::<Vec<_>>();
        let fused = node.forward(xs, [6, 6]);

        assert_eq!(fused.dims(), [1, 4, 6, 6]);
    }

    #[test]
    fn rejects_unsupported_operand_counts() {
        let device: <TestBackend as Backend>::Device = Default::default();

        for op_num in [0, 1, 4] {
            let result = FusionNodeConfig::new(8)
                .with_op_num(op_num)
                .init::<TestBackend>(&device);
            assert!(matches!(
                result,
                Err(ElapFormerError::UnsupportedOperandCount { .. })
            ));
        }
    }

    #[test]
    fn feature_selection_keeps_zero_input_finite() {
        let device = Default::default();
        let fsm = Fsm::<TestBackend>::init(4, &device);

        let y = fsm.forward(Tensor::zeros([1, 4, 5, 5], &device));

        assert!(!y
            .to_data()
            .as_slice::<f32>()
            .unwrap()
            .iter()
            .any(|v| v.is_nan()));
    }
}
