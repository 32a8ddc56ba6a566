//! Progressive pyramid fusion head.
//!
//! One parameterized skeleton covers all eight published head variants:
//! per-level projection, pairwise coarse-to-fine fusion, a variant-selected
//! branch strategy and squeeze-excitation aggregation with an identity
//! skip. See [`FusionVariant`] for what each variant injects and where.

use burn::{
    module::Ignored,
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
};

use super::{
    decode_head::{select_inputs, Classifier, ClassifierConfig},
    modules::{
        resize, ConvBlock, ConvBlockConfig, LargeKernelAttn, LargeKernelAttnConfig,
        MultiScaleStripAttn, MultiScaleStripAttnConfig, SELayer, SELayerConfig,
    },
};
use crate::{
    config::{ElapFormerHeadConfig, FusionVariant, InterpolateKind},
    error::ElapFormerResult,
};

/// Splits the finest fusion result into a pair of decoupled features.
///
/// The first branch is destined for level-1 resolution (optionally through
/// a strided downsampling convolution), the second keeps the native finest
/// resolution and later serves as the identity-mapping operand.
#[derive(Module, Debug)]
pub struct SeparableBranch<B: Backend> {
    conv_shift: Conv2d<B>,
    conv_down: Option<Conv2d<B>>,
    conv_keep: Conv2d<B>,
}

impl<B: Backend> SeparableBranch<B> {
    fn init(channels: usize, strided: bool, device: &Device<B>) -> Self {
        let conv_shift = Conv2dConfig::new([channels, channels], [1, 1]).init(device);
        let conv_down = strided.then(|| {
            Conv2dConfig::new([channels, channels], [2, 2])
                .with_stride([2, 2])
                .init(device)
        });
        let conv_keep = Conv2dConfig::new([channels, channels], [1, 1]).init(device);
        Self {
            conv_shift,
            conv_down,
            conv_keep,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let coarse = self.conv_shift.forward(x.clone());
        let coarse = match &self.conv_down {
            Some(conv_down) => conv_down.forward(coarse),
            None => coarse,
        };
        (coarse, self.conv_keep.forward(x))
    }
}

/// The branch strategy injected into the fusion skeleton.
#[derive(Module, Debug)]
pub enum FusionBranch<B: Backend> {
    /// V1/V2: decouple the finest fusion result into two entries.
    Separable(SeparableBranch<B>),
    /// V3: large-kernel attention on the coarsest aligned level.
    CoarsestLka(LargeKernelAttn<B>),
    /// V4: strip attention on the coarsest aligned level.
    CoarsestMssa(MultiScaleStripAttn<B>),
    /// V5: large-kernel attention on the concatenated aggregate.
    AggregateLka(LargeKernelAttn<B>),
    /// V6: one large-kernel attention per fused entry except the last.
    PerLevelLka(Vec<LargeKernelAttn<B>>),
    /// V7: one strip attention per fused entry except the last.
    PerLevelMssa(Vec<MultiScaleStripAttn<B>>),
    /// V8: strip attention on the coarsest fused entry only.
    CoarsestOutMssa(MultiScaleStripAttn<B>),
}

impl ElapFormerHeadConfig {
    /// Initializes an [`ElapFormerHead`] module.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid (see
    /// [`ElapFormerHeadConfig::validate`]).
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ElapFormerResult<ElapFormerHead<B>> {
        self.validate()?;
        let num_inputs = self.head.in_channels.len();
        let channels = self.head.channels;

        let convs = self
            .head
            .in_channels
            .iter()
            .map(|&c_in| {
                ConvBlockConfig::new(c_in, channels)
                    .with_kernel_size(3)
                    .with_padding(1)
                    .init(device)
            })
            .collect();

        let linear_projections = (0..num_inputs - 1)
            .map(|_| ConvBlockConfig::new(channels * 2, channels).init(device))
            .collect();

        let aggregated = self.variant.aggregated_entries(num_inputs);
        let branch = match self.variant {
            FusionVariant::V1 => {
                FusionBranch::Separable(SeparableBranch::init(channels, false, device))
            }
            FusionVariant::V2 => {
                FusionBranch::Separable(SeparableBranch::init(channels, true, device))
            }
            FusionVariant::V3 => {
                FusionBranch::CoarsestLka(LargeKernelAttnConfig::new(channels).init(device))
            }
            FusionVariant::V4 => {
                FusionBranch::CoarsestMssa(MultiScaleStripAttnConfig::new(channels).init(device))
            }
            FusionVariant::V5 => FusionBranch::AggregateLka(
                LargeKernelAttnConfig::new(channels * aggregated).init(device),
            ),
            FusionVariant::V6 => FusionBranch::PerLevelLka(
                (0..num_inputs - 1)
                    .map(|_| LargeKernelAttnConfig::new(channels).init(device))
                    .collect(),
            ),
            FusionVariant::V7 => FusionBranch::PerLevelMssa(
                (0..num_inputs - 1)
                    .map(|_| MultiScaleStripAttnConfig::new(channels).init(device))
                    .collect(),
            ),
            FusionVariant::V8 => {
                FusionBranch::CoarsestOutMssa(MultiScaleStripAttnConfig::new(channels).init(device))
            }
        };

        let se_module = self.variant.uses_se().then(|| {
            SELayerConfig::new(channels * aggregated)
                .with_reduction(self.se_reduction)
                .init(device)
        });
        let fusion_conv = ConvBlockConfig::new(channels * aggregated, channels).init(device);
        let classifier = ClassifierConfig::new(channels, self.head.num_classes)
            .with_dropout_ratio(self.head.dropout_ratio)
            .init(device);

        Ok(ElapFormerHead {
            convs,
            linear_projections,
            branch,
            se_module,
            fusion_conv,
            classifier,
            in_index: self.head.in_index.clone(),
            aggregated,
            interpolate_mode: Ignored(self.head.interpolate_mode.clone()),
        })
    }
}

/// Progressive pyramid fusion decode head.
#[derive(Module, Debug)]
pub struct ElapFormerHead<B: Backend> {
    convs: Vec<ConvBlock<B>>,
    linear_projections: Vec<ConvBlock<B>>,
    branch: FusionBranch<B>,
    se_module: Option<SELayer<B>>,
    fusion_conv: ConvBlock<B>,
    classifier: Classifier<B>,
    in_index: Vec<usize>,
    aggregated: usize,
    interpolate_mode: Ignored<InterpolateKind>,
}

impl<B: Backend> ElapFormerHead<B> {
    /// Forward pass over the backbone feature pyramid.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Backbone outputs; `in_index` selects the four levels
    ///   ordered finest (stride 4) to coarsest (stride 32).
    ///
    /// # Returns
    ///
    /// Class logits at the spatial resolution of the finest level.
    pub fn forward(&self, inputs: &[Tensor<B, 4>]) -> Tensor<B, 4> {
        let mode = &self.interpolate_mode.0;
        let feats = select_inputs(inputs, &self.in_index);
        let num_inputs = feats.len();
        let [_, _, h1, w1] = feats[1].dims();

        // Project every level to the common width and align levels 1..N to
        // level-1 resolution; level 0 keeps its native resolution.
        let mut aligned: Vec<Tensor<B, 4>> = Vec::with_capacity(num_inputs);
        for (idx, (x, conv)) in feats.into_iter().zip(&self.convs).enumerate() {
            let feat = conv.forward(x);
            let feat = if idx > 0 {
                resize(feat, [h1, w1], mode)
            } else {
                feat
            };
            aligned.push(feat);
        }

        match &self.branch {
            FusionBranch::CoarsestLka(attn) => {
                aligned[num_inputs - 1] = attn.forward(aligned[num_inputs - 1].clone());
            }
            FusionBranch::CoarsestMssa(attn) => {
                aligned[num_inputs - 1] = attn.forward(aligned[num_inputs - 1].clone());
            }
            _ => {}
        }

        // Pairwise fusion, coarsest to finest. The accumulator is threaded
        // explicitly; concatenation order is [coarser-or-accumulated, finer].
        let mut outs: Vec<Tensor<B, 4>> = vec![aligned[num_inputs - 1].clone()];
        let mut acc = aligned[num_inputs - 1].clone();
        for idx in (1..num_inputs).rev() {
            let linear_prj = &self.linear_projections[idx - 1];
            let finer = aligned[idx - 1].clone();
            let coarser = if idx == num_inputs - 1 {
                aligned[idx].clone()
            } else {
                acc
            };
            let coarser = if idx == 1 {
                let [_, _, h, w] = finer.dims();
                resize(coarser, [h, w], mode)
            } else {
                coarser
            };
            acc = linear_prj.forward(Tensor::cat(vec![coarser, finer], 1));

            if idx == 1 {
                if let FusionBranch::Separable(sep) = &self.branch {
                    let (coarse, fine) = sep.forward(acc.clone());
                    outs.push(resize(coarse, [h1, w1], mode));
                    outs.push(fine);
                } else {
                    outs.push(acc.clone());
                }
            } else {
                outs.push(acc.clone());
            }
        }

        match &self.branch {
            FusionBranch::PerLevelLka(attns) => {
                for (i, attn) in attns.iter().enumerate() {
                    outs[i] = attn.forward(outs[i].clone());
                }
            }
            FusionBranch::PerLevelMssa(attns) => {
                for (i, attn) in attns.iter().enumerate() {
                    outs[i] = attn.forward(outs[i].clone());
                }
            }
            FusionBranch::CoarsestOutMssa(attn) => {
                outs[0] = attn.forward(outs[0].clone());
            }
            _ => {}
        }

        let out = Tensor::cat(outs[..self.aggregated].to_vec(), 1);
        let out = match (&self.se_module, &self.branch) {
            (Some(se_module), _) => se_module.forward(out),
            (None, FusionBranch::AggregateLka(attn)) => attn.forward(out),
            (None, _) => out,
        };
        let out = self.fusion_conv.forward(out);

        // Identity mapping against the finest entry; the shapes must match
        // exactly, broadcasting here would mask a wiring bug.
        let finest = outs[outs.len() - 1].clone();
        let [_, _, h, w] = finest.dims();
        let out = resize(out, [h, w], mode);
        assert_eq!(
            out.dims(),
            finest.dims(),
            "fused features and identity skip must agree in shape"
        );
        let out = finest + out;

        self.classifier.forward(out)
    }
}
