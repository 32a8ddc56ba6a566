//! Enumeration types for head configuration.

use burn::prelude::*;

/// Interpolation mode used when resizing feature maps between pyramid
/// levels.
///
/// Burn's `interpolate` carries no corner-alignment flag, so only the
/// sampling mode is configurable here.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum InterpolateKind {
    /// Bilinear interpolation.
    Bilinear,
    /// Nearest-neighbor interpolation.
    Nearest,
}

/// Branch strategy plugged into the progressive fusion skeleton of
/// [`ElapFormerHead`](crate::ElapFormerHead).
///
/// All variants share the same projector / pairwise-fuser / aggregator
/// pipeline and differ only in where (and which) attention or splitting
/// module is injected.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum FusionVariant {
    /// Separable split of the finest fusion result through two independent
    /// 1x1 convolutions; the first branch is resized back to level-1
    /// resolution so the aggregation keeps the full level count.
    V1,
    /// As `V1`, but the first branch downsamples with a strided 2x2
    /// convolution instead of interpolation.
    V2,
    /// Large-kernel attention on the coarsest aligned level before fusion.
    V3,
    /// Multi-scale strip attention on the coarsest aligned level before
    /// fusion.
    V4,
    /// Large-kernel attention on the concatenated aggregate, replacing the
    /// squeeze-excitation gate.
    V5,
    /// One large-kernel attention per fused entry (except the finest),
    /// applied after the fusion loop.
    V6,
    /// One multi-scale strip attention per fused entry (except the finest),
    /// applied after the fusion loop.
    V7,
    /// Multi-scale strip attention on the coarsest fused entry only.
    V8,
}

impl FusionVariant {
    /// Number of `outs` entries concatenated by the aggregator.
    ///
    /// The separable-branch variants keep the full level count; every other
    /// variant fuses one entry fewer.
    #[must_use]
    pub const fn aggregated_entries(&self, num_inputs: usize) -> usize {
        match self {
            Self::V1 | Self::V2 => num_inputs,
            _ => num_inputs - 1,
        }
    }

    /// Whether the aggregator applies squeeze-excitation channel gating.
    ///
    /// `V5` substitutes large-kernel attention for the gate.
    #[must_use]
    pub const fn uses_se(&self) -> bool {
        !matches!(self, Self::V5)
    }
}
