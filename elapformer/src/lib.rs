//! # ELAPFormer decode heads for Burn
//!
//! Feature-fusion decode heads for semantic segmentation. The crate provides
//! two independent fusion architectures that both consume a four-level
//! feature pyramid (strides 4/8/16/32) from an upstream backbone and produce
//! per-pixel class logits:
//!
//! - [`ElapFormerHead`]: progressive pairwise fusion of adjacent pyramid
//!   levels with a variant-selected branch strategy ([`FusionVariant`]) and
//!   squeeze-excitation aggregation.
//! - [`RpfnHead`]: a reversed feature pyramid built from attention-gated
//!   fusion nodes chained coarse-context-into-fine.
//!
//! Backbones, losses and the training loop live outside this crate; heads
//! expose a single `forward` over a slice of backbone feature maps.

mod config;
mod error;
mod models;
#[cfg(test)]
mod tests;

pub use config::{
    DecodeHeadConfig, ElapFormerHeadConfig, FusionVariant, InterpolateKind, RpfnHeadConfig,
};
pub use error::{ElapFormerError, ElapFormerResult};
pub use models::{
    modules, ElapFormerHead, ElapFormerHeadRecord, FusionNode, FusionNodeConfig, RpfnHead,
    RpfnHeadRecord,
};
