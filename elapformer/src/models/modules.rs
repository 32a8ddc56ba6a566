//! Building blocks shared by the decode heads: convolution blocks,
//! attention/gating modules, context descriptors and resize helpers.

mod context;
mod conv_block;
mod lka;
mod mssa;
mod paa;
mod resize;
mod se;

pub use context::{
    ScaleBranch, ScaleBranchConfig, SpatialBranch, SpatialBranchConfig,
};
pub use conv_block::{ConvBlock, ConvBlockConfig};
pub use lka::{LargeKernelAttn, LargeKernelAttnConfig};
pub use mssa::{MultiScaleStripAttn, MultiScaleStripAttnConfig};
pub use paa::{AxialAttention, AxialAttentionConfig, PaaEncoder, PaaEncoderConfig};
pub use resize::{resize, resize_or_pool};
pub use se::{SELayer, SELayerConfig};
