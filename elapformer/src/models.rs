//! Decode-head model implementations.

mod decode_head;
mod elapformer;
pub mod modules;
mod rpfn;

pub use elapformer::{ElapFormerHead, ElapFormerHeadRecord};
pub use rpfn::{FusionNode, FusionNodeConfig, RpfnHead, RpfnHeadRecord};
