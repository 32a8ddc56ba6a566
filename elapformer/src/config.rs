//! Configuration structures for the decode heads.

mod core;
mod enums;

pub use core::{DecodeHeadConfig, ElapFormerHeadConfig, RpfnHeadConfig};
pub use enums::{FusionVariant, InterpolateKind};
