//! Core configuration structures shared by both head families.

use burn::prelude::*;

use super::enums::{FusionVariant, InterpolateKind};
use crate::error::{ElapFormerError, ElapFormerResult};

/// Configuration shared by every decode head: which backbone outputs to
/// consume, the common fusion width and the classifier shape.
///
/// This mirrors the base decode-head contract of the surrounding training
/// framework: `in_index` selects backbone outputs (`multiple_select`), one
/// entry per `in_channels` entry, ordered finest to coarsest.
#[derive(Config, Debug)]
pub struct DecodeHeadConfig {
    /// Channel count of each selected backbone output.
    pub in_channels: Vec<usize>,
    /// Index of each selected backbone output.
    pub in_index: Vec<usize>,
    /// Common channel width features are projected to before fusion.
    pub channels: usize,
    /// Number of output classes.
    pub num_classes: usize,
    /// Dropout probability applied before the classifier convolution.
    #[config(default = "0.1")]
    pub dropout_ratio: f64,
    /// Interpolation mode for all level resizing.
    #[config(default = "InterpolateKind::Bilinear")]
    pub interpolate_mode: InterpolateKind,
}

impl DecodeHeadConfig {
    /// Validate the shared head configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ElapFormerError::MismatchedInputSelection`] when the input
    /// selection sequences disagree in length, and
    /// [`ElapFormerError::InvalidConfiguration`] for degenerate widths.
    pub fn validate(&self) -> ElapFormerResult<()> {
        if self.in_channels.len() != self.in_index.len() {
            return Err(ElapFormerError::MismatchedInputSelection {
                in_channels: self.in_channels.len(),
                in_index: self.in_index.len(),
            });
        }
        if self.in_channels.is_empty() {
            return Err(ElapFormerError::InvalidConfiguration {
                reason: "at least one input level is required".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(ElapFormerError::InvalidConfiguration {
                reason: "fusion channel width must be non-zero".to_string(),
            });
        }
        if self.num_classes == 0 {
            return Err(ElapFormerError::InvalidConfiguration {
                reason: "num_classes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for [`ElapFormerHead`](crate::ElapFormerHead).
#[derive(Config, Debug)]
pub struct ElapFormerHeadConfig {
    /// Shared decode-head configuration.
    pub head: DecodeHeadConfig,
    /// Which branch strategy the fusion skeleton uses.
    #[config(default = "FusionVariant::V1")]
    pub variant: FusionVariant,
    /// Channel reduction ratio of the squeeze-excitation gate.
    #[config(default = "16")]
    pub se_reduction: usize,
}

impl ElapFormerHeadConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the shared configuration is invalid or the
    /// pyramid is too shallow for pairwise fusion.
    pub fn validate(&self) -> ElapFormerResult<()> {
        self.head.validate()?;
        if self.head.in_channels.len() < 2 {
            return Err(ElapFormerError::InvalidConfiguration {
                reason: format!(
                    "progressive fusion needs at least 2 input levels, got {}",
                    self.head.in_channels.len()
                ),
            });
        }
        Ok(())
    }
}

/// Configuration for [`RpfnHead`](crate::RpfnHead).
#[derive(Config, Debug)]
pub struct RpfnHeadConfig {
    /// Shared decode-head configuration.
    pub head: DecodeHeadConfig,
    /// First selected level to project laterally; levels below it are
    /// ignored by the fusion pyramid.
    #[config(default = "0")]
    pub start_level: usize,
}

impl RpfnHeadConfig {
    /// Number of pyramid levels consumed by the fixed fusion topology.
    pub const NUM_LEVELS: usize = 4;

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the shared configuration is invalid or the
    /// selected range does not contain exactly the four levels the fusion
    /// chain is wired for.
    pub fn validate(&self) -> ElapFormerResult<()> {
        self.head.validate()?;
        let available = self.head.in_channels.len().saturating_sub(self.start_level);
        if available != Self::NUM_LEVELS {
            return Err(ElapFormerError::InvalidConfiguration {
                reason: format!(
                    "reversed pyramid fusion consumes exactly {} levels, got {} (start_level {})",
                    Self::NUM_LEVELS,
                    available,
                    self.start_level
                ),
            });
        }
        Ok(())
    }
}
