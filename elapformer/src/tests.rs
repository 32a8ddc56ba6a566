//! Crate-level configuration validation tests.

use crate::{
    DecodeHeadConfig, ElapFormerError, ElapFormerHeadConfig, FusionVariant, RpfnHeadConfig,
};

fn four_level_head() -> DecodeHeadConfig {
    DecodeHeadConfig::new(vec![32, 64, 160, 256], vec![0, 1, 2, 3], 128, 19)
}

#[test]
fn default_configurations_validate() {
    assert!(ElapFormerHeadConfig::new(four_level_head()).validate().is_ok());
    assert!(RpfnHeadConfig::new(four_level_head()).validate().is_ok());
}

#[test]
fn every_fusion_variant_validates() {
    let variants = [
        FusionVariant::V1,
        FusionVariant::V2,
        FusionVariant::V3,
        FusionVariant::V4,
        FusionVariant::V5,
        FusionVariant::V6,
        FusionVariant::V7,
        FusionVariant::V8,
    ];
    for variant in variants {
        let config = ElapFormerHeadConfig::new(four_level_head()).with_variant(variant);
        assert!(config.validate().is_ok());
    }
}

#[test]
fn mismatched_selection_lengths_are_rejected() {
    let head = DecodeHeadConfig::new(vec![32, 64, 160, 256], vec![0, 1, 2], 128, 19);

    let result = head.validate();

    assert!(matches!(
        result,
        Err(ElapFormerError::MismatchedInputSelection {
            in_channels: 4,
            in_index: 3,
        })
    ));
}

#[test]
fn degenerate_widths_are_rejected() {
    let no_channels = DecodeHeadConfig::new(vec![32, 64], vec![0, 1], 0, 19);
    assert!(matches!(
        no_channels.validate(),
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));

    let no_classes = DecodeHeadConfig::new(vec![32, 64], vec![0, 1], 128, 0);
    assert!(matches!(
        no_classes.validate(),
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));

    let no_levels = DecodeHeadConfig::new(vec![], vec![], 128, 19);
    assert!(matches!(
        no_levels.validate(),
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));
}

#[test]
fn progressive_fusion_needs_two_levels() {
    let shallow = DecodeHeadConfig::new(vec![32], vec![0], 128, 19);

    let result = ElapFormerHeadConfig::new(shallow).validate();

    assert!(matches!(
        result,
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));
}

#[test]
fn reversed_pyramid_needs_exactly_four_levels() {
    let three = DecodeHeadConfig::new(vec![32, 64, 160], vec![0, 1, 2], 128, 19);
    assert!(matches!(
        RpfnHeadConfig::new(three).validate(),
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));

    // A deeper pyramid is fine as long as start_level trims it to four.
    let five = DecodeHeadConfig::new(vec![16, 32, 64, 160, 256], vec![0, 1, 2, 3, 4], 128, 19);
    assert!(RpfnHeadConfig::new(five.clone()).validate().is_err());
    assert!(RpfnHeadConfig::new(five).with_start_level(1).validate().is_ok());
}

#[test]
fn start_level_beyond_pyramid_is_rejected() {
    let result = RpfnHeadConfig::new(four_level_head())
        .with_start_level(5)
        .validate();

    assert!(matches!(
        result,
        Err(ElapFormerError::InvalidConfiguration { .. })
    ));
}

#[test]
fn variant_aggregation_widths() {
    assert_eq!(FusionVariant::V1.aggregated_entries(4), 4);
    assert_eq!(FusionVariant::V2.aggregated_entries(4), 4);
    for variant in [
        FusionVariant::V3,
        FusionVariant::V4,
        FusionVariant::V5,
        FusionVariant::V6,
        FusionVariant::V7,
        FusionVariant::V8,
    ] {
        assert_eq!(variant.aggregated_entries(4), 3);
    }
    assert!(FusionVariant::V1.uses_se());
    assert!(!FusionVariant::V5.uses_se());
}
