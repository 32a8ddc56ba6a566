use thiserror::Error;

/// The error type for `elapformer-burn` operations.
///
/// All variants are raised at module construction time; forward passes are
/// infallible once a head has been built (shape violations panic inside the
/// tensor runtime, as is conventional for Burn modules).
#[derive(Error, Debug)]
pub enum ElapFormerError {
    /// The number of configured input channels does not match the number of
    /// input selection indices.
    #[error("mismatched input selection: {in_channels} in_channels entries vs {in_index} in_index entries")]
    MismatchedInputSelection {
        /// Length of the `in_channels` sequence.
        in_channels: usize,
        /// Length of the `in_index` sequence.
        in_index: usize,
    },

    /// A fusion node was configured with an operand count other than 2 or 3.
    #[error("unsupported fusion operand count: {op_num} (expected 2 or 3)")]
    UnsupportedOperandCount {
        /// The rejected operand count.
        op_num: usize,
    },

    /// A head configuration is logically inconsistent.
    #[error("invalid head configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },
}

/// A specialized `Result` type for `elapformer-burn` operations.
pub type ElapFormerResult<T> = Result<T, ElapFormerError>;
