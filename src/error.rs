//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the stereo crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The stereo configuration cannot be used, detected before any matching runs.
    #[error("Invalid stereo parameters: {0}")]
    InvalidParameters(String),

    /// An image or map does not have the size the engine was configured for.
    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32)
    },

    #[cfg(feature = "statistics")]
    #[error("Plotting failed: {0}")]
    Plot(String)
}
