//! Error types for capability queries and argument marshaling
//!
//! `ExtensionNotPresent` is deliberately absent from this enum: a missing
//! driver entry point is not an error. It is reported as a sentinel
//! variant of the resolver's call result so callers can branch on
//! availability without error-based control flow.

use thiserror::Error;

/// Enumeration of all possible capability-layer errors.
#[derive(Error, Debug)]
pub enum CapsErrorKind {
    /// Failed to load the Vulkan entry points (no loader/driver installed)
    #[error("Failed to load Vulkan entry point: {0}")]
    EntryLoadFailed(String),

    /// Failed to stand up the transient instance
    #[error("Vulkan initialization failed: {0}")]
    InitializationFailed(String),

    /// A native driver call reported an error status.
    /// Fatal to the enclosing capability query; the transient instance
    /// is still torn down before this reaches the caller.
    #[error("Vulkan API error: {0:?}")]
    DriverCallFailure(ash::vk::Result),

    /// Coercion given a value with no known native shape mapping
    #[error("Unsupported value type for native coercion: {0}")]
    UnsupportedValueType(String),

    /// A value did not match the native type its descriptor requires
    #[error("Native type mismatch: {0}")]
    TypeMismatch(String),

    /// A string argument cannot be encoded for the native call.
    /// Surfaced immediately; no native call is attempted.
    #[error("String encoding failed: {0}")]
    EncodingFailure(String),

    /// A device did not report a limit the caller depends on
    #[error("Limit not reported by device: {0}")]
    MissingLimit(String),
}

/// Convert ash::vk::Result to CapsErrorKind
impl From<ash::vk::Result> for CapsErrorKind {
    fn from(result: ash::vk::Result) -> Self {
        CapsErrorKind::DriverCallFailure(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CapsErrorKind::InitializationFailed("test".to_string());
        assert!(err.to_string().contains("initialization failed"));
    }

    #[test]
    fn test_driver_failure_from_vk_result() {
        let err: CapsErrorKind = ash::vk::Result::ERROR_INITIALIZATION_FAILED.into();
        assert!(matches!(err, CapsErrorKind::DriverCallFailure(_)));
    }
}
