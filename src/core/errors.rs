//! Error taxonomy shared by every desktop operation
//!
//! Backends report failures with `anyhow`; the public service layer converts
//! them into [`DesktopError`] so tool handlers can tell the caller *what kind*
//! of failure happened.

use serde::Serialize;

/// Result type alias for desktop operations
pub type DesktopResult<T> = Result<T, DesktopError>;

#[derive(Debug, thiserror::Error)]
pub enum DesktopError {
    /// A window title pattern matched nothing
    #[error("No window matches pattern '{pattern}'")]
    NotFound { pattern: String },

    /// The encoded screenshot does not fit the response budget even at the
    /// smallest allowed resolution
    #[error(
        "Screenshot is {bytes} bytes at {width}x{height}, over the {max_bytes} byte budget; retry with a lower scale"
    )]
    SizeExceeded {
        bytes: usize,
        max_bytes: usize,
        width: u32,
        height: u32,
    },

    #[error("Invalid argument '{parameter}': {reason}")]
    InvalidArgument { parameter: String, reason: String },

    /// The operation has no degraded mode on this platform
    #[error("'{capability}' is not supported by the current backend")]
    Unsupported { capability: String },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl DesktopError {
    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Unsupported { .. } => "unsupported",
            Self::Image(_) => "image",
            Self::Io(_) => "io",
            Self::Backend(_) => "backend",
        }
    }
}

/// A capability that was unavailable while an operation still succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Limitation {
    pub capability: String,
    pub detail: String,
}

impl Limitation {
    pub fn new(capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = DesktopError::NotFound {
            pattern: "Notepad".to_string(),
        };
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("Notepad"));

        let err = DesktopError::invalid("threshold", "must be 0-100");
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(err.to_string(), "Invalid argument 'threshold': must be 0-100");
    }

    #[test]
    fn test_size_exceeded_message_suggests_retry() {
        let err = DesktopError::SizeExceeded {
            bytes: 2_000_000,
            max_bytes: 1_048_576,
            width: 64,
            height: 64,
        };
        assert!(err.to_string().contains("retry with a lower scale"));
    }

    #[test]
    fn test_backend_errors_are_transparent() {
        let err: DesktopError = anyhow::anyhow!("ydotool exited with status 1").into();
        assert_eq!(err.kind(), "backend");
        assert_eq!(err.to_string(), "ydotool exited with status 1");
    }
}
