//! Typed errors for package inspection and upload storage.
//!
//! Everything the inspector can reject about an upload collapses into
//! [`Error::InvalidFileType`], whichever platform it was declared as.

/// Result type for inspection and storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The upload is not a readable package of the declared platform,
    /// or its identifying metadata is missing.
    #[error("invalid file type: {reason}")]
    InvalidFileType { reason: String },

    #[error("invalid bundle id: {0:?}")]
    InvalidBundleId(String),

    #[error("invalid upload id: {0:?}")]
    InvalidUploadId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_file_type(reason: impl Into<String>) -> Self {
        Self::InvalidFileType {
            reason: reason.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error is caused by the caller's input rather than by
    /// the server, i.e. should be shown as a validation or not-found page.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileType { .. }
                | Self::InvalidBundleId(_)
                | Self::InvalidUploadId(_)
                | Self::NotFound(_)
        )
    }

    /// HTTP status an outer web layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidFileType { .. } | Self::InvalidBundleId(_) | Self::InvalidUploadId(_) => {
                400
            }
            Self::NotFound(_) => 404,
            Self::Io { .. } | Self::Serialization(_) => 500,
        }
    }
}
