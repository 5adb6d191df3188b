use dropshare_blob::BlobError;
use thiserror::Error;

/// Result type for upload flow operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors surfaced by the upload page and its ports
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Upload page has been unmounted")]
    Unmounted,

    #[error("Upload was superseded by a newer selection")]
    Superseded,

    #[error("Nothing to retry")]
    NothingToRetry,

    #[error("Could not generate an unused record id after {attempts} attempts")]
    IdExhausted { attempts: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] BlobError),

    #[error("Document store error: {source}")]
    Document {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration for '{key}': {message}")]
    Config { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UploadError {
    /// Create a document store error from any error type
    pub fn document<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Document {
            source: Box::new(error),
        }
    }

    /// Create a configuration error
    pub fn config<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}
