use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoredObject;

/// Unique identifier for a resumable upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID
    pub fn new() -> Self {
        Self(format!("upl_{}", Uuid::new_v4().simple()))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata sent along with the bytes of an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    pub content_type: Option<String>,
}

impl UploadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        let content_type = content_type.into();
        // Browsers report an empty type for unknown files
        self.content_type = if content_type.is_empty() {
            None
        } else {
            Some(content_type)
        };
        self
    }
}

/// Snapshot of how far a transfer has got
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// Percentage in `[0, 100]`. An empty object counts as fully transferred.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        let done = self.bytes_transferred.min(self.total_bytes);
        (done as f64 / self.total_bytes as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_transferred >= self.total_bytes
    }
}

/// Event emitted by a resumable upload, in the order the backend produced them
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// More bytes reached the store
    Progress(UploadProgress),
    /// The transfer stopped with an error; no further events follow
    Failed { reason: String },
    /// The transfer was cancelled through its controller; no further events follow
    Cancelled,
    /// All bytes are stored; no further events follow
    Completed(StoredObject),
}

/// Requested run state of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferControl {
    Running,
    Paused,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_tracks_transferred_bytes() {
        assert_eq!(UploadProgress::new(0, 10).percent(), 0.0);
        assert_eq!(UploadProgress::new(5, 10).percent(), 50.0);
        assert_eq!(UploadProgress::new(10, 10).percent(), 100.0);
    }

    #[test]
    fn percent_never_leaves_range() {
        assert_eq!(UploadProgress::new(15, 10).percent(), 100.0);
        assert_eq!(UploadProgress::new(0, 0).percent(), 100.0);
        assert!(UploadProgress::new(0, 0).is_complete());
    }

    #[test]
    fn empty_content_type_is_dropped() {
        let metadata = UploadMetadata::new().with_content_type("");
        assert_eq!(metadata.content_type, None);

        let metadata = UploadMetadata::new().with_content_type("image/png");
        assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn upload_ids_are_prefixed_and_unique() {
        let a = UploadId::new();
        let b = UploadId::new();
        assert!(a.as_str().starts_with("upl_"));
        assert_ne!(a, b);
    }
}
