use serde::{Deserialize, Serialize};
use crate::UploadId;

/// Receipt for an object that finished uploading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub upload_id: UploadId,
    pub created_at: i64,
}

impl StoredObject {
    /// Create a new receipt stamped with the current time
    pub fn new<S: Into<String>>(key: S, size_bytes: u64, upload_id: UploadId) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            content_type: None,
            upload_id,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Set content type
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
