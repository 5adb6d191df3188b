use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{UploadConfig, UserProfile};

/// Identifier of an upload record; document key and share-link segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file handed over by the upload form
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub body: Bytes,
}

impl SelectedFile {
    /// Size is taken from the body
    pub fn new<N, T, B>(name: N, content_type: T, body: B) -> Self
    where
        N: Into<String>,
        T: Into<String>,
        B: Into<Bytes>,
    {
        let body = body.into();
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size: body.len() as u64,
            body,
        }
    }
}

/// Metadata document written once a file is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: RecordId,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_url: String,
    pub user_email: String,
    pub user_name: String,
    pub password: String,
    pub short_url: String,
}

impl UploadRecord {
    pub fn new(
        id: RecordId,
        file: &SelectedFile,
        file_url: String,
        user: Option<&UserProfile>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            short_url: config.share_url(id.as_str()),
            id,
            file_name: file.name.clone(),
            file_size: file.size,
            file_type: file.content_type.clone(),
            file_url,
            user_email: user.map(|u| u.email().to_string()).unwrap_or_default(),
            user_name: user.map(|u| u.name().to_string()).unwrap_or_default(),
            password: String::new(),
        }
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Source of record identifiers
pub trait RecordIdGenerator: Send + Sync {
    fn generate(&self) -> RecordId;
}

/// Random alphanumeric ids of a fixed length
#[derive(Debug, Clone)]
pub struct RandomRecordIds {
    length: usize,
}

impl RandomRecordIds {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl Default for RandomRecordIds {
    fn default() -> Self {
        Self::new(6)
    }
}

impl RecordIdGenerator for RandomRecordIds {
    fn generate(&self) -> RecordId {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        RecordId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserProfile {
        UserProfile::new()
            .with_full_name("Alice")
            .with_primary_email("a@b.com")
    }

    #[test]
    fn random_ids_have_configured_length() {
        let ids = RandomRecordIds::new(9);
        for _ in 0..32 {
            let id = ids.generate();
            assert_eq!(id.as_str().len(), 9);
            assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn record_copies_file_and_user() {
        let config = UploadConfig::new().with_base_url("https://share.io/");
        let file = SelectedFile::new("demo.png", "image/png", &b"0123456789"[..]);
        let user = alice();

        let record = UploadRecord::new(
            RecordId("abc123".into()),
            &file,
            "https://store/demo.png".into(),
            Some(&user),
            &config,
        );

        assert_eq!(record.file_name, "demo.png");
        assert_eq!(record.file_size, 10);
        assert_eq!(record.file_type, "image/png");
        assert_eq!(record.user_email, "a@b.com");
        assert_eq!(record.user_name, "Alice");
        assert_eq!(record.password, "");
        assert_eq!(record.short_url, "https://share.io/abc123");
    }

    #[test]
    fn missing_user_fields_become_empty() {
        let config = UploadConfig::new();
        let file = SelectedFile::new("a.txt", "", Bytes::new());

        let record = UploadRecord::new(RecordId("id".into()), &file, "u".into(), None, &config);
        assert_eq!(record.user_email, "");
        assert_eq!(record.user_name, "");

        let nameless = UserProfile::new().with_primary_email("x@y.z");
        let record = UploadRecord::new(RecordId("id".into()), &file, "u".into(), Some(&nameless), &config);
        assert_eq!(record.user_email, "x@y.z");
        assert_eq!(record.user_name, "");
    }

    #[test]
    fn document_uses_camel_case_fields() {
        let config = UploadConfig::new().with_base_url("b/");
        let file = SelectedFile::new("a.txt", "text/plain", &b"hi"[..]);
        let record = UploadRecord::new(RecordId("k".into()), &file, "u".into(), None, &config);

        let doc = record.to_document().unwrap();
        assert_eq!(doc["id"], "k");
        assert_eq!(doc["fileName"], "a.txt");
        assert_eq!(doc["fileSize"], 2);
        assert_eq!(doc["fileType"], "text/plain");
        assert_eq!(doc["fileUrl"], "u");
        assert_eq!(doc["shortUrl"], "b/k");
        assert_eq!(doc["password"], "");

        let back: UploadRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(back, record);
    }
}
