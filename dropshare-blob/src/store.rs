use async_trait::async_trait;
use bytes::Bytes;
use crate::{BlobResult, ResumableUpload, StoredObject, UploadMetadata};

/// Object storage operations the upload flow relies on
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start moving `body` to `key`. Progress and the outcome are reported
    /// through the returned handle; an `Err` here means nothing was started.
    async fn start_resumable_upload(
        &self,
        key: &str,
        body: Bytes,
        metadata: UploadMetadata,
    ) -> BlobResult<ResumableUpload>;

    /// Mint a public URL for an object that finished uploading
    async fn download_url(&self, object: &StoredObject) -> BlobResult<String>;
}

/// Strategy for naming uploaded objects
pub trait ObjectKeyStrategy: Send + Sync {
    /// Generate the storage key for a file selected by the user
    fn object_key(&self, file_name: &str) -> String;
}

/// Default key strategy: `<prefix><file name>`
#[derive(Debug, Clone)]
pub struct PrefixKeyStrategy {
    prefix: String,
}

impl PrefixKeyStrategy {
    pub const DEFAULT_PREFIX: &'static str = "file-upload/";

    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for PrefixKeyStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl ObjectKeyStrategy for PrefixKeyStrategy {
    fn object_key(&self, file_name: &str) -> String {
        // Last path component only
        let name = file_name
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(file_name);
        format!("{}{}", self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_matches_upload_folder() {
        assert_eq!(PrefixKeyStrategy::default().object_key("demo.png"), "file-upload/demo.png");
    }

    #[test]
    fn directories_are_stripped_from_names() {
        let keys = PrefixKeyStrategy::new("up/");
        assert_eq!(keys.object_key("../../etc/passwd"), "up/passwd");
        assert_eq!(keys.object_key("C:\\Users\\me\\a.txt"), "up/a.txt");
    }

    #[test]
    fn empty_prefix_keeps_bare_name() {
        assert_eq!(PrefixKeyStrategy::new("").object_key("demo.png"), "demo.png");
    }
}
