use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    BlobConfig, BlobError, BlobResult, ObjectStore, ResumableUpload, StoredObject,
    TransferControl, TransferReporter, UploadMetadata,
};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: Option<String>,
    created_at: i64,
}

/// In-memory object store that transfers bodies chunk by chunk.
///
/// Every chunk is a pause/cancel checkpoint and yields to the runtime, so
/// progress events interleave with the rest of the program the way a network
/// upload would.
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
    config: BlobConfig,
}

impl MemoryObjectStore {
    pub fn new(config: BlobConfig) -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Stored bytes for `key`
    pub fn get(&self, key: &str) -> BlobResult<Bytes> {
        self.objects
            .read()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| BlobError::not_found(key))
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).and_then(|o| o.content_type.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn public_url(&self, key: &str) -> String {
        let path = key
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.config.public_base_url.trim_end_matches('/'), path)
    }

    async fn run_transfer(
        objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
        mut reporter: TransferReporter,
        key: String,
        body: Bytes,
        content_type: Option<String>,
        chunk_size: usize,
    ) {
        let total = body.len() as u64;
        if !reporter.progress(0, total) {
            return;
        }

        let mut sent = 0u64;
        for chunk in body.chunks(chunk_size) {
            tokio::task::yield_now().await;
            if reporter.checkpoint().await == TransferControl::Cancelled {
                debug!("Transfer {} cancelled after {} of {} bytes", reporter.upload_id(), sent, total);
                reporter.cancelled();
                return;
            }
            sent += chunk.len() as u64;
            if !reporter.progress(sent, total) {
                return;
            }
        }

        if reporter.checkpoint().await == TransferControl::Cancelled {
            reporter.cancelled();
            return;
        }

        let object = MemoryObject {
            data: body,
            content_type: content_type.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        let created_at = object.created_at;
        objects.write().insert(key.clone(), object);

        let mut stored = StoredObject::new(key, total, reporter.upload_id().clone());
        stored.created_at = created_at;
        if let Some(ct) = content_type {
            stored = stored.with_content_type(ct);
        }
        debug!("Transfer {} stored {} bytes at {}", reporter.upload_id(), total, stored.key);
        reporter.complete(stored);
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new(BlobConfig::default())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn start_resumable_upload(
        &self,
        key: &str,
        body: Bytes,
        metadata: UploadMetadata,
    ) -> BlobResult<ResumableUpload> {
        if key.is_empty() {
            return Err(BlobError::invalid("Object key must not be empty"));
        }
        let size = body.len() as u64;
        if size > self.config.max_object_bytes {
            return Err(BlobError::TooLarge {
                size,
                max: self.config.max_object_bytes,
            });
        }

        let (upload, reporter) = ResumableUpload::channel();
        debug!("Starting transfer {} of {} bytes to {}", upload.id(), size, key);

        tokio::spawn(Self::run_transfer(
            self.objects.clone(),
            reporter,
            key.to_string(),
            body,
            metadata.content_type,
            self.config.chunk_size.max(1),
        ));

        Ok(upload)
    }

    async fn download_url(&self, object: &StoredObject) -> BlobResult<String> {
        if !self.contains(&object.key) {
            return Err(BlobError::not_found(&object.key));
        }
        Ok(self.public_url(&object.key))
    }
}
