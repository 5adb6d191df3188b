/// Configuration for object storage backends
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Absolute max size allowed for a single object (safety guard)
    pub max_object_bytes: u64,

    /// Bytes moved per transfer step; one progress event is emitted per chunk
    pub chunk_size: usize,

    /// Base URL that public download URLs are minted under
    pub public_base_url: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            max_object_bytes: 5 * 1024 * 1024 * 1024, // 5GB
            chunk_size: 256 * 1024,                   // 256KB
            public_base_url: "memory://objects".to_string(),
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max object size
    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.max_object_bytes = bytes;
        self
    }

    /// Set the transfer chunk size. Zero is bumped to one byte.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Set the base for public download URLs
    pub fn with_public_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.public_base_url = url.into();
        self
    }
}
