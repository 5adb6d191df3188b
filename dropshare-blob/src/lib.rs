//! # dropshare-blob: resumable object storage port
//!
//! `dropshare-blob` is the storage side of the dropshare upload flow. It
//! defines the [`ObjectStore`] port that the upload page talks to, the
//! [`ResumableUpload`] handle a transfer reports through, and an in-memory
//! backend that behaves like a chunked network upload.
//!
//! ## Key Features
//!
//! - **Progress events**: every transfer emits `Progress`, then exactly one of
//!   `Completed`, `Failed` or `Cancelled`
//! - **Resumable**: transfers can be paused, resumed and cancelled through a
//!   cloneable [`TransferController`]
//! - **Storage agnostic**: any backend that can mint a public URL fits behind
//!   [`ObjectStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dropshare_blob::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryObjectStore::new(BlobConfig::new().with_public_base_url("https://store"));
//! let metadata = UploadMetadata::new().with_content_type("text/plain");
//!
//! let mut upload = store
//!     .start_resumable_upload("file-upload/hello.txt", Bytes::from_static(b"hello"), metadata)
//!     .await?;
//!
//! while let Some(event) = upload.next_event().await {
//!     if let TransferEvent::Completed(object) = event {
//!         let url = store.download_url(&object).await?;
//!         assert_eq!(url, "https://store/file-upload/hello.txt");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod memory_store;
mod receipt;
pub mod store;
mod types;
mod upload;

// Re-export main types for clean API
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryObjectStore;
pub use receipt::StoredObject;
pub use store::{ObjectKeyStrategy, ObjectStore, PrefixKeyStrategy};
pub use types::{TransferControl, TransferEvent, UploadId, UploadMetadata, UploadProgress};
pub use upload::{ResumableUpload, TransferController, TransferReporter};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobConfig, BlobError, BlobResult, MemoryObjectStore, ObjectStore, StoredObject,
        TransferEvent, UploadMetadata, UploadProgress,
    };
}
