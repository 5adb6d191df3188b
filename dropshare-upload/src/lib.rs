//! # dropshare-upload: the upload page of a file-sharing app
//!
//! The page takes a file from the upload form, streams it to object storage,
//! writes a metadata record to a document store and walks the user through
//! `uploading → complete → preview`. Identity, storage, documents and
//! navigation are ports; in-memory implementations of each ship with the
//! crate.
//!
//! ## Flow
//!
//! ```text
//! select_file ──► Uploading ──progress──► Uploaded ──confirm delay──► Completed
//!                     │                      │                            │
//!                     ▼                      ▼ download URL + record      ▼ redirect delay
//!                  Failed ◄──────────────────┘                        Redirected
//!                     │                                          (/file-preview/<id>)
//!                     └── retry()
//! ```
//!
//! A loaded identity without a signed-in user sends the page to the sign-in
//! route at any point.
//!
//! ## Quick Start
//!
//! ```rust
//! use dropshare_blob::{BlobConfig, MemoryObjectStore};
//! use dropshare_upload::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let identity = SessionIdentity::new(IdentityState::signed_in(
//!     UserProfile::new().with_full_name("Alice").with_primary_email("a@b.com"),
//! ));
//! let store = MemoryObjectStore::new(BlobConfig::new().with_public_base_url("https://store"));
//! let documents = MemoryDocumentStore::new();
//! let navigator = HistoryNavigator::new();
//!
//! let page = UploadPage::builder(store, documents.clone(), navigator.clone(), &identity)
//!     .config(UploadConfig::new().with_base_url("https://share.example.com/"))
//!     .mount();
//!
//! page.select_file(Some(SelectedFile::new("demo.png", "image/png", &b"0123456789"[..])))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod document;
mod error;
mod identity;
mod navigation;
mod page;
mod record;
pub mod telemetry;

pub use config::{blob_config_from, ConfigValues, UploadConfig, ENV_PREFIX};
pub use document::{DocumentStore, MemoryDocumentStore};
pub use error::{UploadError, UploadResult};
pub use identity::{IdentityProvider, IdentityState, SessionIdentity, UserProfile};
pub use navigation::{HistoryNavigator, Navigator};
pub use page::{FailedStep, PageView, Stage, UploadPage, UploadPageBuilder};
pub use record::{RandomRecordIds, RecordId, RecordIdGenerator, SelectedFile, UploadRecord};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        HistoryNavigator, IdentityState, MemoryDocumentStore, PageView, SelectedFile,
        SessionIdentity, Stage, UploadConfig, UploadError, UploadPage, UploadResult, UserProfile,
    };
}
