//! Modera Storage Library
//!
//! Object storage abstraction for the moderation pipeline. A `Storage` value
//! is scoped to one bucket; the upload bucket holds raw submissions and the
//! results bucket holds one `{content_id}.json` verdict document per item.
//!
//! # Storage key format
//!
//! - Uploads: `{content_id}/{filename}`
//! - Verdicts: `{content_id}.json`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized
//! in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::StorageFactory;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use modera_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
