//! DOCQR Storage Library
//!
//! Storage abstraction and implementations for DOCQR: the [`Storage`] trait plus an
//! S3-compatible object-store backend and a local filesystem backend.
//!
//! # Layout
//!
//! Objects live in named containers (`documents`, `qr-codes` by default). On S3 every
//! container is a bucket; on the local backend it is a directory under the storage
//! root. Keys must not contain `..` segments or start with `/`.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use docqr_core::StorageBackend;
pub use factory::{create_storage, StorageSettings};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, PutReceipt, Storage, StorageError, StorageResult};
