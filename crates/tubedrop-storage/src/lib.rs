//! Tubedrop Storage Library
//!
//! Durable object storage for published videos: the `Storage` trait plus S3
//! and local filesystem backends.
//!
//! # Storage key format
//!
//! Every backend uses the same layout: `{prefix}/{safe_title}_{video_id}.mp4`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized
//! in the `keys` module.

pub mod factory;
pub mod keys;
pub mod link_token;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, ConfiguredStorage};
pub use keys::video_object_key;
pub use link_token::{LinkSigner, LinkTokenError};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
pub use tubedrop_core::StorageBackend;
