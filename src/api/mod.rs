//! Backend API layer
//!
//! One REST backend serves every durable operation: listing, copy, move,
//! rename, delete, folder creation, auth, downloads and thumbnails. The
//! [`ApiClient`] owns the transport; the two traits below are the seams the
//! cache and the explorer consume, so tests can substitute a scripted
//! backend.

pub mod client;
pub mod retry;
pub mod types;

pub use client::{ApiClient, ProgressFn, DEFAULT_TIMEOUT_MS};
pub use retry::RetryConfig;
pub use types::*;

use async_trait::async_trait;

/// Source of directory listings, keyed by backend path.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self, path: &str) -> Result<Vec<FileEntry>, ApiError>;
}

/// Mutating file operations. Every call maps to exactly one POST; none of
/// them retry.
#[async_trait]
pub trait FileOps: Send + Sync {
    async fn copy_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError>;
    async fn move_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError>;
    async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), ApiError>;
    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;
    async fn create_folder(&self, folder_name: &str, current_path: &str) -> Result<(), ApiError>;
}
