//! PRTG Entity Cache
//!
//! Local store of the entities fetched from a PRTG server, keyed by object id.
//!
//! # Key Components
//!
//! - **EntityCache trait**: write / lookup / per-kind and changed-only reads
//! - **MemoryCache**: DashMap backend
//! - **FileCache**: JSON file backend (temp file removed on drop, or a
//!   persistent path)

pub mod error;
pub mod traits;

#[cfg(feature = "memory-backend")]
pub mod memory_impl;

#[cfg(feature = "file-backend")]
pub mod file_impl;

// Re-exports
pub use error::{CacheError, Result};
pub use traits::{ContentFilter, EntityCache};

#[cfg(feature = "memory-backend")]
pub use memory_impl::MemoryCache;

#[cfg(feature = "file-backend")]
pub use file_impl::FileCache;
