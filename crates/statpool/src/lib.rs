//! `statpool`: a fixed-size free-list memory pool.
//!
//! One pre-allocated buffer serves aligned allocate, reallocate and
//! deallocate requests. The buffer is carved into chunks, each starting
//! with a header that links it to its neighbours in address order:
//!
//! ```text
//!   ┌────────┬───────────────┬────────┬─────────────┬────────┬───────────┐
//!   │ header │ used data     │ header │ free        │ header │ used data │
//!   └────────┴───────────────┴────────┴─────────────┴────────┴───────────┘
//!        └──── next ──────────▶   └──── next ─────────▶
//! ```
//!
//! - **First fit**: the lowest-addressed free chunk with room wins.
//! - **Split**: a large free chunk is cut after the request; the tail stays
//!   free.
//! - **Coalesce**: every deallocation merges runs of adjacent free chunks.
//! - **Fixed size**: the pool never grows; exhaustion is an error.
//! - **Thread safe**: one reentrant lock serializes every operation.
//! - **Safe mode**: freed memory can be overwritten with random bytes.
//!
//! # Example
//!
//! ```
//! use statpool::StaticMemPool;
//!
//! let pool = StaticMemPool::<8192>::new();
//!
//! let a = pool.allocate(128).unwrap();
//! let b = pool.allocate_aligned(32, 64).unwrap();
//! assert_eq!(b.as_ptr() as usize % 64, 0);
//!
//! let a = pool.reallocate(a.as_ptr(), 1024).unwrap();
//!
//! pool.deallocate(a.as_ptr()).unwrap();
//! pool.deallocate(b.as_ptr()).unwrap();
//!
//! // Double free is reported, not undefined.
//! assert!(pool.deallocate(b.as_ptr()).is_err());
//! ```
//!
//! A process-wide pool and free functions over it live in [`global`].

pub mod align;
mod chunk;
pub mod config;
pub mod error;
pub mod global;
pub mod header;
pub mod pool;

pub use chunk::{ChunkInfo, MIN_SPLIT_ROOM};
pub use config::PoolConfig;
pub use error::{InternalError, Result};
pub use global::{
    DEFAULT_POOL_SIZE, default_pool, static_alloc, static_alloc_aligned, static_alloc_array,
    static_alloc_array_aligned, static_dealloc, static_dump, static_realloc,
    static_realloc_aligned, static_realloc_array, static_realloc_array_aligned,
};
pub use pool::{DEFAULT_ALIGNMENT, PoolStats, StaticMemPool};
