//! Process-wide default pool and free-function facade.
//!
//! The default pool is built on first use, guarded by a `OnceLock`. Code
//! that wants its own pool should construct a [`StaticMemPool`] and pass it
//! by reference instead; these functions are thin forwarders for callers
//! that just want "the" pool.
//!
//! On first use the logger picks up `STATPOOL_LOG` and the pool picks up
//! `STATPOOL_SAFE`. With the `safe-default` feature, safe mode starts on
//! regardless of the environment.
//!
//! # Examples
//!
//! ```
//! use statpool::global::{static_alloc, static_dealloc, static_realloc};
//!
//! let ptr = static_alloc(24).unwrap();
//! let ptr = static_realloc(ptr.as_ptr(), 96).unwrap();
//! static_dealloc(ptr.as_ptr()).unwrap();
//! ```

use std::io::{self, Write};
use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::config::PoolConfig;
use crate::error::Result;
use crate::pool::StaticMemPool;

/// Size of the process-wide pool (1 MiB).
pub const DEFAULT_POOL_SIZE: usize = 1 << 20;

/// Type of the process-wide pool.
pub type DefaultPool = StaticMemPool<DEFAULT_POOL_SIZE>;

/// Returns the process-wide pool, building it on first call.
#[must_use]
pub fn default_pool() -> &'static DefaultPool {
    static POOL: OnceLock<DefaultPool> = OnceLock::new();
    POOL.get_or_init(|| {
        statpool_log::init_from_env();
        let config = PoolConfig::from_env();
        let config = if cfg!(feature = "safe-default") {
            config.with_safe(true)
        } else {
            config
        };
        DefaultPool::with_config(config)
    })
}

/// [`StaticMemPool::allocate`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::allocate_aligned`].
pub fn static_alloc(size: usize) -> Result<NonNull<u8>> {
    default_pool().allocate(size)
}

/// [`StaticMemPool::allocate_aligned`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::allocate_aligned`].
pub fn static_alloc_aligned(size: usize, alignment: usize) -> Result<NonNull<u8>> {
    default_pool().allocate_aligned(size, alignment)
}

/// [`StaticMemPool::allocate_array`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::allocate_array_aligned`].
pub fn static_alloc_array(count: usize, elem_size: usize) -> Result<NonNull<u8>> {
    default_pool().allocate_array(count, elem_size)
}

/// [`StaticMemPool::allocate_array_aligned`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::allocate_array_aligned`].
pub fn static_alloc_array_aligned(
    count: usize,
    elem_size: usize,
    alignment: usize,
) -> Result<NonNull<u8>> {
    default_pool().allocate_array_aligned(count, elem_size, alignment)
}

/// [`StaticMemPool::reallocate`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::reallocate_aligned`].
pub fn static_realloc(ptr: *mut u8, size: usize) -> Result<NonNull<u8>> {
    default_pool().reallocate(ptr, size)
}

/// [`StaticMemPool::reallocate_aligned`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::reallocate_aligned`].
pub fn static_realloc_aligned(ptr: *mut u8, size: usize, alignment: usize) -> Result<NonNull<u8>> {
    default_pool().reallocate_aligned(ptr, size, alignment)
}

/// [`StaticMemPool::reallocate_array`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::reallocate_array`].
pub fn static_realloc_array(ptr: *mut u8, count: usize, elem_size: usize) -> Result<NonNull<u8>> {
    default_pool().reallocate_array(ptr, count, elem_size)
}

/// [`StaticMemPool::reallocate_array_aligned`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::reallocate_array_aligned`].
pub fn static_realloc_array_aligned(
    ptr: *mut u8,
    count: usize,
    elem_size: usize,
    alignment: usize,
) -> Result<NonNull<u8>> {
    default_pool().reallocate_array_aligned(ptr, count, elem_size, alignment)
}

/// [`StaticMemPool::deallocate`] on the default pool.
///
/// # Errors
///
/// See [`StaticMemPool::deallocate`].
pub fn static_dealloc(ptr: *mut u8) -> Result<()> {
    default_pool().deallocate(ptr)
}

/// [`StaticMemPool::dump_headers`] on the default pool.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn static_dump<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    default_pool().dump_headers(out)
}
