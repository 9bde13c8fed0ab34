//! Fixed-size memory pool with a first-fit free list.
//!
//! [`StaticMemPool`] owns one buffer of `SIZE` bytes for its whole life and
//! serves allocate / reallocate / deallocate requests out of it. It never
//! grows: when no chunk is large enough the request fails with
//! "no free chunk available".
//!
//! # Locking
//!
//! Every public operation runs under a single reentrant mutex, so all
//! mutations form one total order. `reallocate` holds the lock for its whole
//! duration and calls `allocate` and `deallocate` while still holding it.
//!
//! # Examples
//!
//! ```
//! use statpool::StaticMemPool;
//!
//! let pool = StaticMemPool::<4096>::new();
//!
//! let ptr = pool.allocate_aligned(64, 16).unwrap();
//! assert_eq!(ptr.as_ptr() as usize % 16, 0);
//!
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 64) };
//!
//! pool.deallocate(ptr.as_ptr()).unwrap();
//! assert_eq!(pool.chunks().len(), 1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;
use statpool_log::{debug, info, trace, warn};

use crate::align::HEADER_ALIGN;
use crate::chunk::{ChunkInfo, ChunkList, MIN_SPLIT_ROOM};
use crate::config::PoolConfig;
use crate::error::{self, InternalError, Result};
use crate::header::HEADER_SIZE;

/// Alignment used when the caller does not ask for one.
pub const DEFAULT_ALIGNMENT: usize = HEADER_ALIGN;

/// Point-in-time view of a pool's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffer size in bytes.
    pub capacity: usize,
    /// Number of headers in the chain.
    pub chunk_count: usize,
    /// Chunks available for allocation.
    pub free_chunks: usize,
    /// Chunks currently handed out.
    pub used_chunks: usize,
    /// Sum of the data room of free chunks.
    pub free_bytes: usize,
    /// Sum of the data room of used chunks.
    pub used_bytes: usize,
    /// Largest data room among free chunks.
    pub largest_free: usize,
    /// Successful allocations since construction.
    pub allocations: usize,
    /// Successful deallocations since construction.
    pub deallocations: usize,
    /// Allocations that found no chunk.
    pub failed_allocations: usize,
}

impl PoolStats {
    /// Share of free bytes that cannot be served by the largest free chunk.
    ///
    /// Returns `None` when nothing is free.
    #[must_use]
    pub fn fragmentation(&self) -> Option<f64> {
        if self.free_bytes == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            Some(1.0 - self.largest_free as f64 / self.free_bytes as f64)
        }
    }
}

/// A mutex-protected free-list allocator over a fixed `SIZE`-byte buffer.
///
/// The buffer is aligned to [`HEADER_ALIGN`]. Chunks are described by
/// headers stored inside the buffer itself, so the pool makes no heap
/// allocation after construction.
///
/// Outstanding allocations are not tracked beyond the chain: dropping the
/// pool releases the buffer regardless of what is still handed out.
pub struct StaticMemPool<const SIZE: usize> {
    chunks: ReentrantMutex<RefCell<ChunkList>>,
    safe: AtomicBool,
}

impl<const SIZE: usize> StaticMemPool<SIZE> {
    /// Buffer size in bytes.
    pub const CAPACITY: usize = SIZE;

    const VALID_SIZE: () = assert!(
        SIZE >= HEADER_SIZE + MIN_SPLIT_ROOM && SIZE <= isize::MAX as usize - HEADER_ALIGN,
        "pool size must fit one header plus its minimum room, and an isize"
    );

    /// Creates a pool with safe mode off.
    ///
    /// # Panics
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the buffer
    /// cannot be allocated.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::new())
    }

    /// Creates a pool with safe mode set to `safe`.
    #[must_use]
    pub fn with_safe(safe: bool) -> Self {
        Self::with_config(PoolConfig::new().with_safe(safe))
    }

    /// Creates a pool from a [`PoolConfig`].
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_SIZE;

        let list = ChunkList::new(SIZE);
        debug!(
            "pool of {} bytes at {:#x} (header {} bytes, align {}, safe {})",
            SIZE,
            list.addr(0),
            HEADER_SIZE,
            HEADER_ALIGN,
            config.safe
        );

        Self {
            chunks: ReentrantMutex::new(RefCell::new(list)),
            safe: AtomicBool::new(config.safe),
        }
    }

    /// Whether freed memory is scrubbed.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.safe.load(Ordering::Acquire)
    }

    /// Turns safe mode on or off for subsequent deallocations.
    pub fn set_safe(&self, safe: bool) {
        let was = self.safe.swap(safe, Ordering::AcqRel);
        if was != safe {
            info!("safe mode {}", if safe { "enabled" } else { "disabled" });
        }
    }

    fn check_request(size: usize, alignment: usize) -> Result<()> {
        if size == 0 {
            return Err(InternalError::new(error::ZERO_SIZE));
        }
        if size > SIZE {
            return Err(InternalError::new(error::SIZE_EXCEEDS_POOL));
        }
        if alignment == 0 {
            return Err(InternalError::new(error::ZERO_ALIGNMENT));
        }
        if size > isize::MAX as usize {
            return Err(InternalError::new(error::SIZE_EXCEEDS_ISIZE));
        }
        Ok(())
    }

    fn array_size(count: usize, elem_size: usize, alignment: usize) -> Result<usize> {
        if elem_size < alignment {
            return Err(InternalError::new(error::ELEMENT_SMALLER_THAN_ALIGNMENT));
        }
        count
            .checked_mul(elem_size)
            .ok_or(InternalError::new(error::ARRAY_SIZE_OVERFLOW))
    }

    /// Allocates `size` bytes at [`DEFAULT_ALIGNMENT`].
    ///
    /// # Errors
    ///
    /// See [`allocate_aligned`](Self::allocate_aligned).
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.allocate_aligned(size, DEFAULT_ALIGNMENT)
    }

    /// Allocates `size` bytes whose address is a multiple of `alignment`.
    ///
    /// The lowest-addressed free chunk with enough room wins. If what is
    /// left after the request can hold another header and a minimum payload,
    /// the chunk is split and the tail stays free.
    ///
    /// # Errors
    ///
    /// - `size` is 0, larger than the pool, or larger than `isize::MAX`
    /// - `alignment` is 0
    /// - no free chunk can hold the request
    pub fn allocate_aligned(&self, size: usize, alignment: usize) -> Result<NonNull<u8>> {
        Self::check_request(size, alignment)?;

        let guard = self.chunks.lock();
        let mut chunks = guard.borrow_mut();

        match chunks.carve(size, alignment) {
            Some(carved) => {
                trace!(
                    "allocated {} bytes (align {}) at +{} in chunk +{}{}",
                    size,
                    alignment,
                    carved.data_start,
                    carved.at,
                    match carved.remainder {
                        Some(tail) => format!(", tail +{tail}"),
                        None => String::new(),
                    }
                );
                Ok(chunks.ptr_at(carved.data_start))
            }
            None => {
                chunks.counters.failed_allocations += 1;
                warn!(
                    "no free chunk for {} bytes (align {}) in {}-byte pool",
                    size, alignment, SIZE
                );
                Err(InternalError::new(error::NO_FREE_CHUNK))
            }
        }
    }

    /// Allocates room for `count` elements of `elem_size` bytes at
    /// [`DEFAULT_ALIGNMENT`].
    ///
    /// # Errors
    ///
    /// See [`allocate_array_aligned`](Self::allocate_array_aligned).
    pub fn allocate_array(&self, count: usize, elem_size: usize) -> Result<NonNull<u8>> {
        self.allocate_array_aligned(count, elem_size, DEFAULT_ALIGNMENT)
    }

    /// Allocates room for `count` elements of `elem_size` bytes at
    /// `alignment`.
    ///
    /// # Errors
    ///
    /// Fails if `elem_size < alignment`, if `count * elem_size` overflows,
    /// or for any reason [`allocate_aligned`](Self::allocate_aligned) fails.
    pub fn allocate_array_aligned(
        &self,
        count: usize,
        elem_size: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>> {
        let size = Self::array_size(count, elem_size, alignment)?;
        self.allocate_aligned(size, alignment)
    }

    /// Resizes an allocation, keeping the alignment it was made with.
    ///
    /// A null `ptr` allocates at [`DEFAULT_ALIGNMENT`].
    ///
    /// # Errors
    ///
    /// See [`reallocate_aligned`](Self::reallocate_aligned).
    pub fn reallocate(&self, ptr: *mut u8, size: usize) -> Result<NonNull<u8>> {
        self.reallocate_with(ptr, size, None)
    }

    /// Resizes an allocation to `size` bytes at `alignment`.
    ///
    /// If the current chunk already holds `size` bytes and was allocated
    /// with the same alignment, the same pointer comes back untouched; the
    /// chunk is never shrunk. Otherwise a new region is allocated, the first
    /// `min(size, old room)` bytes are moved across, and the old region is
    /// freed. A null `ptr` simply allocates.
    ///
    /// # Errors
    ///
    /// - the same size and alignment checks as
    ///   [`allocate_aligned`](Self::allocate_aligned)
    /// - `ptr` is not inside a live allocation of this pool
    /// - no free chunk can hold the new size; the old allocation is kept
    pub fn reallocate_aligned(
        &self,
        ptr: *mut u8,
        size: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>> {
        self.reallocate_with(ptr, size, Some(alignment))
    }

    /// Array form of [`reallocate`](Self::reallocate).
    ///
    /// # Errors
    ///
    /// Fails if `elem_size` is below [`DEFAULT_ALIGNMENT`], if the total
    /// size overflows, or for any reason `reallocate` fails.
    pub fn reallocate_array(
        &self,
        ptr: *mut u8,
        count: usize,
        elem_size: usize,
    ) -> Result<NonNull<u8>> {
        let size = Self::array_size(count, elem_size, DEFAULT_ALIGNMENT)?;
        self.reallocate(ptr, size)
    }

    /// Array form of [`reallocate_aligned`](Self::reallocate_aligned).
    ///
    /// # Errors
    ///
    /// Fails if `elem_size < alignment`, if the total size overflows, or for
    /// any reason `reallocate_aligned` fails.
    pub fn reallocate_array_aligned(
        &self,
        ptr: *mut u8,
        count: usize,
        elem_size: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>> {
        let size = Self::array_size(count, elem_size, alignment)?;
        self.reallocate_aligned(ptr, size, alignment)
    }

    fn reallocate_with(
        &self,
        ptr: *mut u8,
        size: usize,
        alignment: Option<usize>,
    ) -> Result<NonNull<u8>> {
        if ptr.is_null() {
            return self.allocate_aligned(size, alignment.unwrap_or(DEFAULT_ALIGNMENT));
        }
        Self::check_request(size, alignment.unwrap_or(DEFAULT_ALIGNMENT))?;

        let guard = self.chunks.lock();

        let (old, alignment) = {
            let chunks = guard.borrow();
            let Some((_, hdr)) = chunks.find_owner(ptr) else {
                warn!("reallocate of unknown pointer {:p}", ptr);
                return Err(InternalError::new(error::POINTER_NOT_FOUND));
            };

            let alignment = alignment.unwrap_or(hdr.wanted_align);
            if hdr.data_room() >= size && hdr.wanted_align == alignment {
                trace!(
                    "reallocate to {} bytes fits in place at +{}",
                    size, hdr.data_start
                );
                return Ok(chunks.ptr_at(hdr.data_start));
            }
            (hdr, alignment)
        };

        let fresh = self.allocate_aligned(size, alignment)?;
        let old_ptr = {
            let mut chunks = guard.borrow_mut();
            let to = fresh.as_ptr().addr() - chunks.addr(0);
            chunks.copy(old.data_start, to, size.min(old.data_room()));
            chunks.ptr_at(old.data_start)
        };
        self.deallocate(old_ptr.as_ptr())?;

        trace!(
            "moved {} bytes from +{} for reallocate to {} bytes",
            size.min(old.data_room()),
            old.data_start,
            size
        );
        drop(guard);
        Ok(fresh)
    }

    /// Returns an allocation to the pool and coalesces free neighbours.
    ///
    /// Any address inside the allocation's data room identifies it. In safe
    /// mode the freed room is filled with random bytes first.
    ///
    /// # Errors
    ///
    /// - `ptr` is null
    /// - `ptr` is not inside a live allocation of this pool, which includes
    ///   freeing the same pointer twice
    pub fn deallocate(&self, ptr: *mut u8) -> Result<()> {
        if ptr.is_null() {
            return Err(InternalError::new(error::NULL_DEALLOCATION));
        }

        let safe = self.is_safe();
        let guard = self.chunks.lock();
        let mut chunks = guard.borrow_mut();

        let Some((at, _)) = chunks.find_owner(ptr) else {
            warn!("deallocate of unknown or already freed pointer {:p}", ptr);
            return Err(InternalError::new(error::POINTER_NOT_FOUND));
        };

        let hdr = chunks.release(at);
        if safe {
            chunks.scrub(&hdr);
        }
        let merged = chunks.merge_free_chunks(safe);

        trace!(
            "freed chunk +{} ({} bytes), {} neighbour(s) merged",
            at,
            hdr.chunk_size(),
            merged
        );
        Ok(())
    }

    /// Whether `ptr` points into this pool's buffer.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let guard = self.chunks.lock();
        guard.borrow().offset_of(ptr).is_some()
    }

    /// Snapshot of the chunk chain in address order.
    #[must_use]
    pub fn chunks(&self) -> Vec<ChunkInfo> {
        let guard = self.chunks.lock();
        guard.borrow().snapshot()
    }

    /// Occupancy and operation counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let guard = self.chunks.lock();
        let chunks = guard.borrow();

        let mut stats = PoolStats {
            capacity: SIZE,
            chunk_count: 0,
            free_chunks: 0,
            used_chunks: 0,
            free_bytes: 0,
            used_bytes: 0,
            largest_free: 0,
            allocations: chunks.counters.allocations,
            deallocations: chunks.counters.deallocations,
            failed_allocations: chunks.counters.failed_allocations,
        };

        for (_, hdr) in chunks.iter() {
            stats.chunk_count += 1;
            if hdr.free {
                stats.free_chunks += 1;
                stats.free_bytes += hdr.data_room();
                stats.largest_free = stats.largest_free.max(hdr.data_room());
            } else {
                stats.used_chunks += 1;
                stats.used_bytes += hdr.data_room();
            }
        }

        stats
    }

    /// Writes every header of the chain to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn dump_headers<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        // Rendered under the lock, written after it: `out` may call back
        // into the pool.
        let mut text = Vec::new();
        {
            let guard = self.chunks.lock();
            guard.borrow().dump(&mut text)?;
        }
        out.write_all(&text)
    }
}

impl<const SIZE: usize> Default for StaticMemPool<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> fmt::Debug for StaticMemPool<SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("StaticMemPool")
            .field("capacity", &SIZE)
            .field("safe", &self.is_safe())
            .field("chunks", &stats.chunk_count)
            .field("free_bytes", &stats.free_bytes)
            .finish()
    }
}
