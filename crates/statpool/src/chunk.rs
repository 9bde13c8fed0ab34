//! The chunk chain laid over the pool buffer.
//!
//! [`ChunkList`] owns the raw buffer and implements the allocator's
//! algorithms over it: first-fit search, splitting, pointer lookup,
//! release, and coalescing. It performs no locking of its own; the pool
//! only reaches it through its reentrant lock.
//!
//! # Layout
//!
//! ```text
//!   pool buffer
//!   ┌──────────────────────────┬───────┬──────────────────────────┬─────
//!   │ header │ pad │ data ...  │  pad  │ header │ pad │ data ...  │ ...
//!   └──────────────────────────┴───────┴──────────────────────────┴─────
//!   ▲ chunk_start              ▲ chunk_end == next chunk_start
//!            ▲ data_start (aligned for the caller)
//! ```
//!
//! The first header always sits at offset 0. A header sits at its chunk's
//! start rounded up to [`HEADER_ALIGN`], and the chain, followed through
//! `next`, tiles the whole buffer with no gaps or overlaps.

use std::alloc::{self, Layout};
use std::io::{self, Write};
use std::ptr::{self, NonNull};

use crate::align::{self, HEADER_ALIGN};
use crate::header::{ChunkHeader, HEADER_SIZE};

/// Smallest data room a split is allowed to leave behind.
///
/// A tail that could hold its padding and header but no payload stays with
/// the carved chunk instead of becoming a zero-room free chunk. This is
/// stricter than a header-only split rule.
pub const MIN_SPLIT_ROOM: usize = HEADER_ALIGN;

/// Offset of the first header.
const FIRST: usize = 0;

/// Outcome of a successful first-fit search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Carved {
    /// Header offset of the chunk handed out.
    pub at: usize,
    /// Offset of the caller's first byte.
    pub data_start: usize,
    /// Header offset of the free remainder, when the chunk was split.
    pub remainder: Option<usize>,
}

/// Value snapshot of one chunk, with offsets relative to the pool start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Offset of the chunk's header.
    pub header: usize,
    /// First byte of the chunk's extent.
    pub chunk_start: usize,
    /// One past the last byte of the chunk's extent.
    pub chunk_end: usize,
    /// First caller-visible byte.
    pub data_start: usize,
    /// Bytes from `data_start` to `chunk_end`.
    pub data_room: usize,
    /// Alignment the caller requested; 0 while free.
    pub wanted_align: usize,
    /// Whether the chunk is available.
    pub free: bool,
}

impl ChunkInfo {
    fn new(at: usize, hdr: &ChunkHeader) -> Self {
        Self {
            header: at,
            chunk_start: hdr.chunk_start,
            chunk_end: hdr.chunk_end,
            data_start: hdr.data_start,
            data_room: hdr.data_room(),
            wanted_align: hdr.wanted_align,
            free: hdr.free,
        }
    }

    /// Total extent of the chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_end - self.chunk_start
    }
}

/// Operation counters kept alongside the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub allocations: usize,
    pub deallocations: usize,
    pub failed_allocations: usize,
}

/// The pool buffer and the header chain inside it.
pub(crate) struct ChunkList {
    base: NonNull<u8>,
    size: usize,
    pub counters: Counters,
}

// SAFETY: the buffer is uniquely owned by the list and only touched through
// `&mut self` or while the owning pool's lock is held.
unsafe impl Send for ChunkList {}

impl ChunkList {
    /// Allocates a `size`-byte buffer aligned to [`HEADER_ALIGN`] and
    /// writes the single free header covering all of it.
    ///
    /// `size` must hold at least one header and must leave room for
    /// `HEADER_ALIGN` in an `isize`; the pool checks this at compile time.
    pub fn new(size: usize) -> Self {
        debug_assert!(size >= HEADER_SIZE + MIN_SPLIT_ROOM);

        // SAFETY: size is non-zero and below isize::MAX - HEADER_ALIGN, and
        // HEADER_ALIGN is a power of two.
        let layout = unsafe { Layout::from_size_align_unchecked(size, HEADER_ALIGN) };

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        let mut list = Self {
            base,
            size,
            counters: Counters::default(),
        };
        list.init();
        list
    }

    fn init(&mut self) {
        let first = align::header_align(self.addr(0)).map(|a| a.offset);
        debug_assert_eq!(first, Some(0));
        self.write(FIRST, &ChunkHeader::free(FIRST, 0, self.size, None, None));
    }

    /// Buffer length in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Absolute address of `offset`.
    #[inline]
    pub fn addr(&self, offset: usize) -> usize {
        self.base.as_ptr().addr() + offset
    }

    /// Pointer to `offset`, carrying the buffer's provenance.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.size);
        // SAFETY: offset is within the buffer or one past it.
        unsafe { self.base.add(offset) }
    }

    /// Offset of `ptr` within the buffer, if it points inside it.
    #[inline]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = ptr.addr().checked_sub(self.base.as_ptr().addr())?;
        (offset < self.size).then_some(offset)
    }

    /// Decodes the header stored at `at`.
    pub fn read(&self, at: usize) -> ChunkHeader {
        debug_assert!(at + HEADER_SIZE <= self.size);
        let mut bytes = [0u8; HEADER_SIZE];
        // SAFETY: [at, at + HEADER_SIZE) lies in the buffer, and header bytes
        // are never handed to callers.
        unsafe {
            ptr::copy_nonoverlapping(
                self.ptr_at(at).as_ptr(),
                bytes.as_mut_ptr(),
                HEADER_SIZE,
            );
        }
        ChunkHeader::decode(&bytes)
    }

    /// Encodes `hdr` into the buffer at `at`.
    pub fn write(&mut self, at: usize, hdr: &ChunkHeader) {
        debug_assert!(at + HEADER_SIZE <= self.size);
        debug_assert_eq!(at % HEADER_ALIGN, 0);
        let bytes = hdr.encode();
        // SAFETY: as in `read`.
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.ptr_at(at).as_ptr(),
                HEADER_SIZE,
            );
        }
    }

    /// Walks the chain in address order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ChunkHeader)> + '_ {
        let mut cursor = Some(FIRST);
        std::iter::from_fn(move || {
            let at = cursor?;
            let hdr = self.read(at);
            cursor = hdr.next;
            Some((at, hdr))
        })
    }

    /// Value snapshot of the whole chain.
    pub fn snapshot(&self) -> Vec<ChunkInfo> {
        self.iter().map(|(at, hdr)| ChunkInfo::new(at, &hdr)).collect()
    }

    /// Padding needed in front of `data_start` to satisfy `alignment`, if
    /// the chunk still holds `size` bytes afterwards.
    fn enough_room(&self, hdr: &ChunkHeader, size: usize, alignment: usize) -> Option<usize> {
        let pad = align::align(self.addr(hdr.data_start), alignment)?.offset;
        let room = hdr.data_room();
        (room >= pad && room - pad >= size).then_some(pad)
    }

    /// Where a new header would go if the chunk were cut right after the
    /// carved region, provided the remainder still fits a header, its
    /// alignment padding, and `MIN_SPLIT_ROOM` bytes.
    fn can_split(&self, hdr: &ChunkHeader, size: usize, pad: usize) -> Option<usize> {
        let carved_end = hdr.data_start + pad + size;
        // The buffer base is header-aligned, so offsets align like addresses.
        let new_at = align::header_align(carved_end)?.addr;
        let needed = new_at.checked_add(HEADER_SIZE + MIN_SPLIT_ROOM)?;
        (needed <= hdr.chunk_end).then_some(new_at)
    }

    /// First-fit: hands out the lowest-addressed free chunk that can hold
    /// `size` bytes at `alignment`, splitting off the tail when it is large
    /// enough to stand on its own.
    pub fn carve(&mut self, size: usize, alignment: usize) -> Option<Carved> {
        let (at, mut hdr, pad) = self.iter().find_map(|(at, hdr)| {
            if !hdr.free {
                return None;
            }
            self.enough_room(&hdr, size, alignment).map(|pad| (at, hdr, pad))
        })?;

        let remainder = self.can_split(&hdr, size, pad);
        if let Some(new_at) = remainder {
            let cut = hdr.data_start + pad + size;
            let tail = ChunkHeader::free(new_at, cut, hdr.chunk_end, Some(at), hdr.next);
            if let Some(next_at) = hdr.next {
                let mut next = self.read(next_at);
                next.prev = Some(new_at);
                self.write(next_at, &next);
            }
            self.write(new_at, &tail);

            hdr.chunk_end = cut;
            hdr.next = Some(new_at);
        }

        hdr.free = false;
        hdr.wanted_align = alignment;
        hdr.data_start += pad;
        self.write(at, &hdr);
        self.counters.allocations += 1;

        Some(Carved {
            at,
            data_start: hdr.data_start,
            remainder,
        })
    }

    /// Finds the in-use chunk whose data room contains `ptr`.
    pub fn find_owner(&self, ptr: *const u8) -> Option<(usize, ChunkHeader)> {
        let offset = self.offset_of(ptr)?;
        self.iter()
            .take_while(|(_, hdr)| hdr.chunk_start <= offset)
            .find(|(_, hdr)| !hdr.free && hdr.owns(offset))
    }

    /// Marks the chunk at `at` free and undoes its alignment padding.
    pub fn release(&mut self, at: usize) -> ChunkHeader {
        let mut hdr = self.read(at);
        debug_assert!(!hdr.free);
        hdr.free = true;
        hdr.data_start = at + HEADER_SIZE;
        hdr.wanted_align = 0;
        self.write(at, &hdr);
        self.counters.deallocations += 1;
        hdr
    }

    /// Overwrites the data room of a released chunk with random bytes.
    pub fn scrub(&mut self, hdr: &ChunkHeader) {
        debug_assert!(hdr.free);
        let len = hdr.data_room();
        // SAFETY: the data room lies in the buffer and belongs to a free
        // chunk, so no caller holds a pointer into it.
        let room = unsafe {
            std::slice::from_raw_parts_mut(self.ptr_at(hdr.data_start).as_ptr(), len)
        };
        fastrand::fill(room);
    }

    /// Folds every run of adjacent free chunks into its first chunk.
    ///
    /// With `zero_absorbed` set, headers swallowed by a merge are zeroed.
    /// Returns the number of headers removed from the chain.
    pub fn merge_free_chunks(&mut self, zero_absorbed: bool) -> usize {
        let mut merged = 0;
        let mut cursor = Some(FIRST);

        while let Some(at) = cursor {
            let mut hdr = self.read(at);

            if hdr.free {
                let mut absorbed = false;
                while let Some(next_at) = hdr.next {
                    let next = self.read(next_at);
                    if !next.free {
                        break;
                    }

                    hdr.chunk_end = next.chunk_end;
                    hdr.next = next.next;
                    if let Some(after_at) = next.next {
                        let mut after = self.read(after_at);
                        after.prev = Some(at);
                        self.write(after_at, &after);
                    }
                    if zero_absorbed {
                        // SAFETY: the absorbed header lies in the buffer and
                        // is no longer reachable from the chain.
                        unsafe {
                            ptr::write_bytes(self.ptr_at(next_at).as_ptr(), 0, HEADER_SIZE);
                        }
                    }
                    absorbed = true;
                    merged += 1;
                }
                if absorbed {
                    self.write(at, &hdr);
                }
            }

            cursor = hdr.next;
        }

        merged
    }

    /// `memmove` between two offsets of the buffer.
    pub fn copy(&mut self, from: usize, to: usize, len: usize) {
        debug_assert!(from + len <= self.size && to + len <= self.size);
        // SAFETY: both ranges lie in the buffer; `ptr::copy` tolerates
        // overlap.
        unsafe {
            ptr::copy(self.ptr_at(from).as_ptr(), self.ptr_at(to).as_ptr(), len);
        }
    }

    /// Writes a human-readable description of every header to `out`.
    pub fn dump<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let describe = |at: Option<usize>| match at {
            Some(at) => {
                let hdr = self.read(at);
                format!(
                    "{:#x} (+{at}) [{}, {} bytes]",
                    self.addr(at),
                    if hdr.free { "free" } else { "used" },
                    hdr.chunk_size()
                )
            }
            None => "none".to_owned(),
        };

        writeln!(
            out,
            "pool {:#x}..{:#x} ({} bytes, header {} bytes, align {})",
            self.addr(0),
            self.addr(self.size),
            self.size,
            HEADER_SIZE,
            HEADER_ALIGN
        )?;

        for (index, (at, hdr)) in self.iter().enumerate() {
            writeln!(out, "header #{index} @ {:#x} (+{at})", self.addr(at))?;
            writeln!(
                out,
                "  chunk        [{:#x}, {:#x}) (+{}..+{})",
                self.addr(hdr.chunk_start),
                self.addr(hdr.chunk_end),
                hdr.chunk_start,
                hdr.chunk_end
            )?;
            writeln!(out, "  prev         {}", describe(hdr.prev))?;
            writeln!(out, "  next         {}", describe(hdr.next))?;
            writeln!(
                out,
                "  data_start   {:#x} (+{})",
                self.addr(hdr.data_start),
                hdr.data_start
            )?;
            writeln!(out, "  wanted_align {}", hdr.wanted_align)?;
            writeln!(out, "  free         {}", hdr.free)?;
            writeln!(out, "  chunk_size   {}", hdr.chunk_size())?;
            writeln!(out, "  data_room    {}", hdr.data_room())?;
        }

        Ok(())
    }
}

impl Drop for ChunkList {
    fn drop(&mut self) {
        // SAFETY: same layout as in `new`.
        let layout = unsafe { Layout::from_size_align_unchecked(self.size, HEADER_ALIGN) };
        // SAFETY: `base` came from `alloc::alloc` with this layout.
        unsafe {
            alloc::dealloc(self.base.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_count(list: &ChunkList) -> usize {
        list.iter().filter(|(_, hdr)| hdr.free).count()
    }

    #[test]
    fn test_fresh_list_has_one_free_chunk() {
        let list = ChunkList::new(4096);
        let chunks = list.snapshot();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].header, 0);
        assert_eq!(chunks[0].chunk_start, 0);
        assert_eq!(chunks[0].chunk_end, 4096);
        assert_eq!(chunks[0].data_start, HEADER_SIZE);
        assert!(chunks[0].free);
        assert_eq!(chunks[0].wanted_align, 0);
    }

    #[test]
    fn test_carve_splits_large_chunk() {
        let mut list = ChunkList::new(4096);

        let carved = list.carve(64, 16).unwrap();
        assert_eq!(carved.at, 0);
        assert!(carved.remainder.is_some());
        assert_eq!(list.addr(carved.data_start) % 16, 0);

        let chunks = list.snapshot();
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].free);
        assert!(chunks[1].free);
        assert_eq!(chunks[0].chunk_end, chunks[1].chunk_start);
        assert_eq!(chunks[1].chunk_end, 4096);
    }

    #[test]
    fn test_carve_without_split_takes_whole_chunk() {
        let mut list = ChunkList::new(4096);
        let room = 4096 - HEADER_SIZE;

        let carved = list.carve(room - 1, 1).unwrap();
        assert!(carved.remainder.is_none());

        let chunks = list.snapshot();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_end, 4096);
        assert!(!chunks[0].free);
        assert!(list.carve(1, 1).is_none());
    }

    #[test]
    fn test_carve_honours_large_alignment() {
        let mut list = ChunkList::new(8192);

        let carved = list.carve(10, 256).unwrap();
        assert_eq!(list.addr(carved.data_start) % 256, 0);
        assert!(carved.data_start >= HEADER_SIZE);

        let carved = list.carve(10, 24).unwrap();
        assert_eq!(list.addr(carved.data_start) % 24, 0);
    }

    #[test]
    fn test_find_owner_matches_data_room_only() {
        let mut list = ChunkList::new(4096);
        let carved = list.carve(32, 16).unwrap();

        let data = list.ptr_at(carved.data_start).as_ptr();
        assert_eq!(list.find_owner(data).map(|(at, _)| at), Some(carved.at));

        let inner = list.ptr_at(carved.data_start + 31).as_ptr();
        assert_eq!(list.find_owner(inner).map(|(at, _)| at), Some(carved.at));

        let header = list.ptr_at(carved.at).as_ptr();
        assert!(list.find_owner(header).is_none());

        let remainder = carved.remainder.unwrap();
        let free_data = list.ptr_at(list.read(remainder).data_start).as_ptr();
        assert!(list.find_owner(free_data).is_none());

        let outside = 0x10usize as *const u8;
        assert!(list.find_owner(outside).is_none());
    }

    #[test]
    fn test_release_and_merge_restores_single_chunk() {
        let mut list = ChunkList::new(4096);
        let a = list.carve(64, 16).unwrap();
        let b = list.carve(64, 16).unwrap();
        let c = list.carve(64, 16).unwrap();
        assert_eq!(list.snapshot().len(), 4);

        list.release(b.at);
        assert_eq!(list.merge_free_chunks(false), 0);
        assert_eq!(free_count(&list), 2);

        list.release(a.at);
        assert_eq!(list.merge_free_chunks(false), 1);
        assert_eq!(list.snapshot().len(), 3);

        list.release(c.at);
        assert_eq!(list.merge_free_chunks(true), 2);

        let chunks = list.snapshot();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_end, 4096);
        assert_eq!(chunks[0].data_start, HEADER_SIZE);
    }

    #[test]
    fn test_merge_relinks_prev_of_survivor() {
        let mut list = ChunkList::new(4096);
        let a = list.carve(64, 16).unwrap();
        let b = list.carve(64, 16).unwrap();
        let c = list.carve(64, 16).unwrap();

        list.release(a.at);
        list.release(b.at);
        list.merge_free_chunks(false);

        let hdr_c = list.read(c.at);
        assert_eq!(hdr_c.prev, Some(a.at));
        assert_eq!(list.read(a.at).next, Some(c.at));
    }

    #[test]
    fn test_zeroed_absorbed_header() {
        let mut list = ChunkList::new(4096);
        let a = list.carve(64, 16).unwrap();
        let b = list.carve(64, 16).unwrap();

        list.release(b.at);
        list.release(a.at);
        list.merge_free_chunks(true);

        let mut bytes = [0xAAu8; HEADER_SIZE];
        // SAFETY: b's old header lies in the buffer.
        unsafe {
            ptr::copy_nonoverlapping(list.ptr_at(b.at).as_ptr(), bytes.as_mut_ptr(), HEADER_SIZE);
        }
        assert!(bytes.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_scrub_changes_contents() {
        let mut list = ChunkList::new(4096);
        let a = list.carve(256, 16).unwrap();
        // SAFETY: the carved region is 256 bytes long.
        unsafe {
            ptr::write_bytes(list.ptr_at(a.data_start).as_ptr(), 0x5A, 256);
        }

        let hdr = list.release(a.at);
        list.scrub(&hdr);

        // SAFETY: the data room lies in the buffer.
        let room = unsafe {
            std::slice::from_raw_parts(list.ptr_at(hdr.data_start).as_ptr(), 256)
        };
        assert!(room.iter().any(|&byte| byte != 0x5A));
    }

    #[test]
    fn test_dump_lists_every_header() {
        let mut list = ChunkList::new(4096);
        list.carve(64, 16).unwrap();

        let mut out = Vec::new();
        list.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("header #0"));
        assert!(text.contains("header #1"));
        assert!(!text.contains("header #2"));
        assert!(text.contains("wanted_align 16"));
    }
}
