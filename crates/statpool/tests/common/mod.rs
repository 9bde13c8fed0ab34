// Shared helpers for the pool integration tests.
//
// `assert_chain_invariants` checks the structural guarantees of a pool's
// chunk chain; the byte helpers write and verify fill patterns in live
// allocations.

#![allow(dead_code)]

use statpool::header::HEADER_SIZE;
use statpool::{ChunkInfo, StaticMemPool};
use std::ptr::NonNull;

/// A live allocation as seen by a test.
#[derive(Debug, Clone, Copy)]
pub struct Live {
    pub ptr: NonNull<u8>,
    pub size: usize,
    pub alignment: usize,
    pub tag: u8,
}

impl Live {
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.ptr.as_ptr() as usize;
        start..start + self.size
    }
}

/// Checks tiling, contiguity, header placement and coalescing of a chain.
pub fn assert_chain_invariants(chunks: &[ChunkInfo], capacity: usize) {
    assert!(!chunks.is_empty(), "chain must never be empty");
    assert_eq!(chunks[0].chunk_start, 0, "first chunk starts the pool");
    assert_eq!(
        chunks.last().unwrap().chunk_end,
        capacity,
        "last chunk ends the pool"
    );

    for pair in chunks.windows(2) {
        assert_eq!(
            pair[0].chunk_end, pair[1].chunk_start,
            "chunks must be contiguous: {pair:?}"
        );
        assert!(
            !(pair[0].free && pair[1].free),
            "adjacent free chunks left unmerged: {pair:?}"
        );
    }

    for chunk in chunks {
        assert!(chunk.chunk_end > chunk.chunk_start);
        assert!(chunk.header >= chunk.chunk_start);
        assert!(chunk.data_start >= chunk.chunk_start + HEADER_SIZE);
        assert!(chunk.data_start >= chunk.header + HEADER_SIZE);
        assert!(chunk.data_start <= chunk.chunk_end);
        if chunk.free {
            assert_eq!(chunk.wanted_align, 0);
            assert_eq!(chunk.data_start, chunk.header + HEADER_SIZE);
        } else {
            assert_ne!(chunk.wanted_align, 0);
        }
    }
}

/// Checks a pool's chain against [`assert_chain_invariants`].
pub fn assert_pool_invariants<const SIZE: usize>(pool: &StaticMemPool<SIZE>) {
    assert_chain_invariants(&pool.chunks(), SIZE);
}

/// Checks that no two live allocations overlap.
pub fn assert_disjoint(live: &[Live]) {
    let mut ranges: Vec<_> = live.iter().map(Live::range).collect();
    ranges.sort_by_key(|r| r.start);
    for pair in ranges.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "overlapping allocations: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Fills `size` bytes at `ptr` with a pattern derived from `tag`.
pub fn write_pattern(ptr: NonNull<u8>, size: usize, tag: u8) {
    for i in 0..size {
        // SAFETY: callers pass a live allocation of at least `size` bytes.
        unsafe { ptr.as_ptr().add(i).write(pattern_byte(tag, i)) };
    }
}

/// Whether the `size` bytes at `ptr` still hold the pattern for `tag`.
pub fn pattern_intact(ptr: NonNull<u8>, size: usize, tag: u8) -> bool {
    // SAFETY: callers pass a live allocation of at least `size` bytes.
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };
    bytes
        .iter()
        .enumerate()
        .all(|(i, &byte)| byte == pattern_byte(tag, i))
}

fn pattern_byte(tag: u8, i: usize) -> u8 {
    tag.wrapping_mul(31).wrapping_add(i as u8)
}
