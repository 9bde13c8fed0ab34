//! Chunk header record and its byte encoding.
//!
//! Every chunk in the pool starts with a header describing it. Headers are
//! never referenced in place: they are decoded from the pool bytes into a
//! [`ChunkHeader`] value, edited, and encoded back. All positions are byte
//! offsets from the start of the pool buffer.
//!
//! ```text
//!   word  field
//!   ----  ------------
//!   0     chunk_start
//!   1     chunk_end
//!   2     next          (NIL when last)
//!   3     prev          (NIL when first)
//!   4     data_start
//!   5     wanted_align
//!   6     free          (0 or 1)
//!   ...   padding up to HEADER_ALIGN
//! ```

use std::mem;

use crate::align::HEADER_ALIGN;

const WORD: usize = mem::size_of::<usize>();
const FIELDS: usize = 7;
const NIL: usize = usize::MAX;

/// Encoded size of a header, padded to [`HEADER_ALIGN`].
pub const HEADER_SIZE: usize = (FIELDS * WORD).div_ceil(HEADER_ALIGN) * HEADER_ALIGN;

/// Metadata for one chunk of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// First byte of the chunk's extent.
    pub chunk_start: usize,
    /// One past the last byte of the chunk's extent.
    pub chunk_end: usize,
    /// Header offset of the next chunk in address order.
    pub next: Option<usize>,
    /// Header offset of the previous chunk in address order.
    pub prev: Option<usize>,
    /// First byte handed to the caller.
    pub data_start: usize,
    /// Alignment requested for the payload; 0 while free.
    pub wanted_align: usize,
    /// Whether the chunk can be allocated.
    pub free: bool,
}

impl ChunkHeader {
    /// A free chunk spanning `[chunk_start, chunk_end)` whose header sits at
    /// `at`.
    #[must_use]
    pub const fn free(
        at: usize,
        chunk_start: usize,
        chunk_end: usize,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Self {
        Self {
            chunk_start,
            chunk_end,
            next,
            prev,
            data_start: at + HEADER_SIZE,
            wanted_align: 0,
            free: true,
        }
    }

    /// Total extent, header and padding included.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_end - self.chunk_start
    }

    /// Bytes between `data_start` and the end of the chunk.
    #[inline]
    #[must_use]
    pub const fn data_room(&self) -> usize {
        self.chunk_end - self.data_start
    }

    /// Whether `offset` lies inside the caller-visible part of the chunk.
    #[inline]
    #[must_use]
    pub const fn owns(&self, offset: usize) -> bool {
        offset >= self.data_start && offset < self.chunk_end
    }

    /// Serializes the header into its on-pool representation.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let words = [
            self.chunk_start,
            self.chunk_end,
            self.next.unwrap_or(NIL),
            self.prev.unwrap_or(NIL),
            self.data_start,
            self.wanted_align,
            usize::from(self.free),
        ];

        let mut bytes = [0u8; HEADER_SIZE];
        for (slot, word) in bytes.chunks_exact_mut(WORD).zip(words) {
            slot.copy_from_slice(&word.to_ne_bytes());
        }
        bytes
    }

    /// Reconstructs a header from its on-pool representation.
    #[must_use]
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut words = [0usize; FIELDS];
        for (word, slot) in words.iter_mut().zip(bytes.chunks_exact(WORD)) {
            let mut raw = [0u8; WORD];
            raw.copy_from_slice(slot);
            *word = usize::from_ne_bytes(raw);
        }

        let link = |raw: usize| (raw != NIL).then_some(raw);

        Self {
            chunk_start: words[0],
            chunk_end: words[1],
            next: link(words[2]),
            prev: link(words[3]),
            data_start: words[4],
            wanted_align: words[5],
            free: words[6] != 0,
        }
    }
}
