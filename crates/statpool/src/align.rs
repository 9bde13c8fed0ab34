//! Address alignment arithmetic.
//!
//! Power-of-two alignments take the mask path:
//!
//! ```text
//!   aligned = (addr + align - 1) & !(align - 1)
//! ```
//!
//! Any other positive alignment lands on the address a forward byte scan
//! would find, computed from the remainder in constant time. The result
//! never lies below the input address.

use std::mem;

/// The platform's maximum scalar alignment.
///
/// Chunk headers are placed on this boundary, and it is the default
/// alignment handed to callers who do not ask for one.
pub const HEADER_ALIGN: usize = max_scalar_align();

const fn max_scalar_align() -> usize {
    let candidates = [
        mem::align_of::<u128>(),
        mem::align_of::<f64>(),
        mem::align_of::<u64>(),
        mem::align_of::<usize>(),
    ];
    let mut max = 1;
    let mut i = 0;
    while i < candidates.len() {
        if candidates[i] > max {
            max = candidates[i];
        }
        i += 1;
    }
    max
}

/// An address rounded up to an alignment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aligned {
    /// The smallest multiple of the alignment that is `>=` the input.
    pub addr: usize,
    /// `addr - input`.
    pub offset: usize,
}

/// Returns whether `addr` is a multiple of `alignment`.
///
/// `alignment` must be non-zero.
#[inline]
#[must_use]
pub const fn is_aligned(addr: usize, alignment: usize) -> bool {
    addr % alignment == 0
}

/// Rounds `addr` up to the next multiple of `alignment`.
///
/// Returns `None` if `alignment` is zero or the rounded address would not
/// fit in `usize`.
///
/// # Examples
///
/// ```
/// use statpool::align::align;
///
/// let a = align(13, 8).unwrap();
/// assert_eq!((a.addr, a.offset), (16, 3));
///
/// let b = align(13, 12).unwrap();
/// assert_eq!((b.addr, b.offset), (24, 11));
///
/// assert!(align(7, 0).is_none());
/// ```
#[inline]
#[must_use]
pub fn align(addr: usize, alignment: usize) -> Option<Aligned> {
    if alignment == 0 {
        return None;
    }

    if alignment.is_power_of_two() {
        let mask = alignment - 1;
        let aligned = addr.checked_add(mask)? & !mask;
        debug_assert!(aligned >= addr);
        return Some(Aligned {
            addr: aligned,
            offset: aligned - addr,
        });
    }

    let aligned = addr.checked_next_multiple_of(alignment)?;
    Some(Aligned {
        addr: aligned,
        offset: aligned - addr,
    })
}

/// Rounds `addr` up to [`HEADER_ALIGN`].
#[inline]
#[must_use]
pub fn header_align(addr: usize) -> Option<Aligned> {
    align(addr, HEADER_ALIGN)
}
