//! The region algebra the dependency engine builds all of its reasoning on
//! top of: a half-open byte interval `[start, start + len)` over a flat
//! address space, plus the handful of set operations registration, linking
//! and propagation need (containment, intersection, contiguous union,
//! subtraction).
//!
//! This crate intentionally knows nothing about tasks, accesses, or locks —
//! it is the ground truth that [`region-map`](../region_map/index.html) and
//! `depgraph` are built on, and is kept separate so it can be tested (and
//! read) in isolation.

#![forbid(unsafe_code)]

use core::cmp;
use core::fmt;

/// A half-open byte interval `[start, start + len)`.
///
/// `Region` is `Copy`: regions are small, immutable values that get passed
/// around and split constantly during fragmentation, so there is no benefit
/// to indirection.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    start: usize,
    len: usize,
}

impl Region {
    /// The empty region, `[0, 0)`. [`Region::empty`] is true for this value
    /// and for no other.
    pub const EMPTY: Region = Region { start: 0, len: 0 };

    /// Creates the region `[start, start + len)`.
    #[must_use]
    pub const fn new(start: usize, len: usize) -> Self {
        Region { start, len }
    }

    /// Creates the region `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `end < start`.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        assert!(end >= start, "region end {end} precedes start {start}");
        Region {
            start,
            len: end - start,
        }
    }

    #[must_use]
    pub const fn start(self) -> usize {
        self.start
    }

    /// The first address past the end of the region.
    #[must_use]
    pub const fn end(self) -> usize {
        self.start + self.len
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// A region is empty iff its length is zero; the start address of an
    /// empty region is not meaningful.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn contains_addr(self, addr: usize) -> bool {
        !self.is_empty() && addr >= self.start && addr < self.end()
    }

    /// Whether `self` is fully contained in `other`, i.e. `other ∩ self ==
    /// self`. The empty region is contained in every region, including
    /// itself.
    #[must_use]
    pub fn fully_contained_in(self, other: Region) -> bool {
        self.is_empty() || (self.start >= other.start && self.end() <= other.end())
    }

    #[must_use]
    pub fn intersects(self, other: Region) -> bool {
        !self.intersection(other).is_empty()
    }

    /// The overlap between `self` and `other`. Returns [`Region::EMPTY`] if
    /// they don't overlap.
    #[must_use]
    pub fn intersection(self, other: Region) -> Region {
        if self.is_empty() || other.is_empty() {
            return Region::EMPTY;
        }
        let start = cmp::max(self.start, other.start);
        let end = cmp::min(self.end(), other.end());
        if end <= start {
            Region::EMPTY
        } else {
            Region::from_bounds(start, end)
        }
    }

    /// Two regions are contiguous if their union is itself a single
    /// interval, i.e. they overlap or abut with no gap between them. The
    /// empty region is not contiguous with anything (including itself).
    #[must_use]
    pub fn contiguous(self, other: Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.start <= other.end() && other.start <= self.end()
    }

    /// The union of two contiguous regions.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if the two regions are not
    /// [`contiguous`](Region::contiguous).
    #[must_use]
    pub fn contiguous_union(self, other: Region) -> Region {
        debug_assert!(
            self.contiguous(other),
            "contiguous_union of non-contiguous regions {self:?} and {other:?}"
        );
        Region::from_bounds(
            cmp::min(self.start, other.start),
            cmp::max(self.end(), other.end()),
        )
    }

    /// Splits `self` into the parts that lie before and after `cut`.
    ///
    /// Either half may be [`Region::empty`] (e.g. if `cut` fully contains
    /// `self`, both are empty; if `cut` doesn't overlap `self` at all, one
    /// half equals `self` and the other is empty).
    #[must_use]
    pub fn subtract(self, cut: Region) -> (Region, Region) {
        let overlap = self.intersection(cut);
        if overlap.is_empty() {
            return (self, Region::EMPTY);
        }
        let before = if self.start < overlap.start {
            Region::from_bounds(self.start, overlap.start)
        } else {
            Region::EMPTY
        };
        let after = if self.end() > overlap.end() {
            Region::from_bounds(overlap.end(), self.end())
        } else {
            Region::EMPTY
        };
        (before, after)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Region(empty)")
        } else {
            write!(f, "Region[{:#x}, {:#x})", self.start, self.end())
        }
    }
}
