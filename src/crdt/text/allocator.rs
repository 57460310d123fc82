//! Position Allocator: mints positions between existing neighbours
//!
//! The allocator owns this replica's site id and its local clock. Every
//! position it returns is attributed to this replica, so `(site_id, clock)`
//! pairs never collide across replicas.
//!
//! # Density versus path length
//!
//! Two parameters shape the generated paths:
//!
//! - **base** (default 32): the digit appended when growing rightward, and
//!   the upper bound assumed for a missing digit. A larger base leaves more
//!   room for midpoints before a new level is needed, at the cost of larger
//!   digits.
//! - **boundary** (default 10): the step used when inserting before the
//!   head. A larger step lets many head inserts happen on a single-digit
//!   path, while a step of 1 packs them tightly.
//!
//! Appending at the end always adds one level (`prev.path + [base]`), so a
//! document typed strictly left-to-right grows its paths linearly. Inserts
//! between fixed neighbours halve the gap each time and only add a level
//! once the gap closes, giving logarithmic growth in the number of inserts
//! between those neighbours.

use super::position::Position;
use crate::config::AllocatorConfig;
use crate::SiteId;
use serde::{Deserialize, Serialize};

/// Default branching factor for new path levels
pub const DEFAULT_BASE: i64 = 32;

/// Default step when inserting before the first character
pub const DEFAULT_BOUNDARY: i64 = 10;

/// Monotonic local clock for minting positions
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::LamportClock;
///
/// let mut clock = LamportClock::new();
/// assert_eq!(clock.value(), 0);
/// assert_eq!(clock.tick(), 1);
/// assert_eq!(clock.tick(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Create a new clock starting at 0
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Get the current clock value
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Increment clock and return new value
    pub fn tick(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Move the clock forward to at least `observed`
    pub fn update(&mut self, observed: u64) {
        self.value = self.value.max(observed);
    }
}

/// Generates positions for characters inserted by this replica
#[derive(Debug, Clone)]
pub struct PositionAllocator {
    site_id: SiteId,
    clock: LamportClock,
    base: i64,
    boundary: i64,
}

impl PositionAllocator {
    /// Create an allocator with the default base and boundary
    pub fn new(site_id: SiteId) -> Self {
        Self::with_config(site_id, &AllocatorConfig::default())
    }

    /// Create an allocator with explicit parameters
    pub fn with_config(site_id: SiteId, config: &AllocatorConfig) -> Self {
        Self {
            site_id,
            clock: LamportClock::new(),
            base: config.base,
            boundary: config.boundary,
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Current local clock value
    pub fn clock(&self) -> u64 {
        self.clock.value()
    }

    /// Skip past clock values already used by this site
    pub fn advance_clock(&mut self, observed: u64) {
        self.clock.update(observed);
    }

    /// Generate a position strictly between `prev` and `next`
    ///
    /// Either side may be `None` to denote the open start or end of the
    /// sequence. When both paths are equal (concurrent inserts from two
    /// sites at the same spot) no path can separate them; the result then
    /// sorts after both.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cotext_core::crdt::text::PositionAllocator;
    ///
    /// let mut alloc = PositionAllocator::new("site-a".to_string());
    /// let first = alloc.generate_between(None, None);
    /// let last = alloc.generate_between(Some(&first), None);
    /// let mid = alloc.generate_between(Some(&first), Some(&last));
    ///
    /// assert!(first < mid && mid < last);
    /// ```
    pub fn generate_between(&mut self, prev: Option<&Position>, next: Option<&Position>) -> Position {
        let path = match (prev, next) {
            (None, None) => vec![self.base],
            (None, Some(next)) => self.path_before(&next.path),
            (Some(prev), None) => self.path_after(&prev.path),
            (Some(prev), Some(next)) => self.path_between(&prev.path, &next.path),
        };

        Position::new(path, self.site_id.clone(), self.clock.tick())
    }

    fn path_before(&self, next: &[i64]) -> Vec<i64> {
        let mut path = next.to_vec();
        match path.first_mut() {
            Some(head) if *head > self.boundary => *head -= self.boundary,
            Some(head) => *head = head.saturating_sub(1),
            None => path.push(self.base),
        }
        path
    }

    fn path_after(&self, prev: &[i64]) -> Vec<i64> {
        let mut path = prev.to_vec();
        path.push(self.base);
        path
    }

    /// Walk the shared prefix, then split the first gap wide enough
    ///
    /// `upper` becomes `None` once the new path has dropped strictly below
    /// `next`; from then on only `prev` constrains the remaining digits and a
    /// missing upper digit is treated as `base`.
    fn path_between(&self, prev: &[i64], next: &[i64]) -> Vec<i64> {
        if prev >= next {
            // Identical paths: nothing fits between, sort after both.
            return self.path_after(prev);
        }

        let mut path = Vec::with_capacity(prev.len().max(next.len()) + 1);
        let mut upper = Some(next);
        let mut depth = 0;

        loop {
            let lo = prev.get(depth).copied();
            let hi = match upper {
                Some(next) => next.get(depth).copied(),
                None => None,
            };

            match (lo, hi, upper.is_some()) {
                // Shared prefix digit
                (Some(a), Some(b), true) if a == b => path.push(a),

                // Digits diverge below `next`
                (Some(a), Some(b), true) => {
                    if let Some(mid) = split(a, b) {
                        path.push(mid);
                        return path;
                    }
                    path.push(a);
                    upper = None;
                }

                // `prev` is a prefix of `next`: anything below `b` here is
                // longer than `prev` and shorter than `next`.
                (None, Some(b), true) => {
                    path.push(if b > 1 { b / 2 } else { b.saturating_sub(1) });
                    return path;
                }

                // Only `prev` still constrains the path
                (Some(a), _, _) => {
                    if let Some(mid) = split(a, self.base) {
                        path.push(mid);
                        return path;
                    }
                    path.push(a);
                }

                // Past the end of `prev` with no upper bound left
                (None, _, _) => {
                    path.push(self.base / 2);
                    return path;
                }
            }

            depth += 1;
        }
    }
}

/// A digit strictly between `a` and `b`, if the gap leaves room for one
///
/// Computed in `i128` so digits from remote paths cannot overflow.
fn split(a: i64, b: i64) -> Option<i64> {
    let gap = i128::from(b) - i128::from(a);
    // Lies between two i64 values, so the cast is lossless
    (gap > 1).then(|| (i128::from(a) + gap / 2) as i64)
}
