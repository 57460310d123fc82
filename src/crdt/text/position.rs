//! Position: Fractional identifier with total ordering
//!
//! Every character carries a `Position` assigned once by the replica that
//! inserted it. Positions are compared instead of array indices, so
//! concurrent inserts never need renumbering.

use crate::SiteId;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

/// Largest digit magnitude accepted when decoding a position
///
/// The safe-integer range of JavaScript numbers, which is what browser
/// peers can represent exactly.
pub const MAX_DIGIT: i64 = (1 << 53) - 1;

/// Immutable, totally-ordered position of a character
///
/// A position consists of three components:
///
/// 1. **path**: Fractional digits locating the character in the sequence
/// 2. **site_id**: Replica that minted the position (tiebreaker)
/// 3. **clock**: Local clock of that replica at minting time (tiebreaker)
///
/// # Ordering
///
/// Positions are ordered by:
/// 1. Path, lexicographically digit by digit; when one path is a proper
///    prefix of the other, the shorter path comes first
/// 2. Site ID (lexicographic)
/// 3. Clock (numeric)
///
/// A replica only ever mints positions with its own site id and a fresh
/// clock value, so two distinct characters never compare equal even when
/// concurrent inserts at different sites produce identical paths. Two
/// replicas sharing a site id can mint equal positions; the character store
/// orders those by character id.
///
/// Decoding rejects empty paths and digits beyond [`MAX_DIGIT`].
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::Position;
///
/// let a = Position::new(vec![16], "site-a".to_string(), 1);
/// let b = Position::new(vec![16, 8], "site-a".to_string(), 2);
/// let c = Position::new(vec![16], "site-b".to_string(), 1);
///
/// // Prefix sorts first
/// assert!(a < b);
///
/// // Equal paths fall back to site id
/// assert!(a < c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Fractional digits; digits may be negative after repeated head inserts
    #[serde(alias = "index", deserialize_with = "deserialize_path")]
    pub path: Vec<i64>,

    /// Replica that minted this position
    pub site_id: SiteId,

    /// Minting replica's clock value
    pub clock: u64,
}

impl Position {
    /// Create a new position
    pub fn new(path: Vec<i64>, site_id: SiteId, clock: u64) -> Self {
        Self {
            path,
            site_id,
            clock,
        }
    }

    /// Number of digits in the path
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

fn deserialize_path<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let path = Vec::<i64>::deserialize(deserializer)?;
    if path.is_empty() {
        return Err(D::Error::custom("position path is empty"));
    }
    if let Some(digit) = path.iter().find(|d| d.unsigned_abs() > MAX_DIGIT as u64) {
        return Err(D::Error::custom(format!(
            "position digit {} exceeds magnitude {}",
            digit, MAX_DIGIT
        )));
    }
    Ok(path)
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        // `Vec` ordering is lexicographic with prefix-first, which is exactly
        // the path order.
        match self.path.cmp(&other.path) {
            Ordering::Equal => match self.site_id.cmp(&other.site_id) {
                Ordering::Equal => self.clock.cmp(&other.clock),
                other => other,
            },
            other => other,
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits: Vec<String> = self.path.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]@{}:{}", digits.join("."), self.site_id, self.clock)
    }
}
