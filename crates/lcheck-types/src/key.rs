use serde::{Deserialize, Serialize};

use crate::bytes::Key;
use crate::error::TypeError;

impl Key {
    /// The all-zero key.
    pub const MIN: Key = Key([0u8; 32]);
    /// The all-one key.
    pub const MAX: Key = Key([0xffu8; 32]);

    /// Build a key whose last eight bytes hold `n` big-endian. Handy for
    /// readable fixtures: `Key::from_u64(1)` is `00..01`.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

/// Lower and upper sentinels bounding the key space of one verification run.
///
/// Neither sentinel is ever a state entry: traversal starts at `lower`, and
/// the successor chain ends on `upper`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBounds {
    pub lower: Key,
    pub upper: Key,
}

impl Default for KeyBounds {
    fn default() -> Self {
        Self {
            lower: Key::MIN,
            upper: Key::MAX,
        }
    }
}

impl KeyBounds {
    /// Create bounds, rejecting `lower >= upper`.
    pub fn new(lower: Key, upper: Key) -> Result<Self, TypeError> {
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        if self.lower >= self.upper {
            return Err(TypeError::InvalidBounds {
                lower: self.lower.to_hex(),
                upper: self.upper.to_hex(),
            });
        }
        Ok(())
    }

    /// Returns `true` if `key` is one of the two sentinels.
    pub fn is_sentinel(&self, key: &Key) -> bool {
        *key == self.lower || *key == self.upper
    }

    /// Returns `true` if `key` lies strictly between the sentinels.
    pub fn contains(&self, key: &Key) -> bool {
        *key > self.lower && *key < self.upper
    }

    /// Split the space into `[from, to)` segments at the given cursors.
    ///
    /// Cursors must be sorted, unique and strictly inside the bounds. With
    /// no cursors the whole space is a single segment.
    pub fn segments(&self, cursors: &[Key]) -> Vec<(Key, Key)> {
        debug_assert!(
            cursors.windows(2).all(|w| w[0] < w[1]),
            "cursors must be strictly increasing"
        );
        debug_assert!(
            cursors.iter().all(|c| self.contains(c)),
            "cursors must lie strictly inside the bounds"
        );
        let mut segments = Vec::with_capacity(cursors.len() + 1);
        let mut from = self.lower;
        for cursor in cursors {
            segments.push((from, *cursor));
            from = *cursor;
        }
        segments.push((from, self.upper));
        segments
    }
}
