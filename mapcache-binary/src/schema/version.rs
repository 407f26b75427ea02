//! Version ranges for version-dependent record layouts

use crate::error::{BinaryError, Result};
use std::fmt;

/// Half-open version interval `[min, max)`.
///
/// A missing bound is open. `min == max` selects exactly that version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    min: Option<i32>,
    max: Option<i32>,
}

impl VersionRange {
    /// Matches every version, including no version at all
    pub const ANY: Self = Self {
        min: None,
        max: None,
    };

    pub const fn new(min: Option<i32>, max: Option<i32>) -> Self {
        Self { min, max }
    }

    /// `[min, ∞)`
    pub const fn from(min: i32) -> Self {
        Self::new(Some(min), None)
    }

    /// `(-∞, max)`
    pub const fn until(max: i32) -> Self {
        Self::new(None, Some(max))
    }

    /// `[min, max)`
    pub const fn between(min: i32, max: i32) -> Self {
        Self::new(Some(min), Some(max))
    }

    /// Exactly `version`
    pub const fn exactly(version: i32) -> Self {
        Self::new(Some(version), Some(version))
    }

    pub fn min(&self) -> Option<i32> {
        self.min
    }

    pub fn max(&self) -> Option<i32> {
        self.max
    }

    /// Neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Check whether `version` falls in this range.
    ///
    /// Without a version only an unbounded range matches.
    pub fn contains(&self, version: Option<i32>) -> bool {
        let lower = match self.min {
            None => true,
            Some(min) => version.is_some_and(|v| v >= min),
        };
        let upper = match self.max {
            None => true,
            Some(max) if self.min == Some(max) => version.is_some_and(|v| v <= max),
            Some(max) => version.is_some_and(|v| v < max),
        };
        lower && upper
    }

    /// Inclusive lower and exclusive upper bound as wide integers
    fn bounds(&self) -> (i64, i64) {
        let lo = self.min.map_or(i64::MIN, i64::from);
        let hi = match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => i64::from(max) + 1,
            (_, Some(max)) => i64::from(max),
            (_, None) => i64::MAX,
        };
        (lo, hi)
    }

    pub fn overlaps(&self, other: &VersionRange) -> bool {
        let (a_lo, a_hi) = self.bounds();
        let (b_lo, b_hi) = other.bounds();
        a_lo < b_hi && b_lo < a_hi
    }

    fn is_empty(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => f.write_str("any"),
            (Some(min), Some(max)) if min == max => write!(f, "={}", min),
            (min, max) => {
                match min {
                    Some(min) => write!(f, "[{}, ", min)?,
                    None => f.write_str("(.., ")?,
                }
                match max {
                    Some(max) => write!(f, "{})", max),
                    None => f.write_str("..)"),
                }
            }
        }
    }
}

/// Version-ranged values, such as the offset candidates of a field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Versioned<V> {
    candidates: Vec<(VersionRange, V)>,
}

impl<V: Copy> Versioned<V> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    pub fn push(&mut self, range: VersionRange, value: V) {
        self.candidates.push((range, value));
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VersionRange, V)> {
        self.candidates.iter()
    }

    /// Every candidate is version-bounded
    pub fn is_conditional(&self) -> bool {
        self.candidates.iter().all(|(range, _)| !range.is_unbounded())
    }

    /// Reject empty and pairwise overlapping ranges
    pub fn validate(&self, owner: &str) -> Result<()> {
        for (i, (range, _)) in self.candidates.iter().enumerate() {
            if range.is_empty() {
                return Err(BinaryError::configuration(format!(
                    "{}: empty version range {}",
                    owner, range
                )));
            }
            for (other, _) in &self.candidates[i + 1..] {
                if range.overlaps(other) {
                    return Err(BinaryError::configuration(format!(
                        "{}: version ranges {} and {} overlap",
                        owner, range, other
                    )));
                }
            }
        }
        Ok(())
    }

    /// The value whose range contains `version`
    pub fn resolve(&self, version: Option<i32>) -> Option<V> {
        self.candidates
            .iter()
            .find(|(range, _)| range.contains(version))
            .map(|(_, value)| *value)
    }
}
