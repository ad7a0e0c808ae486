//! Range-scoped scripts
//!
//! ## Table of Contents
//! - **ScriptRange**: A script bound to a half-open `[min, max)` band
//! - **ScriptRangeList**: Ranges in registration order, with selection
//!
//! Registration performs no validation. Ranges may overlap or leave gaps;
//! selection returns every band containing the value, in registration
//! order, so overlapping scripts compose (a fade band over a detail band).

use crate::script::ScriptRef;

/// A script applied while the operating value is within `[min_range, max_range)`
#[derive(Debug, Clone)]
pub struct ScriptRange {
    /// Inclusive lower bound
    pub min_range: f64,
    /// Exclusive upper bound
    pub max_range: f64,
    /// Script to apply
    pub script: ScriptRef,
}

impl ScriptRange {
    /// Create a new range
    pub fn new(min_range: f64, max_range: f64, script: ScriptRef) -> Self {
        Self {
            min_range,
            max_range,
            script,
        }
    }

    /// `min <= value < max`; NaN never matches
    pub fn contains(&self, value: f64) -> bool {
        self.min_range <= value && value < self.max_range
    }
}

/// Script ranges in registration order
#[derive(Debug, Clone, Default)]
pub struct ScriptRangeList {
    ranges: Vec<ScriptRange>,
}

impl ScriptRangeList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a range
    pub fn push(&mut self, range: ScriptRange) {
        self.ranges.push(range);
    }

    /// Every range containing `value`, in registration order
    pub fn matching(&self, value: f64) -> impl Iterator<Item = &ScriptRange> {
        self.ranges.iter().filter(move |r| r.contains(value))
    }

    /// Scripts for `value`, in the order they are to be applied
    pub fn select(&self, value: f64) -> Vec<ScriptRef> {
        self.matching(value).map(|r| r.script.clone()).collect()
    }

    /// All ranges
    pub fn iter(&self) -> std::slice::Iter<'_, ScriptRange> {
        self.ranges.iter()
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if no ranges are registered
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Remove all ranges
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl<'a> IntoIterator for &'a ScriptRangeList {
    type Item = &'a ScriptRange;
    type IntoIter = std::slice::Iter<'a, ScriptRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
