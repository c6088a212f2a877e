//! Cut-year generation for rolling-origin evaluation.
//!
//! Produces the expanding-window schedule: every cut year trains on all
//! history up to and including the cut, and tests on a fixed span of years
//! that starts a few years after it.

use serde::{Deserialize, Serialize};

/// A single rolling-origin window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalWindow {
    /// Window number (1-indexed, used to name output files).
    pub index: usize,
    /// Last year included in the training set.
    pub cut_year: i32,
    /// First test year.
    pub test_start: i32,
    /// Last test year (inclusive).
    pub test_end: i32,
}

impl TemporalWindow {
    /// Whether a row observed in `year` belongs to the training set.
    pub fn in_train(&self, year: i32) -> bool {
        year <= self.cut_year
    }

    /// Whether a row observed in `year` belongs to the test set.
    pub fn in_test(&self, year: i32) -> bool {
        year >= self.test_start && year <= self.test_end
    }

    /// All test years in ascending order.
    pub fn test_years(&self) -> Vec<i32> {
        (self.test_start..=self.test_end).collect()
    }
}

/// Retraining cadence and forward gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// Advance the cut year by this many years.
    pub step_years: i32,
    /// Years between the cut and the first test year.
    pub gap_years: i32,
    /// Number of consecutive test years.
    pub test_span_years: i32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            step_years: 2,
            gap_years: 3,
            test_span_years: 2,
        }
    }
}

impl WindowPolicy {
    /// Offset from the cut year to the last test year.
    fn horizon(&self) -> i32 {
        self.gap_years + self.test_span_years - 1
    }
}

/// Temporal domain of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub policy: WindowPolicy,
}

impl SplitSpec {
    /// Create a split spec with the default biennial policy.
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            policy: WindowPolicy::default(),
        }
    }

    /// Override the window policy.
    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// First cut year (one year of history is always required).
    pub fn first_cut(&self) -> i32 {
        self.start_year + 1
    }

    /// Last admissible cut year; its test span ends exactly at `end_year`.
    pub fn last_cut(&self) -> i32 {
        self.end_year - self.policy.horizon()
    }

    /// Lazily enumerate the windows in increasing cut-year order.
    ///
    /// Empty when the domain is too short for a single window.
    pub fn windows(&self) -> Windows {
        Windows {
            next_cut: self.first_cut(),
            last_cut: self.last_cut(),
            policy: self.policy,
            index: 1,
        }
    }

    /// Number of windows `windows()` will produce.
    pub fn expected_windows(&self) -> usize {
        let first = self.first_cut();
        let last = self.last_cut();
        if last < first || self.policy.step_years <= 0 {
            return 0;
        }
        ((last - first) / self.policy.step_years + 1) as usize
    }
}

/// Iterator over the rolling-origin windows of a [`SplitSpec`].
#[derive(Debug, Clone)]
pub struct Windows {
    next_cut: i32,
    last_cut: i32,
    policy: WindowPolicy,
    index: usize,
}

impl Iterator for Windows {
    type Item = TemporalWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_cut > self.last_cut || self.policy.step_years <= 0 {
            return None;
        }

        let cut_year = self.next_cut;
        let test_start = cut_year + self.policy.gap_years;
        let window = TemporalWindow {
            index: self.index,
            cut_year,
            test_start,
            test_end: test_start + self.policy.test_span_years - 1,
        };

        self.next_cut += self.policy.step_years;
        self.index += 1;
        Some(window)
    }
}
