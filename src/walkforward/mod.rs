//! Rolling-origin (walk-forward) splitting.
//!
//! Expanding-window schedule with a forward gap:
//! - Train: every year up to and including the cut year
//! - Test: two consecutive years starting three years after the cut
//! - Roll: every two years

pub mod periods;
pub mod splitter;

pub use periods::{SplitSpec, TemporalWindow, WindowPolicy, Windows};
pub use splitter::{split, TemporalSplitter};
