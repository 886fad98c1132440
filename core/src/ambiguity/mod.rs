//! Static pre-execution ambiguity classification.
//!
//! A whole plan is scanned before any task runs; detection is limited to a
//! fixed allow-list of operations known to be disambiguation-sensitive.
//! Everything else is never flagged.

mod detector;
mod types;

pub use detector::AmbiguityDetector;
pub use types::{AmbiguityInfo, AmbiguityKind, AmbiguityResult};
