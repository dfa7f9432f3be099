//! The election engines.
//!
//! Every engine is built from an `Arc<dyn Store>` (and, where it changes
//! anything, an `Arc<dyn AuditSink>`). Each public operation runs as one
//! transaction, re-run from scratch on transient storage conflicts.

mod candidate;
mod election;
mod recommendation;
mod results;
mod vote;

pub use candidate::CandidateDesk;
pub use election::ElectionRegistry;
pub use recommendation::RecommendationEngine;
pub use results::ResultsAggregator;
pub use vote::VoteEngine;

/// Round to 2 decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part` as a percentage of `whole`, or 0 if `whole` is 0.
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}
