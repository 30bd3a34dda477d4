//! Delay aggregation engine.
//!
//! Takes the normalized, delay-flagged flight set and produces the six
//! analytical views of the report, each with its own fallback policy for
//! sparse data. Views degrade to an empty result with a reason; they
//! never abort the run.

pub mod aggregate;
pub mod rank;
pub mod types;
pub mod utility;
