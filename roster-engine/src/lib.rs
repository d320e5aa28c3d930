//! Workforce rostering engine.
//!
//! The pipeline is a strict left-to-right dataflow over a single request:
//! validate, preprocess (minimum-headcount pattern matching and employee
//! selection), expand demand into slots, build the 0/1 decision model,
//! apply the constraint catalogue, search, and annotate the output with
//! per-shift hour breakdowns.
//!
//! Everything here is pure with respect to its inputs: no state is carried
//! across solve runs. HTTP, job queues and persistence live in the service
//! crate.

pub mod calendar;
pub mod constraints;
pub mod domain;
pub mod engine;
pub mod error;
pub mod hours;
pub mod icpmp;
pub mod limits;
pub mod model;
pub mod output;
pub mod scheme;
pub mod slots;
pub mod solver;
pub mod validate;

pub use engine::{solve, solve_empty_slots, solve_incremental};
pub use error::EngineError;
