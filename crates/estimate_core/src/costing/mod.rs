//! Activity-based cost derivation.
//!
//! # Responsibility
//! - Select the cost fields of an imported row.
//! - Split a line's cost into labor/material/equipment for one activity.
//!
//! # Invariants
//! - Both steps are pure and deterministic; no I/O, no logging.

mod calculator;
mod extract;

pub use calculator::calculate_costs;
pub use extract::extract_cost_components;
