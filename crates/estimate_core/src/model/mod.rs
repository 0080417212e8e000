//! Domain model for estimate cost reconciliation.
//!
//! # Responsibility
//! - Define money, activity, and cost value objects.
//! - Define the SOW line and reconciliation entry records.
//!
//! # Invariants
//! - Monetary values are integer cents; no floating point.
//! - Cost totals are derived from their buckets, never assigned.

pub mod activity;
pub mod cost;
pub mod line_item;
pub mod money;
