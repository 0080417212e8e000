//! Change-order numbering.
//!
//! # Responsibility
//! - Compute the next change-order sequence number under one parent line.
//! - Render `{line}-CO{seq}` display codes.
//!
//! # Invariants
//! - Pure functions only. Allocation atomicity is owned by the store
//!   (`repo::reconciliation_repo`), which calls these inside a write
//!   transaction.

mod line_number;
mod sequence;

pub use line_number::{format_co_line_number, CO_CODE_FALLBACK};
pub use sequence::next_co_sequence_no;
