//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate costing, numbering and repository calls into
//!   reconciliation use-cases.
//! - Keep host/transport layers decoupled from storage details.

pub mod reconciliation_service;
