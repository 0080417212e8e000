//! Estimate reconciliation core.
//!
//! Derives activity-based cost splits for reconciliation entries, numbers
//! standalone change orders under their parent estimate line, and persists
//! both in SQLite.

pub mod config;
pub mod costing;
pub mod db;
pub mod logging;
pub mod model;
pub mod numbering;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ReconcileConfig};
pub use costing::{calculate_costs, extract_cost_components};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_with_config, logging_status, LoggingError,
};
pub use model::activity::{Activity, CostInclusion};
pub use model::cost::{
    CalculatedCosts, CostComponents, CostOverrides, RawCostRow, MAX_COMPONENT_CENTS,
};
pub use model::line_item::{
    ChangeOrderLine, EntryId, EntryKind, LineItemValidationError, ReconciliationEntry, SowItem,
    SowItemId,
};
pub use model::money::Cents;
pub use numbering::{format_co_line_number, next_co_sequence_no, CO_CODE_FALLBACK};
pub use repo::reconciliation_repo::{
    EntryChanges, EntryEvent, EntryEventType, NewEntry, ReconciliationRepository,
    SqliteReconciliationRepository,
};
pub use repo::sow_repo::{SowItemRepository, SqliteSowItemRepository};
pub use repo::{RepoError, RepoResult};
pub use service::reconciliation_service::{
    CompositionStage, ConvertToChangeOrderRequest, EntryRequest, ReconcileError,
    ReconcileResult, ReconciliationService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
