//! Scope-of-work line items and their reconciliation entries.
//!
//! # Responsibility
//! - Define the parent SOW line and the reconciliation/change-order records
//!   that extend it.
//! - Validate user-supplied fields before they reach persistence.
//!
//! # Invariants
//! - `line_no` is 1-based and stable within one estimate version.
//! - `co_sequence_no` is assigned once and never rewritten; reverting a
//!   change order only clears `is_change_order`.
//! - Change-order display codes are derived, never stored.

use crate::model::activity::Activity;
use crate::model::cost::{CalculatedCosts, CostComponents};
use crate::model::money::Cents;
use crate::numbering::format_co_line_number;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a SOW line item.
pub type SowItemId = Uuid;

/// Stable identifier of a reconciliation entry.
pub type EntryId = Uuid;

/// Validation errors for line item input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemValidationError {
    /// Line numbers start at 1.
    ZeroLineNo,
    /// Description is present but blank after trim.
    BlankDescription,
    /// A cost field holds a negative amount.
    NegativeComponent { field: &'static str, value: Cents },
    /// A cost field exceeds `MAX_COMPONENT_CENTS`.
    ComponentTooLarge { field: &'static str, value: Cents },
}

impl Display for LineItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroLineNo => write!(f, "line_no must be at least 1"),
            Self::BlankDescription => write!(f, "description must not be blank"),
            Self::NegativeComponent { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::ComponentTooLarge { field, value } => {
                write!(f, "{field} exceeds the accepted maximum, got {value}")
            }
        }
    }
}

impl Error for LineItemValidationError {}

/// One priced line of an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SowItem {
    pub id: SowItemId,
    pub line_no: u32,
    pub description: String,
    pub activity: Activity,
    pub components: CostComponents,
}

impl SowItem {
    /// Creates a line item with a generated stable ID.
    pub fn new(
        line_no: u32,
        description: impl Into<String>,
        activity: Activity,
        components: CostComponents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_no,
            description: description.into(),
            activity,
            components,
        }
    }

    pub fn validate(&self) -> Result<(), LineItemValidationError> {
        if self.line_no == 0 {
            return Err(LineItemValidationError::ZeroLineNo);
        }
        if self.description.trim().is_empty() {
            return Err(LineItemValidationError::BlankDescription);
        }
        self.components.validate()
    }
}

/// Direction of a reconciliation entry's amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Additional cost owed.
    Add,
    /// Cost returned; totals are reported negative.
    Credit,
    /// Annotation without an amount.
    NoteOnly,
}

impl EntryKind {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Credit => "credit",
            Self::NoteOnly => "note_only",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<EntryKind> {
        match value {
            "add" => Some(Self::Add),
            "credit" => Some(Self::Credit),
            "note_only" => Some(Self::NoteOnly),
            _ => None,
        }
    }
}

/// Persisted reconciliation entry under one SOW line.
///
/// Standalone change orders are entries with `is_change_order == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationEntry {
    pub id: EntryId,
    /// Parent SOW line this entry extends.
    pub sow_item_id: SowItemId,
    pub kind: EntryKind,
    pub description: Option<String>,
    pub note: Option<String>,
    pub activity: Activity,
    pub costs: CalculatedCosts,
    pub is_change_order: bool,
    /// 1-based, unique among entries of the same parent once assigned.
    pub co_sequence_no: Option<u32>,
    /// Parent `line_no` captured when the change order was numbered.
    pub co_source_line_no: Option<u32>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl ReconciliationEntry {
    /// Human-readable change-order code such as `15-CO2`.
    ///
    /// Returns `None` for entries that are not currently change orders.
    pub fn display_code(&self) -> Option<String> {
        if !self.is_change_order {
            return None;
        }
        Some(format_co_line_number(
            self.co_source_line_no,
            self.co_sequence_no,
        ))
    }

    /// Total with the entry direction applied.
    pub fn signed_total(&self) -> Cents {
        let total = self.costs.total_cost();
        match self.kind {
            EntryKind::Credit => Cents::new(-total.raw()),
            EntryKind::Add => total,
            EntryKind::NoteOnly => Cents::ZERO,
        }
    }
}

/// Entry together with its rendered code, as returned by change-order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOrderLine {
    pub entry: ReconciliationEntry,
    pub display_code: String,
}

/// Validates an optional free-text field: `None` is fine, blank is not.
pub(crate) fn validate_optional_text(value: Option<&str>) -> Result<(), LineItemValidationError> {
    match value {
        Some(text) if text.trim().is_empty() => Err(LineItemValidationError::BlankDescription),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryKind, LineItemValidationError, ReconciliationEntry, SowItem};
    use crate::model::activity::Activity;
    use crate::model::cost::{CalculatedCosts, CostComponents};
    use crate::model::money::Cents;
    use uuid::Uuid;

    fn entry() -> ReconciliationEntry {
        ReconciliationEntry {
            id: Uuid::new_v4(),
            sow_item_id: Uuid::new_v4(),
            kind: EntryKind::Add,
            description: None,
            note: None,
            activity: Activity::Repair,
            costs: CalculatedCosts::from_buckets(Cents::new(100), Cents::new(50), Cents::ZERO),
            is_change_order: true,
            co_sequence_no: Some(2),
            co_source_line_no: Some(15),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn sow_item_rejects_zero_line_no() {
        let item = SowItem::new(0, "Drywall", Activity::Repair, CostComponents::default());
        assert_eq!(item.validate(), Err(LineItemValidationError::ZeroLineNo));
    }

    #[test]
    fn sow_item_rejects_blank_description() {
        let item = SowItem::new(3, "   ", Activity::Repair, CostComponents::default());
        assert_eq!(
            item.validate(),
            Err(LineItemValidationError::BlankDescription)
        );
    }

    #[test]
    fn display_code_only_for_active_change_orders() {
        let mut co = entry();
        assert_eq!(co.display_code().as_deref(), Some("15-CO2"));

        co.is_change_order = false;
        assert_eq!(co.display_code(), None);
    }

    #[test]
    fn credit_entries_report_negative_totals() {
        let mut credit = entry();
        credit.kind = EntryKind::Credit;
        assert_eq!(credit.signed_total(), Cents::new(-150));

        credit.kind = EntryKind::NoteOnly;
        assert_eq!(credit.signed_total(), Cents::ZERO);
    }
}
