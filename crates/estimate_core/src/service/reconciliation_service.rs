//! Reconciliation entry and change-order use-case service.
//!
//! # Responsibility
//! - Compose extraction, activity costing, sequencing and formatting into
//!   persisted reconciliation entries.
//! - Retry change-order allocation on sequence conflicts.
//! - Flag fallback activities as data-quality warnings.
//!
//! # Invariants
//! - Change-order creation moves through `PendingInput -> Computed ->
//!   Sequenced -> Persisted`; a failure before `Persisted` leaves no row.
//! - Sequence conflicts are retried with a full read-compute-write cycle,
//!   never swallowed.
//! - Input is validated before any cost is computed.

use crate::config::ReconcileConfig;
use crate::costing::{calculate_costs, extract_cost_components};
use crate::model::activity::Activity;
use crate::model::cost::{CalculatedCosts, CostComponents, CostOverrides, RawCostRow};
use crate::model::line_item::{
    validate_optional_text, ChangeOrderLine, EntryId, EntryKind, LineItemValidationError,
    ReconciliationEntry, SowItem, SowItemId,
};
use crate::numbering::format_co_line_number;
use crate::repo::reconciliation_repo::{
    EntryChanges, EntryEvent, NewEntry, ReconciliationRepository,
};
use crate::repo::RepoError;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Progress of one change-order composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompositionStage {
    /// Request received, nothing computed yet.
    PendingInput,
    /// Cost split computed.
    Computed,
    /// Sequence number computed for the sibling snapshot.
    Sequenced,
    /// Row committed.
    Persisted,
}

impl CompositionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingInput => "pending_input",
            Self::Computed => "computed",
            Self::Sequenced => "sequenced",
            Self::Persisted => "persisted",
        }
    }
}

/// Service error for reconciliation use-cases.
#[derive(Debug)]
pub enum ReconcileError {
    /// Input rejected before computation.
    Validation(LineItemValidationError),
    SowItemNotFound(SowItemId),
    EntryNotFound(EntryId),
    AlreadyChangeOrder(EntryId),
    NotChangeOrder(EntryId),
    /// Every change-order number under the parent line is taken.
    SequenceOverflow(SowItemId),
    /// Every allocation attempt collided with a concurrent writer.
    SequenceExhausted {
        sow_item_id: SowItemId,
        attempts: u32,
    },
    /// Change-order composition stopped after `stage`, the last stage it
    /// completed; nothing was persisted. `Sequenced` means a number was
    /// computed and its write was rolled back.
    Aborted {
        stage: CompositionStage,
        source: RepoError,
    },
    /// Persistence-layer failure outside change-order composition.
    Repo(RepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::SowItemNotFound(id) => write!(f, "sow item not found: {id}"),
            Self::EntryNotFound(id) => write!(f, "reconciliation entry not found: {id}"),
            Self::AlreadyChangeOrder(id) => {
                write!(f, "reconciliation entry is already a change order: {id}")
            }
            Self::NotChangeOrder(id) => {
                write!(f, "reconciliation entry is not a change order: {id}")
            }
            Self::SequenceOverflow(id) => {
                write!(f, "no change order sequence number left under sow item {id}")
            }
            Self::SequenceExhausted {
                sow_item_id,
                attempts,
            } => write!(
                f,
                "change order sequence allocation for sow item {sow_item_id} conflicted {attempts} times"
            ),
            Self::Aborted { stage, source } => write!(
                f,
                "change order composition aborted after stage {}: {source}",
                stage.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Aborted { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LineItemValidationError> for ReconcileError {
    fn from(value: LineItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::SowItemNotFound(id) => Self::SowItemNotFound(id),
            RepoError::EntryNotFound(id) => Self::EntryNotFound(id),
            RepoError::AlreadyChangeOrder(id) => Self::AlreadyChangeOrder(id),
            RepoError::NotChangeOrder(id) => Self::NotChangeOrder(id),
            RepoError::SequenceOverflow(id) => Self::SequenceOverflow(id),
            other => Self::Repo(other),
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Input for a new reconciliation entry or change order under one SOW line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub sow_item_id: SowItemId,
    pub kind: EntryKind,
    /// Explicit activity. Falls back to the cost row's code, then the
    /// parent line's activity.
    pub activity: Option<Activity>,
    /// Raw cost inputs. `None` prices from the parent line's components.
    pub cost_source: Option<RawCostRow>,
    pub overrides: CostOverrides,
    pub description: Option<String>,
    pub note: Option<String>,
}

impl EntryRequest {
    /// Request that prices `activity` from the parent line's own components.
    pub fn for_activity(sow_item_id: SowItemId, activity: Activity) -> Self {
        Self {
            sow_item_id,
            kind: EntryKind::Add,
            activity: Some(activity),
            cost_source: None,
            overrides: CostOverrides::default(),
            description: None,
            note: None,
        }
    }
}

/// Input for converting an existing entry into a change order.
///
/// When no pricing field is set the entry keeps its current costs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertToChangeOrderRequest {
    pub activity: Option<Activity>,
    pub cost_source: Option<RawCostRow>,
    pub overrides: CostOverrides,
    /// Replaces the description when set.
    pub description: Option<String>,
    /// Replaces the note when set.
    pub note: Option<String>,
}

impl ConvertToChangeOrderRequest {
    fn reprices(&self) -> bool {
        self.activity.is_some() || self.cost_source.is_some() || !self.overrides.is_empty()
    }
}

/// Use-case service over a reconciliation repository.
pub struct ReconciliationService<R: ReconciliationRepository> {
    repo: R,
    config: ReconcileConfig,
}

impl<R: ReconciliationRepository> ReconciliationService<R> {
    /// Creates a service with default configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, ReconcileConfig::default())
    }

    pub fn with_config(repo: R, config: ReconcileConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Creates a standalone change order under the request's parent line.
    ///
    /// # Contract
    /// - Costs follow the resolved activity's inclusion policy; overrides
    ///   replace individual buckets and the total is re-derived.
    /// - The sequence number is `max(siblings) + 1`, allocated in the same
    ///   transaction as the insert.
    /// - Conflicts are retried up to `max_sequence_attempts` times.
    pub fn create_change_order(
        &mut self,
        request: &EntryRequest,
    ) -> ReconcileResult<ChangeOrderLine> {
        let started_at = Instant::now();
        let sow_item_id = request.sow_item_id;
        info!(
            "event=co_create module=service status=start sow_item_id={}",
            sow_item_id
        );

        let parent = self.load_parent(sow_item_id)?;
        let (activity, costs) = self.price_request(&parent, request).map_err(|err| {
            warn!(
                "event=co_create module=service status=rejected stage={} sow_item_id={} error={}",
                CompositionStage::PendingInput.as_str(),
                sow_item_id,
                err
            );
            err
        })?;
        let new_entry = NewEntry {
            kind: request.kind,
            description: request.description.clone(),
            note: request.note.clone(),
            activity,
            costs,
        };
        let max_attempts = self.config.max_sequence_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut stage = CompositionStage::Computed;
            match self.repo.insert_change_order(sow_item_id, &new_entry) {
                Ok(entry) => {
                    stage = CompositionStage::Persisted;
                    let display_code =
                        format_co_line_number(entry.co_source_line_no, entry.co_sequence_no);
                    info!(
                        "event=co_create module=service status=ok stage={} sow_item_id={} entry_id={} display_code={} attempts={} duration_ms={}",
                        stage.as_str(),
                        sow_item_id,
                        entry.id,
                        display_code,
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(ChangeOrderLine {
                        entry,
                        display_code,
                    });
                }
                Err(RepoError::SequenceConflict { co_sequence_no, .. }) => {
                    stage = CompositionStage::Sequenced;
                    if attempt >= max_attempts {
                        error!(
                            "event=co_create module=service status=error stage={} sow_item_id={} error_code=sequence_exhausted attempts={}",
                            stage.as_str(),
                            sow_item_id,
                            attempt
                        );
                        return Err(ReconcileError::SequenceExhausted {
                            sow_item_id,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        "event=co_sequence_conflict module=service status=retry sow_item_id={} co_sequence_no={} attempt={}",
                        sow_item_id, co_sequence_no, attempt
                    );
                }
                Err(err) => {
                    if matches!(err, RepoError::ChangeOrderWriteFailed { .. }) {
                        stage = CompositionStage::Sequenced;
                    }
                    error!(
                        "event=co_create module=service status=error stage={} sow_item_id={} error={}",
                        stage.as_str(),
                        sow_item_id,
                        err
                    );
                    return Err(match ReconcileError::from(err) {
                        ReconcileError::Repo(source) => ReconcileError::Aborted { stage, source },
                        semantic => semantic,
                    });
                }
            }
        }
    }

    /// Creates a plain reconciliation entry priced by activity.
    pub fn create_entry(&mut self, request: &EntryRequest) -> ReconcileResult<ReconciliationEntry> {
        let parent = self.load_parent(request.sow_item_id)?;
        let (activity, costs) = self.price_request(&parent, request)?;
        let entry = self.repo.create_entry(
            request.sow_item_id,
            &NewEntry {
                kind: request.kind,
                description: request.description.clone(),
                note: request.note.clone(),
                activity,
                costs,
            },
        )?;
        info!(
            "event=entry_create module=service status=ok sow_item_id={} entry_id={} activity={}",
            request.sow_item_id, entry.id, activity
        );
        Ok(entry)
    }

    /// Re-prices an existing entry from new raw cost inputs.
    ///
    /// Description and note are kept; activity and the cost split are
    /// replaced. Note-only entries stay at zero cost.
    pub fn update_entry_costs(
        &mut self,
        entry_id: EntryId,
        activity: Activity,
        row: &RawCostRow,
    ) -> ReconcileResult<ReconciliationEntry> {
        let current = self.load_entry(entry_id)?;
        let components = extract_cost_components(row);
        components.validate()?;
        self.flag_fallback(current.sow_item_id, activity, row.activity.as_deref());

        let costs = if current.kind == EntryKind::NoteOnly {
            CalculatedCosts::ZERO
        } else {
            calculate_costs(&components, activity)
        };
        let entry = self.repo.update_entry(
            entry_id,
            &EntryChanges {
                description: current.description,
                note: current.note,
                activity,
                costs,
            },
        )?;
        info!(
            "event=entry_update module=service status=ok entry_id={} activity={}",
            entry_id, activity
        );
        Ok(entry)
    }

    /// Converts an existing entry into a standalone change order.
    ///
    /// An entry that was numbered before and reverted gets its original
    /// number back; otherwise the next number under its parent is allocated.
    pub fn convert_entry_to_change_order(
        &mut self,
        entry_id: EntryId,
        request: &ConvertToChangeOrderRequest,
    ) -> ReconcileResult<ChangeOrderLine> {
        let current = self.load_entry(entry_id)?;
        if current.is_change_order {
            return Err(ReconcileError::AlreadyChangeOrder(entry_id));
        }
        validate_optional_text(request.description.as_deref())?;
        request.overrides.validate()?;

        let (activity, costs) = if request.reprices() {
            let parent = self.load_parent(current.sow_item_id)?;
            let activity = self.resolve_activity(
                &parent,
                request.activity,
                request.cost_source.as_ref(),
            );
            let components = self.resolve_components(&parent, request.cost_source.as_ref())?;
            let costs = calculate_costs(&components, activity).with_overrides(&request.overrides);
            (activity, costs)
        } else {
            (current.activity, current.costs)
        };

        let changes = EntryChanges {
            description: request.description.clone().or(current.description),
            note: request.note.clone().or(current.note),
            activity,
            costs,
        };

        let max_attempts = self.config.max_sequence_attempts.max(1);
        let mut attempt = 0;
        let entry = loop {
            attempt += 1;
            match self.repo.mark_entry_change_order(entry_id, &changes) {
                Ok(entry) => break entry,
                Err(RepoError::SequenceConflict { co_sequence_no, .. })
                    if attempt < max_attempts =>
                {
                    warn!(
                        "event=co_sequence_conflict module=service status=retry entry_id={} co_sequence_no={} attempt={}",
                        entry_id, co_sequence_no, attempt
                    );
                }
                Err(RepoError::SequenceConflict { sow_item_id, .. }) => {
                    return Err(ReconcileError::SequenceExhausted {
                        sow_item_id,
                        attempts: attempt,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        };

        let display_code = format_co_line_number(entry.co_source_line_no, entry.co_sequence_no);
        info!(
            "event=co_convert module=service status=ok entry_id={} display_code={}",
            entry_id, display_code
        );
        Ok(ChangeOrderLine {
            entry,
            display_code,
        })
    }

    /// Reverts a change order back to a regular entry.
    pub fn revert_entry_from_change_order(
        &mut self,
        entry_id: EntryId,
    ) -> ReconcileResult<ReconciliationEntry> {
        let entry = self.repo.clear_entry_change_order(entry_id)?;
        info!(
            "event=co_revert module=service status=ok entry_id={} co_sequence_no={:?}",
            entry_id, entry.co_sequence_no
        );
        Ok(entry)
    }

    pub fn get_entry(&self, entry_id: EntryId) -> ReconcileResult<Option<ReconciliationEntry>> {
        Ok(self.repo.get_entry(entry_id)?)
    }

    /// Lists entries under one parent line, change orders first.
    pub fn list_entries(&self, sow_item_id: SowItemId) -> ReconcileResult<Vec<ReconciliationEntry>> {
        Ok(self.repo.list_entries(sow_item_id)?)
    }

    /// Lists audit events of one entry in write order.
    pub fn entry_events(&self, entry_id: EntryId) -> ReconcileResult<Vec<EntryEvent>> {
        Ok(self.repo.list_entry_events(entry_id)?)
    }

    /// Display code of an entry, `None` when it is not a change order.
    pub fn display_code(&self, entry: &ReconciliationEntry) -> Option<String> {
        entry.display_code()
    }

    fn load_parent(&self, sow_item_id: SowItemId) -> ReconcileResult<SowItem> {
        self.repo
            .get_sow_item(sow_item_id)?
            .ok_or(ReconcileError::SowItemNotFound(sow_item_id))
    }

    fn load_entry(&self, entry_id: EntryId) -> ReconcileResult<ReconciliationEntry> {
        self.repo
            .get_entry(entry_id)?
            .ok_or(ReconcileError::EntryNotFound(entry_id))
    }

    fn price_request(
        &self,
        parent: &SowItem,
        request: &EntryRequest,
    ) -> ReconcileResult<(Activity, CalculatedCosts)> {
        validate_optional_text(request.description.as_deref())?;
        request.overrides.validate()?;

        let activity =
            self.resolve_activity(parent, request.activity, request.cost_source.as_ref());
        if request.kind == EntryKind::NoteOnly {
            return Ok((activity, CalculatedCosts::ZERO));
        }

        let components = self.resolve_components(parent, request.cost_source.as_ref())?;
        let costs = calculate_costs(&components, activity).with_overrides(&request.overrides);
        Ok((activity, costs))
    }

    fn resolve_activity(
        &self,
        parent: &SowItem,
        explicit: Option<Activity>,
        cost_source: Option<&RawCostRow>,
    ) -> Activity {
        let row_code = cost_source.and_then(|row| row.activity.as_deref());
        let activity = explicit
            .or_else(|| row_code.map(Activity::from_code))
            .unwrap_or(parent.activity);
        self.flag_fallback(parent.id, activity, row_code);
        activity
    }

    fn resolve_components(
        &self,
        parent: &SowItem,
        cost_source: Option<&RawCostRow>,
    ) -> ReconcileResult<CostComponents> {
        let components = match cost_source {
            Some(row) => extract_cost_components(row),
            None => parent.components,
        };
        components.validate()?;
        Ok(components)
    }

    fn flag_fallback(&self, sow_item_id: SowItemId, activity: Activity, raw_code: Option<&str>) {
        if activity.is_fallback() {
            warn!(
                "event=activity_fallback module=service status=warn sow_item_id={} activity_code={} policy=remove_and_replace",
                sow_item_id,
                raw_code.unwrap_or(activity.code())
            );
        }
    }
}
