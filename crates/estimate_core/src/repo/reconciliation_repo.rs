//! Reconciliation entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist reconciliation entries and standalone change orders under a
//!   parent SOW line.
//! - Allocate change-order sequence numbers inside the same write
//!   transaction as the row insert.
//! - Append one audit event per mutation, in the mutation's transaction.
//!
//! # Invariants
//! - Sequence allocation runs under `BEGIN IMMEDIATE`, so readers of the
//!   sibling snapshot are serialized per database.
//! - `UNIQUE(sow_item_id, co_sequence_no)` backs the allocation; a
//!   violation surfaces as `RepoError::SequenceConflict`, never as a
//!   silently duplicated number.
//! - A failed write rolls back entirely: no row, no event, no burned number.
//! - An assigned `co_sequence_no` is never rewritten.

use super::sow_repo::{load_required_line_no, load_sow_item, parse_uuid};
use super::{bool_to_int, ensure_connection_ready, RepoError, RepoResult};
use crate::model::activity::Activity;
use crate::model::cost::CalculatedCosts;
use crate::model::line_item::{
    validate_optional_text, EntryId, EntryKind, ReconciliationEntry, SowItem, SowItemId,
};
use crate::model::money::Cents;
use crate::numbering::{format_co_line_number, next_co_sequence_no};
use log::debug;
use rusqlite::{ffi, params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    sow_item_id,
    kind,
    description,
    note,
    activity,
    labor_cost_cents,
    material_cost_cents,
    equipment_cost_cents,
    total_cost_cents,
    is_change_order,
    co_sequence_no,
    co_source_line_no,
    created_at,
    updated_at
FROM reconciliation_entries";

/// Field values for a new entry or change order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub description: Option<String>,
    pub note: Option<String>,
    pub activity: Activity,
    pub costs: CalculatedCosts,
}

/// Replacement values for an existing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChanges {
    pub description: Option<String>,
    pub note: Option<String>,
    pub activity: Activity,
    pub costs: CalculatedCosts,
}

/// Audit event kinds written alongside entry mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryEventType {
    EntryCreated,
    ChangeOrderCreated,
    EntryUpdated,
    ConvertedToChangeOrder,
    RevertedFromChangeOrder,
}

impl EntryEventType {
    fn as_db(self) -> &'static str {
        match self {
            Self::EntryCreated => "ENTRY_CREATED",
            Self::ChangeOrderCreated => "CHANGE_ORDER_CREATED",
            Self::EntryUpdated => "ENTRY_UPDATED",
            Self::ConvertedToChangeOrder => "CONVERTED_TO_CHANGE_ORDER",
            Self::RevertedFromChangeOrder => "REVERTED_FROM_CHANGE_ORDER",
        }
    }

    fn from_db(value: &str) -> Option<Self> {
        match value {
            "ENTRY_CREATED" => Some(Self::EntryCreated),
            "CHANGE_ORDER_CREATED" => Some(Self::ChangeOrderCreated),
            "ENTRY_UPDATED" => Some(Self::EntryUpdated),
            "CONVERTED_TO_CHANGE_ORDER" => Some(Self::ConvertedToChangeOrder),
            "REVERTED_FROM_CHANGE_ORDER" => Some(Self::RevertedFromChangeOrder),
            _ => None,
        }
    }
}

/// One audit log row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryEvent {
    pub id: i64,
    pub entry_id: EntryId,
    pub event_type: EntryEventType,
    pub payload: Value,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Repository interface for reconciliation entries and change orders.
pub trait ReconciliationRepository {
    /// Loads the parent SOW line.
    fn get_sow_item(&self, id: SowItemId) -> RepoResult<Option<SowItem>>;
    /// Creates a plain (non change-order) entry.
    fn create_entry(
        &mut self,
        sow_item_id: SowItemId,
        entry: &NewEntry,
    ) -> RepoResult<ReconciliationEntry>;
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<ReconciliationEntry>>;
    /// Lists entries of one parent: change orders by sequence, then others
    /// by creation order.
    fn list_entries(&self, sow_item_id: SowItemId) -> RepoResult<Vec<ReconciliationEntry>>;
    /// Snapshot of sibling sequence numbers, `None` for unnumbered entries.
    fn list_co_sequence_nos(&self, sow_item_id: SowItemId) -> RepoResult<Vec<Option<u32>>>;
    /// Allocates the next sequence number and inserts a change order
    /// atomically.
    fn insert_change_order(
        &mut self,
        sow_item_id: SowItemId,
        entry: &NewEntry,
    ) -> RepoResult<ReconciliationEntry>;
    /// Replaces description, note, activity and costs.
    fn update_entry(
        &mut self,
        id: EntryId,
        changes: &EntryChanges,
    ) -> RepoResult<ReconciliationEntry>;
    /// Turns an existing entry into a change order, reusing its sequence
    /// number when it already holds one.
    fn mark_entry_change_order(
        &mut self,
        id: EntryId,
        changes: &EntryChanges,
    ) -> RepoResult<ReconciliationEntry>;
    /// Clears the change-order flag; the sequence number stays reserved.
    fn clear_entry_change_order(&mut self, id: EntryId) -> RepoResult<ReconciliationEntry>;
    fn list_entry_events(&self, id: EntryId) -> RepoResult<Vec<EntryEvent>>;
}

/// SQLite-backed reconciliation repository.
pub struct SqliteReconciliationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteReconciliationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["sow_items", "reconciliation_entries", "reconciliation_events"],
        )?;
        Ok(Self { conn })
    }

    fn begin_write(&mut self) -> RepoResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

impl ReconciliationRepository for SqliteReconciliationRepository<'_> {
    fn get_sow_item(&self, id: SowItemId) -> RepoResult<Option<SowItem>> {
        load_sow_item(self.conn, id)
    }

    fn create_entry(
        &mut self,
        sow_item_id: SowItemId,
        entry: &NewEntry,
    ) -> RepoResult<ReconciliationEntry> {
        validate_new_entry(entry)?;
        let id = Uuid::new_v4();

        let tx = self.begin_write()?;
        load_required_line_no(&tx, sow_item_id)?;
        insert_entry_row(&tx, id, sow_item_id, entry, None)?;
        append_event(
            &tx,
            id,
            sow_item_id,
            EntryEventType::EntryCreated,
            &entry_payload(entry.activity, &entry.costs),
        )?;
        tx.commit()?;

        load_required_entry(self.conn, id)
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<ReconciliationEntry>> {
        load_entry(self.conn, id)
    }

    fn list_entries(&self, sow_item_id: SowItemId) -> RepoResult<Vec<ReconciliationEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE sow_item_id = ?1
             ORDER BY
                is_change_order DESC,
                CASE WHEN is_change_order = 1 THEN co_sequence_no END ASC,
                created_at ASC,
                rowid ASC;"
        ))?;
        let mut rows = stmt.query([sow_item_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn list_co_sequence_nos(&self, sow_item_id: SowItemId) -> RepoResult<Vec<Option<u32>>> {
        load_sequence_snapshot(self.conn, sow_item_id)
    }

    fn insert_change_order(
        &mut self,
        sow_item_id: SowItemId,
        entry: &NewEntry,
    ) -> RepoResult<ReconciliationEntry> {
        validate_new_entry(entry)?;
        let id = Uuid::new_v4();

        let tx = self.begin_write()?;
        let line_no = load_required_line_no(&tx, sow_item_id)?;
        let co_sequence_no = allocate_sequence_no(&tx, sow_item_id)?;
        debug!(
            "event=co_sequence_allocate module=repo status=ok sow_item_id={} co_sequence_no={}",
            sow_item_id, co_sequence_no
        );

        write_change_order(tx, id, sow_item_id, entry, line_no, co_sequence_no).map_err(
            |err| match err {
                RepoError::SequenceConflict { .. } => err,
                other => RepoError::ChangeOrderWriteFailed {
                    sow_item_id,
                    co_sequence_no,
                    source: Box::new(other),
                },
            },
        )?;

        load_required_entry(self.conn, id)
    }

    fn update_entry(
        &mut self,
        id: EntryId,
        changes: &EntryChanges,
    ) -> RepoResult<ReconciliationEntry> {
        validate_changes(changes)?;

        let tx = self.begin_write()?;
        let current = load_required_entry(&tx, id)?;
        write_entry_changes(&tx, id, changes)?;
        append_event(
            &tx,
            id,
            current.sow_item_id,
            EntryEventType::EntryUpdated,
            &entry_payload(changes.activity, &changes.costs),
        )?;
        tx.commit()?;

        load_required_entry(self.conn, id)
    }

    fn mark_entry_change_order(
        &mut self,
        id: EntryId,
        changes: &EntryChanges,
    ) -> RepoResult<ReconciliationEntry> {
        validate_changes(changes)?;

        let tx = self.begin_write()?;
        let current = load_required_entry(&tx, id)?;
        if current.is_change_order {
            return Err(RepoError::AlreadyChangeOrder(id));
        }

        let sow_item_id = current.sow_item_id;
        let line_no = load_required_line_no(&tx, sow_item_id)?;
        let (co_sequence_no, reused) = match current.co_sequence_no {
            Some(existing) => (existing, true),
            None => (allocate_sequence_no(&tx, sow_item_id)?, false),
        };
        let co_source_line_no = current.co_source_line_no.unwrap_or(line_no);

        write_entry_changes(&tx, id, changes)?;
        tx.execute(
            "UPDATE reconciliation_entries
             SET
                is_change_order = 1,
                co_sequence_no = ?2,
                co_source_line_no = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), co_sequence_no, co_source_line_no],
        )
        .map_err(|err| map_sequence_conflict(err.into(), sow_item_id, co_sequence_no))?;

        let mut payload = entry_payload(changes.activity, &changes.costs);
        payload["coSequenceNo"] = json!(co_sequence_no);
        payload["sequenceReused"] = json!(reused);
        payload["displayCode"] = json!(format_co_line_number(
            Some(co_source_line_no),
            Some(co_sequence_no)
        ));
        append_event(
            &tx,
            id,
            sow_item_id,
            EntryEventType::ConvertedToChangeOrder,
            &payload,
        )?;
        tx.commit()?;

        load_required_entry(self.conn, id)
    }

    fn clear_entry_change_order(&mut self, id: EntryId) -> RepoResult<ReconciliationEntry> {
        let tx = self.begin_write()?;
        let current = load_required_entry(&tx, id)?;
        if !current.is_change_order {
            return Err(RepoError::NotChangeOrder(id));
        }

        tx.execute(
            "UPDATE reconciliation_entries
             SET
                is_change_order = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        append_event(
            &tx,
            id,
            current.sow_item_id,
            EntryEventType::RevertedFromChangeOrder,
            &json!({ "coSequenceNo": current.co_sequence_no }),
        )?;
        tx.commit()?;

        load_required_entry(self.conn, id)
    }

    fn list_entry_events(&self, id: EntryId) -> RepoResult<Vec<EntryEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entry_id, event_type, payload_json, created_at
             FROM reconciliation_events
             WHERE entry_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let entry_text: String = row.get("entry_id")?;
            let type_text: String = row.get("event_type")?;
            let event_type = EntryEventType::from_db(&type_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid event type `{type_text}` in reconciliation_events.event_type"
                ))
            })?;
            let payload_text: String = row.get("payload_json")?;
            let payload = serde_json::from_str(&payload_text).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid payload in reconciliation_events.payload_json: {err}"
                ))
            })?;
            events.push(EntryEvent {
                id: row.get("id")?,
                entry_id: parse_uuid(&entry_text, "reconciliation_events.entry_id")?,
                event_type,
                payload,
                created_at: row.get("created_at")?,
            });
        }
        Ok(events)
    }
}

fn validate_new_entry(entry: &NewEntry) -> RepoResult<()> {
    validate_optional_text(entry.description.as_deref())?;
    Ok(())
}

fn validate_changes(changes: &EntryChanges) -> RepoResult<()> {
    validate_optional_text(changes.description.as_deref())?;
    Ok(())
}

/// Inserts a numbered change order with its audit event and commits.
fn write_change_order(
    tx: Transaction<'_>,
    id: EntryId,
    sow_item_id: SowItemId,
    entry: &NewEntry,
    line_no: u32,
    co_sequence_no: u32,
) -> RepoResult<()> {
    insert_entry_row(
        &tx,
        id,
        sow_item_id,
        entry,
        Some((co_sequence_no, line_no)),
    )
    .map_err(|err| map_sequence_conflict(err, sow_item_id, co_sequence_no))?;

    let mut payload = entry_payload(entry.activity, &entry.costs);
    payload["coSequenceNo"] = json!(co_sequence_no);
    payload["displayCode"] = json!(format_co_line_number(Some(line_no), Some(co_sequence_no)));
    append_event(
        &tx,
        id,
        sow_item_id,
        EntryEventType::ChangeOrderCreated,
        &payload,
    )?;
    tx.commit()?;
    Ok(())
}

fn allocate_sequence_no(conn: &Connection, sow_item_id: SowItemId) -> RepoResult<u32> {
    next_co_sequence_no(load_sequence_snapshot(conn, sow_item_id)?)
        .ok_or(RepoError::SequenceOverflow(sow_item_id))
}

fn insert_entry_row(
    conn: &Connection,
    id: EntryId,
    sow_item_id: SowItemId,
    entry: &NewEntry,
    change_order: Option<(u32, u32)>,
) -> RepoResult<()> {
    let (co_sequence_no, co_source_line_no) = match change_order {
        Some((sequence_no, line_no)) => (Some(sequence_no), Some(line_no)),
        None => (None, None),
    };

    conn.execute(
        "INSERT INTO reconciliation_entries (
            id,
            sow_item_id,
            kind,
            description,
            note,
            activity,
            labor_cost_cents,
            material_cost_cents,
            equipment_cost_cents,
            total_cost_cents,
            is_change_order,
            co_sequence_no,
            co_source_line_no
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            id.to_string(),
            sow_item_id.to_string(),
            entry.kind.as_db(),
            entry.description.as_deref(),
            entry.note.as_deref(),
            entry.activity.code(),
            entry.costs.labor_cost().raw(),
            entry.costs.material_cost().raw(),
            entry.costs.equipment_cost().raw(),
            entry.costs.total_cost().raw(),
            bool_to_int(change_order.is_some()),
            co_sequence_no,
            co_source_line_no,
        ],
    )?;
    Ok(())
}

fn write_entry_changes(conn: &Connection, id: EntryId, changes: &EntryChanges) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE reconciliation_entries
         SET
            description = ?2,
            note = ?3,
            activity = ?4,
            labor_cost_cents = ?5,
            material_cost_cents = ?6,
            equipment_cost_cents = ?7,
            total_cost_cents = ?8,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            id.to_string(),
            changes.description.as_deref(),
            changes.note.as_deref(),
            changes.activity.code(),
            changes.costs.labor_cost().raw(),
            changes.costs.material_cost().raw(),
            changes.costs.equipment_cost().raw(),
            changes.costs.total_cost().raw(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::EntryNotFound(id));
    }
    Ok(())
}

fn append_event(
    conn: &Connection,
    entry_id: EntryId,
    sow_item_id: SowItemId,
    event_type: EntryEventType,
    payload: &Value,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO reconciliation_events (entry_id, sow_item_id, event_type, payload_json)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            entry_id.to_string(),
            sow_item_id.to_string(),
            event_type.as_db(),
            payload.to_string(),
        ],
    )?;
    Ok(())
}

fn entry_payload(activity: Activity, costs: &CalculatedCosts) -> Value {
    json!({
        "activity": activity.code(),
        "laborCost": costs.labor_cost(),
        "materialCost": costs.material_cost(),
        "equipmentCost": costs.equipment_cost(),
        "totalCost": costs.total_cost(),
    })
}

fn load_sequence_snapshot(conn: &Connection, sow_item_id: SowItemId) -> RepoResult<Vec<Option<u32>>> {
    let mut stmt = conn.prepare(
        "SELECT co_sequence_no
         FROM reconciliation_entries
         WHERE sow_item_id = ?1;",
    )?;
    let mut rows = stmt.query([sow_item_id.to_string()])?;
    let mut sequences = Vec::new();
    while let Some(row) = rows.next()? {
        sequences.push(row.get::<_, Option<u32>>(0)?);
    }
    Ok(sequences)
}

fn load_entry(conn: &Connection, id: EntryId) -> RepoResult<Option<ReconciliationEntry>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entry_row(row)?));
    }
    Ok(None)
}

fn load_required_entry(conn: &Connection, id: EntryId) -> RepoResult<ReconciliationEntry> {
    load_entry(conn, id)?.ok_or(RepoError::EntryNotFound(id))
}

fn map_sequence_conflict(err: RepoError, sow_item_id: SowItemId, co_sequence_no: u32) -> RepoError {
    match err {
        RepoError::Db(crate::db::DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)))
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::SequenceConflict {
                sow_item_id,
                co_sequence_no,
            }
        }
        other => other,
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<ReconciliationEntry> {
    let id_text: String = row.get("id")?;
    let sow_item_text: String = row.get("sow_item_id")?;
    let kind_text: String = row.get("kind")?;
    let kind = EntryKind::from_db(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid entry kind `{kind_text}` in reconciliation_entries.kind"
        ))
    })?;
    let activity_text: String = row.get("activity")?;

    let costs = CalculatedCosts::from_buckets(
        Cents::new(row.get("labor_cost_cents")?),
        Cents::new(row.get("material_cost_cents")?),
        Cents::new(row.get("equipment_cost_cents")?),
    );
    let stored_total = Cents::new(row.get("total_cost_cents")?);
    if stored_total != costs.total_cost() {
        return Err(RepoError::InvalidData(format!(
            "total_cost_cents {} does not match bucket sum {} for entry {id_text}",
            stored_total.raw(),
            costs.total_cost().raw()
        )));
    }

    let is_change_order = match row.get::<_, i64>("is_change_order")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_change_order value `{other}` in reconciliation_entries"
            )));
        }
    };

    Ok(ReconciliationEntry {
        id: parse_uuid(&id_text, "reconciliation_entries.id")?,
        sow_item_id: parse_uuid(&sow_item_text, "reconciliation_entries.sow_item_id")?,
        kind,
        description: row.get("description")?,
        note: row.get("note")?,
        activity: Activity::from_code(&activity_text),
        costs,
        is_change_order,
        co_sequence_no: row.get("co_sequence_no")?,
        co_source_line_no: row.get("co_source_line_no")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
