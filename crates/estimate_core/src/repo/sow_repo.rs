//! SOW line item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist parent estimate lines and their raw cost components.
//! - Provide row mapping shared with the reconciliation repository.
//!
//! # Invariants
//! - Write paths call `SowItem::validate()` before SQL mutations.
//! - Component columns keep `NULL` distinct from zero.

use super::{ensure_connection_ready, optional_cents_to_db, RepoError, RepoResult};
use crate::model::activity::Activity;
use crate::model::cost::CostComponents;
use crate::model::line_item::{SowItem, SowItemId};
use crate::model::money::Cents;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const SOW_ITEM_SELECT_SQL: &str = "SELECT
    id,
    line_no,
    description,
    activity,
    workers_wage_cents,
    labor_burden_cents,
    labor_overhead_cents,
    material_cents,
    equipment_cents
FROM sow_items";

/// Repository interface for SOW line items.
pub trait SowItemRepository {
    fn create_sow_item(&self, item: &SowItem) -> RepoResult<SowItemId>;
    fn get_sow_item(&self, id: SowItemId) -> RepoResult<Option<SowItem>>;
    /// Lists all lines ordered by `line_no`.
    fn list_sow_items(&self) -> RepoResult<Vec<SowItem>>;
}

/// SQLite-backed SOW line item repository.
pub struct SqliteSowItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSowItemRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["sow_items"])?;
        Ok(Self { conn })
    }
}

impl SowItemRepository for SqliteSowItemRepository<'_> {
    fn create_sow_item(&self, item: &SowItem) -> RepoResult<SowItemId> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO sow_items (
                id,
                line_no,
                description,
                activity,
                workers_wage_cents,
                labor_burden_cents,
                labor_overhead_cents,
                material_cents,
                equipment_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                item.id.to_string(),
                item.line_no,
                item.description.as_str(),
                item.activity.code(),
                optional_cents_to_db(item.components.workers_wage),
                optional_cents_to_db(item.components.labor_burden),
                optional_cents_to_db(item.components.labor_overhead),
                optional_cents_to_db(item.components.material),
                optional_cents_to_db(item.components.equipment),
            ],
        )?;

        Ok(item.id)
    }

    fn get_sow_item(&self, id: SowItemId) -> RepoResult<Option<SowItem>> {
        load_sow_item(self.conn, id)
    }

    fn list_sow_items(&self) -> RepoResult<Vec<SowItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SOW_ITEM_SELECT_SQL} ORDER BY line_no ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_sow_item_row(row)?);
        }
        Ok(items)
    }
}

pub(crate) fn load_sow_item(conn: &Connection, id: SowItemId) -> RepoResult<Option<SowItem>> {
    let mut stmt = conn.prepare(&format!("{SOW_ITEM_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_sow_item_row(row)?));
    }
    Ok(None)
}

/// Loads the parent `line_no`, failing when the line does not exist.
pub(crate) fn load_required_line_no(conn: &Connection, id: SowItemId) -> RepoResult<u32> {
    conn.query_row(
        "SELECT line_no FROM sow_items WHERE id = ?1;",
        [id.to_string()],
        |row| row.get::<_, u32>(0),
    )
    .optional()?
    .ok_or(RepoError::SowItemNotFound(id))
}

fn parse_sow_item_row(row: &Row<'_>) -> RepoResult<SowItem> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "sow_items.id")?;
    let activity_text: String = row.get("activity")?;

    Ok(SowItem {
        id,
        line_no: row.get("line_no")?,
        description: row.get("description")?,
        activity: Activity::from_code(&activity_text),
        components: CostComponents {
            workers_wage: row.get::<_, Option<i64>>("workers_wage_cents")?.map(Cents::new),
            labor_burden: row.get::<_, Option<i64>>("labor_burden_cents")?.map(Cents::new),
            labor_overhead: row
                .get::<_, Option<i64>>("labor_overhead_cents")?
                .map(Cents::new),
            material: row.get::<_, Option<i64>>("material_cents")?.map(Cents::new),
            equipment: row.get::<_, Option<i64>>("equipment_cents")?.map(Cents::new),
        },
    })
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
