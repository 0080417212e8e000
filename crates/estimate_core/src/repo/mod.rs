//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//! - Own the transaction boundary for change-order number allocation.
//!
//! # Invariants
//! - Repository writes validate input before SQL mutations.
//! - Repository APIs return semantic errors (`*NotFound`, `SequenceConflict`)
//!   in addition to DB transport errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::line_item::{EntryId, LineItemValidationError, SowItemId};
use crate::model::money::Cents;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod reconciliation_repo;
pub mod sow_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for line item and reconciliation storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(LineItemValidationError),
    Db(DbError),
    SowItemNotFound(SowItemId),
    EntryNotFound(EntryId),
    /// Entry is already a change order.
    AlreadyChangeOrder(EntryId),
    /// Entry is not a change order.
    NotChangeOrder(EntryId),
    /// Another writer persisted the same sequence number under this parent.
    SequenceConflict {
        sow_item_id: SowItemId,
        co_sequence_no: u32,
    },
    /// Every change-order number under this parent is taken.
    SequenceOverflow(SowItemId),
    /// A change-order write failed after its number was computed; the
    /// transaction was rolled back.
    ChangeOrderWriteFailed {
        sow_item_id: SowItemId,
        co_sequence_no: u32,
        source: Box<RepoError>,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::SowItemNotFound(id) => write!(f, "sow item not found: {id}"),
            Self::EntryNotFound(id) => write!(f, "reconciliation entry not found: {id}"),
            Self::AlreadyChangeOrder(id) => {
                write!(f, "reconciliation entry is already a change order: {id}")
            }
            Self::NotChangeOrder(id) => {
                write!(f, "reconciliation entry is not a change order: {id}")
            }
            Self::SequenceConflict {
                sow_item_id,
                co_sequence_no,
            } => write!(
                f,
                "change order sequence {co_sequence_no} already taken under sow item {sow_item_id}"
            ),
            Self::SequenceOverflow(id) => {
                write!(f, "no change order sequence number left under sow item {id}")
            }
            Self::ChangeOrderWriteFailed {
                sow_item_id,
                co_sequence_no,
                source,
            } => write!(
                f,
                "change order {co_sequence_no} under sow item {sow_item_id} was not written: {source}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::ChangeOrderWriteFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<LineItemValidationError> for RepoError {
    fn from(value: LineItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that were not opened through `db::open_*`.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn optional_cents_to_db(value: Option<Cents>) -> Option<i64> {
    value.map(|amount| amount.raw())
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
