use rusqlite::{params, Connection, ErrorCode, Transaction};
use tracing::{info, warn};

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::internal_error::{InternalError, InternalResult};

pub type DBConnection = Arc<Mutex<Connection>>;

const BUSY_TIMEOUT: Duration = Duration::from_millis(500);

pub fn open_store(path: &Path) -> InternalResult<DBConnection> {
    let connection = Connection::open(path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&connection)?;

    info!(path = %path.display(), "store opened");
    Ok(Arc::new(Mutex::new(connection)))
}

pub fn init_schema(connection: &Connection) -> InternalResult<()> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            expected_time INTEGER NOT NULL,
            tasks TEXT NOT NULL,
            next_task_id INTEGER NOT NULL DEFAULT 1,
            is_complete INTEGER NOT NULL DEFAULT 0,
            completion_source TEXT NOT NULL DEFAULT 'derived',
            reward_id INTEGER
        )",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS rewards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            media_file TEXT,
            status TEXT NOT NULL DEFAULT 'unbound',
            goal_id INTEGER
        )",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS task_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id INTEGER NOT NULL,
            task_id INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            stopped_at TEXT NOT NULL,
            minutes INTEGER NOT NULL
        )",
        params![],
    )?;

    Ok(())
}

pub fn close_store(db_connection: &DBConnection) -> InternalResult<()> {
    let db_connection = db_connection.lock()?;
    db_connection.execute_batch("PRAGMA optimize")?;

    info!("store closed");
    Ok(())
}

/// Field writes made inside one `atomically` unit, in order.
#[derive(Debug, Default)]
pub struct UpdateJournal {
    fields: Vec<String>,
}

impl UpdateJournal {
    pub fn record(&mut self, field: impl Into<String>) {
        self.fields.push(field.into());
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn is_retryable(e: &InternalError) -> bool {
    match e {
        InternalError::Database(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

/// Runs `unit` inside a single transaction so that every write it makes lands
/// together or not at all. Lock contention is retried up to `attempts` times,
/// after which the journal of the last attempt is reported as uncommitted.
pub fn atomically<T, F>(connection: &mut Connection, attempts: u32, mut unit: F) -> InternalResult<T>
where
    F: FnMut(&Transaction, &mut UpdateJournal) -> InternalResult<T>,
{
    let attempts = attempts.max(1);
    let mut pending = vec![];

    for attempt in 1..=attempts {
        let mut journal = UpdateJournal::default();

        let result = match connection.transaction() {
            Ok(tx) => match unit(&tx, &mut journal) {
                Ok(value) => tx.commit().map(|_| value).map_err(InternalError::from),
                Err(e) => Err(e),
            },
            Err(e) => Err(InternalError::from(e)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                warn!(attempt, attempts, fields = ?journal.fields(), "retrying update: {}", e);
                pending = journal.fields;
            }
            Err(e) => return Err(e),
        }
    }

    Err(InternalError::PartialUpdate {
        attempts,
        committed: vec![],
        pending,
    })
}

#[cfg(test)]
pub fn test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    init_schema(&connection).unwrap();
    connection
}
