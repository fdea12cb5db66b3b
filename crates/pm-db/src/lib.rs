//! SQLite storage for PlayMetric.
//!
//! Implements [`EventStore`] on top of `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a single `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Share one through [`pm_core::Ingestor`] (which holds it behind a
//! mutex), or open one `Database` per thread or process against the same file.
//! Actor upserts run in `BEGIN IMMEDIATE` transactions, so read-modify-write
//! cycles from different connections never interleave.
//!
//! # Schema
//!
//! One `actors` table keyed by actor id, and one table per event category
//! (`game_events`, `level_events`, ...). Event rows keep the envelope and the
//! category body as JSON text (`global_params`, `data`); the actor id, type
//! tag, timestamp and session id are lifted into columns for indexing.
//!
//! Timestamps are stored as RFC 3339 TEXT with millisecond precision, always
//! UTC, so lexicographic order matches chronological order.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use pm_core::{
    ActorId, ActorRecord, CategorizedEvent, Category, DeviceId, EventBody, EventId, EventStore,
    EventType, GlobalParameters, Platform, SessionId, StorageError,
};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use serde_json::{Map, Value};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to encode a document as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored row could not be turned back into a domain value.
    #[error("invalid row {id} in {table}: {message}")]
    InvalidRow {
        table: &'static str,
        id: String,
        message: String,
    },
}

impl DbError {
    /// Whether the error is a lock wait that ran past the busy timeout.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    fn invalid_row(table: &'static str, id: &str, message: impl ToString) -> Self {
        Self::InvalidRow {
            table,
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        if err.is_busy() {
            return Self::Timeout(err.to_string());
        }
        match err {
            DbError::InvalidRow { table, id, message } => Self::Corrupt {
                collection: table,
                id,
                reason: message,
            },
            other => Self::backend(other),
        }
    }
}

/// Default wait for a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ACTORS_TABLE: &str = "actors";

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open. Lock waits give up after
    /// `busy_timeout`.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- first_seen / last_seen: RFC 3339 UTC with milliseconds
            -- platform: display name ('iOS', 'Android', ...) or the raw client value
            CREATE TABLE IF NOT EXISTS actors (
                actor_id TEXT PRIMARY KEY,
                device_id TEXT,
                device_model TEXT,
                os_version TEXT,
                platform TEXT,
                app_version TEXT,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                total_events INTEGER NOT NULL DEFAULT 0,
                total_sessions INTEGER NOT NULL DEFAULT 0,
                current_session_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_actors_last_seen ON actors(last_seen);
            CREATE INDEX IF NOT EXISTS idx_actors_first_seen ON actors(first_seen);
            CREATE INDEX IF NOT EXISTS idx_actors_platform ON actors(platform);
            ",
        )?;
        for category in Category::ALL {
            let table = category.collection();
            self.conn.execute_batch(&format!(
                "
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    actor_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    session_id TEXT,
                    global_params TEXT NOT NULL,
                    data TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_actor ON {table}(actor_id);
                CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp);
                "
            ))?;
        }
        Ok(())
    }

    /// Reads, updates and writes one actor inside an IMMEDIATE transaction.
    pub fn modify_actor(
        &mut self,
        actor_id: &ActorId,
        update: &mut dyn FnMut(Option<ActorRecord>) -> ActorRecord,
    ) -> Result<ActorRecord, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = select_actor(&tx, actor_id)?;
        let record = update(existing);
        tx.execute(
            "
            INSERT INTO actors
            (actor_id, device_id, device_model, os_version, platform, app_version,
             first_seen, last_seen, total_events, total_sessions, current_session_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(actor_id) DO UPDATE SET
                device_id = excluded.device_id,
                device_model = excluded.device_model,
                os_version = excluded.os_version,
                platform = excluded.platform,
                app_version = excluded.app_version,
                first_seen = excluded.first_seen,
                last_seen = excluded.last_seen,
                total_events = excluded.total_events,
                total_sessions = excluded.total_sessions,
                current_session_id = excluded.current_session_id
            ",
            params![
                record.actor_id.as_str(),
                record.device_id.as_ref().map(DeviceId::as_str),
                record.device_model,
                record.os_version,
                record.platform.as_ref().map(Platform::as_str),
                record.app_version,
                format_timestamp(record.first_seen),
                format_timestamp(record.last_seen),
                to_sql_count(record.total_events),
                to_sql_count(record.total_sessions),
                record.current_session_id.as_ref().map(SessionId::as_str),
            ],
        )?;
        tx.commit()?;
        tracing::debug!(actor_id = %record.actor_id, "wrote actor row");
        Ok(record)
    }

    pub fn get_actor(&self, actor_id: &ActorId) -> Result<Option<ActorRecord>, DbError> {
        select_actor(&self.conn, actor_id)
    }

    /// Lists all actors ordered by actor id.
    pub fn all_actors(&self) -> Result<Vec<ActorRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTOR_COLUMNS} FROM actors ORDER BY actor_id ASC"
        ))?;
        let rows = stmt.query_map([], ActorRow::from_row)?;
        let mut actors = Vec::new();
        for row in rows {
            actors.push(row?.into_record()?);
        }
        Ok(actors)
    }

    /// Inserts an event into its category table. Event ids are write-once.
    pub fn insert_event(&mut self, event: &CategorizedEvent) -> Result<(), DbError> {
        let table = event.category().collection();
        let params_json = serde_json::to_string(event.global_params())?;
        let data_json = serde_json::to_string(&event.body().to_fields()?)?;
        self.conn.execute(
            &format!(
                "
                INSERT INTO {table}
                (id, actor_id, event_type, timestamp, session_id, global_params, data)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "
            ),
            params![
                event.id().as_str(),
                event.actor_id().as_str(),
                event.event_type().as_str(),
                format_timestamp(event.global_params().timestamp),
                event.global_params().session_id.as_ref().map(SessionId::as_str),
                params_json,
                data_json,
            ],
        )?;
        tracing::debug!(id = %event.id(), table, "inserted event row");
        Ok(())
    }

    pub fn get_event(
        &self,
        category: Category,
        id: &EventId,
    ) -> Result<Option<CategorizedEvent>, DbError> {
        let table = category.collection();
        let row = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM {table} WHERE id = ?1"),
                [id.as_str()],
                EventRow::from_row,
            )
            .optional()?;
        row.map(|row| row.into_event(category)).transpose()
    }

    /// Lists a category's events in insertion order.
    pub fn events_in(&self, category: Category) -> Result<Vec<CategorizedEvent>, DbError> {
        let table = category.collection();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM {table} ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([], EventRow::from_row)?;
        collect_events(rows, category)
    }

    /// Lists one actor's events in a category, in insertion order.
    pub fn events_for_actor(
        &self,
        category: Category,
        actor_id: &ActorId,
    ) -> Result<Vec<CategorizedEvent>, DbError> {
        let table = category.collection();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM {table} WHERE actor_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([actor_id.as_str()], EventRow::from_row)?;
        collect_events(rows, category)
    }

    pub fn event_count(&self, category: Category) -> Result<u64, DbError> {
        let table = category.collection();
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl EventStore for Database {
    fn update_actor(
        &mut self,
        actor_id: &ActorId,
        update: &mut dyn FnMut(Option<ActorRecord>) -> ActorRecord,
    ) -> Result<ActorRecord, StorageError> {
        Ok(self.modify_actor(actor_id, update)?)
    }

    fn find_actor(&self, actor_id: &ActorId) -> Result<Option<ActorRecord>, StorageError> {
        Ok(self.get_actor(actor_id)?)
    }

    fn list_actors(&self) -> Result<Vec<ActorRecord>, StorageError> {
        Ok(self.all_actors()?)
    }

    fn save_event(&mut self, event: &CategorizedEvent) -> Result<(), StorageError> {
        Ok(self.insert_event(event)?)
    }

    fn find_event(
        &self,
        category: Category,
        id: &EventId,
    ) -> Result<Option<CategorizedEvent>, StorageError> {
        Ok(self.get_event(category, id)?)
    }

    fn list_events(&self, category: Category) -> Result<Vec<CategorizedEvent>, StorageError> {
        Ok(self.events_in(category)?)
    }

    fn list_events_for_actor(
        &self,
        category: Category,
        actor_id: &ActorId,
    ) -> Result<Vec<CategorizedEvent>, StorageError> {
        Ok(self.events_for_actor(category, actor_id)?)
    }

    fn count_events(&self, category: Category) -> Result<u64, StorageError> {
        Ok(self.event_count(category)?)
    }
}

const ACTOR_COLUMNS: &str = "actor_id, device_id, device_model, os_version, platform, app_version, \
     first_seen, last_seen, total_events, total_sessions, current_session_id";

const EVENT_COLUMNS: &str = "id, event_type, global_params, data";

/// An `actors` row as stored, before validation.
struct ActorRow {
    actor_id: String,
    device_id: Option<String>,
    device_model: Option<String>,
    os_version: Option<String>,
    platform: Option<String>,
    app_version: Option<String>,
    first_seen: String,
    last_seen: String,
    total_events: i64,
    total_sessions: i64,
    current_session_id: Option<String>,
}

impl ActorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            actor_id: row.get(0)?,
            device_id: row.get(1)?,
            device_model: row.get(2)?,
            os_version: row.get(3)?,
            platform: row.get(4)?,
            app_version: row.get(5)?,
            first_seen: row.get(6)?,
            last_seen: row.get(7)?,
            total_events: row.get(8)?,
            total_sessions: row.get(9)?,
            current_session_id: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<ActorRecord, DbError> {
        let id = self.actor_id;
        let invalid = |message: String| DbError::invalid_row(ACTORS_TABLE, &id, message);
        let count = |value: i64, column: &str| {
            u64::try_from(value).map_err(|_| invalid(format!("negative {column}: {value}")))
        };
        let actor_id = ActorId::new(id.clone()).map_err(|e| invalid(e.to_string()))?;
        Ok(ActorRecord {
            actor_id,
            device_id: self.device_id.and_then(|d| DeviceId::new(d).ok()),
            device_model: self.device_model,
            os_version: self.os_version,
            platform: self.platform.as_deref().map(Platform::parse),
            app_version: self.app_version,
            first_seen: parse_timestamp(&self.first_seen).map_err(&invalid)?,
            last_seen: parse_timestamp(&self.last_seen).map_err(&invalid)?,
            total_events: count(self.total_events, "total_events")?,
            total_sessions: count(self.total_sessions, "total_sessions")?,
            current_session_id: self
                .current_session_id
                .and_then(|s| SessionId::new(s).ok()),
        })
    }
}

/// A category row as stored, before validation.
struct EventRow {
    id: String,
    event_type: String,
    global_params: String,
    data: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_type: row.get(1)?,
            global_params: row.get(2)?,
            data: row.get(3)?,
        })
    }

    fn into_event(self, category: Category) -> Result<CategorizedEvent, DbError> {
        let table = category.collection();
        let invalid = |message: String| DbError::invalid_row(table, &self.id, message);

        let event_type: EventType = self
            .event_type
            .parse()
            .map_err(|e: pm_core::UnknownEventType| invalid(e.to_string()))?;
        let global_params: GlobalParameters = serde_json::from_str(&self.global_params)
            .map_err(|e| invalid(format!("global_params: {e}")))?;
        let fields: Map<String, Value> = serde_json::from_str(&self.data)
            .map_err(|e| invalid(format!("data: {e}")))?;
        let body = EventBody::from_fields(category, fields)
            .map_err(|e| invalid(format!("data: {e}")))?;
        let id = EventId::new(self.id.clone()).map_err(|e| invalid(e.to_string()))?;

        CategorizedEvent::new(id, event_type, global_params, body)
            .map_err(|e| invalid(e.to_string()))
    }
}

fn select_actor(conn: &Connection, actor_id: &ActorId) -> Result<Option<ActorRecord>, DbError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE actor_id = ?1"),
            [actor_id.as_str()],
            ActorRow::from_row,
        )
        .optional()?;
    row.map(ActorRow::into_record).transpose()
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<EventRow>>,
    category: Category,
) -> Result<Vec<CategorizedEvent>, DbError> {
    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event(category)?);
    }
    Ok(events)
}

fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {timestamp:?}: {e}"))
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
