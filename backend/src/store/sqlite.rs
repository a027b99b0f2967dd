use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use carpool_common::{RequestStatus, VerificationStatus};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::models::{NewShare, NewUser, RideRequest, Share, User};

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed store for users, trips and ride requests.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path == ":memory:" || path == "memory" {
            return Self::open_in_memory();
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        tracing::info!("Store initialized with database: {}", path);
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run read-only or single-statement work on the connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `f` performs its first read. The
    /// transaction commits only when `f` returns `Ok`; any error drops it,
    /// which rolls back every write made so far.
    pub(crate) fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    // ========== Users ==========

    pub fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let now = to_db_time(&Utc::now());

        let inserted = conn.execute(
            "INSERT INTO users (first_name, last_name, email, password_hash, driver_license,
                                gender, senac_id, verification_status, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.first_name,
                user.last_name,
                user.email,
                user.password_hash,
                user.driver_license,
                user.gender.as_str(),
                user.senac_id,
                user.verification_status.as_str(),
                user.role.as_str(),
                now,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        query_user(&conn, id)?.ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", user_columns("users")),
                params![email],
                |row| user_from_row(row, 0),
            )
            .optional()
        })
    }

    /// Set a user's verification status. Returns `None` if the user does not exist.
    pub fn update_user_status(
        &self,
        id: i64,
        status: VerificationStatus,
    ) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET verification_status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, id)
        })
    }

    pub fn list_users(&self, status: Option<VerificationStatus>) -> Result<Vec<User>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE (?1 IS NULL OR verification_status = ?1)
                 ORDER BY id",
                user_columns("users")
            ))?;
            let users = stmt
                .query_map(params![status.map(|s| s.as_str())], |row| user_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    // ========== Shares ==========

    /// Insert a trip. The row is only kept if it reads back cleanly.
    pub fn insert_share(&self, share: &NewShare) -> Result<Share, StoreError> {
        self.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO shares (driver_id, origin, destination, departure_time, spots, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    share.driver_id,
                    share.origin,
                    share.destination,
                    to_db_time(&share.departure_time),
                    share.spots,
                    share.message,
                    to_db_time(&Utc::now()),
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_share(conn, id)?
                .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    pub fn find_share(&self, id: i64) -> Result<Option<Share>, StoreError> {
        self.with_conn(|conn| query_share(conn, id))
    }

    // ========== Requests ==========

    /// Insert a PENDING request.
    pub fn insert_request(
        &self,
        share_id: i64,
        user_id: i64,
        message: Option<&str>,
    ) -> Result<RideRequest, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO requests (share_id, user_id, status, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    share_id,
                    user_id,
                    RequestStatus::Pending.as_str(),
                    message,
                    to_db_time(&Utc::now()),
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_request(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    pub fn find_request(&self, id: i64) -> Result<Option<RideRequest>, StoreError> {
        self.with_conn(|conn| query_request(conn, id))
    }
}

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        driver_license TEXT,
        gender TEXT NOT NULL,
        senac_id TEXT NOT NULL,
        verification_status TEXT NOT NULL DEFAULT 'PENDING',
        role TEXT NOT NULL DEFAULT 'USER',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS shares (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        driver_id INTEGER NOT NULL,
        origin TEXT NOT NULL,
        destination TEXT NOT NULL,
        departure_time TEXT NOT NULL,
        spots INTEGER NOT NULL CHECK (spots >= 0),
        message TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (driver_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        share_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        message TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (share_id) REFERENCES shares(id),
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_shares_driver_id ON shares(driver_id);
    CREATE INDEX IF NOT EXISTS idx_shares_departure_time ON shares(departure_time);
    CREATE INDEX IF NOT EXISTS idx_requests_share_id ON requests(share_id);
    CREATE INDEX IF NOT EXISTS idx_requests_user_id ON requests(user_id);
";

// ========== Row mapping ==========

/// Latest instant with a four-digit year, the upper bound of [`is_storable`].
pub(crate) const LATEST_DB_TIME: &str = "9999-12-31T23:59:59Z";

/// Whether `time` survives the text round trip. Years outside 0000-9999 get
/// a sign prefix that neither sorts nor parses back.
pub(crate) fn is_storable(time: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&time.year())
}

/// Fixed-width UTC format so that text comparison orders by time.
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn prefixed(alias: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn user_columns(alias: &str) -> String {
    prefixed(
        alias,
        &[
            "id",
            "first_name",
            "last_name",
            "email",
            "password_hash",
            "driver_license",
            "gender",
            "senac_id",
            "verification_status",
            "role",
            "created_at",
        ],
    )
}

pub(crate) fn share_columns(alias: &str) -> String {
    prefixed(
        alias,
        &[
            "id",
            "driver_id",
            "origin",
            "destination",
            "departure_time",
            "spots",
            "message",
            "created_at",
        ],
    )
}

pub(crate) const SHARE_COLUMN_COUNT: usize = 8;

pub(crate) fn request_columns(alias: &str) -> String {
    prefixed(
        alias,
        &["id", "share_id", "user_id", "status", "message", "created_at"],
    )
}

pub(crate) const REQUEST_COLUMN_COUNT: usize = 6;

fn user_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(at)?,
        first_name: row.get(at + 1)?,
        last_name: row.get(at + 2)?,
        email: row.get(at + 3)?,
        password_hash: row.get(at + 4)?,
        driver_license: row.get(at + 5)?,
        gender: enum_column(row, at + 6)?,
        senac_id: row.get(at + 7)?,
        verification_status: enum_column(row, at + 8)?,
        role: enum_column(row, at + 9)?,
        created_at: time_column(row, at + 10)?,
    })
}

pub(crate) fn share_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Share> {
    Ok(Share {
        id: row.get(at)?,
        driver_id: row.get(at + 1)?,
        origin: row.get(at + 2)?,
        destination: row.get(at + 3)?,
        departure_time: time_column(row, at + 4)?,
        spots: row.get(at + 5)?,
        message: row.get(at + 6)?,
        created_at: time_column(row, at + 7)?,
    })
}

pub(crate) fn request_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<RideRequest> {
    Ok(RideRequest {
        id: row.get(at)?,
        share_id: row.get(at + 1)?,
        user_id: row.get(at + 2)?,
        status: enum_column(row, at + 3)?,
        message: row.get(at + 4)?,
        created_at: time_column(row, at + 5)?,
    })
}

fn query_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", user_columns("users")),
        params![id],
        |row| user_from_row(row, 0),
    )
    .optional()
}

pub(crate) fn query_share(conn: &Connection, id: i64) -> rusqlite::Result<Option<Share>> {
    conn.query_row(
        &format!("SELECT {} FROM shares WHERE id = ?1", share_columns("shares")),
        params![id],
        |row| share_from_row(row, 0),
    )
    .optional()
}

pub(crate) fn query_request(conn: &Connection, id: i64) -> rusqlite::Result<Option<RideRequest>> {
    conn.query_row(
        &format!("SELECT {} FROM requests WHERE id = ?1", request_columns("requests")),
        params![id],
        |row| request_from_row(row, 0),
    )
    .optional()
}
