//! Job ledger: last successful run time of periodic jobs, persisted in SQLite.
//!
//! The ledger holds a single table keyed by `(runfreq, cronjob)`:
//!
//! ```text
//! cron(runfreq TEXT, cronjob TEXT, time REAL, PRIMARY KEY(runfreq, cronjob))
//! ```
//!
//! Writes come from `zpm cron` (one process per job run), reads from the exporter's scrape
//! path. SQLite transactions are the only concurrency control: a write is a single upsert
//! inside an IMMEDIATE transaction, a read runs inside a deferred one, so a reader sees either
//! the state before or after a write and never a partial row.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, TransactionBehavior, params};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collector::traits::{CommandError, CommandRunner};

/// Schema of the ledger table.
pub const SCHEMA: &str =
    "CREATE TABLE cron (runfreq TEXT, cronjob TEXT, time REAL, PRIMARY KEY (runfreq, cronjob))";

const UPSERT: &str = "INSERT INTO cron (runfreq, cronjob, time) VALUES (?1, ?2, ?3) \
     ON CONFLICT (runfreq, cronjob) DO UPDATE SET time = excluded.time";

const SELECT_ALL: &str = "SELECT runfreq, cronjob, time FROM cron ORDER BY runfreq";

/// How long a connection waits for another process's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The database could not be opened, read or written.
    #[error("ledger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The tracked job failed; nothing was recorded.
    #[error("job failed: {0}")]
    Command(#[from] CommandError),
    /// The run frequency cannot be used as part of a metric name.
    #[error("invalid run frequency {0:?}: only ASCII letters, digits and '_' are allowed")]
    InvalidRunFrequency(String),
}

impl LedgerError {
    /// Exit code of the failed job, if the job itself exited unsuccessfully.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LedgerError::Command(e) => e.exit_code(),
            _ => None,
        }
    }
}

/// Result of [`Ledger::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The ledger table was created.
    Created,
    /// The database already contained a schema; nothing was changed.
    AlreadyInitialized,
}

/// One row of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub run_frequency: String,
    pub job_name: String,
    /// Unix timestamp (seconds) of the most recent successful run.
    pub last_run_time: f64,
}

/// An open ledger database.
pub struct Ledger {
    conn: Connection,
    path: PathBuf,
}

impl Ledger {
    /// Initializes a ledger file, creating it if needed.
    ///
    /// Idempotent: if the database already has any schema object, it is left untouched
    /// and [`InitOutcome::AlreadyInitialized`] is returned.
    pub fn init(path: impl AsRef<Path>) -> Result<InitOutcome, LedgerError> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let objects: i64 = tx.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get(0)
        })?;
        let outcome = if objects == 0 {
            tx.execute(SCHEMA, [])?;
            InitOutcome::Created
        } else {
            InitOutcome::AlreadyInitialized
        };
        tx.commit()?;

        info!(path = %path.display(), outcome = ?outcome, "ledger initialization finished");
        Ok(outcome)
    }

    /// Opens an existing ledger for writing. Does not create the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Opens an existing ledger for reading only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self, LedgerError> {
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a successful run of `job` at `time`.
    ///
    /// Inserts the row, or overwrites `time` if `(run_frequency, job)` already exists.
    pub fn record_run(
        &mut self,
        run_frequency: &str,
        job: &str,
        time: f64,
    ) -> Result<(), LedgerError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(UPSERT, params![run_frequency, job, time])?;
        tx.commit()?;

        debug!(path = %self.path.display(), runfreq = run_frequency, job, time, "recorded job run");
        Ok(())
    }

    /// Returns every row ordered by run frequency.
    pub fn entries(&mut self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let tx = self.conn.transaction()?;
        let entries = {
            let mut stmt = tx.prepare(SELECT_ALL)?;
            let rows = stmt.query_map([], |row| {
                Ok(LedgerEntry {
                    run_frequency: row.get(0)?,
                    job_name: row.get(1)?,
                    last_run_time: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;
        Ok(entries)
    }
}

/// Checks that a run frequency can become part of a metric name.
pub fn validate_run_frequency(run_frequency: &str) -> Result<(), LedgerError> {
    let valid = !run_frequency.is_empty()
        && run_frequency
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidRunFrequency(run_frequency.to_string()))
    }
}

/// Current time as Unix seconds with sub-second precision.
pub fn now_unix() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Outcome of a successful [`run_job`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobRun {
    /// Timestamp written to the ledger.
    pub recorded_at: f64,
}

/// Runs a job and records its completion in the ledger.
///
/// The ledger is opened before the job starts so a missing or unreadable ledger is
/// reported without running anything. The job's output goes straight to ours; only its
/// exit status decides whether it succeeded. If the job fails, nothing is written.
pub fn run_job<R: CommandRunner + ?Sized>(
    runner: &R,
    run_frequency: &str,
    db_path: impl AsRef<Path>,
    job: &str,
    argv: &[String],
) -> Result<JobRun, LedgerError> {
    validate_run_frequency(run_frequency)?;
    let mut ledger = Ledger::open(db_path)?;

    info!(runfreq = run_frequency, job, command = %argv.join(" "), "running job");
    runner.status(argv).inspect_err(|e| {
        warn!(runfreq = run_frequency, job, error = %e, "job failed, not recording");
    })?;

    let recorded_at = now_unix();
    ledger.record_run(run_frequency, job, recorded_at)?;
    info!(runfreq = run_frequency, job, "job succeeded");

    Ok(JobRun { recorded_at })
}
