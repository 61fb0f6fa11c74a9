use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::db::{ScanRunRecord, ScanStatus};
use crate::report::{Finding, FindingContext, SourceSite};

/// `0` means a fresh database with no tables.
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to encode finding: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    #[error("scan run {0} not found")]
    UnknownRun(i64),
}

pub type DbResult<T> = Result<T, DbError>;

/// SQLite history of scan runs and the findings they produced.
#[derive(Debug)]
pub struct ScanDb {
    conn: Connection,
}

impl ScanDb {
    /// Open (or create) the database and bring its schema up to date.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> DbResult<i32> {
        current_schema_version(&self.conn)
    }

    /// Insert a scan run and return its row id.
    pub fn insert_scan_run(&self, record: &ScanRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO scan_runs (
                program, program_hash, bug, description, status,
                started_at, finished_at, finding_count
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.program,
                record.program_hash,
                record.bug,
                record.description,
                record.status.as_str(),
                record.started_at,
                record.finished_at,
                record.finding_count
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Mark a run finished.
    pub fn finish_scan_run(
        &self,
        run_id: i64,
        status: ScanStatus,
        finished_at: &str,
        finding_count: i64,
    ) -> DbResult<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE scan_runs
            SET status = ?2, finished_at = ?3, finding_count = ?4
            WHERE id = ?1
            "#,
            params![run_id, status.as_str(), finished_at, finding_count],
        )?;
        if changed == 0 {
            return Err(DbError::UnknownRun(run_id));
        }
        Ok(())
    }

    /// Store findings for a run, preserving their order.
    pub fn insert_findings(&self, run_id: i64, findings: &[Finding]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO findings (run_id, idx, bug, function, sites_json, context_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (idx, finding) in findings.iter().enumerate() {
                let sites = serde_json::to_string(&finding.sites)?;
                let context = serde_json::to_string(&finding.context)?;
                stmt.execute(params![
                    run_id,
                    idx as i64,
                    finding.bug,
                    finding.function,
                    sites,
                    context
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List runs, optionally only those of one detector.
    pub fn list_scan_runs(&self, bug: Option<&str>) -> DbResult<Vec<ScanRunRecord>> {
        let mut stmt = if bug.is_some() {
            self.conn.prepare(
                r#"
                SELECT id, program, program_hash, bug, description, status,
                       started_at, finished_at, finding_count
                FROM scan_runs
                WHERE bug = ?1
                ORDER BY id
                "#,
            )?
        } else {
            self.conn.prepare(
                r#"
                SELECT id, program, program_hash, bug, description, status,
                       started_at, finished_at, finding_count
                FROM scan_runs
                ORDER BY id
                "#,
            )?
        };

        let rows = if let Some(bug) = bug {
            stmt.query_map(params![bug], map_run)?
        } else {
            stmt.query_map([], map_run)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn scan_run(&self, run_id: i64) -> DbResult<ScanRunRecord> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, program, program_hash, bug, description, status,
                   started_at, finished_at, finding_count
            FROM scan_runs
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![run_id], map_run)?;
        let first = rows.next();
        match first {
            Some(row) => Ok(row?),
            None => Err(DbError::UnknownRun(run_id)),
        }
    }

    /// Findings of a run in the order they were reported.
    pub fn list_findings(&self, run_id: i64) -> DbResult<Vec<Finding>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT bug, function, sites_json, context_json
            FROM findings
            WHERE run_id = ?1
            ORDER BY idx
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (bug, function, sites, context) = row?;
            let sites: Vec<SourceSite> = serde_json::from_str(&sites)?;
            let context: Vec<FindingContext> = serde_json::from_str(&context)?;
            out.push(Finding { bug, function, sites, context });
        }
        Ok(out)
    }
}

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanRunRecord> {
    let status: String = row.get(5)?;
    Ok(ScanRunRecord {
        id: Some(row.get(0)?),
        program: row.get(1)?,
        program_hash: row.get(2)?,
        bug: row.get(3)?,
        description: row.get(4)?,
        status: ScanStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        finding_count: row.get(8)?,
    })
}

/// Bring the schema to [`CURRENT_SCHEMA_VERSION`], tracked in `PRAGMA user_version`.
///
/// Version map:
/// - 0: no schema
/// - 1: scan_runs
/// - 2: findings
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS scan_runs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                program       TEXT NOT NULL,
                program_hash  TEXT,
                bug           TEXT NOT NULL,
                description   TEXT,
                status        TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                finished_at   TEXT,
                finding_count INTEGER NOT NULL DEFAULT 0
            );
            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS findings (
                run_id       INTEGER NOT NULL,
                idx          INTEGER NOT NULL,
                bug          TEXT NOT NULL,
                function     TEXT,
                sites_json   TEXT NOT NULL,
                context_json TEXT NOT NULL,
                PRIMARY KEY(run_id, idx)
            );
            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
