//! SQLite connection holding the host's credential, token and session tables.
//!
//! Secret columns are sealed by [`crate::crypto`] before they are written;
//! the database itself is plain SQLite.
//!
//! Schema changes live in `migrations/NNN_name.sql` and are listed in
//! [`MIGRATIONS`]. Each one runs once inside its own transaction and is
//! recorded in `schema_migrations`.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, error, info};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: include_str!("migrations/001_initial.sql"),
}];

/// Concurrent CLI invocations share one file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        debug!(path = %path.display(), "[Database] Opened");
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("[Database] Opened in memory");
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        let applied = db.migrate()?;
        if applied > 0 {
            info!(applied, version = db.schema_version(), "[Database] Schema updated");
        }
        Ok(db)
    }

    /// Apply pending migrations, returning how many ran.
    fn migrate(&self) -> Result<usize> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
        )?;

        let current = self.schema_version();
        let mut applied = 0;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql).map_err(|e| {
                error!(version = migration.version, error = %e, "[Database] Migration failed");
                anyhow!("Migration {:03}_{} failed: {}", migration.version, migration.name, e)
            })?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, datetime('now'))",
                params![migration.version, migration.name],
            )?;
            tx.commit()?;

            debug!(version = migration.version, name = migration.name, "[Database] Migration applied");
            applied += 1;
        }
        Ok(applied)
    }

    /// Highest applied migration, 0 for an empty database.
    pub fn schema_version(&self) -> i64 {
        self.conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
