/// Store connection management with connection pooling
///
/// Provides a thread-safe connection pool to the SQLite store, plus the
/// recovery path for a corrupt store file: the broken file is moved aside
/// and a fresh schema is initialized, and the loss is reported to the
/// caller instead of crashing.

use crate::error::{ProjdexError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Maximum number of database connections in the pool
const MAX_CONNECTIONS: u32 = 5;

/// Store wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
    recovered: bool,
}

impl Database {
    /// Create a new store instance
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    ///
    /// # Returns
    /// * `Ok(Database)` - Successfully opened (or freshly re-initialized) store
    /// * `Err(ProjdexError)` - If connection fails and recovery is impossible
    ///
    /// If the existing file is unreadable or corrupt, it is renamed to
    /// `<file>.corrupt` and a fresh schema is initialized in its place.
    /// `recovered_from_corruption()` reports when that happened.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match Self::open(&db_path).await {
            Ok(db) => Ok(db),
            Err(ProjdexError::Store(e)) if db_path.exists() => {
                let backup = PathBuf::from(format!("{}.corrupt", db_path.display()));
                tracing::warn!(
                    store = %db_path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "store unreadable, moving it aside and starting fresh"
                );
                std::fs::rename(&db_path, &backup)?;

                let mut db = Self::open(&db_path).await?;
                db.recovered = true;
                Ok(db)
            }
            Err(e) => Err(e),
        }
    }

    /// Open the pool against a path and initialize the schema
    async fn open(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
            recovered: false,
        };

        db.integrity_check().await?;
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Create a test store in memory
    ///
    /// Used for testing. Creates a fresh database for each test.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single connection: each in-memory connection is its own database,
        // so the pool must not hand out a second one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path: PathBuf::from(":memory:"),
            recovered: false,
        };

        db.initialize_schema().await?;

        Ok(db)
    }

    /// Fail early when SQLite reports the file as damaged
    async fn integrity_check(&self) -> Result<()> {
        let row = sqlx::query("PRAGMA quick_check")
            .fetch_one(self.pool.as_ref())
            .await?;

        let verdict: String = row.get(0);
        if verdict == "ok" {
            Ok(())
        } else {
            Err(ProjdexError::Store(sqlx::Error::Protocol(format!(
                "integrity check failed: {}",
                verdict
            ))))
        }
    }

    /// Initialize database schema
    ///
    /// Creates all required tables and indexes if they don't exist.
    async fn initialize_schema(&self) -> Result<()> {
        // Read schema file
        let schema = include_str!("../../database/schema.sql");

        // Execute schema SQL
        // Note: SQLite doesn't support multiple statements in execute,
        // so we need to split and execute each statement
        for statement in schema.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(self.pool.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Get reference to the connection pool
    ///
    /// Used internally by query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether opening this store required throwing away a corrupt file
    pub fn recovered_from_corruption(&self) -> bool {
        self.recovered
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get store statistics
    ///
    /// Returns information about the store for debugging.
    pub async fn stats(&self) -> Result<StoreStats> {
        let project_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(self.pool.as_ref())
            .await?;

        let present_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM projects WHERE present = 1")
                .fetch_one(self.pool.as_ref())
                .await?;

        let command_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM custom_commands")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(StoreStats {
            total_projects: project_count.0,
            present_projects: present_count.0,
            total_commands: command_count.0,
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        })
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_projects: i64,
    pub present_projects: i64,
    pub total_commands: i64,
    pub pool_size: u32,
    pub idle_connections: usize,
}
