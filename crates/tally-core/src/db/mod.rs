//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Mirrored provider users
//! - `categories` - Hierarchical expense categories and visibility
//! - `expenses` - Expense CRUD and paginated listing
//! - `groups` - Expense-sharing groups, membership, join codes

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod categories;
mod expenses;
mod groups;
mod users;

pub use expenses::ExpenseListFilter;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database at `path` and bring the schema up to date
    pub fn open(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/tally_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::open(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    ///
    /// Idempotent: the batch only creates what is missing. Each invocation is
    /// recorded in `migration_runs` so the admin endpoint can surface run
    /// history and tests can observe runner invocations.
    pub fn run_migrations(&self) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Users mirrored from the identity provider
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT,
                confirmed INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Expense categories (hierarchical via parent_id)
            CREATE TABLE IF NOT EXISTS expense_categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id INTEGER REFERENCES expense_categories(id),
                is_system INTEGER NOT NULL DEFAULT 0,
                is_public INTEGER NOT NULL DEFAULT 0,
                -- Provider user id; no FK because the local mirror may lag
                user_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_categories_parent ON expense_categories(parent_id);
            CREATE INDEX IF NOT EXISTS idx_categories_user ON expense_categories(user_id);

            -- Expense-sharing groups
            CREATE TABLE IF NOT EXISTS expense_groups (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                join_code TEXT NOT NULL UNIQUE,
                created_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS group_members (
                group_id INTEGER NOT NULL REFERENCES expense_groups(id),
                user_id TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                joined_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(group_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);

            -- Expenses
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                group_id INTEGER REFERENCES expense_groups(id),
                category_id INTEGER REFERENCES expense_categories(id),
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                expense_date DATE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_user ON expenses(user_id);
            CREATE INDEX IF NOT EXISTS idx_expenses_group ON expenses(group_id);
            CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category_id);

            -- Migration runner invocation history
            CREATE TABLE IF NOT EXISTS migration_runs (
                id INTEGER PRIMARY KEY,
                ran_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        conn.execute("INSERT INTO migration_runs DEFAULT VALUES", [])?;
        let runs: i64 = conn.query_row("SELECT COUNT(*) FROM migration_runs", [], |row| {
            row.get(0)
        })?;

        info!(runs, "Database migrations applied");
        Ok(runs)
    }

    /// Number of times the migration runner has been invoked on this database
    pub fn migration_run_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM migration_runs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Row counts across the main tables, for the CLI status output
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?)
        };

        Ok(DbStats {
            users: count("users")?,
            expenses: count("expenses")?,
            categories: count("expense_categories")?,
            groups: count("expense_groups")?,
            migration_runs: count("migration_runs")?,
        })
    }
}

/// Summary row counts for the status command
#[derive(Debug, Clone, Copy)]
pub struct DbStats {
    pub users: i64,
    pub expenses: i64,
    pub categories: i64,
    pub groups: i64,
    pub migration_runs: i64,
}
