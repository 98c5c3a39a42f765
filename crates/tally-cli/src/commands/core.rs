//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database and seed system categories
//! - `cmd_migrate` - Run migrations explicitly
//! - `cmd_status` - Show database status

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::db::Database;

/// Open (or create) the database at the given path
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    Database::open(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;

    db.seed_system_categories()
        .context("Failed to seed system categories")?;
    println!("   Seeded system expense categories");

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Set TALLY_AUTH_URL and TALLY_AUTH_KEY for the identity provider");
    println!("  2. Start the API server: tally serve");

    Ok(())
}

pub fn cmd_migrate(db_path: &Path) -> Result<()> {
    println!("🔧 Running migrations on {}...", db_path.display());

    // Opening already brings the schema up to date; run once more so the
    // explicit command is recorded in the run history.
    let db = open_db(db_path)?;
    let runs = db.run_migrations().context("Migration run failed")?;

    println!("✅ Migrations completed ({} total runs recorded)", runs);

    Ok(())
}

pub fn cmd_status(db_path: &Path) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }

        match open_db(db_path) {
            Ok(db) => {
                if let Ok(stats) = db.stats() {
                    println!();
                    println!("   Users: {}", stats.users);
                    println!("   Expenses: {}", stats.expenses);
                    println!("   Categories: {}", stats.categories);
                    println!("   Groups: {}", stats.groups);
                    println!("   Migration runs: {}", stats.migration_runs);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    println!();
    Ok(())
}
