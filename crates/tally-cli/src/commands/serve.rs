//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::provider::{AuthProvider, AUTH_KEY_ENV, AUTH_URL_ENV};
use tally_server::{ServerConfig, ADMIN_KEY_ENV};

use super::open_db;

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16) -> Result<()> {
    println!("🚀 Starting Tally API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let provider = AuthProvider::from_env().with_context(|| {
        format!(
            "Identity provider not configured - set {} and {}",
            AUTH_URL_ENV, AUTH_KEY_ENV
        )
    })?;
    println!("   Identity provider: {}", provider.base_url());

    let config = ServerConfig::from_env();

    if config.admin_api_key.is_some() {
        println!("   🔑 Admin API key: configured ({})", ADMIN_KEY_ENV);
    } else {
        println!("   ⚠️  Admin API key: NOT SET - admin endpoints disabled");
    }

    let enabled: Vec<&str> = config
        .oauth
        .providers()
        .into_iter()
        .filter(|(_, configured)| *configured)
        .map(|(name, _)| name)
        .collect();
    if enabled.is_empty() {
        println!("   OAuth providers: none configured");
    } else {
        println!("   OAuth providers: {}", enabled.join(", "));
    }

    if !config.allowed_origins.is_empty() {
        println!("   CORS origins: {}", config.allowed_origins.join(", "));
    }

    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;

    // Ensure system categories are seeded (idempotent)
    db.seed_system_categories()
        .context("Failed to seed system categories")?;

    tally_server::serve(db, provider, host, port, config).await?;

    Ok(())
}
