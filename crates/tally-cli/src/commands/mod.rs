//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, migrate, status) and shared utilities (open_db)
//! - `serve` - Web server command

pub mod core;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use serve::*;
