//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Find a user by email or phone
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use gotek_core::db::Database;
use gotek_core::models::{Month, User};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Find a user by email (contains `@`) or WhatsApp number
pub fn resolve_user(db: &Database, identifier: &str) -> Result<User> {
    let identifier = identifier.trim();
    let user = if identifier.contains('@') {
        db.get_user_by_email(&identifier.to_lowercase())?
    } else {
        db.get_user_by_phone(identifier)?
    };
    match user {
        Some(user) => Ok(user),
        None => bail!("User not found: {}", identifier),
    }
}

/// Parse an optional `YYYY-MM`, defaulting to the current month
pub fn resolve_month(month: Option<&str>) -> Result<Month> {
    match month {
        Some(s) => s.parse().map_err(|e: String| anyhow::anyhow!(e)),
        None => Ok(Month::current()),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Register a user: gotek users add --name Budi --email budi@example.com --phone 0812...");
    println!("  2. Start the webhook server: gotek serve");

    Ok(())
}
