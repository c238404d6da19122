//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, resolve_user, resolve_month)
//! - `ai` - AI backend test
//! - `budget` - Monthly budget commands (set, list, status)
//! - `debts` - Debt commands (list, pay)
//! - `parse` - Dry-run message parsing
//! - `reports` - Summary, CSV export and audit log
//! - `serve` - Web server command
//! - `users` - User registration and listing

pub mod ai;
pub mod budget;
pub mod core;
pub mod debts;
pub mod parse;
pub mod reports;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use ai::*;
pub use budget::*;
pub use self::core::*;
pub use debts::*;
pub use parse::*;
pub use reports::*;
pub use serve::*;
pub use users::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
