//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod auth;
pub mod budgets;
pub mod categories;
pub mod debts;
pub mod health;
pub mod reports;
pub mod transactions;
pub mod webhook;

// Re-export all handlers for use in router
pub use auth::*;
pub use budgets::*;
pub use categories::*;
pub use debts::*;
pub use health::*;
pub use reports::*;
pub use transactions::*;
pub use webhook::*;

use chrono::NaiveDate;

use crate::AppError;
use gotek_core::Month;

/// Resolve an optional `YYYY-MM` query value, defaulting to the month of `today`
pub(crate) fn resolve_month(month: Option<&str>, today: NaiveDate) -> Result<Month, AppError> {
    match month {
        Some(s) => s
            .parse()
            .map_err(|_| AppError::bad_request("Invalid month (use YYYY-MM)")),
        None => Ok(Month::of(today)),
    }
}

/// Parse an optional `YYYY-MM-DD` body value
pub(crate) fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
        .transpose()
        .map_err(|_| AppError::bad_request(&format!("Invalid '{}' date format (use YYYY-MM-DD)", field)))
}
