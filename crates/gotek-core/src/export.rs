//! Transaction export
//!
//! CSV export of one user's transactions, optionally limited to a month.
//! Files are written atomically: the CSV lands in a temp file beside the
//! destination and is renamed into place.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::db::Database;
use crate::error::Result;
use crate::models::{Month, TransactionFilter};

/// Options for transaction export
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionExportOptions {
    /// Restrict to a calendar month
    pub month: Option<Month>,
}

/// One CSV row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    date: String,
    kind: &'a str,
    category: &'a str,
    description: &'a str,
    amount: i64,
    payment_method: &'a str,
    source: &'a str,
}

impl Database {
    /// Export a user's transactions as CSV, oldest first
    pub fn export_transactions_csv(
        &self,
        user_id: i64,
        opts: &TransactionExportOptions,
    ) -> Result<String> {
        let filter = TransactionFilter {
            month: opts.month,
            ..Default::default()
        };
        let mut transactions = self.list_transactions(user_id, &filter)?;
        transactions.reverse();

        let mut writer = csv::Writer::from_writer(Vec::new());
        for tx in &transactions {
            writer.serialize(ExportRow {
                date: tx.date.to_string(),
                kind: tx.kind.as_str(),
                category: &tx.category_name,
                description: &tx.description,
                amount: tx.amount,
                payment_method: tx.payment_method.as_deref().unwrap_or(""),
                source: tx.source.as_str(),
            })?;
        }
        // Header row even when there is nothing to export
        if transactions.is_empty() {
            writer.write_record([
                "date",
                "kind",
                "category",
                "description",
                "amount",
                "payment_method",
                "source",
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Write `contents` to `path` via a temp file in the same directory
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
