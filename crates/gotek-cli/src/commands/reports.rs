//! Summary, export and audit commands

use std::path::Path;

use anyhow::{Context, Result};

use gotek_core::db::Database;
use gotek_core::models::{format_rupiah, TransactionType};
use gotek_core::{write_atomic, TransactionExportOptions};

use super::{resolve_month, resolve_user, truncate};

pub fn cmd_summary(db: &Database, user: &str, month: Option<&str>) -> Result<()> {
    let user = resolve_user(db, user)?;
    let month = resolve_month(month)?;
    let summary = db.monthly_summary(user.id, month)?;

    println!("📒 {} - {}", user.name, month.label());
    println!("   ─────────────────────────────");
    println!("   Pemasukan:   {:>16}", format_rupiah(summary.income));
    println!("   Pengeluaran: {:>16}", format_rupiah(summary.expense));
    println!("   Saldo:       {:>16}", format_rupiah(summary.balance));

    for kind in [TransactionType::Expense, TransactionType::Income] {
        let rows: Vec<_> = summary
            .by_category
            .iter()
            .filter(|c| c.kind == kind)
            .collect();
        if rows.is_empty() {
            continue;
        }
        println!();
        println!("   {}:", kind.label());
        for row in rows {
            println!(
                "   {:<24} {:>16}  ({}x)",
                truncate(&row.category_name, 24),
                format_rupiah(row.total),
                row.count
            );
        }
    }
    Ok(())
}

pub fn cmd_export(
    db: &Database,
    user: &str,
    output: Option<&Path>,
    month: Option<&str>,
) -> Result<()> {
    let user = resolve_user(db, user)?;
    let month = month.map(|m| resolve_month(Some(m))).transpose()?;

    let csv = db
        .export_transactions_csv(user.id, &TransactionExportOptions { month })
        .context("Failed to export transactions")?;
    let rows = csv.lines().count().saturating_sub(1);

    db.log_audit(
        "cli",
        "export",
        Some("transaction"),
        None,
        Some(&format!("user_id={}, rows={}", user.id, rows)),
    )?;

    match output {
        Some(path) => {
            write_atomic(path, &csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Exported {} transaction(s) to {}", rows, path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit.max(1))?;

    if entries.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }

    for entry in entries {
        let target = match (&entry.entity_type, entry.entity_id) {
            (Some(kind), Some(id)) => format!("{} #{}", kind, id),
            (Some(kind), None) => kind.clone(),
            _ => "-".to_string(),
        };
        println!(
            "{}  {:<12}  {:<10}  {:<16}  {}",
            entry.timestamp,
            truncate(&entry.actor, 12),
            entry.action,
            target,
            entry.details.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
