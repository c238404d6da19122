//! Debt commands

use anyhow::Result;

use gotek_core::db::Database;
use gotek_core::models::{format_rupiah, DebtStatus};

use super::{resolve_user, truncate};

pub fn cmd_debts_list(db: &Database, user: &str, status: Option<&str>) -> Result<()> {
    let user = resolve_user(db, user)?;
    let status = status
        .map(str::parse::<DebtStatus>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let debts = db.list_debts(user.id, status)?;

    if debts.is_empty() {
        println!("No debts recorded.");
        return Ok(());
    }

    println!(
        "{:>4}  {:<8}  {:<20}  {:>14}  {:<10}  {:<6}  {}",
        "ID", "Kind", "Counterparty", "Amount", "Due", "Status", "Description"
    );
    println!("{}", "─".repeat(90));
    for debt in debts {
        println!(
            "{:>4}  {:<8}  {:<20}  {:>14}  {:<10}  {:<6}  {}",
            debt.id,
            debt.kind.label(),
            truncate(&debt.counterparty, 20),
            format_rupiah(debt.amount),
            debt.due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            debt.status.as_str(),
            truncate(&debt.description, 30)
        );
    }
    Ok(())
}

pub fn cmd_debts_pay(db: &Database, user: &str, id: i64) -> Result<()> {
    let user = resolve_user(db, user)?;
    let debt = db.mark_debt_paid(user.id, id)?;
    db.log_audit("cli", "pay", Some("debt"), Some(id), None)?;

    println!(
        "✅ {} {} {} marked as paid",
        debt.kind.label(),
        debt.counterparty,
        format_rupiah(debt.amount)
    );
    Ok(())
}
