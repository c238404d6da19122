//! Budget commands

use anyhow::{bail, Context, Result};

use gotek_core::db::Database;
use gotek_core::models::{format_rupiah, TransactionType};
use gotek_core::{parse_smart_amount, BudgetLevel};

use super::{resolve_month, resolve_user, truncate};

pub fn cmd_budget_set(db: &Database, user: &str, category: &str, amount: &str) -> Result<()> {
    let user = resolve_user(db, user)?;
    let Some(amount) = parse_smart_amount(amount) else {
        bail!("Invalid amount: {} (try 1500000, 1,5jt or 750rb)", amount);
    };

    let category = db
        .find_category(user.id, category, TransactionType::Expense)?
        .with_context(|| format!("Expense category not found: {}", category))?;

    let budget = db.upsert_budget(user.id, category.id, amount)?;
    db.log_audit(
        "cli",
        "set",
        Some("budget"),
        Some(budget.id),
        Some(&format!("category={}, amount={}", budget.category_name, budget.amount)),
    )?;

    println!(
        "✅ Budget {}: {} per month",
        budget.category_name,
        format_rupiah(budget.amount)
    );
    Ok(())
}

pub fn cmd_budget_list(db: &Database, user: &str) -> Result<()> {
    let user = resolve_user(db, user)?;
    let budgets = db.list_budgets(user.id)?;

    if budgets.is_empty() {
        println!("No budgets set for {}.", user.name);
        return Ok(());
    }

    println!("{:>4}  {:<24}  {:>15}", "ID", "Category", "Monthly limit");
    println!("{}", "─".repeat(47));
    for budget in budgets {
        println!(
            "{:>4}  {:<24}  {:>15}",
            budget.id,
            truncate(&budget.category_name, 24),
            format_rupiah(budget.amount)
        );
    }
    Ok(())
}

pub fn cmd_budget_status(db: &Database, user: &str, month: Option<&str>) -> Result<()> {
    let user = resolve_user(db, user)?;
    let month = resolve_month(month)?;
    let reports = db.list_budget_statuses(user.id, month)?;

    println!("📊 Budgets for {} - {}", user.name, month.label());
    println!();

    if reports.is_empty() {
        println!("   No budgets set.");
        return Ok(());
    }

    for report in reports {
        let icon = match report.status.level {
            BudgetLevel::Safe => "🟢",
            BudgetLevel::Warning => "🟡",
            BudgetLevel::Exceeded => "🔴",
        };
        println!(
            "   {} {:<24} {:>14} / {:<14} {:>6.1}%",
            icon,
            truncate(&report.budget.category_name, 24),
            format_rupiah(report.status.spent),
            format_rupiah(report.status.limit),
            report.status.percentage
        );
    }
    Ok(())
}
