//! Budget operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::budget::{check_budget_status, BudgetReport, BudgetStatus};
use crate::error::{Error, Result};
use crate::models::{Budget, Month, TransactionType};

const BUDGET_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.category_id, c.name, b.amount, b.created_at
    FROM budgets b
    JOIN categories c ON c.id = b.category_id
"#;

fn row_to_budget(row: &Row<'_>) -> rusqlite::Result<Budget> {
    let created_at: String = row.get(5)?;
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        category_name: row.get(3)?,
        amount: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Set the monthly limit for an expense category (replaces any existing one)
    pub fn upsert_budget(&self, user_id: i64, category_id: i64, amount: i64) -> Result<Budget> {
        if amount <= 0 {
            return Err(Error::InvalidData(format!(
                "Budget must be positive, got {}",
                amount
            )));
        }
        let category = self
            .get_category(user_id, category_id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", category_id)))?;
        if category.kind != TransactionType::Expense {
            return Err(Error::InvalidData(format!(
                "Budgets apply to expense categories, {} is income",
                category.name
            )));
        }

        {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO budgets (user_id, category_id, amount) VALUES (?, ?, ?)
                ON CONFLICT(user_id, category_id) DO UPDATE SET amount = excluded.amount
                "#,
                params![user_id, category_id, amount],
            )?;
        }

        self.get_budget_for_category(user_id, category_id)?
            .ok_or_else(|| Error::NotFound(format!("Budget for category {}", category_id)))
    }

    pub fn get_budget_for_category(&self, user_id: i64, category_id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let budget = conn
            .query_row(
                &format!("{} WHERE b.user_id = ? AND b.category_id = ?", BUDGET_SELECT),
                params![user_id, category_id],
                row_to_budget,
            )
            .optional()?;
        Ok(budget)
    }

    pub fn delete_budget(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM budgets WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Budget {}", id)));
        }
        Ok(())
    }

    pub fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE b.user_id = ? ORDER BY c.name",
            BUDGET_SELECT
        ))?;
        let budgets = stmt
            .query_map(params![user_id], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    /// Every budget of a user evaluated against that month's spending
    pub fn list_budget_statuses(&self, user_id: i64, month: Month) -> Result<Vec<BudgetReport>> {
        self.list_budgets(user_id)?
            .into_iter()
            .map(|budget| {
                let spent = self.expense_total(
                    user_id,
                    budget.category_id,
                    month.first_day(),
                    month.last_day(),
                )?;
                let status = check_budget_status(spent, budget.amount);
                Ok(BudgetReport {
                    budget,
                    month,
                    status,
                })
            })
            .collect()
    }

    /// Evaluate a category's budget for the calendar month containing `on`
    ///
    /// Returns None when the category has no budget.
    pub fn check_budget_status(
        &self,
        user_id: i64,
        category_id: i64,
        on: NaiveDate,
    ) -> Result<Option<BudgetStatus>> {
        let Some(budget) = self.get_budget_for_category(user_id, category_id)? else {
            return Ok(None);
        };
        let month = Month::of(on);
        let spent = self.expense_total(user_id, category_id, month.first_day(), month.last_day())?;
        Ok(Some(check_budget_status(spent, budget.amount)))
    }
}
