//! Debt (hutang/piutang) operations

use chrono::{Days, NaiveDate};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date, parse_datetime, parse_enum, Database};
use crate::error::{Error, Result};
use crate::models::{Debt, DebtReminder, DebtStatus, NewDebt};

/// Upper bound on the reminder look-ahead window
const MAX_LEAD_DAYS: i64 = 36_500;

const DEBT_COLUMNS: &str = "d.id, d.user_id, d.kind, d.counterparty, d.amount, d.description, \
    d.due_date, d.status, d.paid_at, d.reminded_at, d.created_at";

fn row_to_debt(row: &Row<'_>) -> rusqlite::Result<Debt> {
    let kind: String = row.get(2)?;
    let due_date: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let paid_at: Option<String> = row.get(8)?;
    let reminded_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    Ok(Debt {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: parse_enum(&kind)?,
        counterparty: row.get(3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        due_date: due_date.as_deref().map(parse_date).transpose()?,
        status: parse_enum(&status)?,
        paid_at: paid_at.as_deref().map(parse_datetime),
        reminded_at: reminded_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    pub fn insert_debt(&self, user_id: i64, debt: &NewDebt) -> Result<Debt> {
        if debt.amount <= 0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                debt.amount
            )));
        }
        let counterparty = debt.counterparty.trim();
        if counterparty.is_empty() {
            return Err(Error::InvalidData("Counterparty is required".to_string()));
        }
        let description = debt.description.trim();
        let description = if description.is_empty() {
            debt.kind.label()
        } else {
            description
        };

        let id = {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO debts (user_id, kind, counterparty, amount, description, due_date)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    debt.kind.as_str(),
                    counterparty,
                    debt.amount,
                    description,
                    debt.due_date.map(|d| d.to_string()),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get_debt(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Debt {}", id)))
    }

    pub fn get_debt(&self, user_id: i64, id: i64) -> Result<Option<Debt>> {
        let conn = self.conn()?;
        let debt = conn
            .query_row(
                &format!(
                    "SELECT {} FROM debts d WHERE d.id = ? AND d.user_id = ?",
                    DEBT_COLUMNS
                ),
                params![id, user_id],
                row_to_debt,
            )
            .optional()?;
        Ok(debt)
    }

    /// List debts, soonest due first (undated last)
    pub fn list_debts(&self, user_id: i64, status: Option<DebtStatus>) -> Result<Vec<Debt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM debts d
            WHERE d.user_id = ?1 AND (?2 IS NULL OR d.status = ?2)
            ORDER BY d.due_date IS NULL, d.due_date, d.id
            "#,
            DEBT_COLUMNS
        ))?;
        let debts = stmt
            .query_map(params![user_id, status.map(|s| s.as_str())], row_to_debt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(debts)
    }

    /// Settle a debt; paying an already-paid debt is a conflict
    pub fn mark_debt_paid(&self, user_id: i64, id: i64) -> Result<Debt> {
        let debt = self
            .get_debt(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Debt {}", id)))?;
        if debt.status == DebtStatus::Paid {
            return Err(Error::Conflict(format!("Debt {} is already paid", id)));
        }

        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE debts SET status = 'paid', paid_at = datetime('now') WHERE id = ? AND user_id = ?",
                params![id, user_id],
            )?;
        }

        self.get_debt(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Debt {}", id)))
    }

    pub fn delete_debt(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM debts WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Debt {}", id)));
        }
        Ok(())
    }

    /// Unpaid, not yet reminded debts due on or before `today + lead_days`
    ///
    /// Overdue debts are included so a reminder still goes out after downtime.
    pub fn debts_due_for_reminder(
        &self,
        today: NaiveDate,
        lead_days: i64,
    ) -> Result<Vec<DebtReminder>> {
        let lead = Days::new(lead_days.clamp(0, MAX_LEAD_DAYS).unsigned_abs());
        let horizon = today.checked_add_days(lead).unwrap_or(today);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}, u.phone
            FROM debts d
            JOIN users u ON u.id = d.user_id
            WHERE d.status = 'unpaid'
              AND d.due_date IS NOT NULL
              AND d.due_date <= ?
              AND d.reminded_at IS NULL
            ORDER BY d.due_date, d.id
            "#,
            DEBT_COLUMNS
        ))?;
        let reminders = stmt
            .query_map(params![horizon.to_string()], |row| {
                Ok(DebtReminder {
                    debt: row_to_debt(row)?,
                    phone: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    pub fn mark_debt_reminded(&self, debt_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE debts SET reminded_at = datetime('now') WHERE id = ?",
            params![debt_id],
        )?;
        Ok(())
    }
}
