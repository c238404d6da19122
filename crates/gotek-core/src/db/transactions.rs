//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, ToSql};

use super::{parse_date, parse_datetime, parse_enum, Database};
use crate::error::{Error, Result};
use crate::models::{
    CategoryTotal, Month, MonthlySummary, NewTransaction, Transaction, TransactionFilter,
    TransactionType,
};

const TRANSACTION_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.category_id, c.name, t.kind, t.amount, t.description,
           t.payment_method, t.date, t.source, t.created_at
    FROM transactions t
    JOIN categories c ON c.id = t.category_id
"#;

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(4)?;
    let date: String = row.get(8)?;
    let source: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        category_name: row.get(3)?,
        kind: parse_enum(&kind)?,
        amount: row.get(5)?,
        description: row.get(6)?,
        payment_method: row.get(7)?,
        date: parse_date(&date)?,
        source: parse_enum(&source)?,
        created_at: parse_datetime(&created_at),
    })
}

/// WHERE clause and parameters for a user's filtered transactions
fn filter_clause(user_id: i64, filter: &TransactionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions = vec!["t.user_id = ?".to_string()];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id)];

    if let Some(month) = filter.month {
        conditions.push("t.date BETWEEN ? AND ?".to_string());
        params.push(Box::new(month.first_day().to_string()));
        params.push(Box::new(month.last_day().to_string()));
    }
    if let Some(kind) = filter.kind {
        conditions.push("t.kind = ?".to_string());
        params.push(Box::new(kind.as_str()));
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("t.category_id = ?".to_string());
        params.push(Box::new(category_id));
    }

    (format!("WHERE {}", conditions.join(" AND ")), params)
}

impl Database {
    /// Store a transaction for a user
    ///
    /// The category must belong to the user and match the transaction kind.
    pub fn insert_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<Transaction> {
        if tx.amount <= 0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                tx.amount
            )));
        }

        let category = self
            .get_category(user_id, tx.category_id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", tx.category_id)))?;
        if category.kind != tx.kind {
            return Err(Error::InvalidData(format!(
                "Category {} is for {} transactions",
                category.name, category.kind
            )));
        }

        let description = tx.description.trim();
        let description = if description.is_empty() {
            category.name.as_str()
        } else {
            description
        };

        let id = {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO transactions (user_id, category_id, kind, amount, description, payment_method, date, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    tx.category_id,
                    tx.kind.as_str(),
                    tx.amount,
                    description,
                    tx.payment_method,
                    tx.date.to_string(),
                    tx.source.as_str(),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get_transaction(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    pub fn get_transaction(&self, user_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("{} WHERE t.id = ? AND t.user_id = ?", TRANSACTION_SELECT),
                params![id, user_id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List transactions newest first; a limit of 0 returns everything
    pub fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let (where_clause, mut params) = filter_clause(user_id, filter);

        let limit = if filter.limit > 0 { filter.limit } else { -1 };
        params.push(Box::new(limit));
        params.push(Box::new(filter.offset.max(0)));

        let sql = format!(
            "{} {} ORDER BY t.date DESC, t.id DESC LIMIT ? OFFSET ?",
            TRANSACTION_SELECT, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_from_iter(params.iter()), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Count transactions matching a filter (ignores limit/offset)
    pub fn count_transactions(&self, user_id: i64, filter: &TransactionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let (where_clause, params) = filter_clause(user_id, filter);
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM transactions t {}", where_clause),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_transaction(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    /// Delete the most recently recorded transaction ("undo")
    pub fn delete_last_transaction(&self, user_id: i64) -> Result<Option<Transaction>> {
        let last = {
            let conn = self.conn()?;
            conn.query_row(
                &format!(
                    "{} WHERE t.user_id = ? ORDER BY t.id DESC LIMIT 1",
                    TRANSACTION_SELECT
                ),
                params![user_id],
                row_to_transaction,
            )
            .optional()?
        };

        if let Some(tx) = &last {
            self.delete_transaction(user_id, tx.id)?;
        }
        Ok(last)
    }

    /// Total expenses in a category between two dates (inclusive)
    pub fn expense_total(
        &self,
        user_id: i64,
        category_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let total = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = ? AND category_id = ? AND kind = 'expense' AND date BETWEEN ? AND ?
            "#,
            params![user_id, category_id, from.to_string(), to.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Income, expense and per-category totals for one month
    pub fn monthly_summary(&self, user_id: i64, month: Month) -> Result<MonthlySummary> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.category_id, c.name, t.kind, SUM(t.amount), COUNT(*)
            FROM transactions t
            JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = ? AND t.date BETWEEN ? AND ?
            GROUP BY t.category_id, c.name, t.kind
            ORDER BY SUM(t.amount) DESC
            "#,
        )?;

        let by_category = stmt
            .query_map(
                params![
                    user_id,
                    month.first_day().to_string(),
                    month.last_day().to_string()
                ],
                |row| {
                    let kind: String = row.get(2)?;
                    Ok(CategoryTotal {
                        category_id: row.get(0)?,
                        category_name: row.get(1)?,
                        kind: parse_enum(&kind)?,
                        total: row.get(3)?,
                        count: row.get(4)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let sum_of = |kind: TransactionType| -> i64 {
            by_category
                .iter()
                .filter(|c| c.kind == kind)
                .map(|c| c.total)
                .sum()
        };
        let income = sum_of(TransactionType::Income);
        let expense = sum_of(TransactionType::Expense);

        Ok(MonthlySummary {
            month,
            income,
            expense,
            balance: income - expense,
            by_category,
        })
    }
}
