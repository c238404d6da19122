//! Category operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, parse_enum, Database};
use crate::error::{Error, Result};
use crate::models::{
    Category, TransactionType, DEFAULT_EXPENSE_CATEGORIES, DEFAULT_INCOME_CATEGORIES,
};

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    let kind: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_enum(&kind)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// List a user's categories, optionally restricted to one kind
    pub fn list_categories(
        &self,
        user_id: i64,
        kind: Option<TransactionType>,
    ) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, kind, created_at
            FROM categories
            WHERE user_id = ?1 AND (?2 IS NULL OR kind = ?2)
            ORDER BY kind, name
            "#,
        )?;
        let categories = stmt
            .query_map(params![user_id, kind.map(|k| k.as_str())], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_category(&self, user_id: i64, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, user_id, name, kind, created_at FROM categories WHERE id = ? AND user_id = ?",
                params![id, user_id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Find a category by name (case-insensitive)
    pub fn find_category(
        &self,
        user_id: i64,
        name: &str,
        kind: TransactionType,
    ) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                r#"
                SELECT id, user_id, name, kind, created_at
                FROM categories
                WHERE user_id = ? AND name = ? AND kind = ?
                "#,
                params![user_id, name.trim(), kind.as_str()],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Create a category, failing with Conflict if the name is taken
    pub fn create_category(
        &self,
        user_id: i64,
        name: &str,
        kind: TransactionType,
    ) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name is required".to_string()));
        }
        if self.find_category(user_id, name, kind)?.is_some() {
            return Err(Error::Conflict(format!("Category already exists: {}", name)));
        }

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO categories (user_id, name, kind) VALUES (?, ?, ?)",
                params![user_id, name, kind.as_str()],
            )?;
            conn.last_insert_rowid()
        };

        self.get_category(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    /// Resolve a tagged category name, creating it when the user has none
    pub fn find_or_create_category(
        &self,
        user_id: i64,
        name: &str,
        kind: TransactionType,
    ) -> Result<Category> {
        match self.find_category(user_id, name, kind)? {
            Some(category) => Ok(category),
            None => self.create_category(user_id, name, kind),
        }
    }

    /// Delete a category; refused while transactions still use it
    pub fn delete_category(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;

        let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ? AND user_id = ?",
            params![id, user_id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Category is used by {} transaction(s)",
                in_use
            )));
        }

        let deleted = conn.execute(
            "DELETE FROM categories WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        Ok(())
    }

    /// Give a user the standard Indonesian category set (idempotent)
    pub fn seed_default_categories(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let seeds = DEFAULT_EXPENSE_CATEGORIES
            .iter()
            .map(|name| (*name, TransactionType::Expense))
            .chain(
                DEFAULT_INCOME_CATEGORIES
                    .iter()
                    .map(|name| (*name, TransactionType::Income)),
            );

        for (name, kind) in seeds {
            conn.execute(
                "INSERT OR IGNORE INTO categories (user_id, name, kind) VALUES (?, ?, ?)",
                params![user_id, name, kind.as_str()],
            )?;
        }
        Ok(())
    }
}
