//! User operations

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{normalize_phone, NewUser, User};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))
}

impl Database {
    /// Register a user and seed their default categories
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let name = new_user.name.trim();
        let email = new_user.email.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::InvalidData("Name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(Error::InvalidData(format!("Invalid email: {}", new_user.email)));
        }
        let phone = normalize_phone(&new_user.phone)
            .ok_or_else(|| Error::InvalidData(format!("Invalid phone: {}", new_user.phone)))?;
        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidData(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self.get_user_by_email(&email)?.is_some() {
            return Err(Error::Conflict(format!("Email already registered: {}", email)));
        }
        if self.get_user_by_phone(&phone)?.is_some() {
            return Err(Error::Conflict(format!("Phone already registered: {}", phone)));
        }

        let password_hash = hash_password(&new_user.password)?;

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO users (name, email, phone, password_hash) VALUES (?, ?, ?, ?)",
                params![name, email, phone, password_hash],
            )?;
            conn.last_insert_rowid()
        };

        self.seed_default_categories(id)?;
        info!(user_id = id, "Registered user");

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a user by phone in any common notation (`08…`, `+62…`, `62…`)
    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let Some(phone) = normalize_phone(phone) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE phone = ?", USER_COLUMNS),
                params![phone],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                params![email.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Check credentials; `identifier` is an email or a phone number
    ///
    /// Returns None for unknown users and wrong passwords alike.
    pub fn verify_user_password(&self, identifier: &str, password: &str) -> Result<Option<User>> {
        let user = if identifier.contains('@') {
            self.get_user_by_email(identifier)?
        } else {
            self.get_user_by_phone(identifier)?
        };

        let Some(user) = user else {
            return Ok(None);
        };

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| Error::Auth(format!("Stored password hash is invalid: {}", e)))?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
        {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn update_user_password(&self, user_id: i64, new_password: &str) -> Result<()> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidData(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let password_hash = hash_password(new_password)?;

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            params![password_hash, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }
}
