//! User commands

use anyhow::{Context, Result};

use gotek_core::db::Database;
use gotek_core::models::NewUser;

use super::truncate;

pub fn cmd_users_add(
    db: &Database,
    name: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> Result<()> {
    let user = db
        .create_user(&NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password: password.to_string(),
        })
        .context("Failed to register user")?;

    db.log_audit("cli", "register", Some("user"), Some(user.id), None)?;

    println!("✅ Registered {} (ID: {})", user.name, user.id);
    println!("   Email: {}", user.email);
    println!("   WhatsApp: +{}", user.phone);
    println!("   Default categories created");

    Ok(())
}

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Add one with: gotek users add --name .. --email .. --phone ..");
        return Ok(());
    }

    println!("{:>4}  {:<24}  {:<28}  {:<15}", "ID", "Name", "Email", "WhatsApp");
    println!("{}", "─".repeat(77));
    for user in users {
        println!(
            "{:>4}  {:<24}  {:<28}  +{:<14}",
            user.id,
            truncate(&user.name, 24),
            truncate(&user.email, 28),
            user.phone
        );
    }

    Ok(())
}
