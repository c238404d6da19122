//! GoTEK CLI - WhatsApp personal finance tracker
//!
//! Usage:
//!   gotek init                              Initialize database
//!   gotek users add --name .. --phone ..    Register a user
//!   gotek parse "-25rb kopi @Makanan"       Preview how a message is read
//!   gotek serve --port 3000                 Start API and webhook server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            insecure_cookie,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                insecure_cookie,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
        Commands::Parse { message } => commands::cmd_parse(&message.join(" ")),
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                UsersAction::Add {
                    name,
                    email,
                    phone,
                    password,
                } => {
                    let password = password
                        .or_else(|| std::env::var("GOTEK_USER_PASSWORD").ok())
                        .ok_or_else(|| {
                            anyhow::anyhow!("Pass --password or set GOTEK_USER_PASSWORD")
                        })?;
                    commands::cmd_users_add(&db, &name, &email, &phone, &password)
                }
                UsersAction::List => commands::cmd_users_list(&db),
            }
        }
        Commands::Budget { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                BudgetAction::Set {
                    user,
                    category,
                    amount,
                } => commands::cmd_budget_set(&db, &user, &category, &amount),
                BudgetAction::List { user } => commands::cmd_budget_list(&db, &user),
                BudgetAction::Status { user, month } => {
                    commands::cmd_budget_status(&db, &user, month.as_deref())
                }
            }
        }
        Commands::Debts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                DebtsAction::List { user, status } => {
                    commands::cmd_debts_list(&db, &user, status.as_deref())
                }
                DebtsAction::Pay { user, id } => commands::cmd_debts_pay(&db, &user, id),
            }
        }
        Commands::Summary { user, month } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_summary(&db, &user, month.as_deref())
        }
        Commands::Export {
            user,
            output,
            month,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_export(&db, &user, output.as_deref(), month.as_deref())
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
        Commands::AiTest { message } => commands::cmd_ai_test(&message.join(" ")).await,
    }
}
