//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// GoTEK - Track money by chatting on WhatsApp
#[derive(Parser)]
#[command(name = "gotek")]
#[command(about = "WhatsApp personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "gotek.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set GOTEK_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the API and WhatsApp webhook server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Send the session cookie without `Secure` (plain-HTTP local development only)
        #[arg(long)]
        insecure_cookie: bool,

        /// Directory containing static files to serve (e.g., a dashboard build)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Show how a chat message would be read, without storing anything
    Parse {
        /// The message, e.g. "-25rb kopi @Makanan & Minuman #GoPay"
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage monthly category budgets
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Manage debts and receivables
    Debts {
        #[command(subcommand)]
        action: DebtsAction,
    },

    /// Show income, expense and balance for a month
    Summary {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Month (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Export transactions to CSV
    Export {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Output file (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only this month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Send a message to the configured AI backend and show the extraction
    AiTest {
        /// The free-text message to extract
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Register a user (their WhatsApp number becomes their bot identity)
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// WhatsApp number (08…, +62… or 62…)
        #[arg(long)]
        phone: String,

        /// Password (reads GOTEK_USER_PASSWORD if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// List registered users
    List,
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// Set a monthly limit for an expense category
    Set {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Expense category name
        #[arg(short, long)]
        category: String,

        /// Amount, e.g. 1500000, 1,5jt or 750rb
        amount: String,
    },

    /// List monthly limits
    List {
        /// User email or phone
        #[arg(short, long)]
        user: String,
    },

    /// Show spending against every budget for a month
    Status {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Month (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DebtsAction {
    /// List debts and receivables
    List {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Filter by status: unpaid or paid
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Mark a debt as paid
    Pay {
        /// User email or phone
        #[arg(short, long)]
        user: String,

        /// Debt ID
        id: i64,
    },
}
