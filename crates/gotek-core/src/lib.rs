//! GoTEK Core Library
//!
//! Shared functionality for the GoTEK WhatsApp finance tracker:
//! - Rule-based parsing of chat messages (amounts, tags, debts, commands)
//! - Monthly budget threshold evaluation
//! - Database access (SQLCipher-encrypted SQLite)
//! - Generative AI fallback (Gemini, Qwen, mock) with a prompt library
//! - Conversation engine that turns messages into records and replies
//! - WhatsApp Cloud API client and webhook types
//! - CSV export

pub mod ai;
pub mod bot;
pub mod budget;
pub mod db;
pub mod error;
pub mod export;
pub mod messaging;
pub mod models;
pub mod parser;
pub mod prompts;

/// Test utilities including mock AI and WhatsApp servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, AIExtraction, ExtractionKind, GeminiBackend, MockBackend,
    OpenAICompatibleBackend,
};
pub use bot::{Bot, BotAction, BotReply, RecordedTransaction};
pub use budget::{budget_alert_message, check_budget_status, BudgetLevel, BudgetReport, BudgetStatus};
pub use db::Database;
pub use error::{Error, Result};
pub use export::{write_atomic, TransactionExportOptions};
pub use messaging::{verify_signature, MessageSender, Messenger, RecordingSender, WhatsAppClient};
pub use models::{AuditEntry, Month};
pub use parser::{
    parse_command, parse_debt_message, parse_smart_amount, parse_transaction_message, Command,
    ParsedDebt, ParsedTransaction,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
