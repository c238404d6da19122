//! Dry-run message parsing

use anyhow::Result;
use serde_json::{json, Value};

use gotek_core::parser::{looks_like_debt, parse_command, parse_debt_message};
use gotek_core::parse_transaction_message;

/// How the bot would read a message, as JSON
///
/// Mirrors the bot's order: commands, then debts, then transactions.
pub fn parse_preview(message: &str) -> Value {
    if let Some(command) = parse_command(message) {
        return json!({ "type": "command", "command": format!("{:?}", command) });
    }
    if looks_like_debt(message) {
        return match parse_debt_message(message) {
            Some(debt) => json!({ "type": "debt", "debt": debt }),
            None => json!({ "type": "incomplete_debt", "ai_fallback": false }),
        };
    }
    match parse_transaction_message(message) {
        Some(transaction) => json!({ "type": "transaction", "transaction": transaction }),
        None => json!({ "type": "unrecognized", "ai_fallback": true }),
    }
}

pub fn cmd_parse(message: &str) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&parse_preview(message))?);
    Ok(())
}
