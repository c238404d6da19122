//! AI backend test command

use anyhow::{bail, Result};

use gotek_core::{AIBackend, AIClient};

pub async fn cmd_ai_test(message: &str) -> Result<()> {
    let Some(client) = AIClient::from_env() else {
        bail!("No AI backend configured. Set GEMINI_API_KEY, or AI_BACKEND=qwen with QWEN_API_KEY");
    };

    println!("🤖 Testing AI backend: {} ({})", client.backend_name(), client.host());
    println!("   Model: {}", client.model());

    if !client.health_check().await {
        println!("   ⚠️  Health check failed - extraction will likely fail too");
    }

    let today = chrono::Local::now().date_naive();
    let extraction = client.extract_transaction(message, today, &[]).await?;

    println!();
    println!("{}", serde_json::to_string_pretty(&extraction)?);

    if let Some(tx) = extraction.to_transaction() {
        println!();
        println!("   → would record {} {} ({})", tx.kind.label(), tx.amount, tx.description);
    } else if let Some(debt) = extraction.to_debt() {
        println!();
        println!("   → would record {} with {} ({})", debt.kind.label(), debt.counterparty, debt.amount);
    } else {
        println!();
        println!("   → nothing recognizable; the bot would reply with a format hint");
    }
    Ok(())
}
