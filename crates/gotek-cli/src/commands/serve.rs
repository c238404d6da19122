//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    insecure_cookie: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    let mut config = gotek_server::ServerConfig::from_env()?;
    if insecure_cookie {
        config.cookie_secure = false;
    }

    println!("🚀 Starting GoTEK server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   WhatsApp webhook: http://{}:{}/api/webhook/whatsapp", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    println!(
        "   🔐 Sessions: {}h, cookie {}",
        config.session_ttl_hours,
        if config.cookie_secure { "Secure" } else { "NOT Secure (--insecure-cookie)" }
    );
    if config.webhook_verify_token.is_none() {
        println!("   ⚠️  WHATSAPP_VERIFY_TOKEN not set - webhook cannot be verified by Meta");
    }
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 CORS origins: {} (GOTEK_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    gotek_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
