//! Background task scheduler for debt reminders
//!
//! Enabled via environment variables:
//!
//! - `GOTEK_REMINDER_INTERVAL_HOURS`: how often to look for due debts (e.g. "6")
//! - `GOTEK_REMINDER_LEAD_DAYS`: remind when a debt is due within N days (default: 1)
//!
//! Each unpaid debt is reminded once; overdue debts that were missed
//! while the server was down are picked up on the next run.

use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::interval;
use tracing::{error, info, warn};

use gotek_core::models::{format_rupiah, Debt, DebtKind};
use gotek_core::{Database, MessageSender, Messenger};

/// Longest accepted interval between runs (one year)
const MAX_INTERVAL_HOURS: u64 = 24 * 365;

/// Longest accepted reminder lead time
const MAX_LEAD_DAYS: i64 = 365;

/// Configuration for scheduled debt reminders
#[derive(Debug, Clone)]
pub struct ReminderScheduleConfig {
    /// Interval between runs in hours
    pub interval_hours: u64,
    /// Remind when due within this many days
    pub lead_days: i64,
}

impl ReminderScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (GOTEK_REMINDER_INTERVAL_HOURS not set)
    pub fn from_env() -> Option<Self> {
        let interval_hours: u64 = std::env::var("GOTEK_REMINDER_INTERVAL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())?;

        if interval_hours == 0 {
            warn!("GOTEK_REMINDER_INTERVAL_HOURS is 0, debt reminders disabled");
            return None;
        }
        if interval_hours > MAX_INTERVAL_HOURS {
            warn!(
                "GOTEK_REMINDER_INTERVAL_HOURS={} too large, using {}",
                interval_hours, MAX_INTERVAL_HOURS
            );
        }
        let interval_hours = interval_hours.min(MAX_INTERVAL_HOURS);

        let lead_days = std::env::var("GOTEK_REMINDER_LEAD_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|d: &i64| *d >= 0)
            .map(|d| d.min(MAX_LEAD_DAYS))
            .unwrap_or(1);

        Some(Self {
            interval_hours,
            lead_days,
        })
    }
}

/// Start the reminder scheduler as a background task
pub fn start_reminder_scheduler(db: Database, messenger: Messenger, config: ReminderScheduleConfig) {
    info!(
        "Starting debt reminder scheduler: every {} hours, {} day(s) ahead",
        config.interval_hours, config.lead_days
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_hours.saturating_mul(3600)));

        loop {
            // First tick fires immediately so reminders missed during downtime go out
            ticker.tick().await;

            let today = chrono::Local::now().date_naive();
            match run_reminders(&db, &messenger, today, config.lead_days).await {
                Ok(0) => {}
                Ok(sent) => info!("Sent {} debt reminder(s)", sent),
                Err(e) => error!("Debt reminder run failed: {}", e),
            }
        }
    });
}

/// Send one reminder per due, unreminded debt
///
/// A debt is marked reminded only after its message was accepted, so a
/// failed send is retried on the next run. Returns the number sent.
pub async fn run_reminders<S: MessageSender + ?Sized>(
    db: &Database,
    sender: &S,
    today: NaiveDate,
    lead_days: i64,
) -> gotek_core::Result<usize> {
    let mut sent = 0;

    for reminder in db.debts_due_for_reminder(today, lead_days)? {
        let body = reminder_text(&reminder.debt, today);
        if let Err(e) = sender.send_text(&reminder.phone, &body).await {
            warn!(debt_id = reminder.debt.id, error = %e, "Failed to send debt reminder");
            continue;
        }

        db.mark_debt_reminded(reminder.debt.id)?;
        sent += 1;

        // Log to audit (as "scheduler" user)
        if let Err(e) = db.log_audit(
            "scheduler",
            "remind",
            Some("debt"),
            Some(reminder.debt.id),
            None,
        ) {
            warn!("Failed to log debt reminder to audit: {}", e);
        }
    }

    Ok(sent)
}

fn reminder_text(debt: &Debt, today: NaiveDate) -> String {
    let who = match debt.kind {
        DebtKind::Payable => format!("Hutang ke {}", debt.counterparty),
        DebtKind::Receivable => format!("Piutang dari {}", debt.counterparty),
    };
    let when = match debt.due_date {
        Some(due) if due < today => format!("sudah lewat jatuh tempo ({})", due.format("%d/%m/%Y")),
        Some(due) if due == today => "jatuh tempo hari ini".to_string(),
        Some(due) => format!("jatuh tempo {}", due.format("%d/%m/%Y")),
        None => "belum ada jatuh tempo".to_string(),
    };
    format!(
        "⏰ Pengingat: {} {} ({}) {}.\nBalas *lunas {}* kalau sudah beres.",
        who,
        format_rupiah(debt.amount),
        debt.description,
        when,
        debt.id
    )
}
