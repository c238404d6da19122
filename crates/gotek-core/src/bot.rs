//! WhatsApp conversation engine
//!
//! Turns one inbound chat message into stored records and a reply:
//!
//! 1. Unknown phone number: registration hint
//! 2. Command (`saldo`, `budget @Makan 500rb`, `lunas 3`, ...)
//! 3. Debt message (`hutang 50k ke Budi`)
//! 4. Transaction message (`-25rb nasi padang @Makanan`), with a budget
//!    alert appended for expenses
//! 5. AI fallback when configured, else a format hint
//!
//! Replies are Indonesian WhatsApp text.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient, AIExtraction};
use crate::budget::{budget_alert_message, BudgetStatus};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    format_rupiah, Debt, DebtKind, DebtStatus, Month, NewDebt, NewTransaction, Transaction,
    TransactionSource, TransactionType, User, FALLBACK_CATEGORY,
};
use crate::parser::{
    looks_like_debt, parse_command, parse_debt_message_on, parse_transaction_message, Command,
    ParsedDebt, ParsedTransaction,
};

/// Source of "today" for dates and budget months
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// What the bot did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    UnknownUser,
    Command,
    Transaction { id: i64 },
    Debt { id: i64 },
    /// Nothing recorded; the reply explains the accepted formats
    FormatHint,
}

#[derive(Debug, Clone)]
pub struct BotReply {
    pub text: String,
    pub action: BotAction,
}

impl BotReply {
    fn new(text: impl Into<String>, action: BotAction) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }
}

/// A stored transaction with its category's budget after the insert
#[derive(Debug, Clone)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub budget: Option<BudgetStatus>,
}

impl RecordedTransaction {
    pub fn budget_alert(&self) -> Option<String> {
        self.budget
            .as_ref()
            .and_then(|status| budget_alert_message(&self.transaction.category_name, status))
    }
}

#[derive(Clone)]
pub struct Bot {
    db: Database,
    ai: Option<AIClient>,
    clock: Clock,
}

impl Bot {
    pub fn new(db: Database, ai: Option<AIClient>) -> Self {
        Self {
            db,
            ai,
            clock: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Pin "today" to a fixed date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.clock = Arc::new(move || today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Handle a text message from `phone`
    pub async fn handle_text(&self, phone: &str, text: &str) -> Result<BotReply> {
        let Some(user) = self.db.get_user_by_phone(phone)? else {
            info!(phone = %phone, "Message from unregistered number");
            return Ok(BotReply::new(registration_hint(), BotAction::UnknownUser));
        };

        let text = text.trim();
        let today = self.today();

        if let Some(command) = parse_command(text) {
            debug!(user_id = user.id, ?command, "Bot command");
            let reply = self.run_command(&user, command, today)?;
            return Ok(BotReply::new(reply, BotAction::Command));
        }

        // A debt keyword never falls through to the transaction parser
        if looks_like_debt(text) {
            let Some(parsed) = parse_debt_message_on(text, today) else {
                debug!(user_id = user.id, "Incomplete debt message");
                return Ok(BotReply::new(debt_hint(), BotAction::FormatHint));
            };
            let debt = self.record_debt(&user, &parsed, "whatsapp")?;
            return Ok(BotReply::new(
                debt_confirmation(&debt),
                BotAction::Debt { id: debt.id },
            ));
        }

        if let Some(parsed) = parse_transaction_message(text) {
            let recorded =
                self.record_transaction(user.id, &parsed, today, TransactionSource::Whatsapp)?;
            return Ok(transaction_reply(&recorded, false));
        }

        self.ai_fallback(&user, text, today).await
    }

    /// Handle a receipt or transfer-slip photo from `phone`
    pub async fn handle_image(
        &self,
        phone: &str,
        image: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<BotReply> {
        let Some(user) = self.db.get_user_by_phone(phone)? else {
            return Ok(BotReply::new(registration_hint(), BotAction::UnknownUser));
        };

        let Some(ai) = &self.ai else {
            return Ok(BotReply::new(
                "📷 Fitur baca struk belum aktif. Ketik transaksinya saja, contoh: -25rb makan siang",
                BotAction::FormatHint,
            ));
        };

        let extraction = match ai.extract_receipt(image, mime_type, caption).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Receipt extraction failed");
                AIExtraction::unknown()
            }
        };

        match extraction.to_transaction() {
            Some(parsed) => {
                let recorded =
                    self.record_transaction(user.id, &parsed, self.today(), TransactionSource::Ai)?;
                Ok(transaction_reply(&recorded, true))
            }
            None => Ok(BotReply::new(
                "😕 Struknya belum bisa dibaca. Coba foto lebih jelas, atau ketik manual: -45rb belanja @Belanja",
                BotAction::FormatHint,
            )),
        }
    }

    /// Store a parsed transaction and evaluate its category budget
    ///
    /// An untagged transaction goes to the `Lainnya` category of its kind;
    /// an unknown tag creates the category.
    pub fn record_transaction(
        &self,
        user_id: i64,
        parsed: &ParsedTransaction,
        date: NaiveDate,
        source: TransactionSource,
    ) -> Result<RecordedTransaction> {
        let category_name = parsed.category.as_deref().unwrap_or(FALLBACK_CATEGORY);
        let category = self
            .db
            .find_or_create_category(user_id, category_name, parsed.kind)?;

        let transaction = self.db.insert_transaction(
            user_id,
            &NewTransaction {
                category_id: category.id,
                kind: parsed.kind,
                amount: parsed.amount,
                description: parsed.description.clone(),
                payment_method: parsed.payment_method.clone(),
                date,
                source,
            },
        )?;

        self.db.log_audit(
            &format!("user:{}", user_id),
            "create",
            Some("transaction"),
            Some(transaction.id),
            Some(&format!("amount={}, source={}", transaction.amount, source)),
        )?;

        let budget = match transaction.kind {
            TransactionType::Expense => {
                self.db
                    .check_budget_status(user_id, transaction.category_id, date)?
            }
            TransactionType::Income => None,
        };

        info!(
            user_id,
            transaction_id = transaction.id,
            kind = %transaction.kind,
            amount = transaction.amount,
            "Transaction recorded"
        );

        Ok(RecordedTransaction {
            transaction,
            budget,
        })
    }

    fn record_debt(&self, user: &User, parsed: &ParsedDebt, source: &str) -> Result<Debt> {
        let debt = self.db.insert_debt(
            user.id,
            &NewDebt {
                kind: parsed.kind,
                counterparty: parsed.counterparty.clone(),
                amount: parsed.amount,
                description: parsed.description.clone(),
                due_date: parsed.due_date,
            },
        )?;
        self.db.log_audit(
            &format!("user:{}", user.id),
            "create",
            Some("debt"),
            Some(debt.id),
            Some(&format!("kind={}, source={}", debt.kind, source)),
        )?;
        info!(user_id = user.id, debt_id = debt.id, kind = %debt.kind, "Debt recorded");
        Ok(debt)
    }

    async fn ai_fallback(&self, user: &User, text: &str, today: NaiveDate) -> Result<BotReply> {
        let Some(ai) = &self.ai else {
            return Ok(BotReply::new(format_hint(), BotAction::FormatHint));
        };

        let categories: Vec<String> = self
            .db
            .list_categories(user.id, None)?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let extraction = match ai.extract_transaction(text, today, &categories).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "AI extraction failed");
                return Ok(BotReply::new(format_hint(), BotAction::FormatHint));
            }
        };
        debug!(user_id = user.id, kind = ?extraction.kind, "AI extraction");

        if let Some(parsed) = extraction.to_debt() {
            let debt = self.record_debt(user, &parsed, "ai")?;
            return Ok(BotReply::new(
                debt_confirmation(&debt),
                BotAction::Debt { id: debt.id },
            ));
        }
        if let Some(parsed) = extraction.to_transaction() {
            let recorded = self.record_transaction(user.id, &parsed, today, TransactionSource::Ai)?;
            return Ok(transaction_reply(&recorded, true));
        }

        Ok(BotReply::new(format_hint(), BotAction::FormatHint))
    }

    fn run_command(&self, user: &User, command: Command, today: NaiveDate) -> Result<String> {
        let month = Month::of(today);
        match command {
            Command::Help => Ok(help_text(&user.name)),
            Command::Summary => {
                let summary = self.db.monthly_summary(user.id, month)?;
                Ok(format!(
                    "📊 Ringkasan {}\n\n💵 Pemasukan: {}\n💸 Pengeluaran: {}\n💰 Saldo: {}",
                    month.label(),
                    format_rupiah(summary.income),
                    format_rupiah(summary.expense),
                    format_rupiah(summary.balance),
                ))
            }
            Command::Report => {
                let summary = self.db.monthly_summary(user.id, month)?;
                if summary.by_category.is_empty() {
                    return Ok(format!("📋 Belum ada transaksi di {}.", month.label()));
                }
                let mut lines = vec![format!("📋 Laporan {}", month.label())];
                for kind in [TransactionType::Income, TransactionType::Expense] {
                    let rows: Vec<_> = summary
                        .by_category
                        .iter()
                        .filter(|c| c.kind == kind)
                        .collect();
                    if rows.is_empty() {
                        continue;
                    }
                    lines.push(String::new());
                    lines.push(format!("*{}*", kind.label()));
                    for row in rows {
                        lines.push(format!(
                            "• {}: {} ({}x)",
                            row.category_name,
                            format_rupiah(row.total),
                            row.count
                        ));
                    }
                }
                lines.push(String::new());
                lines.push(format!("💰 Saldo: {}", format_rupiah(summary.balance)));
                Ok(lines.join("\n"))
            }
            Command::ListBudgets => {
                let reports = self.db.list_budget_statuses(user.id, month)?;
                if reports.is_empty() {
                    return Ok(
                        "Belum ada budget. Atur dengan: budget @Kategori 500rb".to_string()
                    );
                }
                let mut lines = vec![format!("🎯 Budget {}", month.label())];
                for report in reports {
                    lines.push(format!(
                        "{} {}: {} / {} ({:.1}%)",
                        level_icon(&report.status),
                        report.budget.category_name,
                        format_rupiah(report.status.spent),
                        format_rupiah(report.status.limit),
                        report.status.percentage,
                    ));
                }
                Ok(lines.join("\n"))
            }
            Command::SetBudget { category, amount } => {
                let Some(found) =
                    self.db
                        .find_category(user.id, &category, TransactionType::Expense)?
                else {
                    return Ok(format!(
                        "Kategori pengeluaran \"{}\" tidak ditemukan. Ketik *kategori* untuk melihat daftarnya.",
                        category
                    ));
                };
                let budget = self.db.upsert_budget(user.id, found.id, amount)?;
                self.db.log_audit(
                    &format!("user:{}", user.id),
                    "upsert",
                    Some("budget"),
                    Some(budget.id),
                    Some(&format!("amount={}", amount)),
                )?;
                let mut reply = format!(
                    "✅ Budget {} diatur {} per bulan.",
                    budget.category_name,
                    format_rupiah(budget.amount)
                );
                if let Some(status) = self.db.check_budget_status(user.id, found.id, today)? {
                    reply.push_str(&format!(
                        "\nTerpakai bulan ini: {} ({:.1}%).",
                        format_rupiah(status.spent),
                        status.percentage
                    ));
                    if let Some(alert) = budget_alert_message(&budget.category_name, &status) {
                        reply.push_str("\n\n");
                        reply.push_str(&alert);
                    }
                }
                Ok(reply)
            }
            Command::DeleteBudget { category } => {
                let budget = match self
                    .db
                    .find_category(user.id, &category, TransactionType::Expense)?
                {
                    Some(found) => self.db.get_budget_for_category(user.id, found.id)?,
                    None => None,
                };
                match budget {
                    Some(budget) => {
                        self.db.delete_budget(user.id, budget.id)?;
                        self.db.log_audit(
                            &format!("user:{}", user.id),
                            "delete",
                            Some("budget"),
                            Some(budget.id),
                            None,
                        )?;
                        Ok(format!("🗑️ Budget {} dihapus.", budget.category_name))
                    }
                    None => Ok(format!("Tidak ada budget untuk \"{}\".", category)),
                }
            }
            Command::ListDebts { kind } => {
                let debts: Vec<Debt> = self
                    .db
                    .list_debts(user.id, Some(DebtStatus::Unpaid))?
                    .into_iter()
                    .filter(|d| d.kind == kind)
                    .collect();
                if debts.is_empty() {
                    return Ok(format!("🎉 Tidak ada {} yang belum lunas.", kind.label().to_lowercase()));
                }
                let total: i64 = debts.iter().map(|d| d.amount).sum();
                let mut lines = vec![format!("📒 {} belum lunas", kind.label())];
                for debt in &debts {
                    let due = debt
                        .due_date
                        .map(|d| format!(", jatuh tempo {}", d.format("%d/%m/%Y")))
                        .unwrap_or_default();
                    lines.push(format!(
                        "#{} {} {} ({}{})",
                        debt.id,
                        debt.counterparty,
                        format_rupiah(debt.amount),
                        debt.description,
                        due
                    ));
                }
                lines.push(format!("Total: {}", format_rupiah(total)));
                lines.push("Balas \"lunas <id>\" bila sudah dibayar.".to_string());
                Ok(lines.join("\n"))
            }
            Command::PayDebt { id } => match self.db.mark_debt_paid(user.id, id) {
                Ok(debt) => {
                    self.db.log_audit(
                        &format!("user:{}", user.id),
                        "pay",
                        Some("debt"),
                        Some(debt.id),
                        None,
                    )?;
                    Ok(format!(
                        "✅ {} #{} dengan {} sebesar {} ditandai lunas.",
                        debt.kind.label(),
                        debt.id,
                        debt.counterparty,
                        format_rupiah(debt.amount)
                    ))
                }
                Err(Error::NotFound(_)) => Ok(format!("Hutang/piutang #{} tidak ditemukan.", id)),
                Err(Error::Conflict(_)) => Ok(format!("#{} sudah lunas sebelumnya.", id)),
                Err(e) => Err(e),
            },
            Command::Undo => match self.db.delete_last_transaction(user.id)? {
                Some(tx) => {
                    self.db.log_audit(
                        &format!("user:{}", user.id),
                        "delete",
                        Some("transaction"),
                        Some(tx.id),
                        Some("undo"),
                    )?;
                    Ok(format!(
                        "🗑️ Transaksi terakhir dihapus: {} {} ({}).",
                        tx.kind.label(),
                        format_rupiah(tx.amount),
                        tx.description
                    ))
                }
                None => Ok("Belum ada transaksi untuk dihapus.".to_string()),
            },
            Command::ListCategories => {
                let categories = self.db.list_categories(user.id, None)?;
                let names = |kind: TransactionType| {
                    categories
                        .iter()
                        .filter(|c| c.kind == kind)
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                Ok(format!(
                    "📂 Kategori\n\n*Pengeluaran*: {}\n*Pemasukan*: {}\n\nPakai dengan @NamaKategori",
                    names(TransactionType::Expense),
                    names(TransactionType::Income)
                ))
            }
            Command::Invalid { usage } => Ok(format!("Format belum tepat. Contoh: {}", usage)),
        }
    }
}

fn level_icon(status: &BudgetStatus) -> &'static str {
    match status.level {
        crate::budget::BudgetLevel::Safe => "🟢",
        crate::budget::BudgetLevel::Warning => "🟡",
        crate::budget::BudgetLevel::Exceeded => "🔴",
    }
}

fn transaction_reply(recorded: &RecordedTransaction, via_ai: bool) -> BotReply {
    let tx = &recorded.transaction;
    let mut lines = vec![
        format!("✅ {} tercatat", tx.kind.label()),
        format!("💰 {}", format_rupiah(tx.amount)),
        format!("📝 {}", tx.description),
        format!("📂 {}", tx.category_name),
    ];
    if let Some(method) = &tx.payment_method {
        lines.push(format!("💳 {}", method));
    }
    if via_ai {
        lines.push("🤖 Dibaca otomatis. Salah? Ketik *hapus* lalu kirim ulang.".to_string());
    }
    let mut text = lines.join("\n");
    if let Some(alert) = recorded.budget_alert() {
        text.push_str("\n\n");
        text.push_str(&alert);
    }
    BotReply::new(text, BotAction::Transaction { id: tx.id })
}

fn debt_confirmation(debt: &Debt) -> String {
    let who = match debt.kind {
        DebtKind::Payable => "Ke",
        DebtKind::Receivable => "Dari",
    };
    let mut lines = vec![
        format!("✅ {} tercatat", debt.kind.label()),
        format!("👤 {} {}", who, debt.counterparty),
        format!("💰 {}", format_rupiah(debt.amount)),
        format!("📝 {}", debt.description),
    ];
    if let Some(due) = debt.due_date {
        lines.push(format!("📅 Jatuh tempo {}", due.format("%d/%m/%Y")));
    }
    lines.push(format!("Balas \"lunas {}\" bila sudah dibayar.", debt.id));
    lines.join("\n")
}

fn registration_hint() -> &'static str {
    "👋 Halo! Nomor ini belum terdaftar di GoTEK.\nDaftar dulu dengan nomor WhatsApp ini, lalu kirim pesan lagi ya."
}

fn format_hint() -> &'static str {
    "🤔 Maaf, pesannya belum kami pahami.\n\nContoh format:\n• -25rb nasi padang @Makanan & Minuman #GoPay\n• +5jt gaji @Gaji\n• hutang 100rb ke Budi !01/11\n\nKetik *help* untuk semua perintah."
}

fn debt_hint() -> &'static str {
    "🤔 Catatan hutang perlu jumlah dan nama orangnya.\n\nContoh:\n• hutang 100rb ke Budi !01/11\n• piutang 250rb @Pak Andi"
}

fn help_text(name: &str) -> String {
    format!(
        "Halo {}! 👋 Cara pakai GoTEK:\n\n\
         *Catat transaksi*\n\
         • -25rb makan siang @Makanan & Minuman #Cash\n\
         • +5jt gaji @Gaji #BCA\n\n\
         *Hutang / piutang*\n\
         • hutang 100rb ke Budi !01/11\n\
         • piutang 250rb @Pak Andi\n\n\
         *Perintah*\n\
         • saldo: ringkasan bulan ini\n\
         • laporan: rincian per kategori\n\
         • budget / budget @Kategori 500rb / hapusbudget @Kategori\n\
         • hutang / piutang: daftar yang belum lunas\n\
         • lunas <id>\n\
         • hapus: batalkan transaksi terakhir\n\
         • kategori: daftar kategori",
        name
    )
}
