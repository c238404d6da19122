//! Domain models for GoTEK

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A registered user, identified on WhatsApp by phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// International digits without the leading `+` (e.g. 6281234567890)
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A new user to be registered (before DB insertion)
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Direction of money flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Indonesian label used in chat replies
    pub fn label(&self) -> &'static str {
        match self {
            Self::Income => "Pemasukan",
            Self::Expense => "Pengeluaran",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" | "pemasukan" => Ok(Self::Income),
            "expense" | "pengeluaran" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction source - how it was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Parsed from a structured WhatsApp message
    #[default]
    Whatsapp,
    /// Extracted by the generative AI fallback
    Ai,
    /// Entered through the dashboard API
    Dashboard,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Ai => "ai",
            Self::Dashboard => "dashboard",
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(Self::Whatsapp),
            "ai" => Ok(Self::Ai),
            "dashboard" => Ok(Self::Dashboard),
            _ => Err(format!("Unknown transaction source: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-owned category for income or expenses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// Categories every new user starts with
pub const DEFAULT_EXPENSE_CATEGORIES: &[&str] = &[
    "Makanan & Minuman",
    "Transportasi",
    "Belanja",
    "Tagihan",
    "Hiburan",
    "Kesehatan",
    "Pendidikan",
    "Lainnya",
];

pub const DEFAULT_INCOME_CATEGORIES: &[&str] = &["Gaji", "Bonus", "Investasi", "Lainnya"];

/// Fallback category name when a message carries no `@category` tag
pub const FALLBACK_CATEGORY: &str = "Lainnya";

/// A recorded transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub kind: TransactionType,
    /// Whole rupiah, always positive; `kind` carries the direction
    pub amount: i64,
    pub description: String,
    pub payment_method: Option<String>,
    pub date: NaiveDate,
    pub source: TransactionSource,
    pub created_at: DateTime<Utc>,
}

/// A new transaction (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub category_id: i64,
    pub kind: TransactionType,
    pub amount: i64,
    pub description: String,
    pub payment_method: Option<String>,
    pub date: NaiveDate,
    pub source: TransactionSource,
}

/// Filter for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to a calendar month
    pub month: Option<Month>,
    pub kind: Option<TransactionType>,
    pub category_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

/// A recurring monthly spending limit for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Which side of a debt the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtKind {
    /// The user owes someone ("hutang")
    Payable,
    /// Someone owes the user ("piutang")
    Receivable,
}

impl DebtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payable => "payable",
            Self::Receivable => "receivable",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Payable => "Hutang",
            Self::Receivable => "Piutang",
        }
    }
}

impl std::str::FromStr for DebtKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "payable" | "hutang" | "utang" => Ok(Self::Payable),
            "receivable" | "piutang" => Ok(Self::Receivable),
            _ => Err(format!("Unknown debt kind: {}", s)),
        }
    }
}

impl std::fmt::Display for DebtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Debt settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Unpaid,
    Paid,
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }
}

impl std::str::FromStr for DebtStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("Unknown debt status: {}", s)),
        }
    }
}

/// A debt or receivable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub id: i64,
    pub user_id: i64,
    pub kind: DebtKind,
    pub counterparty: String,
    pub amount: i64,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub status: DebtStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub reminded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A new debt (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewDebt {
    pub kind: DebtKind,
    pub counterparty: String,
    pub amount: i64,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

/// A debt that needs a reminder, joined with its owner's phone
#[derive(Debug, Clone)]
pub struct DebtReminder {
    pub debt: Debt,
    pub phone: String,
}

/// A calendar month (e.g. 2026-10)
///
/// Always lies within chrono's date range, so its first and last days exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    /// None for month numbers outside 1..=12 or years chrono cannot represent
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        // The following month must exist too, for the exclusive upper bound
        first.checked_add_months(Months::new(1))?;
        Some(Self { first })
    }

    /// The month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        let first = date
            .checked_sub_days(Days::new(u64::from(date.day0())))
            .unwrap_or(date);
        Self { first }
    }

    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        // Only the final representable month has no successor; it ends on MAX
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Indonesian month name with year, e.g. "Oktober 2026"
    pub fn label(&self) -> String {
        const NAMES: [&str; 12] = [
            "Januari",
            "Februari",
            "Maret",
            "April",
            "Mei",
            "Juni",
            "Juli",
            "Agustus",
            "September",
            "Oktober",
            "November",
            "Desember",
        ];
        format!("{} {}", NAMES[self.first.month0() as usize], self.year())
    }
}

impl std::str::FromStr for Month {
    type Err = String;

    /// Parse `YYYY-MM`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month (use YYYY-MM): {}", s))?;
        let year: i32 = y
            .parse()
            .map_err(|_| format!("Invalid year in month: {}", s))?;
        let month: u32 = m
            .parse()
            .map_err(|_| format!("Invalid month number: {}", s))?;
        Month::new(year, month).ok_or_else(|| format!("Month out of range: {}", s))
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for Month {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Spending or income total for one category in a month
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category_id: i64,
    pub category_name: String,
    pub kind: TransactionType,
    pub total: i64,
    pub count: i64,
}

/// Monthly cash-flow summary
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub month: Month,
    pub income: i64,
    pub expense: i64,
    pub balance: i64,
    pub by_category: Vec<CategoryTotal>,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

/// Normalize a phone number to international digits without `+`
///
/// Indonesian local numbers (`08…`) are rewritten to `628…`. Returns None
/// when fewer than 8 digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("62{}", rest)
    } else {
        digits
    };
    if normalized.len() < 8 || normalized.len() > 15 {
        None
    } else {
        Some(normalized)
    }
}

/// Format whole rupiah with dot thousands separators, e.g. `Rp1.500.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp{}", grouped)
    } else {
        format!("Rp{}", grouped)
    }
}
