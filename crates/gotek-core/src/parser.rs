//! Rule-based parsing of WhatsApp chat messages
//!
//! Users log money the way they type it in a chat:
//!
//! ```text
//! +5jt gaji oktober @Gaji #BCA
//! -25rb nasi padang @Makanan & Minuman #GoPay
//! beli 2 kopi 30k
//! hutang 150k ke Budi pulsa !2026-11-01
//! piutang 1,5jt @Pak Andi Saputra
//! /budget @Transportasi 750rb
//! ```
//!
//! Tags start at a word beginning with a marker and run across words until
//! the next marker or the end of the message:
//! - `@` category (transactions, budgets) or counterparty (debts)
//! - `#` payment method
//! - `!` due date (debts)
//!
//! Anything the rules cannot read is left to the AI fallback.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::models::{DebtKind, TransactionType};

/// Largest amount accepted from chat input (one quadrillion rupiah)
const MAX_AMOUNT: f64 = 1e15;

/// Amounts below this without a suffix or separators are treated as weak
/// (likely a quantity, not money)
const WEAK_AMOUNT_CEILING: i64 = 1_000;

const INCOME_KEYWORDS: &[&str] = &["masuk", "pemasukan", "terima", "income"];
const INCOME_KEYWORDS_KEPT: &[&str] = &["gaji"];
const EXPENSE_KEYWORDS: &[&str] = &["keluar", "pengeluaran", "expense"];
const EXPENSE_KEYWORDS_KEPT: &[&str] = &["bayar", "beli"];

const AMOUNT_SUFFIXES: &[&str] = &["k", "rb", "ribu", "jt", "juta", "m", "miliar"];
const CURRENCY_TOKENS: &[&str] = &["rp", "rp."];

const DEBT_PREPOSITIONS: &[&str] = &["ke", "dari", "sama", "kepada", "pada"];
const HONORIFICS: &[&str] = &["pak", "bu", "bapak", "ibu", "mas", "mbak", "kak", "bang", "om", "tante"];

/// A transaction read from a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTransaction {
    pub kind: TransactionType,
    pub amount: i64,
    pub description: String,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

/// A debt or receivable read from a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDebt {
    pub kind: DebtKind,
    pub amount: i64,
    pub counterparty: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

/// Bot commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Income, expense and balance for the current month
    Summary,
    /// Per-category breakdown for the current month
    Report,
    ListBudgets,
    SetBudget { category: String, amount: i64 },
    DeleteBudget { category: String },
    ListDebts { kind: DebtKind },
    PayDebt { id: i64 },
    /// Delete the most recent transaction
    Undo,
    ListCategories,
    /// Recognized command with malformed arguments
    Invalid { usage: &'static str },
}

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d[\d.,]*)\s*(k|rb|ribu|jt|juta|m|miliar)?$").expect("valid regex")
    })
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)([@#!])").expect("valid regex"))
}

/// Parse an amount like `50k`, `1.5jt`, `Rp 25.000` or `15,000` into whole rupiah
pub fn parse_smart_amount(input: &str) -> Option<i64> {
    let lowered = input.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("rp.")
        .or_else(|| lowered.strip_prefix("rp"))
        .unwrap_or(&lowered)
        .trim();

    let caps = amount_regex().captures(stripped)?;
    let number = parse_grouped_number(caps.get(1)?.as_str())?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        None => 1.0,
        Some("k") | Some("rb") | Some("ribu") => 1e3,
        Some("jt") | Some("juta") => 1e6,
        Some("m") | Some("miliar") => 1e9,
        Some(_) => return None,
    };

    let value = (number * multiplier).round();
    if !value.is_finite() || value < 1.0 || value > MAX_AMOUNT {
        return None;
    }
    Some(value as i64)
}

/// Read digits with `.`/`,` separators
///
/// Three-digit groups are thousands; otherwise the last separator is the
/// decimal point.
fn parse_grouped_number(num: &str) -> Option<f64> {
    let groups: Vec<&str> = num.split(['.', ',']).collect();
    if groups.iter().any(|g| g.is_empty()) {
        return None;
    }
    if groups.len() == 1 {
        return groups[0].parse().ok();
    }

    let (last, init) = groups.split_last()?;
    if init[1..].iter().any(|g| g.len() != 3) {
        return None;
    }

    if last.len() == 3 {
        groups.concat().parse().ok()
    } else {
        format!("{}.{}", init.concat(), last).parse().ok()
    }
}

/// Whether a token carries an explicit money magnitude (suffix, currency
/// prefix, or a value of at least a thousand) rather than being a bare
/// small number
///
/// Separators alone do not count: `7.30` is a clock time, not Rp7.
fn is_strong_amount(token: &str, value: i64) -> bool {
    let lowered = token.to_lowercase();
    value >= WEAK_AMOUNT_CEILING
        || lowered.starts_with("rp")
        || lowered.ends_with(|c: char| c.is_ascii_alphabetic())
}

/// Split a message into the untagged head and `(marker, text)` tags
fn split_tags(text: &str, markers: &[char]) -> (String, Vec<(char, String)>) {
    let positions: Vec<(usize, char)> = marker_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| {
            let marker = text[m.start()..].chars().next()?;
            markers.contains(&marker).then_some((m.start(), marker))
        })
        .collect();

    let head_end = positions.first().map(|(pos, _)| *pos).unwrap_or(text.len());
    let head = text[..head_end].trim().to_string();

    let tags = positions
        .iter()
        .enumerate()
        .map(|(i, (pos, marker))| {
            let end = positions
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(text.len());
            let body = text[pos + 1..end].split_whitespace().collect::<Vec<_>>().join(" ");
            (*marker, body)
        })
        .collect();

    (head, tags)
}

fn first_tag(tags: &[(char, String)], marker: char) -> Option<String> {
    tags.iter()
        .find(|(m, body)| *m == marker && !body.is_empty())
        .map(|(_, body)| body.clone())
}

/// Result of locating the amount among message tokens
struct AmountMatch {
    amount: i64,
    strong: bool,
    /// Remaining tokens with the amount (and any currency/suffix words) removed
    rest: Vec<String>,
}

/// Find the amount among tokens, preferring explicit money amounts
///
/// A bare number followed by a suffix word (`50 ribu`) and a currency word
/// before the number (`Rp 25.000`) are folded into the amount.
fn take_amount(tokens: &[String]) -> Option<AmountMatch> {
    let mut candidates: Vec<(usize, usize, i64, bool)> = Vec::new();

    for i in 0..tokens.len() {
        let next_is_suffix = tokens
            .get(i + 1)
            .is_some_and(|t| AMOUNT_SUFFIXES.contains(&t.to_lowercase().as_str()));

        let (value, span, strong) = if next_is_suffix {
            match parse_smart_amount(&format!("{}{}", tokens[i], tokens[i + 1])) {
                Some(v) => (v, 2, true),
                None => continue,
            }
        } else {
            match parse_smart_amount(&tokens[i]) {
                Some(v) => (v, 1, is_strong_amount(&tokens[i], v)),
                None => continue,
            }
        };

        let preceded_by_currency = i > 0
            && CURRENCY_TOKENS.contains(&tokens[i - 1].to_lowercase().as_str());
        let start = if preceded_by_currency { i - 1 } else { i };
        candidates.push((start, i + span, value, strong || preceded_by_currency));
    }

    let (start, end, amount, strong) = candidates
        .iter()
        .find(|c| c.3)
        .or_else(|| candidates.first())
        .copied()?;

    let rest = tokens[..start]
        .iter()
        .chain(tokens[end..].iter())
        .cloned()
        .collect();

    Some(AmountMatch {
        amount,
        strong,
        rest,
    })
}

/// Parse a transaction message such as `-25rb makan siang @Makanan #Cash`
///
/// Returns None when no usable amount is present, leaving the message to
/// the AI fallback.
pub fn parse_transaction_message(text: &str) -> Option<ParsedTransaction> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (head, tags) = split_tags(text, &['@', '#']);
    let category = first_tag(&tags, '@');
    let payment_method = first_tag(&tags, '#');

    let mut tokens: Vec<String> = head.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return None;
    }

    let mut kind = None;
    if let Some(rest) = tokens[0].strip_prefix('+') {
        kind = Some(TransactionType::Income);
        tokens[0] = rest.to_string();
    } else if let Some(rest) = tokens[0].strip_prefix('-') {
        kind = Some(TransactionType::Expense);
        tokens[0] = rest.to_string();
    } else {
        let first = tokens[0].to_lowercase();
        if INCOME_KEYWORDS.contains(&first.as_str()) {
            kind = Some(TransactionType::Income);
            tokens.remove(0);
        } else if INCOME_KEYWORDS_KEPT.contains(&first.as_str()) {
            kind = Some(TransactionType::Income);
        } else if EXPENSE_KEYWORDS.contains(&first.as_str()) {
            kind = Some(TransactionType::Expense);
            tokens.remove(0);
        } else if EXPENSE_KEYWORDS_KEPT.contains(&first.as_str()) {
            kind = Some(TransactionType::Expense);
        }
    }
    tokens.retain(|t| !t.is_empty());

    let found = take_amount(&tokens)?;
    let has_signal = kind.is_some() || category.is_some() || payment_method.is_some();
    if !found.strong && !has_signal {
        return None;
    }

    let kind = kind.unwrap_or(TransactionType::Expense);
    let description = if found.rest.is_empty() {
        category
            .clone()
            .unwrap_or_else(|| kind.label().to_string())
    } else {
        found.rest.join(" ")
    };

    Some(ParsedTransaction {
        kind,
        amount: found.amount,
        description,
        category,
        payment_method,
    })
}

/// Parse a debt message such as `hutang 100k ke Budi pulsa !2026-11-01`
pub fn parse_debt_message(text: &str) -> Option<ParsedDebt> {
    parse_debt_message_on(text, chrono::Local::now().date_naive())
}

/// Parse a debt message, resolving partial due dates against `today`
pub fn parse_debt_message_on(text: &str, today: NaiveDate) -> Option<ParsedDebt> {
    let (head, tags) = split_tags(text.trim(), &['@', '#', '!']);
    let mut tokens: Vec<String> = head.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return None;
    }

    let kind = match tokens[0].to_lowercase().as_str() {
        "hutang" | "utang" => DebtKind::Payable,
        "piutang" => DebtKind::Receivable,
        _ => return None,
    };
    tokens.remove(0);

    let found = take_amount(&tokens)?;
    let mut rest = found.rest;

    let counterparty = match first_tag(&tags, '@') {
        Some(name) => name,
        None => take_counterparty(&mut rest)?,
    };

    let due_date = first_tag(&tags, '!').and_then(|s| parse_due_date(&s, today));

    let description = if rest.is_empty() {
        kind.label().to_string()
    } else {
        rest.join(" ")
    };

    Some(ParsedDebt {
        kind,
        amount: found.amount,
        counterparty,
        description,
        due_date,
    })
}

/// Pull the counterparty name out of the remaining words
///
/// `ke Budi` / `dari Pak Andi` take the word after the preposition (two
/// words after an honorific); without a preposition the first word is used.
fn take_counterparty(rest: &mut Vec<String>) -> Option<String> {
    let prep = rest
        .iter()
        .position(|t| DEBT_PREPOSITIONS.contains(&t.to_lowercase().as_str()));

    let (start, name_start) = match prep {
        Some(p) if p + 1 < rest.len() => (p, p + 1),
        Some(_) => return None,
        None if !rest.is_empty() => (0, 0),
        None => return None,
    };

    let is_honorific = HONORIFICS.contains(&rest[name_start].to_lowercase().as_str());
    let name_end = if is_honorific && name_start + 1 < rest.len() {
        name_start + 2
    } else {
        name_start + 1
    };

    let name = rest[name_start..name_end].join(" ");
    rest.drain(start..name_end);
    Some(name)
}

/// Parse `YYYY-MM-DD`, `DD/MM/YYYY` or `DD/MM` (year taken from `today`)
pub fn parse_due_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = input.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(d);
    }
    let (day, month) = s.split_once('/')?;
    NaiveDate::from_ymd_opt(today.year(), month.parse().ok()?, day.parse().ok()?)
}

/// Recognize bot commands (`/help`, `saldo`, `budget @Makan 500k`, `lunas 3`…)
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let body = text.strip_prefix('/').unwrap_or(text);
    let (word, args) = match body.split_once(char::is_whitespace) {
        Some((w, a)) => (w.to_lowercase(), a.trim()),
        None => (body.to_lowercase(), ""),
    };

    let command = match word.as_str() {
        "help" | "bantuan" | "menu" | "start" if args.is_empty() => Command::Help,
        "saldo" | "ringkasan" if args.is_empty() => Command::Summary,
        "laporan" if args.is_empty() => Command::Report,
        "kategori" if args.is_empty() => Command::ListCategories,
        "hapus" | "undo" | "batal" if args.is_empty() => Command::Undo,
        "hutang" | "utang" if args.is_empty() => Command::ListDebts {
            kind: DebtKind::Payable,
        },
        "piutang" if args.is_empty() => Command::ListDebts {
            kind: DebtKind::Receivable,
        },
        "budget" | "anggaran" => {
            if args.is_empty() {
                return Some(Command::ListBudgets);
            }
            let (head, tags) = split_tags(args, &['@']);
            let tokens: Vec<String> = head.split_whitespace().map(str::to_string).collect();
            match (first_tag(&tags, '@'), take_amount(&tokens)) {
                (Some(category), Some(found)) => Command::SetBudget {
                    category,
                    amount: found.amount,
                },
                // `budget 500k @Makan` leaves the amount at the end of the tag
                (Some(tagged), None) => match split_trailing_amount(&tagged) {
                    Some((category, amount)) => Command::SetBudget { category, amount },
                    None => Command::Invalid {
                        usage: "budget @Kategori 500rb",
                    },
                },
                _ => Command::Invalid {
                    usage: "budget @Kategori 500rb",
                },
            }
        }
        "hapusbudget" => {
            let (head, tags) = split_tags(args, &['@']);
            match first_tag(&tags, '@').or_else(|| (!head.is_empty()).then_some(head)) {
                Some(category) => Command::DeleteBudget { category },
                None => Command::Invalid {
                    usage: "hapusbudget @Kategori",
                },
            }
        }
        "lunas" => match args.trim_start_matches('#').parse::<i64>() {
            Ok(id) if id > 0 => Command::PayDebt { id },
            _ => Command::Invalid { usage: "lunas <id>" },
        },
        _ => return None,
    };

    Some(command)
}

/// Split `Makanan 500rb` into (`Makanan`, 500000)
fn split_trailing_amount(tag: &str) -> Option<(String, i64)> {
    let (name, last) = tag.rsplit_once(' ')?;
    let amount = parse_smart_amount(last)?;
    let name = name.trim();
    (!name.is_empty()).then(|| (name.to_string(), amount))
}

/// Whether a message opens with a debt keyword
pub fn looks_like_debt(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or("").to_lowercase();
    matches!(first.as_str(), "hutang" | "utang" | "piutang")
}
