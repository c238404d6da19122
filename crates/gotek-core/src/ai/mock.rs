//! Mock backend for testing
//!
//! Deterministic and offline. Reads messages with the rule parser after
//! expanding a little chat slang, so tests can exercise the AI path.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{DebtKind, TransactionType};
use crate::parser::{looks_like_debt, parse_debt_message_on, parse_transaction_message};

use super::types::{AIExtraction, ExtractionKind};
use super::AIBackend;

/// Amount the mock reads from any non-empty receipt image
pub const MOCK_RECEIPT_AMOUNT: i64 = 50_000;

const SLANG: &[(&str, &str)] = &[
    ("rebu", "ribu"),
    ("rbu", "ribu"),
    ("ceban", "10rb"),
    ("goceng", "5rb"),
    ("gocap", "50rb"),
    ("cepek", "100rb"),
    ("sejuta", "1jt"),
];

const INCOME_HINTS: &[&str] = &["gaji", "dapat", "dapet", "terima", "ditransfer", "bonus"];

const CATEGORY_HINTS: &[(&str, &str)] = &[
    ("makan", "Makanan & Minuman"),
    ("bakso", "Makanan & Minuman"),
    ("kopi", "Makanan & Minuman"),
    ("bensin", "Transportasi"),
    ("grab", "Transportasi"),
    ("gojek", "Transportasi"),
    ("parkir", "Transportasi"),
    ("listrik", "Tagihan"),
    ("pulsa", "Tagihan"),
    ("gaji", "Gaji"),
];

#[derive(Clone, Default)]
pub struct MockBackend {
    pub healthy: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self { healthy: true }
    }

    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }
}

fn expand_slang(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            SLANG
                .iter()
                .find(|(slang, _)| *slang == lower)
                .map(|(_, replacement)| replacement.to_string())
                .unwrap_or_else(|| word.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn guess_category(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CATEGORY_HINTS
        .iter()
        .find(|(hint, _)| lower.contains(hint))
        .map(|(_, category)| category.to_string())
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_transaction(
        &self,
        text: &str,
        today: NaiveDate,
        _categories: &[String],
    ) -> Result<AIExtraction> {
        let expanded = expand_slang(text);

        if looks_like_debt(&expanded) {
            if let Some(debt) = parse_debt_message_on(&expanded, today) {
                return Ok(AIExtraction {
                    kind: match debt.kind {
                        DebtKind::Payable => ExtractionKind::Payable,
                        DebtKind::Receivable => ExtractionKind::Receivable,
                    },
                    amount: Some(debt.amount),
                    description: Some(debt.description),
                    counterparty: Some(debt.counterparty),
                    due_date: debt.due_date,
                    ..AIExtraction::unknown()
                });
            }
        }

        let Some(tx) = parse_transaction_message(&expanded) else {
            return Ok(AIExtraction::unknown());
        };

        let lower = expanded.to_lowercase();
        let income = tx.kind == TransactionType::Income
            || INCOME_HINTS.iter().any(|hint| lower.contains(hint));

        Ok(AIExtraction {
            kind: if income {
                ExtractionKind::Income
            } else {
                ExtractionKind::Expense
            },
            amount: Some(tx.amount),
            category: tx.category.or_else(|| guess_category(&expanded)),
            description: Some(tx.description),
            payment_method: tx.payment_method,
            ..AIExtraction::unknown()
        })
    }

    async fn extract_receipt(
        &self,
        image: &[u8],
        _mime_type: &str,
        caption: Option<&str>,
    ) -> Result<AIExtraction> {
        if image.is_empty() {
            return Ok(AIExtraction::unknown());
        }
        let description = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("Struk belanja");

        Ok(AIExtraction {
            kind: ExtractionKind::Expense,
            amount: Some(MOCK_RECEIPT_AMOUNT),
            description: Some(description.to_string()),
            category: Some("Belanja".to_string()),
            ..AIExtraction::unknown()
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
