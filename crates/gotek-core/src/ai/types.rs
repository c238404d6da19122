//! AI backend response types
//!
//! Backend-agnostic; every implementation produces these.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DebtKind, TransactionType};
use crate::parser::{ParsedDebt, ParsedTransaction};

/// What the model thinks a message or image describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionKind {
    Income,
    Expense,
    Payable,
    Receivable,
    #[serde(other)]
    Unknown,
}

/// Structured record extracted by an AI backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AIExtraction {
    pub kind: ExtractionKind,
    /// Whole rupiah
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub counterparty: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl AIExtraction {
    pub fn unknown() -> Self {
        Self {
            kind: ExtractionKind::Unknown,
            amount: None,
            description: None,
            category: None,
            payment_method: None,
            counterparty: None,
            due_date: None,
        }
    }

    /// As a transaction, when the model found income or expense with an amount
    pub fn to_transaction(&self) -> Option<ParsedTransaction> {
        let kind = match self.kind {
            ExtractionKind::Income => TransactionType::Income,
            ExtractionKind::Expense => TransactionType::Expense,
            _ => return None,
        };
        let amount = self.amount.filter(|a| *a > 0)?;
        let category = non_empty(&self.category);
        let description = non_empty(&self.description)
            .or_else(|| category.clone())
            .unwrap_or_else(|| kind.label().to_string());

        Some(ParsedTransaction {
            kind,
            amount,
            description,
            category,
            payment_method: non_empty(&self.payment_method),
        })
    }

    /// As a debt, when the model found one with an amount and counterparty
    pub fn to_debt(&self) -> Option<ParsedDebt> {
        let kind = match self.kind {
            ExtractionKind::Payable => DebtKind::Payable,
            ExtractionKind::Receivable => DebtKind::Receivable,
            _ => return None,
        };
        let amount = self.amount.filter(|a| *a > 0)?;
        let counterparty = non_empty(&self.counterparty)?;

        Some(ParsedDebt {
            kind,
            amount,
            counterparty,
            description: non_empty(&self.description)
                .unwrap_or_else(|| kind.label().to_string()),
            due_date: self.due_date,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}
