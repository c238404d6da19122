//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or code fences, and return
//! amounts as numbers, numeric strings or chat shorthand (`"25rb"`).

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::parser::parse_smart_amount;

use super::types::{AIExtraction, ExtractionKind};

/// Loose shape of the model's JSON before validation
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    amount: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

/// Slice out the outermost JSON object in a response
fn json_object(response: &str) -> Result<&str> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::Ai(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

fn parse_amount(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            let amount = n.as_f64()?.round();
            (amount >= 1.0 && amount <= 1e15).then_some(amount as i64)
        }
        serde_json::Value::String(s) => parse_smart_amount(s),
        _ => None,
    }
}

fn parse_kind(kind: Option<&str>) -> ExtractionKind {
    match kind.map(|k| k.trim().to_lowercase()).as_deref() {
        Some("income") | Some("pemasukan") => ExtractionKind::Income,
        Some("expense") | Some("pengeluaran") => ExtractionKind::Expense,
        Some("payable") | Some("hutang") | Some("utang") => ExtractionKind::Payable,
        Some("receivable") | Some("piutang") => ExtractionKind::Receivable,
        _ => ExtractionKind::Unknown,
    }
}

/// Parse an extraction response from any backend
pub fn parse_extraction(response: &str) -> Result<AIExtraction> {
    let json_str = json_object(response)?;
    let raw: RawExtraction = serde_json::from_str(json_str).map_err(|e| {
        Error::Ai(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })?;

    Ok(AIExtraction {
        kind: parse_kind(raw.kind.as_deref()),
        amount: raw.amount.as_ref().and_then(parse_amount),
        description: raw.description,
        category: raw.category,
        payment_method: raw.payment_method,
        counterparty: raw.counterparty,
        due_date: raw
            .due_date
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let response = r#"{"kind": "expense", "amount": 25000, "description": "bakso", "category": "Makanan & Minuman", "payment_method": "GoPay", "counterparty": null, "due_date": null}"#;
        let e = parse_extraction(response).unwrap();
        assert_eq!(e.kind, ExtractionKind::Expense);
        assert_eq!(e.amount, Some(25_000));
        assert_eq!(e.payment_method.as_deref(), Some("GoPay"));
        assert!(e.counterparty.is_none());
    }

    #[test]
    fn test_parse_wrapped_in_prose_and_fences() {
        let response = "Berikut hasilnya:\n```json\n{\"kind\": \"payable\", \"amount\": \"1,5jt\", \"counterparty\": \"Budi\", \"due_date\": \"2026-11-01\"}\n```";
        let e = parse_extraction(response).unwrap();
        assert_eq!(e.kind, ExtractionKind::Payable);
        assert_eq!(e.amount, Some(1_500_000));
        assert_eq!(e.due_date, NaiveDate::from_ymd_opt(2026, 11, 1));
    }

    #[test]
    fn test_parse_float_and_bad_amounts() {
        let e = parse_extraction(r#"{"kind": "income", "amount": 12500.6}"#).unwrap();
        assert_eq!(e.amount, Some(12_501));

        let e = parse_extraction(r#"{"kind": "income", "amount": -5}"#).unwrap();
        assert!(e.amount.is_none());

        let e = parse_extraction(r#"{"kind": "income", "amount": true}"#).unwrap();
        assert!(e.amount.is_none());
    }

    #[test]
    fn test_parse_unknown_kind() {
        let e = parse_extraction(r#"{"kind": "greeting"}"#).unwrap();
        assert_eq!(e.kind, ExtractionKind::Unknown);
        let e = parse_extraction(r#"{}"#).unwrap();
        assert_eq!(e.kind, ExtractionKind::Unknown);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_extraction("no json here"), Err(Error::Ai(_))));
        assert!(matches!(parse_extraction("{not: valid}"), Err(Error::Ai(_))));
    }
}
