//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{parse_date, resolve_month};
use crate::{AppError, AppState, AuthUser, SuccessResponse, MAX_PAGE_LIMIT};
use gotek_core::models::{
    Transaction, TransactionFilter, TransactionSource, TransactionType, FALLBACK_CATEGORY,
};
use gotek_core::{parse_smart_amount, parse_transaction_message, BudgetStatus, ParsedTransaction};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Calendar month (YYYY-MM)
    pub month: Option<String>,
    /// income or expense
    pub kind: Option<String>,
    pub category_id: Option<i64>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Amount as a number or as chat shorthand ("25rb", "1,5jt")
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(i64),
    Text(String),
}

impl AmountInput {
    pub(crate) fn resolve(&self) -> Option<i64> {
        match self {
            AmountInput::Number(n) => Some(*n).filter(|n| *n > 0),
            AmountInput::Text(s) => parse_smart_amount(s),
        }
    }
}

/// Body for POST /api/transactions
///
/// Either a chat-style `message` read by the same parser as WhatsApp, or
/// structured fields.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateTransactionRequest {
    Message {
        message: String,
        date: Option<String>,
    },
    Fields {
        kind: TransactionType,
        amount: AmountInput,
        #[serde(default)]
        description: String,
        category_id: Option<i64>,
        category: Option<String>,
        payment_method: Option<String>,
        date: Option<String>,
    },
}

#[derive(Serialize)]
pub struct TransactionCreated {
    pub transaction: Transaction,
    /// Category budget after this transaction (expenses with a budget only)
    pub budget: Option<BudgetStatus>,
    pub budget_alert: Option<String>,
}

/// GET /api/transactions - List transactions newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<TransactionListResponse>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let month = params
        .month
        .as_deref()
        .map(|m| resolve_month(Some(m), state.bot.today()))
        .transpose()?;
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<TransactionType>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let filter = TransactionFilter {
        month,
        kind,
        category_id: params.category_id,
        limit,
        offset,
    };
    let transactions = state.db.list_transactions(auth.id, &filter)?;
    let total = state.db.count_transactions(auth.id, &filter)?;

    Ok(Json(TransactionListResponse {
        transactions,
        total,
        limit,
        offset,
    }))
}

/// POST /api/transactions - Record a transaction and evaluate its budget
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), AppError> {
    let (parsed, date) = match req {
        CreateTransactionRequest::Message { message, date } => {
            let parsed = parse_transaction_message(&message).ok_or_else(|| {
                AppError::bad_request("Could not read a transaction from the message")
            })?;
            (parsed, parse_date(date.as_deref(), "date")?)
        }
        CreateTransactionRequest::Fields {
            kind,
            amount,
            description,
            category_id,
            category,
            payment_method,
            date,
        } => {
            let amount = amount
                .resolve()
                .ok_or_else(|| AppError::bad_request("Amount must be a positive number"))?;

            let category = match category_id {
                Some(id) => {
                    let category = state
                        .db
                        .get_category(auth.id, id)?
                        .ok_or_else(|| AppError::not_found("Category not found"))?;
                    if category.kind != kind {
                        return Err(AppError::bad_request(&format!(
                            "Category '{}' is for {}",
                            category.name, category.kind
                        )));
                    }
                    category.name
                }
                None => category
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| FALLBACK_CATEGORY.to_string()),
            };

            let description = match description.trim() {
                "" => category.clone(),
                d => d.to_string(),
            };

            let parsed = ParsedTransaction {
                kind,
                amount,
                description,
                category: Some(category),
                payment_method: payment_method
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty()),
            };
            (parsed, parse_date(date.as_deref(), "date")?)
        }
    };

    let date = date.unwrap_or_else(|| state.bot.today());
    let recorded = state
        .bot
        .record_transaction(auth.id, &parsed, date, TransactionSource::Dashboard)
        .map_err(AppError::from_core)?;
    let budget_alert = recorded.budget_alert();

    Ok((
        StatusCode::CREATED,
        Json(TransactionCreated {
            transaction: recorded.transaction,
            budget: recorded.budget,
            budget_alert,
        }),
    ))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .db
        .get_transaction(auth.id, id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;
    Ok(Json(transaction))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_transaction(auth.id, id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&auth.actor(), "delete", Some("transaction"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shapes() {
        let req: CreateTransactionRequest =
            serde_json::from_str(r#"{"message": "-25rb kopi @Makanan & Minuman"}"#).unwrap();
        assert!(matches!(req, CreateTransactionRequest::Message { .. }));

        let req: CreateTransactionRequest =
            serde_json::from_str(r#"{"kind": "expense", "amount": "1,5jt", "category": "Tagihan"}"#)
                .unwrap();
        let CreateTransactionRequest::Fields { amount, .. } = req else {
            panic!("expected structured fields");
        };
        assert_eq!(amount.resolve(), Some(1_500_000));

        assert_eq!(AmountInput::Number(0).resolve(), None);
        assert_eq!(AmountInput::Number(12_000).resolve(), Some(12_000));
    }
}
