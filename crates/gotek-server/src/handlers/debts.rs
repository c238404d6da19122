//! Debt and receivable handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use super::{parse_date, AmountInput};
use crate::{AppError, AppState, AuthUser, SuccessResponse};
use gotek_core::models::{Debt, DebtKind, DebtStatus, NewDebt};
use gotek_core::parser::parse_debt_message_on;

#[derive(Debug, Deserialize)]
pub struct DebtQuery {
    /// unpaid or paid
    pub status: Option<String>,
}

/// Body for POST /api/debts: a chat-style message or structured fields
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateDebtRequest {
    Message {
        message: String,
    },
    Fields {
        kind: DebtKind,
        counterparty: String,
        amount: AmountInput,
        #[serde(default)]
        description: String,
        due_date: Option<String>,
    },
}

/// GET /api/debts - List debts and receivables
pub async fn list_debts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<DebtQuery>,
) -> Result<Json<Vec<Debt>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<DebtStatus>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    Ok(Json(state.db.list_debts(auth.id, status)?))
}

/// POST /api/debts - Record a debt or receivable
pub async fn create_debt(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateDebtRequest>,
) -> Result<(StatusCode, Json<Debt>), AppError> {
    let new_debt = match req {
        CreateDebtRequest::Message { message } => {
            let parsed = parse_debt_message_on(&message, state.bot.today()).ok_or_else(|| {
                AppError::bad_request("Could not read a debt from the message")
            })?;
            NewDebt {
                kind: parsed.kind,
                counterparty: parsed.counterparty,
                amount: parsed.amount,
                description: parsed.description,
                due_date: parsed.due_date,
            }
        }
        CreateDebtRequest::Fields {
            kind,
            counterparty,
            amount,
            description,
            due_date,
        } => NewDebt {
            kind,
            counterparty,
            amount: amount
                .resolve()
                .ok_or_else(|| AppError::bad_request("Amount must be a positive number"))?,
            description,
            due_date: parse_date(due_date.as_deref(), "due_date")?,
        },
    };

    let debt = state
        .db
        .insert_debt(auth.id, &new_debt)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &auth.actor(),
        "create",
        Some("debt"),
        Some(debt.id),
        Some(&format!("kind={}, source=dashboard", debt.kind)),
    )?;

    Ok((StatusCode::CREATED, Json(debt)))
}

/// POST /api/debts/:id/pay - Mark a debt as settled
pub async fn pay_debt(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Debt>, AppError> {
    let debt = state
        .db
        .mark_debt_paid(auth.id, id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&auth.actor(), "pay", Some("debt"), Some(id), None)?;

    Ok(Json(debt))
}

/// DELETE /api/debts/:id - Delete a debt
pub async fn delete_debt(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_debt(auth.id, id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&auth.actor(), "delete", Some("debt"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
