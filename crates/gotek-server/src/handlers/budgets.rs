//! Budget handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{resolve_month, AmountInput};
use crate::{AppError, AppState, AuthUser, SuccessResponse};
use gotek_core::models::{Budget, TransactionType};
use gotek_core::BudgetReport;

#[derive(Debug, Deserialize)]
pub struct SetBudgetRequest {
    pub category_id: Option<i64>,
    /// Expense category name, used when `category_id` is absent
    pub category: Option<String>,
    pub amount: AmountInput,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// Calendar month (YYYY-MM), defaults to the current month
    pub month: Option<String>,
}

/// GET /api/budgets - List monthly limits
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Budget>>, AppError> {
    Ok(Json(state.db.list_budgets(auth.id)?))
}

/// POST /api/budgets - Create or replace a category's monthly limit
pub async fn set_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SetBudgetRequest>,
) -> Result<Json<Budget>, AppError> {
    let amount = req
        .amount
        .resolve()
        .ok_or_else(|| AppError::bad_request("Amount must be a positive number"))?;

    let category_id = match (req.category_id, req.category.as_deref()) {
        (Some(id), _) => id,
        (None, Some(name)) => {
            state
                .db
                .find_category(auth.id, name, TransactionType::Expense)?
                .ok_or_else(|| AppError::not_found("Expense category not found"))?
                .id
        }
        (None, None) => return Err(AppError::bad_request("category_id or category is required")),
    };

    let budget = state
        .db
        .upsert_budget(auth.id, category_id, amount)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &auth.actor(),
        "set",
        Some("budget"),
        Some(budget.id),
        Some(&format!("category={}, amount={}", budget.category_name, budget.amount)),
    )?;

    Ok(Json(budget))
}

/// DELETE /api/budgets/:id - Remove a monthly limit
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_budget(auth.id, id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&auth.actor(), "delete", Some("budget"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/budgets/status?month=YYYY-MM - Every budget against the month's spending
pub async fn budget_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<Vec<BudgetReport>>, AppError> {
    let month = resolve_month(params.month.as_deref(), state.bot.today())?;
    Ok(Json(state.db.list_budget_statuses(auth.id, month)?))
}
