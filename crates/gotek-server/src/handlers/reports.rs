//! Monthly summary and export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response, StatusCode},
    Extension, Json,
};
use tracing::info;

use super::{resolve_month, MonthQuery};
use crate::{AppError, AppState, AuthUser};
use gotek_core::models::MonthlySummary;
use gotek_core::TransactionExportOptions;

/// GET /api/summary?month=YYYY-MM - Income, expense and balance for a month
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Json<MonthlySummary>, AppError> {
    let month = resolve_month(params.month.as_deref(), state.bot.today())?;
    Ok(Json(state.db.monthly_summary(auth.id, month)?))
}

/// GET /api/export/transactions?month=YYYY-MM - Download transactions as CSV
///
/// Without `month` every transaction is exported.
pub async fn export_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<MonthQuery>,
) -> Result<Response<Body>, AppError> {
    let month = params
        .month
        .as_deref()
        .map(|m| resolve_month(Some(m), state.bot.today()))
        .transpose()?;

    let csv = state
        .db
        .export_transactions_csv(auth.id, &TransactionExportOptions { month })?;

    state.db.log_audit(
        &auth.actor(),
        "export",
        Some("transaction"),
        None,
        Some(&format!(
            "month={}",
            month.map(|m| m.to_string()).unwrap_or_else(|| "all".into())
        )),
    )?;
    info!(user_id = auth.id, "Exported transactions");

    let filename = match month {
        Some(m) => format!("gotek-transactions-{}.csv", m),
        None => "gotek-transactions.csv".to_string(),
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::from(anyhow::anyhow!(e)))?;

    Ok(response)
}
