//! Category handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, SuccessResponse};
use gotek_core::models::{Category, TransactionType};

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    /// income or expense
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub kind: TransactionType,
}

/// GET /api/categories - List the user's categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<CategoryQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<TransactionType>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    Ok(Json(state.db.list_categories(auth.id, kind)?))
}

/// POST /api/categories - Create a category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state
        .db
        .create_category(auth.id, &req.name, req.kind)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &auth.actor(),
        "create",
        Some("category"),
        Some(category.id),
        Some(&format!("name={}, kind={}", category.name, category.kind)),
    )?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// DELETE /api/categories/:id - Delete an unused category
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_category(auth.id, id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&auth.actor(), "delete", Some("category"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
