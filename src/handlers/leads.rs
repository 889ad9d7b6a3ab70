// src/handlers/leads.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::User,
        lead::{LeadDrawFilters, LeadStatus, TransitionExtra},
    },
    services::import_service::ImportRow,
};

// Admin enxerga tudo; consultor só os próprios leads
fn owner_scope(user: &User) -> Option<Uuid> {
    if user.is_admin() { None } else { Some(user.id) }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLeadsQuery {
    pub status: Option<String>,
}

// GET /api/leads
pub async fn list_leads(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListLeadsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = query.status.as_deref().map(LeadStatus::parse);

    let leads = app_state
        .lead_service
        .list(owner_scope(&user), status)
        .await?;

    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/leads/{id}
pub async fn get_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.lead_service.detail(lead_id, &user).await?;

    Ok((StatusCode::OK, Json(detail)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusPayload {
    pub status: LeadStatus,
    #[serde(flatten)]
    pub extra: TransitionExtra,
}

// PATCH /api/leads/{id}/status
pub async fn change_status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let lead = app_state
        .lead_service
        .change_status(lead_id, payload.status, &user, payload.extra)
        .await?;

    Ok((StatusCode::OK, Json(lead)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPayload {
    pub assigned_to: Uuid,
}

// PATCH /api/leads/{id}/assign
pub async fn assign_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<AssignPayload>,
) -> Result<impl IntoResponse, AppError> {
    let lead = app_state
        .lead_service
        .assign_lead(lead_id, payload.assigned_to, &user)
        .await?;

    Ok((StatusCode::OK, Json(lead)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestLeadsPayload {
    #[validate(range(min = 1, message = "Solicite pelo menos 1 lead."))]
    pub count: i64,
    #[serde(default)]
    pub filters: LeadDrawFilters,
}

// POST /api/leads/request
pub async fn request_leads(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<RequestLeadsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // Sorteio vazio não é erro: o chamador enxerga drawn/duplicates zerados
    let outcome = app_state
        .lead_service
        .request_leads(&user, &payload.filters, payload.count)
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// GET /api/leads/pool-counts — o que o pool tem, por convênio/tag/DDD
pub async fn pool_counts(
    State(app_state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let counts = app_state.lead_service.pool_counts().await?;

    Ok((StatusCode::OK, Json(counts)))
}

// GET /api/leads/credits
pub async fn get_credit_balance(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let balance = app_state.lead_service.credit_balance(user.id).await?;

    Ok((StatusCode::OK, Json(json!({ "balance": balance }))))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsPayload {
    pub user_id: Uuid,
    #[validate(range(min = 1, message = "A quantidade deve ser positiva."))]
    pub amount: i64,
}

// POST /api/leads/credits (só admin)
pub async fn grant_credits(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<GrantCreditsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let balance = app_state
        .lead_service
        .grant_credits(&user, payload.user_id, payload.amount)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "balance": balance }))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub rows: Vec<ImportRow>,
    pub assigned_to: Option<Uuid>,
}

// POST /api/leads/import (só admin)
pub async fn import_leads(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ImportPayload>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .import_service
        .import_leads(&user, &payload.rows, payload.assigned_to)
        .await?;

    Ok((StatusCode::OK, Json(report)))
}

// POST /api/leads/expire-contacts (só admin, rotina sob demanda)
pub async fn expire_contacts(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let expired = app_state.lead_service.expire_overdue_contacts(&user).await?;

    Ok((StatusCode::OK, Json(json!({ "expired": expired }))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeletePayload {
    pub ids: Vec<Uuid>,
}

// DELETE /api/leads (só admin, em lotes)
pub async fn bulk_delete(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<BulkDeletePayload>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = app_state
        .lead_service
        .bulk_delete(&user, &payload.ids)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "deleted": deleted }))))
}
