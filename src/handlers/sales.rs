// src/handlers/sales.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser,
    models::auth::User,
};

fn owner_scope(user: &User) -> Option<Uuid> {
    if user.is_admin() { None } else { Some(user.id) }
}

// Período consultado; sem parâmetros, vale o mês corrente
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl PeriodQuery {
    pub fn resolve(&self) -> (NaiveDate, NaiveDate) {
        let today = Utc::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);
        (self.from.unwrap_or(month_start), self.to.unwrap_or(today))
    }
}

// GET /api/televendas
pub async fn list_sales(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = period.resolve();

    let sales = app_state
        .commission_service
        .list_sales(&app_state.db_pool, owner_scope(&user), from, to)
        .await?;

    Ok((StatusCode::OK, Json(sales)))
}

// GET /api/televendas/revenue
pub async fn revenue_overview(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = period.resolve();

    let overview = app_state
        .commission_service
        .revenue_overview(&app_state.db_pool, owner_scope(&user), from, to)
        .await?;

    Ok((StatusCode::OK, Json(overview)))
}

// GET /api/commissions
pub async fn list_commissions(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = period.resolve();

    let commissions = app_state
        .commission_service
        .list_commissions(owner_scope(&user), from, to)
        .await?;

    Ok((StatusCode::OK, Json(commissions)))
}
