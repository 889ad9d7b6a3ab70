// src/handlers/dashboard.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, handlers::sales::PeriodQuery,
    middleware::auth::AuthenticatedUser, models::auth::User,
};

fn owner_scope(user: &User) -> Option<Uuid> {
    if user.is_admin() { None } else { Some(user.id) }
}

// GET /api/dashboard/status-summary
pub async fn status_summary(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state
        .report_service
        .status_summary(&app_state.db_pool, owner_scope(&user))
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/dashboard/ranking
pub async fn salesperson_ranking(
    State(app_state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = period.resolve();

    let ranking = app_state
        .report_service
        .salesperson_ranking(&app_state.db_pool, from, to)
        .await?;

    Ok((StatusCode::OK, Json(ranking)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeismQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    // Dias úteis esperados no período; 22 é o mês comercial
    pub expected_work_days: Option<u32>,
}

// GET /api/dashboard/absenteeism (só admin)
pub async fn absenteeism(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<AbsenteeismQuery>,
) -> Result<impl IntoResponse, AppError> {
    if !user.is_admin() {
        return Err(AppError::PermissionDenied);
    }

    let period = PeriodQuery {
        from: query.from,
        to: query.to,
    };
    let (from, to) = period.resolve();

    // Converte as datas para o intervalo [from 00:00, to+1 00:00) em UTC
    let from_ts = Utc.from_utc_datetime(&from.and_hms_opt(0, 0, 0).unwrap_or_default());
    let to_ts = Utc.from_utc_datetime(
        &to.succ_opt()
            .unwrap_or(to)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default(),
    );

    let report = app_state
        .report_service
        .absenteeism_report(
            &app_state.db_pool,
            from_ts,
            to_ts,
            query.expected_work_days.unwrap_or(22),
        )
        .await?;

    Ok((StatusCode::OK, Json(report)))
}
