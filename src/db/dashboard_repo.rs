// src/db/dashboard_repo.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{common::error::AppError, models::dashboard::ClockEntry};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registros de ponto do período, para o cálculo de absenteísmo.
    /// A redução acontece em memória no report_service.
    pub async fn list_clock_entries(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClockEntry>, AppError> {
        let entries = sqlx::query_as::<_, ClockEntry>(
            r#"
            SELECT user_id, registered_at
            FROM clock_entries
            WHERE registered_at >= $1 AND registered_at < $2
            ORDER BY registered_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
