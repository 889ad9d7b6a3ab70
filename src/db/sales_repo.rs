// src/db/sales_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::sale::{Commission, CommissionRule, Sale},
};

#[derive(Clone)]
pub struct SalesRepository {
    pool: PgPool,
}

impl SalesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Vendas do período. `owner` restringe ao consultor (admin passa None).
    pub async fn list_sales<'e, E>(
        &self,
        executor: E,
        owner: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM televendas
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND data_venda >= $2
              AND data_venda <= $3
            ORDER BY data_venda ASC, created_at ASC
            "#,
        )
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(sales)
    }

    /// Todas as regras, ativas ou não. Quem filtra é o matcher, que
    /// precisa ignorar inativas de forma determinística.
    pub async fn list_rules<'e, E>(&self, executor: E) -> Result<Vec<CommissionRule>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rules =
            sqlx::query_as::<_, CommissionRule>("SELECT * FROM commission_rules ORDER BY created_at ASC")
                .fetch_all(executor)
                .await?;

        Ok(rules)
    }

    pub async fn list_commissions(
        &self,
        owner: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Commission>, AppError> {
        let commissions = sqlx::query_as::<_, Commission>(
            r#"
            SELECT * FROM commissions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND proposal_date >= $2
              AND proposal_date <= $3
            ORDER BY proposal_date ASC
            "#,
        )
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(commissions)
    }
}
