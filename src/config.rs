// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, time::Duration};

use crate::{
    db::{DashboardRepository, LeadRepository, SalesRepository, UserRepository},
    services::{
        auth::AuthService, commission_service::CommissionService, import_service::ImportService,
        lead_service::LeadService, report_service::ReportService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub commission_service: CommissionService,
    pub report_service: ReportService,
    pub import_service: ImportService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let lead_repo = LeadRepository::new(db_pool.clone());
        let sales_repo = SalesRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo.clone(), jwt_secret.clone(), db_pool.clone());
        let lead_service = LeadService::new(db_pool.clone(), lead_repo.clone(), user_repo.clone());
        let commission_service = CommissionService::new(sales_repo.clone());
        let report_service = ReportService::new(
            lead_repo.clone(),
            sales_repo.clone(),
            user_repo.clone(),
            dashboard_repo.clone(),
        );
        let import_service = ImportService::new(lead_repo.clone());

        Ok(Self {
            db_pool,
            jwt_secret,
            auth_service,
            lead_service,
            commission_service,
            report_service,
            import_service,
        })
    }
}
