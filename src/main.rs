// src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;

mod common;
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let lead_routes = Router::new()
        .route("/", get(handlers::leads::list_leads).delete(handlers::leads::bulk_delete))
        .route("/request", post(handlers::leads::request_leads))
        .route("/pool-counts", get(handlers::leads::pool_counts))
        .route(
            "/credits",
            get(handlers::leads::get_credit_balance).post(handlers::leads::grant_credits),
        )
        .route("/import", post(handlers::leads::import_leads))
        .route("/expire-contacts", post(handlers::leads::expire_contacts))
        .route("/{id}", get(handlers::leads::get_lead))
        .route("/{id}/status", patch(handlers::leads::change_status))
        .route("/{id}/assign", patch(handlers::leads::assign_lead))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let sales_routes = Router::new()
        .route("/", get(handlers::sales::list_sales))
        .route("/revenue", get(handlers::sales::revenue_overview))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let commission_routes = Router::new()
        .route("/", get(handlers::sales::list_commissions))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let dashboard_routes = Router::new()
        .route("/status-summary", get(handlers::dashboard::status_summary))
        .route("/ranking", get(handlers::dashboard::salesperson_ranking))
        .route("/absenteeism", get(handlers::dashboard::absenteeism))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/leads", lead_routes)
        .nest("/api/televendas", sales_routes)
        .nest("/api/commissions", commission_routes)
        .nest("/api/dashboard", dashboard_routes)
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
