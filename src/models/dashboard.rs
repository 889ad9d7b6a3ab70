// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Perfil enxuto para os relatórios (não carrega hash de senha)
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub is_active: bool,
}

// Registro de ponto de um consultor
#[derive(Debug, Clone, FromRow)]
pub struct ClockEntry {
    pub user_id: Uuid,
    pub registered_at: DateTime<Utc>,
}

// 1. Contagem de leads por status (os cards do topo)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    pub label: String,
    pub count: i64,
}

// 2. Absenteísmo do período
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeismEntry {
    pub user_id: Uuid,
    pub name: String,
    pub missed_days: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeismReport {
    pub per_user: Vec<AbsenteeismEntry>,
    // Fração de dias perdidos sobre o total esperado (0.0 a 1.0)
    pub rate: f64,
}

// 3. Ranking de vendedores por vendas pagas
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SalespersonRank {
    pub id: Uuid,
    pub name: String,
    pub sales_count: u64,
}

// 4. Receita do período vs período anterior
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueOverview {
    pub current_total: Decimal,
    pub previous_total: Decimal,
    pub delta_percent: Decimal,
}
