// src/models/proposta.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Origem fixa das propostas criadas a partir de leads fechados
pub const ORIGEM_LEADS_PREMIUM: &str = "leads_premium";
// Etapa inicial do funil quando a proposta nasce
pub const ETAPA_CONTATO_INICIADO: &str = "contato_iniciado";

// Registro downstream criado quando um lead vira cliente_fechado.
// Carrega os dados de identidade do lead para o funil de propostas.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Proposta {
    pub id: Uuid,
    pub lead_id: Option<Uuid>,
    pub nome: String,
    pub cpf: String,
    pub telefone: String,
    pub convenio: Option<String>,
    pub origem: String,
    pub etapa: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
