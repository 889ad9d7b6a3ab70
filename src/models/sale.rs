// src/models/sale.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Venda (registro de televendas). O status é texto livre no banco
// ("pago", "cancelado", "solicitado_digitacao"...), vindo de sistemas
// externos, então fica String mesmo.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub banco: String,
    pub tipo_operacao: String,
    pub parcela: Option<Decimal>,
    pub troco: Option<Decimal>,
    pub saldo_devedor: Option<Decimal>,
    pub status: String,
    // Data de competência, distinta do created_at
    pub data_venda: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// Regra de cálculo do valor de uma venda.
// company_id nulo = regra global (vale para qualquer empresa).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRule {
    pub id: Uuid,
    pub bank_name: String,
    pub product_name: String,
    // Texto livre no banco; o parse acontece na hora do cálculo
    pub calculation_model: String,
    pub company_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Modelos de cálculo aceitos. "bruto" é sinônimo histórico de valor_bruto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationModel {
    SaldoDevedor,
    ValorBruto,
    Troco,
    Ambos,
}

impl CalculationModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "saldo_devedor" => Some(Self::SaldoDevedor),
            "valor_bruto" | "bruto" => Some(Self::ValorBruto),
            "troco" => Some(Self::Troco),
            "ambos" => Some(Self::Ambos),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Preview,
    Paid,
}

// Comissão registrada à parte (ledger próprio, não derivada das regras)
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub commission_amount: Decimal,
    pub status: CommissionStatus,
    pub proposal_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aceita_sinonimo_bruto() {
        assert_eq!(CalculationModel::parse("valor_bruto"), Some(CalculationModel::ValorBruto));
        assert_eq!(CalculationModel::parse("bruto"), Some(CalculationModel::ValorBruto));
        assert_eq!(CalculationModel::parse("  AMBOS "), Some(CalculationModel::Ambos));
        assert_eq!(CalculationModel::parse("percentual"), None);
    }
}
