// src/models/lead.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- ENUMS ---

// Ciclo de vida do lead. O grafo de transições é permissivo: a UI oferece
// todos os status num dropdown só, então qualquer status alcança qualquer
// outro (exceto que cliente_fechado é terminal na prática).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    NewLead,
    EmAndamento,
    AguardandoRetorno,
    ClienteFechado,
    RecusouOferta,
    ContatoFuturo,
    Agendamento,
    NaoECliente,
    SemInteresse,
    SemRetorno,
    NaoEWhatsapp,
    // Qualquer valor fora da enumeração cai aqui em vez de quebrar o decode
    Desconhecido,
}

impl LeadStatus {
    /// Enumeração fixa, na ordem de exibição do dashboard
    pub const ALL: [LeadStatus; 11] = [
        Self::NewLead,
        Self::EmAndamento,
        Self::AguardandoRetorno,
        Self::ClienteFechado,
        Self::RecusouOferta,
        Self::ContatoFuturo,
        Self::Agendamento,
        Self::NaoECliente,
        Self::SemInteresse,
        Self::SemRetorno,
        Self::NaoEWhatsapp,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw {
            "new_lead" => Self::NewLead,
            "em_andamento" => Self::EmAndamento,
            "aguardando_retorno" => Self::AguardandoRetorno,
            "cliente_fechado" => Self::ClienteFechado,
            "recusou_oferta" => Self::RecusouOferta,
            "contato_futuro" => Self::ContatoFuturo,
            "agendamento" => Self::Agendamento,
            "nao_e_cliente" => Self::NaoECliente,
            "sem_interesse" => Self::SemInteresse,
            "sem_retorno" => Self::SemRetorno,
            "nao_e_whatsapp" => Self::NaoEWhatsapp,
            _ => Self::Desconhecido,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::EmAndamento => "em_andamento",
            Self::AguardandoRetorno => "aguardando_retorno",
            Self::ClienteFechado => "cliente_fechado",
            Self::RecusouOferta => "recusou_oferta",
            Self::ContatoFuturo => "contato_futuro",
            Self::Agendamento => "agendamento",
            Self::NaoECliente => "nao_e_cliente",
            Self::SemInteresse => "sem_interesse",
            Self::SemRetorno => "sem_retorno",
            Self::NaoEWhatsapp => "nao_e_whatsapp",
            Self::Desconhecido => "desconhecido",
        }
    }

    /// Rótulo humano, usado nas notas de histórico
    pub fn label(&self) -> &'static str {
        match self {
            Self::NewLead => "Novo Lead",
            Self::EmAndamento => "Em Andamento",
            Self::AguardandoRetorno => "Aguardando Retorno",
            Self::ClienteFechado => "Cliente Fechado",
            Self::RecusouOferta => "Recusou Oferta",
            Self::ContatoFuturo => "Contato Futuro",
            Self::Agendamento => "Agendamento",
            Self::NaoECliente => "Não é Cliente",
            Self::SemInteresse => "Sem Interesse",
            Self::SemRetorno => "Sem Retorno",
            Self::NaoEWhatsapp => "Não é WhatsApp",
            Self::Desconhecido => "Desconhecido",
        }
    }
}

impl From<String> for LeadStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<LeadStatus> for String {
    fn from(status: LeadStatus) -> Self {
        status.as_str().to_string()
    }
}

// O status é TEXT no banco. Implementamos Type/Decode/Encode na mão
// porque o decode precisa do fallback Desconhecido: um valor fora da
// enumeração não pode derrubar a listagem inteira.
impl sqlx::Type<sqlx::Postgres> for LeadStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for LeadStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(LeadStatus::parse(raw))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for LeadStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

// Motivos de recusa. Dois deles exigem valor oferecido + banco,
// porque só fazem sentido com uma contraproposta registrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    ValorBaixo,
    FechouOutroBanco,
    TaxaAlta,
    NaoPrecisaMais,
    Outro,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValorBaixo => "valor_baixo",
            Self::FechouOutroBanco => "fechou_outro_banco",
            Self::TaxaAlta => "taxa_alta",
            Self::NaoPrecisaMais => "nao_precisa_mais",
            Self::Outro => "outro",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ValorBaixo => "Valor baixo",
            Self::FechouOutroBanco => "Fechou com outro banco",
            Self::TaxaAlta => "Taxa alta",
            Self::NaoPrecisaMais => "Não precisa mais",
            Self::Outro => "Outro",
        }
    }

    /// Motivos que exigem contraproposta (valor oferecido + banco)
    pub fn requires_offer(&self) -> bool {
        matches!(self, Self::ValorBaixo | Self::FechouOutroBanco)
    }
}

// Ações possíveis no histórico (mapeia o CREATE TYPE lead_history_action)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_history_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    StatusChange,
    Assigned,
    Rejected,
    DigitacaoRequested,
}

// --- O LEAD ---

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub nome: String,
    pub cpf: String,
    pub telefone: String,
    pub telefone2: Option<String>,

    // Categoria de folha/benefício (ex: "INSS"), usada como filtro
    pub convenio: Option<String>,
    // Origem de marketing
    pub tag: Option<String>,

    pub status: LeadStatus,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,

    // Detalhe da recusa (preenchido só em recusou_oferta)
    pub recusa_motivo: Option<String>,
    pub recusa_valor_oferecido: Option<Decimal>,
    pub recusa_banco: Option<String>,
    pub recusa_descricao: Option<String>,

    // Agendamentos
    pub contato_futuro_data: Option<NaiveDate>,
    pub agendamento_data: Option<NaiveDate>,
    pub agendamento_hora: Option<NaiveTime>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Registro imutável do histórico. Nunca sofre UPDATE nem DELETE.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub action: HistoryAction,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub note: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// Lead + histórico completo (resposta de detalhe)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub history: Vec<HistoryEntry>,
}

// Linha do pool compartilhado, antes de virar lead de alguém
#[derive(Debug, Clone, FromRow)]
pub struct PoolLead {
    pub id: Uuid,
    pub nome: String,
    pub cpf: String,
    pub telefone: String,
    pub telefone2: Option<String>,
    pub convenio: Option<String>,
    pub tag: Option<String>,
}

// Quantos leads o pool tem por combinação de convênio/tag/DDD,
// mostrado ao consultor antes de pedir um sorteio
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PoolCount {
    pub convenio: Option<String>,
    pub tag: Option<String>,
    pub ddd: Option<String>,
    pub count: i64,
}

// Filtros do sorteio de leads do pool
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDrawFilters {
    pub convenio: Option<String>,
    #[serde(default)]
    pub ddds: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// --- PAYLOADS DE TRANSIÇÃO ---

// Campos extras que algumas transições exigem. Chega tudo opcional;
// a validação por status acontece no serviço.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionExtra {
    pub reason: Option<RejectionReason>,
    pub description: Option<String>,
    pub offered_value: Option<Decimal>,
    pub bank: Option<String>,
    pub future_contact_date: Option<NaiveDate>,
    pub schedule_date: Option<NaiveDate>,
    pub schedule_time: Option<NaiveTime>,
}

// Dados de recusa já validados (saída de validate_rejection)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionData {
    pub reason: RejectionReason,
    pub description: String,
    pub offered_value: Option<Decimal>,
    pub bank: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleData {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_e_as_str_sao_inversos_para_status_conhecidos() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn status_desconhecido_vira_fallback_sem_quebrar() {
        assert_eq!(LeadStatus::parse("algo_que_nao_existe"), LeadStatus::Desconhecido);
        assert_eq!(LeadStatus::parse(""), LeadStatus::Desconhecido);
        assert_eq!(LeadStatus::Desconhecido.label(), "Desconhecido");
    }

    #[test]
    fn motivos_com_contraproposta_exigem_oferta() {
        assert!(RejectionReason::ValorBaixo.requires_offer());
        assert!(RejectionReason::FechouOutroBanco.requires_offer());
        assert!(!RejectionReason::TaxaAlta.requires_offer());
        assert!(!RejectionReason::Outro.requires_offer());
    }
}
