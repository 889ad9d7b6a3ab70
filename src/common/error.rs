use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Nenhum erro sobe até derrubar o processo: tudo vira resposta JSON.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Campo obrigatório ausente numa transição de status
    #[error("Campo obrigatório ausente: {0}")]
    MissingTransitionField(&'static str),

    // Status fora da enumeração fixa. O fallback Desconhecido existe só
    // para leitura; nunca é um destino válido de transição.
    #[error("Status de destino inválido")]
    UnknownStatus,

    #[error("Sem permissão para alterar este lead")]
    PermissionDenied,

    #[error("Créditos insuficientes: disponível {available}, solicitado {requested}")]
    InsufficientCredits { available: i64, requested: i64 },

    // Falha ao criar o registro downstream (proposta) no fechamento.
    // A transição inteira é abortada, nunca aplicada pela metade.
    #[error("Falha ao criar proposta: {0}")]
    DownstreamCreation(String),

    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::MissingTransitionField(field) => {
                let body = Json(json!({
                    "error": "Campo obrigatório ausente para esta transição.",
                    "field": field,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InsufficientCredits { available, requested } => {
                let body = Json(json!({
                    "error": "Créditos insuficientes para solicitar leads.",
                    "available": available,
                    "requested": requested,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::UnknownStatus => {
                (StatusCode::BAD_REQUEST, "Status de destino inválido para esta transição.")
            }
            AppError::PermissionDenied => {
                (StatusCode::FORBIDDEN, "Você não tem permissão para alterar este lead.")
            }
            AppError::LeadNotFound => (StatusCode::NOT_FOUND, "Lead não encontrado."),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "Este e-mail já está em uso."),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos."),
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.")
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado."),
            AppError::DownstreamCreation(ref detail) => {
                tracing::error!("Falha downstream no fechamento de lead: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Não foi possível criar a proposta. Nada foi alterado.")
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
