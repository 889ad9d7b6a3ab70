// src/services/import_service.rs
//
// Importação em massa de leads. O parsing do CSV em si acontece no cliente;
// aqui chegam as linhas já separadas, e o serviço valida, normaliza e insere
// em lotes sequenciais. Linha inválida é reportada, nunca inserida.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::LeadRepository,
    models::auth::User,
    services::lead_service::BULK_CHUNK,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub nome: String,
    pub cpf: String,
    pub convenio: Option<String>,
    pub telefone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportRejection {
    // Índice da linha no arquivo original (base 0)
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: u64,
    pub duplicates: u64,
    pub invalid: Vec<ImportRejection>,
}

#[derive(Debug)]
struct ValidRow {
    nome: String,
    cpf: String,
    telefone: String,
    convenio: Option<String>,
}

/// CPF: tira tudo que não é dígito, completa com zeros à esquerda até 11.
/// Mais que 11 dígitos (ou nenhum) é inválido.
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 11 {
        return None;
    }
    Some(format!("{:0>11}", digits))
}

/// Telefone: só dígitos, mínimo 10 (DDD + número)
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return None;
    }
    Some(digits)
}

fn validate_row(index: usize, row: &ImportRow) -> Result<ValidRow, ImportRejection> {
    let nome = row.nome.trim();
    if nome.is_empty() {
        return Err(ImportRejection {
            index,
            reason: "nome vazio".to_string(),
        });
    }

    let cpf = normalize_cpf(&row.cpf).ok_or_else(|| ImportRejection {
        index,
        reason: format!("CPF inválido: {}", row.cpf),
    })?;

    let telefone = normalize_phone(&row.telefone).ok_or_else(|| ImportRejection {
        index,
        reason: format!("telefone inválido: {}", row.telefone),
    })?;

    Ok(ValidRow {
        nome: nome.to_string(),
        cpf,
        telefone,
        convenio: row.convenio.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(String::from),
    })
}

#[derive(Clone)]
pub struct ImportService {
    repo: LeadRepository,
}

impl ImportService {
    pub fn new(repo: LeadRepository) -> Self {
        Self { repo }
    }

    /// Importa as linhas em lotes de 100, um lote por vez. Falha no meio
    /// mantém os lotes já commitados e aborta o restante (sem rollback
    /// cruzado); duplicatas de CPF são contadas, não erram.
    pub async fn import_leads(
        &self,
        actor: &User,
        rows: &[ImportRow],
        assigned_to: Option<Uuid>,
    ) -> Result<ImportReport, AppError> {
        if !actor.is_admin() {
            return Err(AppError::PermissionDenied);
        }

        let owner = assigned_to.unwrap_or(actor.id);

        let mut invalid = Vec::new();
        let mut valid = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            match validate_row(index, row) {
                Ok(v) => valid.push(v),
                Err(rejection) => invalid.push(rejection),
            }
        }

        let mut imported: u64 = 0;
        let mut duplicates: u64 = 0;
        for chunk in valid.chunks(BULK_CHUNK) {
            let nomes: Vec<String> = chunk.iter().map(|r| r.nome.clone()).collect();
            let cpfs: Vec<String> = chunk.iter().map(|r| r.cpf.clone()).collect();
            let telefones: Vec<String> = chunk.iter().map(|r| r.telefone.clone()).collect();
            let convenios: Vec<Option<String>> = chunk.iter().map(|r| r.convenio.clone()).collect();

            let inserted = self
                .repo
                .insert_imported_chunk(&nomes, &cpfs, &telefones, &convenios, owner)
                .await?;

            imported += inserted.len() as u64;
            duplicates += (chunk.len() - inserted.len()) as u64;
        }

        tracing::info!(
            "Importação por {}: {} inseridos, {} duplicados, {} inválidos",
            actor.email,
            imported,
            duplicates,
            invalid.len()
        );

        Ok(ImportReport {
            imported,
            duplicates,
            invalid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_tira_mascara_e_completa_com_zeros() {
        assert_eq!(normalize_cpf("123.456.789-09"), Some("12345678909".to_string()));
        // Mais curto que 11: completa à esquerda
        assert_eq!(normalize_cpf("1234567890"), Some("01234567890".to_string()));
        assert_eq!(normalize_cpf("42"), Some("00000000042".to_string()));
    }

    #[test]
    fn cpf_vazio_ou_longo_demais_e_invalido() {
        assert_eq!(normalize_cpf(""), None);
        assert_eq!(normalize_cpf("abc"), None);
        assert_eq!(normalize_cpf("123456789012"), None);
    }

    #[test]
    fn telefone_exige_dez_digitos() {
        assert_eq!(normalize_phone("(11) 98888-7777"), Some("11988887777".to_string()));
        assert_eq!(normalize_phone("1133334444"), Some("1133334444".to_string()));
        assert_eq!(normalize_phone("8888-7777"), None);
    }

    #[test]
    fn linha_invalida_e_reportada_com_indice() {
        let row = ImportRow {
            nome: "Maria".to_string(),
            cpf: "123456789012".to_string(),
            convenio: Some("INSS".to_string()),
            telefone: "11988887777".to_string(),
        };

        let err = validate_row(7, &row).unwrap_err();
        assert_eq!(err.index, 7);
        assert!(err.reason.contains("CPF"));
    }

    #[test]
    fn linha_valida_sai_normalizada() {
        let row = ImportRow {
            nome: "  Maria da Silva ".to_string(),
            cpf: "123.456.789-09".to_string(),
            convenio: Some("  ".to_string()),
            telefone: "(11) 98888-7777".to_string(),
        };

        let valid = validate_row(0, &row).unwrap();
        assert_eq!(valid.nome, "Maria da Silva");
        assert_eq!(valid.cpf, "12345678909");
        assert_eq!(valid.telefone, "11988887777");
        // Convênio só de espaços vira None
        assert_eq!(valid.convenio, None);
    }
}
