// src/services/lead_service.rs
//
// Máquina de estados do lead. O grafo é permissivo de propósito (qualquer
// status alcança qualquer outro via dropdown); o que a transição carrega de
// regra fica nos handlers explícitos por status de destino, cada um rodando
// dentro de UMA transação: validação, persistência, histórico e efeitos
// colaterais (blacklist, alerta, proposta) commitam ou desfazem juntos.

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, UserRepository},
    models::{
        auth::User,
        lead::{
            HistoryAction, Lead, LeadDetail, LeadDrawFilters, LeadStatus, PoolCount,
            RejectionData, ScheduleData, TransitionExtra,
        },
    },
};

// Operações em massa rodam em lotes sequenciais deste tamanho
pub const BULK_CHUNK: usize = 100;

type Tx<'t> = sqlx::Transaction<'t, sqlx::Postgres>;

// Resultado de um sorteio: o que materializou e o que caiu como duplicata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOutcome {
    pub leads: Vec<Lead>,
    pub drawn: usize,
    pub duplicates: usize,
}

// --- REGRAS PURAS (testáveis sem banco) ---

/// Admin, dono atual ou criador podem mexer no lead. Mais ninguém.
pub fn authorize_mutation(lead: &Lead, actor: &User) -> Result<(), AppError> {
    if actor.is_admin()
        || lead.assigned_to == Some(actor.id)
        || lead.created_by == Some(actor.id)
    {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

pub fn validate_rejection(extra: &TransitionExtra) -> Result<RejectionData, AppError> {
    let reason = extra
        .reason
        .ok_or(AppError::MissingTransitionField("reason"))?;

    let description = extra
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or(AppError::MissingTransitionField("description"))?
        .to_string();

    if reason.requires_offer() {
        if extra.offered_value.is_none() {
            return Err(AppError::MissingTransitionField("offeredValue"));
        }
        if extra.bank.as_deref().is_none_or(|b| b.trim().is_empty()) {
            return Err(AppError::MissingTransitionField("bank"));
        }
    }

    Ok(RejectionData {
        reason,
        description,
        offered_value: extra.offered_value,
        bank: extra.bank.clone(),
    })
}

pub fn validate_future_contact(extra: &TransitionExtra) -> Result<chrono::NaiveDate, AppError> {
    extra
        .future_contact_date
        .ok_or(AppError::MissingTransitionField("futureContactDate"))
}

pub fn validate_schedule(extra: &TransitionExtra) -> Result<ScheduleData, AppError> {
    let date = extra
        .schedule_date
        .ok_or(AppError::MissingTransitionField("scheduleDate"))?;
    let time = extra
        .schedule_time
        .ok_or(AppError::MissingTransitionField("scheduleTime"))?;
    Ok(ScheduleData { date, time })
}

/// O fallback Desconhecido só existe para leitura de valores legados;
/// nunca pode ser gravado como destino de transição.
pub fn validate_target_status(status: LeadStatus) -> Result<(), AppError> {
    if status == LeadStatus::Desconhecido {
        return Err(AppError::UnknownStatus);
    }
    Ok(())
}

/// Precondição do sorteio: saldo positivo e pedido dentro do saldo
pub fn check_credit(balance: i64, requested: i64) -> Result<(), AppError> {
    if balance <= 0 || requested > balance {
        return Err(AppError::InsufficientCredits {
            available: balance.max(0),
            requested,
        });
    }
    Ok(())
}

fn transition_note(from: LeadStatus, to: LeadStatus) -> String {
    format!("Status alterado de {} para {}", from.label(), to.label())
}

// --- SERVIÇO ---

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
    repo: LeadRepository,
    user_repo: UserRepository,
}

impl LeadService {
    pub fn new(pool: PgPool, repo: LeadRepository, user_repo: UserRepository) -> Self {
        Self {
            pool,
            repo,
            user_repo,
        }
    }

    pub async fn list(
        &self,
        owner: Option<Uuid>,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError> {
        self.repo.list(&self.pool, owner, status).await
    }

    pub async fn detail(&self, lead_id: Uuid, actor: &User) -> Result<LeadDetail, AppError> {
        let lead = self
            .repo
            .find_by_id(&self.pool, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;
        authorize_mutation(&lead, actor)?;

        let history = self.repo.list_history(&self.pool, lead_id).await?;
        Ok(LeadDetail { lead, history })
    }

    // =========================================================================
    //  TRANSIÇÃO DE STATUS
    // =========================================================================

    /// Toda transição: autoriza, despacha para o handler do status de destino
    /// e registra exatamente UMA entrada de histórico. Tudo numa transação.
    pub async fn change_status(
        &self,
        lead_id: Uuid,
        new_status: LeadStatus,
        actor: &User,
        extra: TransitionExtra,
    ) -> Result<Lead, AppError> {
        validate_target_status(new_status)?;

        let mut tx = self.pool.begin().await?;

        let lead = self
            .repo
            .find_by_id(&mut *tx, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;
        authorize_mutation(&lead, actor)?;

        let updated = match new_status {
            LeadStatus::RecusouOferta => self.apply_recusa(&mut tx, &lead, actor, &extra).await?,
            LeadStatus::ContatoFuturo => {
                self.apply_contato_futuro(&mut tx, &lead, actor, &extra).await?
            }
            LeadStatus::Agendamento => {
                self.apply_agendamento(&mut tx, &lead, actor, &extra).await?
            }
            LeadStatus::ClienteFechado => self.apply_fechamento(&mut tx, &lead, actor).await?,
            _ => self.apply_simples(&mut tx, &lead, actor, new_status).await?,
        };

        tx.commit().await?;

        tracing::info!(
            "Lead {} transicionado de {} para {} por {}",
            lead_id,
            lead.status.as_str(),
            new_status.as_str(),
            actor.email
        );

        Ok(updated)
    }

    /// recusou_oferta: valida motivo/descrição (e contraproposta quando o
    /// motivo exige), grava os campos de recusa e joga o CPF na blacklist.
    async fn apply_recusa(
        &self,
        tx: &mut Tx<'_>,
        lead: &Lead,
        actor: &User,
        extra: &TransitionExtra,
    ) -> Result<Lead, AppError> {
        let data = validate_rejection(extra)?;

        let updated = self.repo.update_rejection(&mut **tx, lead.id, &data).await?;

        let payload = serde_json::to_value(&data).map_err(anyhow::Error::from)?;
        self.repo
            .append_history(
                &mut **tx,
                lead.id,
                HistoryAction::Rejected,
                Some(lead.status.as_str()),
                Some(LeadStatus::RecusouOferta.as_str()),
                Some(actor.id),
                &actor.full_name,
                Some(&format!("Recusou oferta: {}", data.reason.label())),
                Some(payload),
            )
            .await?;

        let motivo = format!("recusou_oferta: {}", data.reason.label());
        self.repo
            .insert_blacklist(&mut **tx, &lead.cpf, &motivo, Some(actor.id))
            .await?;

        Ok(updated)
    }

    /// contato_futuro: grava a data e cria o alerta companheiro. O retorno
    /// automático para new_lead fica a cargo de expire_overdue_contacts.
    async fn apply_contato_futuro(
        &self,
        tx: &mut Tx<'_>,
        lead: &Lead,
        actor: &User,
        extra: &TransitionExtra,
    ) -> Result<Lead, AppError> {
        let date = validate_future_contact(extra)?;

        let updated = self.repo.update_future_contact(&mut **tx, lead.id, date).await?;

        let note = format!("Contato futuro marcado para {}", date.format("%d/%m/%Y"));
        self.repo
            .append_history(
                &mut **tx,
                lead.id,
                HistoryAction::StatusChange,
                Some(lead.status.as_str()),
                Some(LeadStatus::ContatoFuturo.as_str()),
                Some(actor.id),
                &actor.full_name,
                Some(&note),
                Some(json!({ "futureContactDate": date })),
            )
            .await?;

        let alert_owner = lead.assigned_to.unwrap_or(actor.id);
        self.repo
            .insert_alert(&mut **tx, lead.id, alert_owner, date, &note)
            .await?;

        Ok(updated)
    }

    /// agendamento: data + hora obrigatórias, sem efeitos externos
    async fn apply_agendamento(
        &self,
        tx: &mut Tx<'_>,
        lead: &Lead,
        actor: &User,
        extra: &TransitionExtra,
    ) -> Result<Lead, AppError> {
        let schedule = validate_schedule(extra)?;

        let updated = self
            .repo
            .update_schedule(&mut **tx, lead.id, schedule.date, schedule.time)
            .await?;

        let note = format!(
            "Agendamento marcado para {} às {}",
            schedule.date.format("%d/%m/%Y"),
            schedule.time.format("%H:%M")
        );
        let payload = serde_json::to_value(&schedule).map_err(anyhow::Error::from)?;
        self.repo
            .append_history(
                &mut **tx,
                lead.id,
                HistoryAction::StatusChange,
                Some(lead.status.as_str()),
                Some(LeadStatus::Agendamento.as_str()),
                Some(actor.id),
                &actor.full_name,
                Some(&note),
                Some(payload),
            )
            .await?;

        Ok(updated)
    }

    /// cliente_fechado: a proposta downstream nasce ANTES do status virar.
    /// Se a criação falhar, a transação desfaz tudo e o lead fica como estava.
    async fn apply_fechamento(
        &self,
        tx: &mut Tx<'_>,
        lead: &Lead,
        actor: &User,
    ) -> Result<Lead, AppError> {
        let proposta = self.repo.create_proposta(&mut **tx, lead, actor.id).await?;

        let updated = self
            .repo
            .update_status(&mut **tx, lead.id, LeadStatus::ClienteFechado)
            .await?;

        self.repo
            .append_history(
                &mut **tx,
                lead.id,
                HistoryAction::StatusChange,
                Some(lead.status.as_str()),
                Some(LeadStatus::ClienteFechado.as_str()),
                Some(actor.id),
                &actor.full_name,
                Some(&transition_note(lead.status, LeadStatus::ClienteFechado)),
                Some(json!({ "propostaId": proposta.id })),
            )
            .await?;

        Ok(updated)
    }

    /// Demais status: troca simples com nota humana no histórico
    async fn apply_simples(
        &self,
        tx: &mut Tx<'_>,
        lead: &Lead,
        actor: &User,
        new_status: LeadStatus,
    ) -> Result<Lead, AppError> {
        let updated = self.repo.update_status(&mut **tx, lead.id, new_status).await?;

        self.repo
            .append_history(
                &mut **tx,
                lead.id,
                HistoryAction::StatusChange,
                Some(lead.status.as_str()),
                Some(new_status.as_str()),
                Some(actor.id),
                &actor.full_name,
                Some(&transition_note(lead.status, new_status)),
                None,
            )
            .await?;

        Ok(updated)
    }

    // =========================================================================
    //  ATRIBUIÇÃO (paralela ao status, não mexe nele)
    // =========================================================================

    pub async fn assign_lead(
        &self,
        lead_id: Uuid,
        new_assignee: Uuid,
        actor: &User,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = self
            .repo
            .find_by_id(&mut *tx, lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;
        authorize_mutation(&lead, actor)?;

        let target = self
            .user_repo
            .find_by_id_with(&mut *tx, new_assignee)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let previous_name = match lead.assigned_to {
            Some(id) => self
                .user_repo
                .find_by_id_with(&mut *tx, id)
                .await?
                .map(|u| u.full_name)
                .unwrap_or_else(|| "desconhecido".to_string()),
            None => "ninguém".to_string(),
        };

        let updated = self.repo.update_assignee(&mut *tx, lead_id, new_assignee).await?;

        self.repo
            .append_history(
                &mut *tx,
                lead_id,
                HistoryAction::Assigned,
                None,
                None,
                Some(actor.id),
                &actor.full_name,
                Some(&format!("Transferido de {} para {}", previous_name, target.full_name)),
                Some(json!({ "de": previous_name, "para": target.full_name })),
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // =========================================================================
    //  SOLICITAÇÃO DE LEADS (sorteio com crédito)
    // =========================================================================

    /// Sorteia até `count` leads do pool. O saldo é lido com lock; sorteio
    /// vazio não debita nada. Debita pelo que materializou, não pelo pedido.
    pub async fn request_leads(
        &self,
        actor: &User,
        filters: &LeadDrawFilters,
        count: i64,
    ) -> Result<DrawOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let balance = self.repo.credit_balance_for_update(&mut *tx, actor.id).await?;
        check_credit(balance, count)?;

        let drawn = self.repo.draw_from_pool(&mut *tx, filters, count).await?;
        if drawn.is_empty() {
            tx.rollback().await?;
            return Ok(DrawOutcome {
                leads: Vec::new(),
                drawn: 0,
                duplicates: 0,
            });
        }

        let mut leads = Vec::with_capacity(drawn.len());
        for pool_lead in &drawn {
            // CPF já cadastrado como lead não materializa de novo
            if let Some(lead) = self.repo.insert_from_pool(&mut *tx, pool_lead, actor.id).await? {
                self.repo
                    .append_history(
                        &mut *tx,
                        lead.id,
                        HistoryAction::Created,
                        None,
                        Some(LeadStatus::NewLead.as_str()),
                        Some(actor.id),
                        &actor.full_name,
                        Some("Lead solicitado do pool"),
                        None,
                    )
                    .await?;
                leads.push(lead);
            }
        }

        if !leads.is_empty() {
            self.repo
                .debit_credits(&mut *tx, actor.id, leads.len() as i64)
                .await?;
        }

        tx.commit().await?;

        // CPF já cadastrado some do pool sem virar lead; o chamador
        // precisa enxergar isso no resultado
        let duplicates = drawn.len() - leads.len();

        tracing::info!(
            "{} solicitou {} leads, {} materializados, {} duplicados",
            actor.email,
            count,
            leads.len(),
            duplicates
        );

        let drawn = leads.len();
        Ok(DrawOutcome {
            leads,
            drawn,
            duplicates,
        })
    }

    pub async fn credit_balance(&self, user_id: Uuid) -> Result<i64, AppError> {
        self.repo.credit_balance(user_id).await
    }

    pub async fn pool_counts(&self) -> Result<Vec<PoolCount>, AppError> {
        self.repo.pool_counts().await
    }

    pub async fn grant_credits(
        &self,
        actor: &User,
        user_id: Uuid,
        amount: i64,
    ) -> Result<i64, AppError> {
        if !actor.is_admin() {
            return Err(AppError::PermissionDenied);
        }
        self.repo.grant_credits(user_id, amount).await
    }

    // =========================================================================
    //  ROTINAS SOB DEMANDA
    // =========================================================================

    /// Devolve para new_lead os leads com contato futuro vencido.
    /// Invocada sob demanda (não existe processo de fundo aqui).
    pub async fn expire_overdue_contacts(&self, actor: &User) -> Result<u64, AppError> {
        if !actor.is_admin() {
            return Err(AppError::PermissionDenied);
        }

        let mut tx = self.pool.begin().await?;
        let expired = self.repo.expire_overdue_contacts(&mut *tx).await?;

        for lead in &expired {
            self.repo
                .append_history(
                    &mut *tx,
                    lead.id,
                    HistoryAction::StatusChange,
                    Some(LeadStatus::ContatoFuturo.as_str()),
                    Some(LeadStatus::NewLead.as_str()),
                    Some(actor.id),
                    &actor.full_name,
                    Some("Contato futuro vencido, lead devolvido para a fila"),
                    None,
                )
                .await?;
        }

        tx.commit().await?;
        Ok(expired.len() as u64)
    }

    /// Deleção em massa (só admin): lotes sequenciais de 100, cada um
    /// aguardado antes do próximo. Falha no meio mantém os lotes anteriores
    /// e aborta os restantes, sem rollback cruzado.
    pub async fn bulk_delete(&self, actor: &User, ids: &[Uuid]) -> Result<u64, AppError> {
        if !actor.is_admin() {
            return Err(AppError::PermissionDenied);
        }

        let mut deleted = 0;
        for chunk in ids.chunks(BULK_CHUNK) {
            deleted += self.repo.delete_chunk(chunk).await?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{auth::UserRole, lead::RejectionReason};
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@exemplo.com".to_string(),
            password_hash: String::new(),
            full_name: "Ana Silva".to_string(),
            role,
            company_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn lead_of(assigned_to: Option<Uuid>, created_by: Option<Uuid>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            nome: "Maria".to_string(),
            cpf: "01234567890".to_string(),
            telefone: "11988887777".to_string(),
            telefone2: None,
            convenio: Some("INSS".to_string()),
            tag: None,
            status: LeadStatus::EmAndamento,
            assigned_to,
            created_by,
            recusa_motivo: None,
            recusa_valor_oferecido: None,
            recusa_banco: None,
            recusa_descricao: None,
            contato_futuro_data: None,
            agendamento_data: None,
            agendamento_hora: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_dono_e_criador_podem_alterar() {
        let admin = user(UserRole::Admin);
        let dono = user(UserRole::Consultor);
        let criador = user(UserRole::Consultor);
        let intruso = user(UserRole::Consultor);

        let lead = lead_of(Some(dono.id), Some(criador.id));

        assert!(authorize_mutation(&lead, &admin).is_ok());
        assert!(authorize_mutation(&lead, &dono).is_ok());
        assert!(authorize_mutation(&lead, &criador).is_ok());
        assert!(matches!(
            authorize_mutation(&lead, &intruso),
            Err(AppError::PermissionDenied)
        ));
    }

    #[test]
    fn recusa_exige_motivo_e_descricao() {
        let sem_nada = TransitionExtra::default();
        assert!(matches!(
            validate_rejection(&sem_nada),
            Err(AppError::MissingTransitionField("reason"))
        ));

        let sem_descricao = TransitionExtra {
            reason: Some(RejectionReason::TaxaAlta),
            description: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_rejection(&sem_descricao),
            Err(AppError::MissingTransitionField("description"))
        ));
    }

    #[test]
    fn valor_baixo_sem_contraproposta_falha() {
        // Cenário E: reason valor_baixo sem offeredValue
        let extra = TransitionExtra {
            reason: Some(RejectionReason::ValorBaixo),
            description: Some("Cliente achou pouco".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_rejection(&extra),
            Err(AppError::MissingTransitionField("offeredValue"))
        ));

        let sem_banco = TransitionExtra {
            reason: Some(RejectionReason::ValorBaixo),
            description: Some("Cliente achou pouco".to_string()),
            offered_value: Some(Decimal::from(1500)),
            ..Default::default()
        };
        assert!(matches!(
            validate_rejection(&sem_banco),
            Err(AppError::MissingTransitionField("bank"))
        ));
    }

    #[test]
    fn recusa_completa_passa() {
        let extra = TransitionExtra {
            reason: Some(RejectionReason::ValorBaixo),
            description: Some("Cliente achou pouco".to_string()),
            offered_value: Some(Decimal::from(1500)),
            bank: Some("Banco Alfa".to_string()),
            ..Default::default()
        };

        let data = validate_rejection(&extra).unwrap();
        assert_eq!(data.reason, RejectionReason::ValorBaixo);
        assert_eq!(data.description, "Cliente achou pouco");
        assert_eq!(data.offered_value, Some(Decimal::from(1500)));
    }

    #[test]
    fn motivo_sem_contraproposta_nao_exige_oferta() {
        let extra = TransitionExtra {
            reason: Some(RejectionReason::Outro),
            description: Some("Mudou de ideia".to_string()),
            ..Default::default()
        };
        assert!(validate_rejection(&extra).is_ok());
    }

    #[test]
    fn contato_futuro_exige_data() {
        assert!(matches!(
            validate_future_contact(&TransitionExtra::default()),
            Err(AppError::MissingTransitionField("futureContactDate"))
        ));

        let extra = TransitionExtra {
            future_contact_date: NaiveDate::from_ymd_opt(2026, 9, 15),
            ..Default::default()
        };
        assert_eq!(
            validate_future_contact(&extra).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap()
        );
    }

    #[test]
    fn agendamento_exige_data_e_hora() {
        let so_data = TransitionExtra {
            schedule_date: NaiveDate::from_ymd_opt(2026, 9, 15),
            ..Default::default()
        };
        assert!(matches!(
            validate_schedule(&so_data),
            Err(AppError::MissingTransitionField("scheduleTime"))
        ));

        let completo = TransitionExtra {
            schedule_date: NaiveDate::from_ymd_opt(2026, 9, 15),
            schedule_time: NaiveTime::from_hms_opt(14, 30, 0),
            ..Default::default()
        };
        let schedule = validate_schedule(&completo).unwrap();
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn credito_zerado_ou_estourado_bloqueia_sorteio() {
        // Cenário C: saldo 3, pedido 5
        assert!(matches!(
            check_credit(3, 5),
            Err(AppError::InsufficientCredits { available: 3, requested: 5 })
        ));
        assert!(matches!(
            check_credit(0, 1),
            Err(AppError::InsufficientCredits { available: 0, requested: 1 })
        ));
        assert!(check_credit(10, 5).is_ok());
        assert!(check_credit(5, 5).is_ok());
    }

    #[test]
    fn nota_de_transicao_usa_rotulos_humanos() {
        assert_eq!(
            transition_note(LeadStatus::NewLead, LeadStatus::EmAndamento),
            "Status alterado de Novo Lead para Em Andamento"
        );
    }

    #[test]
    fn status_fora_da_enumeracao_nao_e_destino_valido() {
        // Um status desconhecido no payload desserializa para o fallback...
        let status = LeadStatus::parse("banana_status");
        assert_eq!(status, LeadStatus::Desconhecido);
        // ...e o fallback é rejeitado antes de qualquer escrita
        assert!(matches!(
            validate_target_status(status),
            Err(AppError::UnknownStatus)
        ));

        for status in LeadStatus::ALL {
            assert!(validate_target_status(status).is_ok());
        }
    }

    // --- Testes com banco (um banco novo por teste, migrações aplicadas) ---

    fn service(pool: &PgPool) -> LeadService {
        LeadService::new(
            pool.clone(),
            LeadRepository::new(pool.clone()),
            UserRepository::new(pool.clone()),
        )
    }

    async fn seed_admin(pool: &PgPool) -> User {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, full_name, role)
            VALUES ('admin@exemplo.com', 'hash', 'Admin', 'admin')
            RETURNING *
            "#,
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_lead(pool: &PgPool, owner: Uuid) -> Lead {
        sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (nome, cpf, telefone, status, assigned_to, created_by)
            VALUES ('Maria', '01234567890', '11988887777', 'em_andamento', $1, $1)
            RETURNING *
            "#,
        )
        .bind(owner)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_pool_lead(pool: &PgPool, cpf: &str) {
        sqlx::query(
            "INSERT INTO lead_pool (nome, cpf, telefone, convenio) VALUES ('Pool', $1, '11977776666', 'INSS')",
        )
        .bind(cpf)
        .execute(pool)
        .await
        .unwrap();
    }

    #[sqlx::test]
    async fn fechamento_cria_proposta_e_uma_entrada_de_historico(pool: PgPool) {
        let admin = seed_admin(&pool).await;
        let lead = seed_lead(&pool, admin.id).await;

        let updated = service(&pool)
            .change_status(lead.id, LeadStatus::ClienteFechado, &admin, TransitionExtra::default())
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::ClienteFechado);

        let repo = LeadRepository::new(pool.clone());
        let history = repo.list_history(&pool, lead.id).await.unwrap();
        assert_eq!(history.len(), 1);

        let propostas: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM propostas WHERE lead_id = $1")
                .bind(lead.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(propostas, 1);
    }

    #[sqlx::test]
    async fn fechamento_desfaz_tudo_quando_a_proposta_falha(pool: PgPool) {
        let admin = seed_admin(&pool).await;
        let lead = seed_lead(&pool, admin.id).await;

        // Ocupa o slot único de proposta do lead para forçar a falha downstream
        sqlx::query(
            r#"
            INSERT INTO propostas (lead_id, nome, cpf, telefone, origem, etapa)
            VALUES ($1, 'Maria', '01234567890', '11988887777', 'leads_premium', 'contato_iniciado')
            "#,
        )
        .bind(lead.id)
        .execute(&pool)
        .await
        .unwrap();

        let err = service(&pool)
            .change_status(lead.id, LeadStatus::ClienteFechado, &admin, TransitionExtra::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DownstreamCreation(_)));

        // O status não virou e o histórico continua vazio
        let repo = LeadRepository::new(pool.clone());
        let after = repo.find_by_id(&pool, lead.id).await.unwrap().unwrap();
        assert_eq!(after.status, LeadStatus::EmAndamento);
        assert!(repo.list_history(&pool, lead.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn sorteio_vazio_nao_debita(pool: PgPool) {
        let admin = seed_admin(&pool).await;
        let repo = LeadRepository::new(pool.clone());
        repo.grant_credits(admin.id, 5).await.unwrap();

        let outcome = service(&pool)
            .request_leads(&admin, &LeadDrawFilters::default(), 3)
            .await
            .unwrap();

        assert_eq!(outcome.drawn, 0);
        assert!(outcome.leads.is_empty());
        assert_eq!(repo.credit_balance(admin.id).await.unwrap(), 5);
    }

    #[sqlx::test]
    async fn sorteio_debita_so_o_que_materializou_e_reporta_duplicatas(pool: PgPool) {
        let admin = seed_admin(&pool).await;
        let existente = seed_lead(&pool, admin.id).await;
        let repo = LeadRepository::new(pool.clone());
        repo.grant_credits(admin.id, 5).await.unwrap();

        // Um CPF novo e um que já existe como lead
        seed_pool_lead(&pool, "99999999999").await;
        seed_pool_lead(&pool, &existente.cpf).await;

        let outcome = service(&pool)
            .request_leads(&admin, &LeadDrawFilters::default(), 2)
            .await
            .unwrap();

        assert_eq!(outcome.drawn, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(repo.credit_balance(admin.id).await.unwrap(), 4);
    }

    #[sqlx::test]
    async fn deletar_lead_fechado_desvincula_a_proposta(pool: PgPool) {
        let admin = seed_admin(&pool).await;
        let lead = seed_lead(&pool, admin.id).await;
        let svc = service(&pool);

        svc.change_status(lead.id, LeadStatus::ClienteFechado, &admin, TransitionExtra::default())
            .await
            .unwrap();

        let deleted = svc.bulk_delete(&admin, &[lead.id]).await.unwrap();
        assert_eq!(deleted, 1);

        let orfas: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM propostas WHERE lead_id IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(orfas, 1);
    }
}
