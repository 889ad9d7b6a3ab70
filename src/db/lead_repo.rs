// src/db/lead_repo.rs

use chrono::{NaiveDate, NaiveTime};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        lead::{
            HistoryAction, HistoryEntry, Lead, LeadDrawFilters, LeadStatus, PoolCount, PoolLead,
            RejectionData,
        },
        proposta::{ETAPA_CONTATO_INICIADO, ORIGEM_LEADS_PREMIUM, Proposta},
    },
};

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(lead)
    }

    /// Lista leads. `owner` restringe ao consultor (admin passa None e vê tudo).
    pub async fn list<'e, E>(
        &self,
        executor: E,
        owner: Option<Uuid>,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::uuid IS NULL OR assigned_to = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(owner)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(executor)
        .await?;

        Ok(leads)
    }

    pub async fn list_history<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let history = sqlx::query_as::<_, HistoryEntry>(
            "SELECT * FROM lead_history WHERE lead_id = $1 ORDER BY created_at ASC",
        )
        .bind(lead_id)
        .fetch_all(executor)
        .await?;

        Ok(history)
    }

    // =========================================================================
    //  TRANSIÇÕES DE STATUS
    // =========================================================================

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            "UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(lead_id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    /// Persiste a recusa completa (status + campos de detalhe) num UPDATE só
    pub async fn update_rejection<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        data: &RejectionData,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2,
                recusa_motivo = $3,
                recusa_valor_oferecido = $4,
                recusa_banco = $5,
                recusa_descricao = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(LeadStatus::RecusouOferta)
        .bind(data.reason.as_str())
        .bind(data.offered_value)
        .bind(data.bank.as_deref())
        .bind(data.description.as_str())
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    pub async fn update_future_contact<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        date: NaiveDate,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2, contato_futuro_data = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(LeadStatus::ContatoFuturo)
        .bind(date)
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    pub async fn update_schedule<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2, agendamento_data = $3, agendamento_hora = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(LeadStatus::Agendamento)
        .bind(date)
        .bind(time)
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    pub async fn update_assignee<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        new_assignee: Uuid,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            "UPDATE leads SET assigned_to = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(lead_id)
        .bind(new_assignee)
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    /// Append no histórico. Nunca existe caminho de UPDATE/DELETE aqui.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_history<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        action: HistoryAction,
        from_status: Option<&str>,
        to_status: Option<&str>,
        actor_id: Option<Uuid>,
        actor_name: &str,
        note: Option<&str>,
        payload: Option<serde_json::Value>,
    ) -> Result<HistoryEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, HistoryEntry>(
            r#"
            INSERT INTO lead_history (
                lead_id, action, from_status, to_status, actor_id, actor_name, note, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(lead_id)
        .bind(action)
        .bind(from_status)
        .bind(to_status)
        .bind(actor_id)
        .bind(actor_name)
        .bind(note)
        .bind(payload)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    // =========================================================================
    //  EFEITOS COLATERAIS DAS TRANSIÇÕES
    // =========================================================================

    pub async fn insert_blacklist<'e, E>(
        &self,
        executor: E,
        cpf: &str,
        motivo: &str,
        created_by: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("INSERT INTO blacklist (cpf, motivo, created_by) VALUES ($1, $2, $3)")
            .bind(cpf)
            .bind(motivo)
            .bind(created_by)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn insert_alert<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        user_id: Uuid,
        alert_date: NaiveDate,
        message: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO lead_alerts (lead_id, user_id, alert_date, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(lead_id)
        .bind(user_id)
        .bind(alert_date)
        .bind(message)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Cria a proposta downstream quando o lead fecha. Chamado DENTRO da
    /// transação da transição: se falhar, o status do lead não muda.
    pub async fn create_proposta<'e, E>(
        &self,
        executor: E,
        lead: &Lead,
        created_by: Uuid,
    ) -> Result<Proposta, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let proposta = sqlx::query_as::<_, Proposta>(
            r#"
            INSERT INTO propostas (lead_id, nome, cpf, telefone, convenio, origem, etapa, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(lead.id)
        .bind(lead.nome.as_str())
        .bind(lead.cpf.as_str())
        .bind(lead.telefone.as_str())
        .bind(lead.convenio.as_deref())
        .bind(ORIGEM_LEADS_PREMIUM)
        .bind(ETAPA_CONTATO_INICIADO)
        .bind(created_by)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::DownstreamCreation(e.to_string()))?;

        Ok(proposta)
    }

    // =========================================================================
    //  CRÉDITOS E POOL
    // =========================================================================

    /// Saldo com lock pessimista, para segurar o sorteio inteiro
    pub async fn credit_balance_for_update<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM lead_credits WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(executor)
                .await?;

        Ok(balance.unwrap_or(0))
    }

    pub async fn credit_balance(&self, user_id: Uuid) -> Result<i64, AppError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM lead_credits WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance.unwrap_or(0))
    }

    /// Debita exatamente o número de leads materializados.
    /// O CHECK (balance >= 0) do schema é a última linha de defesa.
    pub async fn debit_credits<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        amount: i64,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE lead_credits SET balance = balance - $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn grant_credits(&self, user_id: Uuid, amount: i64) -> Result<i64, AppError> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lead_credits (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = lead_credits.balance + EXCLUDED.balance, updated_at = NOW()
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Contagem do pool por convênio/tag/DDD, para a UI de solicitação
    pub async fn pool_counts(&self) -> Result<Vec<PoolCount>, AppError> {
        let counts = sqlx::query_as::<_, PoolCount>(
            r#"
            SELECT convenio,
                   tag,
                   left(regexp_replace(telefone, '[^0-9]', '', 'g'), 2) AS ddd,
                   COUNT(*) AS count
            FROM lead_pool
            GROUP BY convenio, tag, ddd
            ORDER BY count DESC, convenio ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Sorteia até `count` linhas do pool sob os filtros.
    /// SKIP LOCKED evita que dois consultores disputem as mesmas linhas.
    pub async fn draw_from_pool<'e, E>(
        &self,
        executor: E,
        filters: &LeadDrawFilters,
        count: i64,
    ) -> Result<Vec<PoolLead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, PoolLead>(
            r#"
            DELETE FROM lead_pool
            WHERE id IN (
                SELECT id FROM lead_pool
                WHERE ($1::text IS NULL OR convenio = $1)
                  AND (cardinality($2::text[]) = 0
                       OR left(regexp_replace(telefone, '[^0-9]', '', 'g'), 2) = ANY($2))
                  AND (cardinality($3::text[]) = 0 OR tag = ANY($3))
                ORDER BY created_at ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, nome, cpf, telefone, telefone2, convenio, tag
            "#,
        )
        .bind(filters.convenio.as_deref())
        .bind(&filters.ddds)
        .bind(&filters.tags)
        .bind(count)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Materializa um lead sorteado do pool. CPF já presente em leads é
    /// tratado como duplicata silenciosa (não conta para o débito).
    pub async fn insert_from_pool<'e, E>(
        &self,
        executor: E,
        pool_lead: &PoolLead,
        owner: Uuid,
    ) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (nome, cpf, telefone, telefone2, convenio, tag, status, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (cpf) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(pool_lead.nome.as_str())
        .bind(pool_lead.cpf.as_str())
        .bind(pool_lead.telefone.as_str())
        .bind(pool_lead.telefone2.as_deref())
        .bind(pool_lead.convenio.as_deref())
        .bind(pool_lead.tag.as_deref())
        .bind(LeadStatus::NewLead)
        .bind(owner)
        .fetch_optional(executor)
        .await?;

        Ok(lead)
    }

    // =========================================================================
    //  OPERAÇÕES EM MASSA
    // =========================================================================

    /// Insere um chunk de leads importados. Duplicatas de CPF são puladas
    /// (ON CONFLICT DO NOTHING); o retorno traz só o que entrou de fato.
    pub async fn insert_imported_chunk(
        &self,
        nomes: &[String],
        cpfs: &[String],
        telefones: &[String],
        convenios: &[Option<String>],
        assigned_to: Uuid,
    ) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (nome, cpf, telefone, convenio, status, assigned_to, created_by)
            SELECT t.nome, t.cpf, t.telefone, t.convenio, 'new_lead', $5, $5
            FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[])
                AS t(nome, cpf, telefone, convenio)
            ON CONFLICT (cpf) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(nomes)
        .bind(cpfs)
        .bind(telefones)
        .bind(convenios)
        .bind(assigned_to)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    pub async fn delete_chunk(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Volta para new_lead os leads cujo contato futuro já venceu
    pub async fn expire_overdue_contacts<'e, E>(&self, executor: E) -> Result<Vec<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $1, contato_futuro_data = NULL, updated_at = NOW()
            WHERE status = $2 AND contato_futuro_data <= CURRENT_DATE
            RETURNING *
            "#,
        )
        .bind(LeadStatus::NewLead)
        .bind(LeadStatus::ContatoFuturo)
        .fetch_all(executor)
        .await?;

        Ok(leads)
    }
}
