// src/services/report_service.rs
//
// Todos os agregadores são redutores puros sobre coleções já carregadas
// em memória. O escopo (admin vê tudo, consultor vê só o próprio) é
// resolvido antes, na busca.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DashboardRepository, LeadRepository, SalesRepository, UserRepository},
    models::{
        dashboard::{AbsenteeismEntry, AbsenteeismReport, ClockEntry, Profile, SalespersonRank, StatusCount},
        lead::{Lead, LeadStatus},
        sale::Sale,
    },
};

// --- REDUTORES PUROS ---

pub fn count_by_status(leads: &[Lead]) -> HashMap<LeadStatus, i64> {
    let mut counts = HashMap::new();
    for lead in leads {
        *counts.entry(lead.status).or_insert(0) += 1;
    }
    counts
}

/// Dias perdidos = max(0, esperado - dias distintos com registro de ponto).
/// A taxa geral é guardada contra divisão por zero.
pub fn absenteeism(
    profiles: &[Profile],
    entries: &[ClockEntry],
    expected_work_days: u32,
) -> AbsenteeismReport {
    let mut days_present: HashMap<Uuid, HashSet<NaiveDate>> = HashMap::new();
    for entry in entries {
        days_present
            .entry(entry.user_id)
            .or_default()
            .insert(entry.registered_at.date_naive());
    }

    let mut per_user = Vec::with_capacity(profiles.len());
    let mut total_missed: u64 = 0;
    for profile in profiles.iter().filter(|p| p.is_active) {
        let present = days_present.get(&profile.id).map_or(0, |d| d.len()) as u32;
        let missed = expected_work_days.saturating_sub(present);
        total_missed += u64::from(missed);
        per_user.push(AbsenteeismEntry {
            user_id: profile.id,
            name: profile.full_name.clone(),
            missed_days: missed,
        });
    }

    let expected_total = per_user.len() as u64 * u64::from(expected_work_days);
    let rate = if expected_total == 0 {
        0.0
    } else {
        total_missed as f64 / expected_total as f64
    };

    AbsenteeismReport { per_user, rate }
}

/// Ranking por vendas com status "pago" no período, decrescente.
/// O sort é estável: empate preserva a ordem de entrada dos perfis.
pub fn rank_salespeople(sales: &[Sale], profiles: &[Profile]) -> Vec<SalespersonRank> {
    let mut paid_counts: HashMap<Uuid, u64> = HashMap::new();
    for sale in sales {
        if sale.status.trim().eq_ignore_ascii_case("pago") {
            *paid_counts.entry(sale.user_id).or_insert(0) += 1;
        }
    }

    let mut ranking: Vec<SalespersonRank> = profiles
        .iter()
        .map(|p| SalespersonRank {
            id: p.id,
            name: p.full_name.clone(),
            sales_count: paid_counts.get(&p.id).copied().unwrap_or(0),
        })
        .collect();

    ranking.sort_by(|a, b| b.sales_count.cmp(&a.sales_count));
    ranking
}

/// Variação percentual do período. Período anterior zerado devolve 0.
pub fn revenue_delta(current: Decimal, previous: Decimal) -> Decimal {
    if previous == Decimal::ZERO {
        return Decimal::ZERO;
    }
    (current - previous) / previous * Decimal::from(100)
}

// --- SERVIÇO ---

#[derive(Clone)]
pub struct ReportService {
    lead_repo: LeadRepository,
    sales_repo: SalesRepository,
    user_repo: UserRepository,
    dashboard_repo: DashboardRepository,
}

impl ReportService {
    pub fn new(
        lead_repo: LeadRepository,
        sales_repo: SalesRepository,
        user_repo: UserRepository,
        dashboard_repo: DashboardRepository,
    ) -> Self {
        Self {
            lead_repo,
            sales_repo,
            user_repo,
            dashboard_repo,
        }
    }

    /// Cards do dashboard: contagem por status, sempre na ordem fixa da
    /// enumeração. Status desconhecidos entram num card genérico no fim.
    pub async fn status_summary<'e, E>(
        &self,
        executor: E,
        owner: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let leads = self.lead_repo.list(executor, owner, None).await?;
        let counts = count_by_status(&leads);

        let mut summary: Vec<StatusCount> = LeadStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: status.as_str().to_string(),
                label: status.label().to_string(),
                count: counts.get(status).copied().unwrap_or(0),
            })
            .collect();

        let unknown = counts.get(&LeadStatus::Desconhecido).copied().unwrap_or(0);
        if unknown > 0 {
            summary.push(StatusCount {
                status: LeadStatus::Desconhecido.as_str().to_string(),
                label: LeadStatus::Desconhecido.label().to_string(),
                count: unknown,
            });
        }

        Ok(summary)
    }

    pub async fn salesperson_ranking<'e, E>(
        &self,
        executor: E,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SalespersonRank>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;
        let profiles = self.user_repo.list_active_profiles(&mut *tx).await?;
        let sales = self.sales_repo.list_sales(&mut *tx, None, from, to).await?;
        tx.commit().await?;

        Ok(rank_salespeople(&sales, &profiles))
    }

    pub async fn absenteeism_report<'e, E>(
        &self,
        executor: E,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        expected_work_days: u32,
    ) -> Result<AbsenteeismReport, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profiles = self.user_repo.list_active_profiles(executor).await?;
        let entries = self.dashboard_repo.list_clock_entries(from, to).await?;

        Ok(absenteeism(&profiles, &entries, expected_work_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn profile(name: &str, active: bool) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            is_active: active,
        }
    }

    fn entry(user_id: Uuid, y: i32, m: u32, d: u32, h: u32) -> ClockEntry {
        ClockEntry {
            user_id,
            registered_at: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
        }
    }

    fn paid_sale(user_id: Uuid, status: &str) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            user_id,
            company_id: Uuid::new_v4(),
            banco: "Banco Alfa".to_string(),
            tipo_operacao: "Portabilidade".to_string(),
            parcela: None,
            troco: None,
            saldo_devedor: None,
            status: status.to_string(),
            data_venda: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn delta_de_receita_contra_periodo_anterior() {
        assert_eq!(
            revenue_delta(Decimal::from(150), Decimal::from(100)),
            Decimal::from(50)
        );
        assert_eq!(
            revenue_delta(Decimal::from(50), Decimal::from(100)),
            Decimal::from(-50)
        );
        // Período anterior zerado não divide por zero
        assert_eq!(revenue_delta(Decimal::from(100), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn absenteismo_conta_dias_distintos() {
        let p1 = profile("Ana", true);
        let p2 = profile("Bruno", true);
        // Ana bateu ponto 2 dias (um deles duas vezes), Bruno nenhum
        let entries = vec![
            entry(p1.id, 2026, 8, 3, 8),
            entry(p1.id, 2026, 8, 3, 17),
            entry(p1.id, 2026, 8, 4, 8),
        ];

        let report = absenteeism(&[p1.clone(), p2.clone()], &entries, 5);

        assert_eq!(report.per_user.len(), 2);
        assert_eq!(report.per_user[0].missed_days, 3);
        assert_eq!(report.per_user[1].missed_days, 5);
        // (3 + 5) / (2 * 5)
        assert!((report.rate - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn absenteismo_nunca_fica_negativo_e_ignora_inativos() {
        let ativo = profile("Ana", true);
        let inativo = profile("Caio", false);
        // Mais dias de ponto do que o esperado: clampa em zero
        let entries = vec![
            entry(ativo.id, 2026, 8, 3, 8),
            entry(ativo.id, 2026, 8, 4, 8),
            entry(ativo.id, 2026, 8, 5, 8),
        ];

        let report = absenteeism(&[ativo, inativo], &entries, 2);

        assert_eq!(report.per_user.len(), 1);
        assert_eq!(report.per_user[0].missed_days, 0);
        assert_eq!(report.rate, 0.0);
    }

    #[test]
    fn absenteismo_sem_perfis_nao_divide_por_zero() {
        let report = absenteeism(&[], &[], 22);
        assert!(report.per_user.is_empty());
        assert_eq!(report.rate, 0.0);
    }

    #[test]
    fn ranking_conta_so_vendas_pagas_em_ordem_decrescente() {
        let p1 = profile("Ana", true);
        let p2 = profile("Bruno", true);
        let sales = vec![
            paid_sale(p1.id, "pago"),
            paid_sale(p2.id, "pago"),
            paid_sale(p2.id, "PAGO "),
            paid_sale(p1.id, "cancelado"),
            paid_sale(p1.id, "solicitado_digitacao"),
        ];

        let ranking = rank_salespeople(&sales, &[p1.clone(), p2.clone()]);

        assert_eq!(ranking[0].id, p2.id);
        assert_eq!(ranking[0].sales_count, 2);
        assert_eq!(ranking[1].id, p1.id);
        assert_eq!(ranking[1].sales_count, 1);
    }

    #[test]
    fn ranking_empate_preserva_ordem_de_entrada() {
        let p1 = profile("Ana", true);
        let p2 = profile("Bruno", true);
        let sales = vec![paid_sale(p1.id, "pago"), paid_sale(p2.id, "pago")];

        let ranking = rank_salespeople(&sales, &[p1.clone(), p2.clone()]);

        assert_eq!(ranking[0].id, p1.id);
        assert_eq!(ranking[1].id, p2.id);
    }

    #[test]
    fn contagem_por_status_agrupa_leads() {
        fn lead(status: LeadStatus) -> Lead {
            Lead {
                id: Uuid::new_v4(),
                nome: "Maria".to_string(),
                cpf: "01234567890".to_string(),
                telefone: "11988887777".to_string(),
                telefone2: None,
                convenio: Some("INSS".to_string()),
                tag: None,
                status,
                assigned_to: None,
                created_by: None,
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

        let leads = vec![
            lead(LeadStatus::NewLead),
            lead(LeadStatus::NewLead),
            lead(LeadStatus::ClienteFechado),
        ];
        let counts = count_by_status(&leads);

        assert_eq!(counts.get(&LeadStatus::NewLead), Some(&2));
        assert_eq!(counts.get(&LeadStatus::ClienteFechado), Some(&1));
        assert_eq!(counts.get(&LeadStatus::SemRetorno), None);
    }
}
