// src/services/commission_service.rs

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SalesRepository,
    models::{
        dashboard::RevenueOverview,
        sale::{CalculationModel, Commission, CommissionRule, Sale},
    },
    services::report_service::revenue_delta,
};

fn norm(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Escolhe a melhor regra para a venda:
/// 1. banco + produto batendo, com escopo exato de empresa (prioridade máxima);
/// 2. banco + produto batendo, regra global;
/// 3. qualquer regra do mesmo banco (fallback, ignora produto e empresa).
/// O match de produto tolera substring nos dois sentidos. Isso arrisca
/// falso-positivo em nomes curtos, mas é o comportamento homologado.
fn best_matching_rule<'a>(
    sale: &Sale,
    rules: &'a [CommissionRule],
    company_id: Uuid,
) -> Option<&'a CommissionRule> {
    let banco = norm(&sale.banco);
    let operacao = norm(&sale.tipo_operacao);

    let mut global: Option<&CommissionRule> = None;
    let mut bank_only: Option<&CommissionRule> = None;

    for rule in rules.iter().filter(|r| r.is_active) {
        if norm(&rule.bank_name) != banco {
            continue;
        }
        if bank_only.is_none() {
            bank_only = Some(rule);
        }

        let product = norm(&rule.product_name);
        let product_match =
            product == operacao || product.contains(&operacao) || operacao.contains(&product);
        if !product_match {
            continue;
        }

        match rule.company_id {
            Some(scoped) if scoped == company_id => return Some(rule),
            None => {
                if global.is_none() {
                    global = Some(rule);
                }
            }
            // Regra de outra empresa não participa do match por produto
            Some(_) => {}
        }
    }

    global.or(bank_only)
}

/// Sem regra: portabilidade usa o saldo devedor, o resto usa a parcela crua
fn no_rule_default(sale: &Sale) -> Decimal {
    if norm(&sale.tipo_operacao) == "portabilidade" {
        sale.saldo_devedor.unwrap_or(Decimal::ZERO)
    } else {
        sale.parcela.unwrap_or(Decimal::ZERO)
    }
}

/// Valor de receita de uma venda. Função pura e determinística: é chamada
/// separadamente para o período atual e o anterior, e os dois resultados
/// precisam ser comparáveis.
pub fn compute_sale_value(sale: &Sale, rules: &[CommissionRule], company_id: Uuid) -> Decimal {
    let saldo = sale.saldo_devedor.unwrap_or(Decimal::ZERO);
    let troco = sale.troco.unwrap_or(Decimal::ZERO);

    match best_matching_rule(sale, rules, company_id) {
        Some(rule) => match CalculationModel::parse(&rule.calculation_model) {
            Some(CalculationModel::SaldoDevedor) => saldo,
            Some(CalculationModel::ValorBruto) | Some(CalculationModel::Ambos) => saldo + troco,
            Some(CalculationModel::Troco) => troco,
            // Modelo irreconhecível na regra: cai no default de quem não tem regra
            None => no_rule_default(sale),
        },
        None => no_rule_default(sale),
    }
}

#[derive(Clone)]
pub struct CommissionService {
    repo: SalesRepository,
}

impl CommissionService {
    pub fn new(repo: SalesRepository) -> Self {
        Self { repo }
    }

    pub async fn list_sales<'e, E>(
        &self,
        executor: E,
        owner: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_sales(executor, owner, from, to).await
    }

    pub async fn list_commissions(
        &self,
        owner: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Commission>, AppError> {
        self.repo.list_commissions(owner, from, to).await
    }

    /// Receita do período com comparação contra o período imediatamente
    /// anterior de mesma duração.
    pub async fn revenue_overview<'e, E>(
        &self,
        executor: E,
        owner: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RevenueOverview, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        // Janela anterior com o mesmo tamanho, terminando na véspera
        let span = to.signed_duration_since(from).num_days();
        let prev_to = from - Duration::days(1);
        let prev_from = prev_to - Duration::days(span);

        // Transação para um snapshot consistente das duas janelas
        let mut tx = executor.begin().await?;
        let rules = self.repo.list_rules(&mut *tx).await?;
        let current = self.repo.list_sales(&mut *tx, owner, from, to).await?;
        let previous = self.repo.list_sales(&mut *tx, owner, prev_from, prev_to).await?;
        tx.commit().await?;

        let current_total: Decimal = current
            .iter()
            .map(|s| compute_sale_value(s, &rules, s.company_id))
            .sum();
        let previous_total: Decimal = previous
            .iter()
            .map(|s| compute_sale_value(s, &rules, s.company_id))
            .sum();

        Ok(RevenueOverview {
            current_total,
            previous_total,
            delta_percent: revenue_delta(current_total, previous_total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sale(
        banco: &str,
        tipo_operacao: &str,
        parcela: Option<i64>,
        troco: Option<i64>,
        saldo_devedor: Option<i64>,
        company_id: Uuid,
    ) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            company_id,
            banco: banco.to_string(),
            tipo_operacao: tipo_operacao.to_string(),
            parcela: parcela.map(Decimal::from),
            troco: troco.map(Decimal::from),
            saldo_devedor: saldo_devedor.map(Decimal::from),
            status: "pago".to_string(),
            data_venda: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn rule(
        bank_name: &str,
        product_name: &str,
        calculation_model: &str,
        company_id: Option<Uuid>,
    ) -> CommissionRule {
        CommissionRule {
            id: Uuid::new_v4(),
            bank_name: bank_name.to_string(),
            product_name: product_name.to_string(),
            calculation_model: calculation_model.to_string(),
            company_id,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn modelo_ambos_soma_saldo_e_troco() {
        // Cenário A: saldo 5000 + troco 800 com regra "ambos"
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade", Some(300), Some(800), Some(5000), company);
        let rules = vec![rule("banco alfa", "portabilidade", "ambos", None)];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(5800));
    }

    #[test]
    fn sem_regra_usa_parcela_crua() {
        // Cenário B: Refinanciamento sem regra devolve a parcela
        let company = Uuid::new_v4();
        let s = sale("Banco Beta", "Refinanciamento", Some(450), Some(100), Some(9000), company);

        assert_eq!(compute_sale_value(&s, &[], company), Decimal::from(450));
    }

    #[test]
    fn sem_regra_portabilidade_usa_saldo_devedor() {
        // P3, inclusive com capitalização diferente
        let company = Uuid::new_v4();
        let s = sale("Banco Beta", "Portabilidade", Some(450), None, Some(7200), company);
        assert_eq!(compute_sale_value(&s, &[], company), Decimal::from(7200));

        let sem_saldo = sale("Banco Beta", "PORTABILIDADE", Some(450), None, None, company);
        assert_eq!(compute_sale_value(&sem_saldo, &[], company), Decimal::ZERO);
    }

    #[test]
    fn regra_da_empresa_ganha_da_global() {
        // P2: mesma chave banco+produto, escopos diferentes
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade", Some(300), Some(800), Some(5000), company);
        let rules = vec![
            rule("banco alfa", "portabilidade", "troco", None),
            rule("banco alfa", "portabilidade", "saldo_devedor", Some(company)),
        ];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(5000));
    }

    #[test]
    fn regra_de_outra_empresa_nao_participa_do_match_por_produto() {
        let company = Uuid::new_v4();
        let outra = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade", Some(300), Some(800), Some(5000), company);
        let rules = vec![rule("banco alfa", "portabilidade", "troco", Some(outra))];

        // Cai no fallback por banco (mesma regra, mas via passo 2)
        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(800));
    }

    #[test]
    fn fallback_por_banco_ignora_produto() {
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Cartão RMC", Some(300), Some(150), Some(2000), company);
        let rules = vec![rule("banco alfa", "portabilidade", "troco", None)];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(150));
    }

    #[test]
    fn match_tolera_substring_nos_dois_sentidos() {
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade com Refin", None, Some(200), Some(3000), company);
        let rules = vec![rule("Banco Alfa", "portabilidade", "saldo_devedor", None)];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(3000));
    }

    #[test]
    fn regra_inativa_nunca_bate() {
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Refinanciamento", Some(450), None, Some(9000), company);
        let mut inativa = rule("banco alfa", "refinanciamento", "saldo_devedor", None);
        inativa.is_active = false;

        assert_eq!(compute_sale_value(&s, &[inativa], company), Decimal::from(450));
    }

    #[test]
    fn modelo_irreconhecivel_cai_no_default() {
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Refinanciamento", Some(450), None, Some(9000), company);
        let rules = vec![rule("banco alfa", "refinanciamento", "percentual", None)];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::from(450));
    }

    #[test]
    fn calculo_e_deterministico() {
        // P1: mesmo input, mesmo output, quantas vezes for
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade", Some(300), Some(800), Some(5000), company);
        let rules = vec![
            rule("banco alfa", "portabilidade", "ambos", None),
            rule("banco alfa", "cartao", "troco", None),
        ];

        let primeiro = compute_sale_value(&s, &rules, company);
        for _ in 0..10 {
            assert_eq!(compute_sale_value(&s, &rules, company), primeiro);
        }
    }

    #[test]
    fn nulos_entram_como_zero() {
        let company = Uuid::new_v4();
        let s = sale("Banco Alfa", "Portabilidade", None, None, None, company);
        let rules = vec![rule("banco alfa", "portabilidade", "ambos", None)];

        assert_eq!(compute_sale_value(&s, &rules, company), Decimal::ZERO);
    }
}
