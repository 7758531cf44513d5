//! Report Aggregator Service
//!
//! 참가자별 납입 효율, 미납 주차, 대출 요약, 개인 잔액을 파생 계산.
//! 쓰기 없음 — 시작 시점에 스냅샷을 한 번 읽고 그 위에서만 계산한다
//! (계산 중 변이가 끼어들어 효율 퍼센트가 뒤섞이는 것을 방지).
//! 언제든 재호출 가능 (멱등).

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::db::{CycleStatus, Loan, LoanStatus, Participant, Payment, TandaStore};
use crate::error::ApiError;
use crate::services::payment_processor::week_number_for;

/// 사이클 전체 주차 수
const TOTAL_WEEKS: i32 = 52;

// ============ Response Types ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsReportsResponse {
    pub report_info: ReportInfo,
    pub summary: ReportSummary,
    pub participant_reports: Vec<ParticipantReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInfo {
    pub year: i32,
    pub week_number: i32,
    pub report_date: chrono::DateTime<Utc>,
    pub total_weeks: i32,
    pub progress_percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_participants: usize,
    pub reports_generated: usize,
    pub reports_with_errors: usize,
    pub participants_up_to_date: usize,
    pub participants_with_missed_payments: usize,
    pub participants_with_positive_balance: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantReport {
    pub participant_info: ParticipantInfo,
    pub payment_summary: PaymentSummary,
    pub loan_summary: LoanSummary,
    pub personal_balance: PersonalBalance,
    pub personal_message: String,
    pub overall_status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub shares: i32,
    pub is_active: bool,
    pub member_since: chrono::DateTime<Utc>,
    pub weekly_contribution: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub total_paid: f64,
    pub expected_total: f64,
    pub payment_efficiency: f64,
    pub weeks_with_payments: i32,
    pub missed_weeks: i32,
    pub average_weekly_payment: f64,
    pub up_to_date: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub total_loans_received: usize,
    pub total_loan_amount: f64,
    pub active_loan_amount: f64,
    pub total_interest_paid: f64,
    pub total_principal_paid: f64,
    pub loan_status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBalance {
    pub current_balance: f64,
    pub status: String,
    pub explanation: String,
}

// ============ Service ============

/// 참가자 리포트 집계 서비스 (읽기 전용)
pub struct ReportAggregator {
    store: Arc<dyn TandaStore>,
    config: Arc<Config>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn TandaStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// 사이클(연도) 기준 전체 참가자 리포트 생성
    ///
    /// year 생략 시 활성 사이클 기준.
    pub async fn build_report(
        &self,
        year: Option<i32>,
    ) -> Result<ParticipantsReportsResponse, ApiError> {
        let cycle = match year {
            Some(y) => self
                .store
                .find_cycle_by_year(y)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Ciclo del año {}", y)))?,
            None => self
                .store
                .find_active_cycle()
                .await?
                .ok_or_else(|| ApiError::NotFound("Ciclo activo".to_string()))?,
        };

        // 스냅샷: 이후 계산은 이 세 컬렉션만 본다
        let participants = self.store.list_participants(true).await?;
        let payments = self.store.list_payments_by_cycle(cycle.year).await?;
        let loans = self.store.list_loans_by_cycle(cycle.id).await?;

        // 마감된 사이클은 closed_at까지, 진행 중이면 현재까지
        let as_of = match (cycle.status, cycle.closed_at) {
            (CycleStatus::Closed, Some(closed_at)) => closed_at,
            _ => Utc::now(),
        };
        let elapsed_days = (as_of - cycle.created_at).num_seconds() as f64 / 86_400.0;
        let expected_weeks = ((elapsed_days / 7.0).ceil() as i32).clamp(0, TOTAL_WEEKS);

        let participant_reports: Vec<ParticipantReport> = participants
            .iter()
            .map(|p| self.participant_report(p, &payments, &loans, expected_weeks))
            .collect();

        let up_to_date = participant_reports
            .iter()
            .filter(|r| r.payment_summary.up_to_date)
            .count();
        let with_missed = participant_reports
            .iter()
            .filter(|r| r.payment_summary.missed_weeks > 0)
            .count();
        let positive_balance = participant_reports
            .iter()
            .filter(|r| r.personal_balance.current_balance > 0.0)
            .count();

        Ok(ParticipantsReportsResponse {
            report_info: ReportInfo {
                year: cycle.year,
                week_number: week_number_for(as_of),
                report_date: Utc::now(),
                total_weeks: TOTAL_WEEKS,
                progress_percentage: expected_weeks as f64 / TOTAL_WEEKS as f64 * 100.0,
            },
            summary: ReportSummary {
                total_participants: participants.len(),
                reports_generated: participant_reports.len(),
                reports_with_errors: 0,
                participants_up_to_date: up_to_date,
                participants_with_missed_payments: with_missed,
                participants_with_positive_balance: positive_balance,
            },
            participant_reports,
        })
    }

    fn participant_report(
        &self,
        participant: &Participant,
        payments: &[Payment],
        loans: &[Loan],
        expected_weeks: i32,
    ) -> ParticipantReport {
        let weekly_contribution = participant.shares as f64 * self.config.share_price;

        let own_payments: Vec<&Payment> = payments
            .iter()
            .filter(|p| p.participant_id == participant.id)
            .collect();

        let total_paid: f64 = own_payments.iter().map(|p| p.amount).sum();
        let mut weeks: Vec<i32> = own_payments.iter().map(|p| p.week_number).collect();
        weeks.sort_unstable();
        weeks.dedup();
        let weeks_with_payments = weeks.len() as i32;

        let missed_weeks = (expected_weeks - weeks_with_payments).max(0);
        let expected_total = expected_weeks as f64 * weekly_contribution;
        let payment_efficiency = if expected_weeks > 0 {
            weeks_with_payments as f64 / expected_weeks as f64 * 100.0
        } else {
            100.0
        };
        let average_weekly_payment = if weeks_with_payments > 0 {
            total_paid / weeks_with_payments as f64
        } else {
            0.0
        };

        let current_balance = total_paid - expected_total;

        let own_loans: Vec<&Loan> = loans
            .iter()
            .filter(|l| l.participant_id == participant.id)
            .collect();
        let loan_summary = Self::loan_summary(&own_loans);

        // 상태 분류: 미납 주차 > 잔액 우선순위
        let overall_status = if missed_weeks > 0 {
            "Atrasado"
        } else if current_balance > 0.0 {
            "Saldo a favor"
        } else {
            "Al día"
        };

        let (balance_status, explanation) = if current_balance > 0.0 {
            (
                "A favor",
                format!("Tiene un saldo a favor de {:.2}", current_balance),
            )
        } else if current_balance < 0.0 {
            (
                "Pendiente",
                format!("Tiene un saldo pendiente de {:.2}", -current_balance),
            )
        } else {
            ("Al corriente", "Sus aportaciones están al corriente".to_string())
        };

        let personal_message = match overall_status {
            "Atrasado" => format!(
                "Tiene {} semana(s) sin aportación. Póngase al corriente para mantener sus beneficios.",
                missed_weeks
            ),
            "Saldo a favor" => "Sus aportaciones van adelantadas. ¡Gracias!".to_string(),
            _ => "Sus aportaciones están al día. ¡Gracias!".to_string(),
        };

        ParticipantReport {
            participant_info: ParticipantInfo {
                id: participant.id,
                name: participant.name.clone(),
                email: participant.email.clone(),
                shares: participant.shares,
                is_active: participant.is_active,
                member_since: participant.created_at,
                weekly_contribution,
            },
            payment_summary: PaymentSummary {
                total_paid,
                expected_total,
                payment_efficiency,
                weeks_with_payments,
                missed_weeks,
                average_weekly_payment,
                up_to_date: missed_weeks == 0,
            },
            loan_summary,
            personal_balance: PersonalBalance {
                current_balance,
                status: balance_status.to_string(),
                explanation,
            },
            personal_message,
            overall_status: overall_status.to_string(),
        }
    }

    fn loan_summary(loans: &[&Loan]) -> LoanSummary {
        let total_loan_amount: f64 = loans.iter().map(|l| l.amount).sum();
        let active_loan_amount: f64 = loans
            .iter()
            .filter(|l| l.status.is_payable())
            .map(|l| l.amount)
            .sum();
        let total_interest_paid: f64 = loans.iter().map(|l| l.paid_interest).sum();
        let total_principal_paid: f64 = loans.iter().map(|l| l.paid_principal).sum();

        let loan_status = if loans.is_empty() {
            "Sin préstamos"
        } else if loans.iter().any(|l| l.status.is_payable()) {
            "Préstamo activo"
        } else if loans.iter().any(|l| l.status == LoanStatus::Defaulted) {
            "Préstamo en mora"
        } else {
            "Préstamos pagados"
        };

        LoanSummary {
            total_loans_received: loans.len(),
            total_loan_amount,
            active_loan_amount,
            total_interest_paid,
            total_principal_paid,
            loan_status: loan_status.to_string(),
        }
    }
}
