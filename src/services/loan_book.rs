//! Loan Book Service
//!
//! 대출 발행, 이자 계산, 상태 전이를 담당.
//! 대출은 활성 사이클에 귀속되며 이자 조건은 생성 시점에 스냅샷되어 불변.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::{AnnualCycle, CycleStatus, Loan, LoanStatus, TandaStore};
use crate::error::ApiError;
use crate::services::locks::KeyedLocks;

/// 대출 서비스
pub struct LoanBook {
    store: Arc<dyn TandaStore>,
    config: Arc<Config>,
    locks: Arc<KeyedLocks>,
}

impl LoanBook {
    pub fn new(store: Arc<dyn TandaStore>, config: Arc<Config>, locks: Arc<KeyedLocks>) -> Self {
        Self { store, config, locks }
    }

    /// 대출 생성
    ///
    /// - amount <= 0 → Validation
    /// - year가 활성 사이클과 불일치 → State
    /// - 같은 사이클에 미완납 대출 보유 → Conflict (1인 1대출 규칙)
    ///
    /// totalInterest = amount * 이자율(정책 파라미터), 생성 후 불변.
    pub async fn create_loan(
        &self,
        participant_id: i64,
        amount: f64,
        year: i32,
    ) -> Result<Loan, ApiError> {
        if amount <= 0.0 {
            return Err(ApiError::Validation(
                "El monto del préstamo debe ser mayor a cero".to_string(),
            ));
        }
        if participant_id <= 0 {
            return Err(ApiError::Validation(
                "El ID del participante debe ser un número positivo".to_string(),
            ));
        }

        // 같은 참가자의 동시 대출 요청 직렬화
        let lock = self.locks.lock_for(participant_id);
        let _guard = lock.lock().await;

        let cycle = self.active_cycle_for_year(year).await?;

        self.store
            .find_participant(participant_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Participante {}", participant_id)))?;

        if self
            .store
            .find_open_loan(participant_id, cycle.id)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(
                "El participante ya tiene un préstamo abierto en este ciclo".to_string(),
            ));
        }

        let rate = self.config.loan_interest_rate;
        let total_interest = amount * rate;
        let term_weeks = self.config.loan_term_weeks;
        let now = Utc::now();

        let loan = self
            .store
            .insert_loan(Loan {
                id: 0,
                participant_id,
                amount,
                interest_rate: rate,
                total_interest,
                projected_interest: total_interest,
                paid_principal: 0.0,
                paid_interest: 0.0,
                term_weeks,
                status: LoanStatus::Active,
                due_date: now + Duration::weeks(term_weeks as i64),
                annual_cycle_id: cycle.id,
                created_at: now,
                updated_at: now,
            })
            .await?;

        // 풀에서 자금 인출 + 예상 이자 반영 (원자적 가산)
        self.store
            .increment_cycle_totals(cycle.id, -amount, 0.0, total_interest)
            .await?;

        tracing::info!(loan_id = loan.id, participant_id, amount, year, "loan created");
        Ok(loan)
    }

    /// 완납 처리 (PaymentProcessor 전용)
    pub(crate) async fn mark_paid(&self, loan_id: i64) -> Result<Loan, ApiError> {
        self.transition(loan_id, LoanStatus::Paid, "marcar como pagado")
            .await
    }

    /// 유예 처리 (관리자 액션)
    pub async fn defer(&self, loan_id: i64) -> Result<Loan, ApiError> {
        let loan = self.find_required(loan_id).await?;
        if loan.status != LoanStatus::Active {
            return Err(ApiError::State(
                "Solo un préstamo activo puede ser diferido".to_string(),
            ));
        }
        self.transition(loan_id, LoanStatus::Deferred, "diferir").await
    }

    /// 유예 해제 (관리자 액션)
    pub async fn resume(&self, loan_id: i64) -> Result<Loan, ApiError> {
        let loan = self.find_required(loan_id).await?;
        if loan.status != LoanStatus::Deferred {
            return Err(ApiError::State(
                "Solo un préstamo diferido puede ser reactivado".to_string(),
            ));
        }
        self.transition(loan_id, LoanStatus::Active, "reactivar").await
    }

    // ============ Queries ============

    pub async fn get_by_participant(&self, participant_id: i64) -> Result<Vec<Loan>, ApiError> {
        Ok(self.store.list_loans_by_participant(participant_id).await?)
    }

    /// 상환 중인 대출 (active + deferred)
    pub async fn get_active(&self) -> Result<Vec<Loan>, ApiError> {
        Ok(self
            .store
            .list_loans_by_status(&[LoanStatus::Active, LoanStatus::Deferred])
            .await?)
    }

    /// 종결된 대출 (paid + defaulted)
    pub async fn get_completed(&self) -> Result<Vec<Loan>, ApiError> {
        Ok(self
            .store
            .list_loans_by_status(&[LoanStatus::Paid, LoanStatus::Defaulted])
            .await?)
    }

    // ============ Internals ============

    async fn active_cycle_for_year(&self, year: i32) -> Result<AnnualCycle, ApiError> {
        match self.store.find_cycle_by_year(year).await? {
            Some(cycle) if cycle.status == CycleStatus::Active => Ok(cycle),
            _ => Err(ApiError::State(format!(
                "El año {} no corresponde a un ciclo activo",
                year
            ))),
        }
    }

    async fn find_required(&self, loan_id: i64) -> Result<Loan, ApiError> {
        self.store
            .find_loan(loan_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Préstamo {}", loan_id)))
    }

    async fn transition(
        &self,
        loan_id: i64,
        target: LoanStatus,
        action: &str,
    ) -> Result<Loan, ApiError> {
        let mut loan = self.find_required(loan_id).await?;
        loan.status = target;
        loan.updated_at = Utc::now();
        self.store.update_loan(&loan).await?;
        tracing::info!(loan_id, ?target, action, "loan status transition");
        Ok(loan)
    }
}
