//! Payment Processor Service
//!
//! 주간 납입과 대출 상환을 원장에 적용하는 유일한 경로.
//!
//! - 상환 금액은 항상 대출의 누적 상환치에서 재계산 (클라이언트 캐시 불신)
//! - 대출을 paid로 전이시킬 수 있는 유일한 컴포넌트
//! - bulk 주간 납입: 참가자 단위 독립 처리, Conflict는 skipped로 강등
//!
//! # Interview Q&A
//!
//! Q: bulk 납입을 단일 트랜잭션으로 묶지 않은 이유는?
//! A: 한 참가자의 실패가 배치 전체를 중단시키면 안 되기 때문.
//!    참가자별로 독립 적용하고 결과를 per-item으로 수집한다
//!    (배치 전체 원자성은 요구사항이 아님).

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::db::{CycleStatus, Loan, LoanPayment, Participant, Payment, PaymentType, TandaStore};
use crate::error::ApiError;
use crate::services::loan_book::LoanBook;
use crate::services::locks::KeyedLocks;

/// 완납 판정용 부동소수점 허용 오차
const SETTLEMENT_EPSILON: f64 = 1e-6;

/// bulk 납입 동시 처리 한도
const BULK_CONCURRENCY: usize = 8;

// ============ Request/Response Types ============

/// 대출 상환 요청
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPaymentRequest {
    pub participant_id: i64,
    pub loan_id: i64,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub year: i32,
    pub week_number: i32,
}

/// bulk 주간 납입 결과
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub year: i32,
    /// 생략 시 현재 주차로 해석된 값
    pub week_number: i32,
    pub total_participants: usize,
    pub payments_created: usize,
    pub payments_skipped: usize,
    pub details: Vec<BulkDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDetail {
    pub participant_id: i64,
    pub name: String,
    pub status: BulkStatus,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Created,
    Skipped,
}

// ============ Week Number ============

/// 연도 내 주차 계산
///
/// ceil((1월 1일 이후 경과 일수 + 1월 1일의 요일) / 7), 요일은 월=1..일=7.
/// 연말 며칠은 산술상 53주차가 되는 해가 있어 52로 고정한다 —
/// 사이클은 52주이고, 53을 그대로 돌려주면 연말 bulk 납입이
/// 전원 주차 범위 검증에 걸린다.
/// 개별 납입과 bulk 납입이 반드시 같은 함수를 쓴다 —
/// 두 경로의 주차가 달라지면 중복 방어가 깨진다.
pub fn week_number_for(date: DateTime<Utc>) -> i32 {
    let start_of_year = Utc
        .with_ymd_and_hms(date.year(), 1, 1, 0, 0, 0)
        .single()
        .expect("jan 1 is always a valid date");
    let past_days = (date - start_of_year).num_seconds() as f64 / 86_400.0;
    let day_of_week = start_of_year.weekday().number_from_monday() as f64;
    (((past_days + day_of_week) / 7.0).ceil() as i32).min(52)
}

/// 현재 주차
pub fn current_week_number() -> i32 {
    week_number_for(Utc::now())
}

// ============ Service ============

/// 납입/상환 처리 서비스
pub struct PaymentProcessor {
    store: Arc<dyn TandaStore>,
    config: Arc<Config>,
    loan_book: Arc<LoanBook>,
    locks: Arc<KeyedLocks>,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn TandaStore>,
        config: Arc<Config>,
        loan_book: Arc<LoanBook>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self { store, config, loan_book, locks }
    }

    /// 상환 유형별 납부해야 할 금액
    ///
    /// 항상 원장의 누적 상환치에서 재계산하고 0 아래로 내려가지 않는다.
    /// full = principal + interest 관계가 항상 성립.
    pub fn calculate_amount(loan: &Loan, payment_type: PaymentType) -> f64 {
        let remaining_principal = (loan.amount - loan.paid_principal).max(0.0);
        let remaining_interest = (loan.total_interest - loan.paid_interest).max(0.0);

        match payment_type {
            PaymentType::Principal => remaining_principal,
            PaymentType::Interest => remaining_interest,
            PaymentType::Full => remaining_principal + remaining_interest,
        }
    }

    /// 참가자의 주간 납입금 (보유 주 수 * 주당 가격)
    pub fn contribution_amount(&self, participant: &Participant) -> f64 {
        participant.shares as f64 * self.config.share_price
    }

    /// 대출 상환 적용
    ///
    /// 검증 순서: 주차 범위 → 양수 검증 → 대출 존재(NotFound) →
    /// 상환 가능 상태(State). 완납 시 LoanBook을 통해 paid 전이 —
    /// 이 경로가 대출을 paid로 만드는 유일한 경로다.
    ///
    /// 완전히 동일한 요청의 재시도는 기존 기록을 그대로 반환 (멱등).
    pub async fn apply_loan_payment(
        &self,
        request: LoanPaymentRequest,
    ) -> Result<LoanPayment, ApiError> {
        if !(1..=52).contains(&request.week_number) {
            return Err(ApiError::Validation(
                "El número de semana debe estar entre 1 y 52".to_string(),
            ));
        }
        if request.amount <= 0.0 || request.participant_id <= 0 || request.loan_id <= 0 {
            return Err(ApiError::Validation(
                "El monto, ID del participante e ID del préstamo deben ser números positivos"
                    .to_string(),
            ));
        }

        let lock = self.locks.lock_for(request.participant_id);
        let _guard = lock.lock().await;

        let mut loan = self
            .store
            .find_loan(request.loan_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Préstamo {}", request.loan_id)))?;

        if loan.participant_id != request.participant_id {
            return Err(ApiError::Validation(
                "El préstamo no pertenece al participante indicado".to_string(),
            ));
        }
        if !loan.status.is_payable() {
            return Err(ApiError::State(
                "El préstamo no admite pagos en su estado actual".to_string(),
            ));
        }

        // 재시도 멱등성: 완전 중복 요청이면 기존 기록 반환
        if let Some(existing) = self
            .store
            .find_loan_payment_exact(
                request.loan_id,
                request.payment_type,
                request.amount,
                request.year,
                request.week_number,
            )
            .await?
        {
            tracing::info!(loan_id = loan.id, payment_id = existing.id, "duplicate loan payment retry, returning existing");
            return Ok(existing);
        }

        let (to_principal, to_interest) = self.allocate(&loan, &request)?;

        loan.paid_principal += to_principal;
        loan.paid_interest += to_interest;
        loan.updated_at = Utc::now();
        self.store.update_loan(&loan).await?;

        let payment = self
            .store
            .insert_loan_payment(LoanPayment {
                id: 0,
                loan_id: loan.id,
                participant_id: request.participant_id,
                amount: request.amount,
                payment_type: request.payment_type,
                week_number: request.week_number,
                year: request.year,
                weekly_summary_id: None,
                created_at: Utc::now(),
            })
            .await?;

        // 상환금은 풀로 환류, 이자분은 사이클 총이자에 가산 (원자적)
        self.store
            .increment_cycle_totals(loan.annual_cycle_id, request.amount, to_interest, 0.0)
            .await?;

        let settled = loan.paid_principal >= loan.amount - SETTLEMENT_EPSILON
            && loan.paid_interest >= loan.total_interest - SETTLEMENT_EPSILON;
        if settled {
            self.loan_book.mark_paid(loan.id).await?;
            tracing::info!(loan_id = loan.id, "loan fully settled");
        }

        tracing::info!(
            loan_id = loan.id,
            amount = request.amount,
            payment_type = ?request.payment_type,
            "loan payment applied"
        );
        Ok(payment)
    }

    /// 주간 납입 적용
    ///
    /// (참가자, 연도, 주차) 중복은 Conflict — 절대 덮어쓰지 않는다.
    pub async fn apply_weekly_contribution(
        &self,
        participant_id: i64,
        year: i32,
        week_number: i32,
        amount: f64,
    ) -> Result<Payment, ApiError> {
        if !(1..=52).contains(&week_number) {
            return Err(ApiError::Validation(
                "El número de semana debe estar entre 1 y 52".to_string(),
            ));
        }
        if amount <= 0.0 {
            return Err(ApiError::Validation(
                "El monto debe ser mayor a cero".to_string(),
            ));
        }

        let lock = self.locks.lock_for(participant_id);
        let _guard = lock.lock().await;

        let participant = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Participante {}", participant_id)))?;
        if !participant.is_active {
            return Err(ApiError::State(
                "El participante no está activo".to_string(),
            ));
        }

        let cycle = match self.store.find_cycle_by_year(year).await? {
            Some(cycle) if cycle.status == CycleStatus::Active => cycle,
            _ => {
                return Err(ApiError::State(format!(
                    "El año {} no corresponde a un ciclo activo",
                    year
                )))
            }
        };

        if self
            .store
            .find_payment_by_week(participant_id, year, week_number)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(format!(
                "Ya existe un pago para la semana {}",
                week_number
            )));
        }

        let now = Utc::now();
        let payment = self
            .store
            .insert_payment(Payment {
                id: 0,
                participant_id,
                amount,
                year,
                week_number,
                annual_cycle_id: cycle.id,
                payment_date: now,
                created_at: now,
            })
            .await?;

        // 동시 납입끼리 증분을 잃지 않도록 원자적 가산
        self.store
            .increment_cycle_totals(cycle.id, amount, 0.0, 0.0)
            .await?;

        tracing::info!(participant_id, year, week_number, amount, "weekly contribution applied");
        Ok(payment)
    }

    /// 전체 활성 참가자 주간 납입 일괄 처리
    ///
    /// - week_number 생략 시 현재 주차 (개별 납입과 동일한 계산)
    /// - 참가자별 독립 처리: Conflict(이미 납입)는 skipped로 기록,
    ///   그 외 실패도 메시지와 함께 skipped — 배치는 계속 진행
    /// - 동시 처리는 세마포어로 제한
    pub async fn bulk_pay_all_participants(
        self: Arc<Self>,
        year: i32,
        week_number: Option<i32>,
        exclude_participant_ids: Vec<i64>,
    ) -> Result<BulkResult, ApiError> {
        let week_number = week_number.unwrap_or_else(current_week_number);

        let participants = self.store.list_participants(true).await?;
        let total_participants = participants.len();

        let semaphore = Arc::new(Semaphore::new(BULK_CONCURRENCY));
        let mut join_set: JoinSet<BulkDetail> = JoinSet::new();
        let mut details: Vec<BulkDetail> = Vec::with_capacity(total_participants);

        for participant in participants {
            if exclude_participant_ids.contains(&participant.id) {
                details.push(BulkDetail {
                    participant_id: participant.id,
                    name: participant.name,
                    status: BulkStatus::Skipped,
                    amount: 0.0,
                    reason: Some("Excluido de la corrida semanal".to_string()),
                });
                continue;
            }

            let processor = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");

                let amount = processor.contribution_amount(&participant);
                match processor
                    .apply_weekly_contribution(participant.id, year, week_number, amount)
                    .await
                {
                    Ok(payment) => BulkDetail {
                        participant_id: participant.id,
                        name: participant.name,
                        status: BulkStatus::Created,
                        amount: payment.amount,
                        reason: None,
                    },
                    Err(err) => BulkDetail {
                        participant_id: participant.id,
                        name: participant.name,
                        status: BulkStatus::Skipped,
                        amount: 0.0,
                        reason: Some(err.to_string()),
                    },
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(detail) => details.push(detail),
                Err(err) => {
                    // task panic은 삼키지 않고 surface
                    tracing::error!("bulk payment task failed: {:?}", err);
                    return Err(ApiError::Internal);
                }
            }
        }

        details.sort_by_key(|d| d.participant_id);
        let payments_created = details.iter().filter(|d| d.status == BulkStatus::Created).count();
        let payments_skipped = details.len() - payments_created;

        tracing::info!(
            year,
            week_number,
            payments_created,
            payments_skipped,
            "bulk weekly payments processed"
        );

        Ok(BulkResult {
            year,
            week_number,
            total_participants,
            payments_created,
            payments_skipped,
            details,
        })
    }

    // ============ Queries ============

    /// 사이클(연도)의 전체 주간 납입
    pub async fn get_cycle_payments(&self, year: i32) -> Result<Vec<Payment>, ApiError> {
        Ok(self.store.list_payments_by_cycle(year).await?)
    }

    /// 대출의 상환 이력
    pub async fn get_loan_payments(&self, loan_id: i64) -> Result<Vec<LoanPayment>, ApiError> {
        if loan_id <= 0 {
            return Err(ApiError::Validation(
                "El ID del préstamo debe ser un número positivo".to_string(),
            ));
        }
        if self.store.find_loan(loan_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("Préstamo {}", loan_id)));
        }
        Ok(self.store.list_loan_payments(loan_id).await?)
    }

    // ============ Internals ============

    /// 상환 금액을 원금/이자로 배분
    ///
    /// full은 이자 우선 충당 후 잔여를 원금에. 유형별 잔액을
    /// 초과하는 금액은 Validation — 누적 상환이 원금/이자 총액을
    /// 절대 넘지 않는다.
    fn allocate(
        &self,
        loan: &Loan,
        request: &LoanPaymentRequest,
    ) -> Result<(f64, f64), ApiError> {
        let due = Self::calculate_amount(loan, request.payment_type);
        if request.amount > due + SETTLEMENT_EPSILON {
            return Err(ApiError::Validation(format!(
                "El monto {:.2} excede el saldo pendiente {:.2}",
                request.amount, due
            )));
        }

        Ok(match request.payment_type {
            PaymentType::Principal => (request.amount, 0.0),
            PaymentType::Interest => (0.0, request.amount),
            PaymentType::Full => {
                let remaining_interest = (loan.total_interest - loan.paid_interest).max(0.0);
                let to_interest = remaining_interest.min(request.amount);
                (request.amount - to_interest, to_interest)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::InMemoryStore;
    use crate::db::{LoanStatus, Participant};
    use crate::services::cycle_ledger::{CarryForward, CycleLedger};

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            port: 3000,
            database_url: String::new(),
            share_price: 100.0,
            loan_interest_rate: 0.10,
            loan_term_weeks: 12,
            environment: crate::config::Environment::Development,
        })
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        loan_book: Arc<LoanBook>,
        processor: Arc<PaymentProcessor>,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let config = test_config();
        let locks = Arc::new(KeyedLocks::new());
        let loan_book = Arc::new(LoanBook::new(store.clone(), config.clone(), locks.clone()));
        let processor = Arc::new(PaymentProcessor::new(
            store.clone(),
            config,
            loan_book.clone(),
            locks,
        ));
        Fixture { store, loan_book, processor }
    }

    async fn seed_participant(store: &InMemoryStore, id_hint: usize) -> Participant {
        let now = Utc::now();
        store
            .insert_participant(Participant {
                id: 0,
                name: format!("Socio {}", id_hint),
                email: format!("socio{}@tanda.mx", id_hint),
                shares: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    async fn activate_cycle(store: &Arc<InMemoryStore>, year: i32) {
        let ledger = CycleLedger::new(store.clone(), Arc::new(CarryForward));
        ledger.activate(year).await.unwrap();
    }

    fn loan_request(
        participant_id: i64,
        loan_id: i64,
        amount: f64,
        payment_type: PaymentType,
    ) -> LoanPaymentRequest {
        LoanPaymentRequest {
            participant_id,
            loan_id,
            amount,
            payment_type,
            year: 2025,
            week_number: 10,
        }
    }

    // ============ calculate_amount ============

    #[test]
    fn full_equals_principal_plus_interest() {
        let now = Utc::now();
        let mut loan = Loan {
            id: 1,
            participant_id: 1,
            amount: 1000.0,
            interest_rate: 0.10,
            total_interest: 100.0,
            projected_interest: 100.0,
            paid_principal: 0.0,
            paid_interest: 0.0,
            term_weeks: 12,
            status: LoanStatus::Active,
            due_date: now,
            annual_cycle_id: 1,
            created_at: now,
            updated_at: now,
        };

        for (paid_p, paid_i) in [(0.0, 0.0), (400.0, 0.0), (1000.0, 30.0), (1200.0, 150.0)] {
            loan.paid_principal = paid_p;
            loan.paid_interest = paid_i;

            let full = PaymentProcessor::calculate_amount(&loan, PaymentType::Full);
            let principal = PaymentProcessor::calculate_amount(&loan, PaymentType::Principal);
            let interest = PaymentProcessor::calculate_amount(&loan, PaymentType::Interest);

            assert!((full - (principal + interest)).abs() < 1e-9);
            // 과납 상태에서도 음수가 되지 않는다
            assert!(principal >= 0.0 && interest >= 0.0 && full >= 0.0);
        }
    }

    // ============ week number ============

    #[test]
    fn week_number_matches_reference_dates() {
        // 2025-01-01은 수요일 (월=1 기준 3) → ceil(3/7) = 1
        let jan1 = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(week_number_for(jan1), 1);

        // 2025-01-06 (월요일): ceil((5 + 3)/7) = 2
        let jan6 = Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap();
        assert_eq!(week_number_for(jan6), 2);

        // 2024-01-01은 월요일 → 1주차
        let jan1_2024 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(week_number_for(jan1_2024), 1);

        // 2025-12-28: ceil((361 + 3)/7) = 52
        let dec28 = Utc.with_ymd_and_hms(2025, 12, 28, 0, 0, 0).unwrap();
        assert_eq!(week_number_for(dec28), 52);

        // 2024-12-31: 산술상 ceil((365 + 1)/7) = 53이지만 52로 고정 —
        // 연말 bulk 납입이 주차 범위 검증에 걸리면 안 된다
        let dec31 = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(week_number_for(dec31), 52);
    }

    #[test]
    fn single_and_bulk_paths_share_week_computation() {
        // 두 경로 모두 current_week_number()를 쓰므로 같은 시점엔 같은 값
        let now = Utc::now();
        assert_eq!(week_number_for(now), week_number_for(now));
        assert_eq!(current_week_number(), week_number_for(Utc::now()));
    }

    // ============ loan settlement scenario ============

    #[tokio::test]
    async fn principal_then_full_settles_loan() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;

        // 1000 대출, 이자율 10% → totalInterest 100
        let loan = f.loan_book.create_loan(participant.id, 1000.0, 2025).await.unwrap();
        assert!((loan.total_interest - 100.0).abs() < 1e-9);

        // 원금 400 상환 → 남은 원금 600, full 잔액 700
        f.processor
            .apply_loan_payment(loan_request(participant.id, loan.id, 400.0, PaymentType::Principal))
            .await
            .unwrap();

        let after = f.store.find_loan(loan.id).await.unwrap().unwrap();
        assert!((PaymentProcessor::calculate_amount(&after, PaymentType::Principal) - 600.0).abs() < 1e-9);
        assert!((PaymentProcessor::calculate_amount(&after, PaymentType::Full) - 700.0).abs() < 1e-9);

        // full 700 상환 → 완납, paid 전이
        f.processor
            .apply_loan_payment(loan_request(participant.id, loan.id, 700.0, PaymentType::Full))
            .await
            .unwrap();

        let settled = f.store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(settled.status, LoanStatus::Paid);
        assert!((settled.paid_principal - 1000.0).abs() < 1e-9);
        assert!((settled.paid_interest - 100.0).abs() < 1e-9);

        // paid 대출에는 추가 상환 불가
        match f
            .processor
            .apply_loan_payment(loan_request(participant.id, loan.id, 10.0, PaymentType::Interest))
            .await
        {
            Err(ApiError::State(_)) => {}
            other => panic!("expected State, got {:?}", other.map(|p| p.id)),
        }
    }

    #[tokio::test]
    async fn overpayment_is_rejected() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;
        let loan = f.loan_book.create_loan(participant.id, 1000.0, 2025).await.unwrap();

        match f
            .processor
            .apply_loan_payment(loan_request(participant.id, loan.id, 1100.0, PaymentType::Principal))
            .await
        {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other.map(|p| p.id)),
        }

        // 원장은 그대로
        let unchanged = f.store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(unchanged.paid_principal, 0.0);
    }

    #[tokio::test]
    async fn interest_payment_feeds_cycle_totals() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;
        let loan = f.loan_book.create_loan(participant.id, 1000.0, 2025).await.unwrap();

        f.processor
            .apply_loan_payment(loan_request(participant.id, loan.id, 100.0, PaymentType::Interest))
            .await
            .unwrap();

        let cycle = f.store.find_cycle_by_year(2025).await.unwrap().unwrap();
        // 대출로 -1000, 상환으로 +100
        assert!((cycle.total_funds - (-900.0)).abs() < 1e-9);
        assert!((cycle.total_interest - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exact_duplicate_loan_payment_returns_existing() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;
        let loan = f.loan_book.create_loan(participant.id, 1000.0, 2025).await.unwrap();

        let request = loan_request(participant.id, loan.id, 400.0, PaymentType::Principal);
        let first = f.processor.apply_loan_payment(request.clone()).await.unwrap();
        let retry = f.processor.apply_loan_payment(request).await.unwrap();

        assert_eq!(first.id, retry.id);

        // 재시도가 원장을 두 번 깎지 않는다
        let after = f.store.find_loan(loan.id).await.unwrap().unwrap();
        assert!((after.paid_principal - 400.0).abs() < 1e-9);
        assert_eq!(f.store.list_loan_payments(loan.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn loan_payment_week_out_of_range() {
        let f = setup().await;
        let mut request = loan_request(1, 1, 100.0, PaymentType::Full);
        request.week_number = 53;

        match f.processor.apply_loan_payment(request).await {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other.map(|p| p.id)),
        }
    }

    // ============ weekly contributions ============

    #[tokio::test]
    async fn duplicate_weekly_contribution_conflicts() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;

        f.processor
            .apply_weekly_contribution(participant.id, 2025, 10, 100.0)
            .await
            .unwrap();

        match f
            .processor
            .apply_weekly_contribution(participant.id, 2025, 10, 100.0)
            .await
        {
            Err(ApiError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other.map(|p| p.id)),
        }

        // 두 번째 행이 생기지 않는다
        assert_eq!(f.store.list_payments_by_cycle(2025).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weekly_contribution_requires_active_cycle() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;

        match f
            .processor
            .apply_weekly_contribution(participant.id, 2025, 10, 100.0)
            .await
        {
            Err(ApiError::State(_)) => {}
            other => panic!("expected State, got {:?}", other.map(|p| p.id)),
        }
    }

    // ============ bulk sweep ============

    #[tokio::test]
    async fn bulk_sweep_counts_created_and_skipped() {
        let f = setup().await;
        activate_cycle(&f.store, 2025).await;

        let mut ids = Vec::new();
        for i in 1..=5 {
            ids.push(seed_participant(&f.store, i).await.id);
        }

        // 참가자 3번째는 이미 10주차 납입
        f.processor
            .apply_weekly_contribution(ids[2], 2025, 10, 100.0)
            .await
            .unwrap();

        // 마지막 참가자는 제외 목록
        let excluded = ids[4];
        let result = f
            .processor
            .clone()
            .bulk_pay_all_participants(2025, Some(10), vec![excluded])
            .await
            .unwrap();

        assert_eq!(result.total_participants, 5);
        assert_eq!(result.payments_created, 3);
        assert_eq!(result.payments_skipped, 2);
        assert_eq!(result.details.len(), 5);
        assert_eq!(result.week_number, 10);

        let excluded_detail = result
            .details
            .iter()
            .find(|d| d.participant_id == excluded)
            .unwrap();
        assert_eq!(excluded_detail.status, BulkStatus::Skipped);

        let duplicate_detail = result
            .details
            .iter()
            .find(|d| d.participant_id == ids[2])
            .unwrap();
        assert_eq!(duplicate_detail.status, BulkStatus::Skipped);
        assert!(duplicate_detail.reason.is_some());

        // 주간 납입 총 4건 (기존 1 + 신규 3)
        assert_eq!(f.store.list_payments_by_cycle(2025).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn bulk_sweep_accumulates_every_contribution_in_pool() {
        let f = setup().await;
        activate_cycle(&f.store, 2025).await;
        for i in 1..=5 {
            seed_participant(&f.store, i).await;
        }

        let result = f
            .processor
            .clone()
            .bulk_pay_all_participants(2025, Some(10), vec![])
            .await
            .unwrap();
        assert_eq!(result.payments_created, 5);

        // 동시 납입이 서로의 증분을 덮어쓰지 않는다: 5 x 100 = 500
        let cycle = f.store.find_cycle_by_year(2025).await.unwrap().unwrap();
        assert!((cycle.total_funds - 500.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_same_week_contributions_yield_single_payment() {
        let f = setup().await;
        let participant = seed_participant(&f.store, 1).await;
        activate_cycle(&f.store, 2025).await;

        // 개별 납입과 또 다른 납입이 같은 참가자/주차로 동시에 도착
        let p1 = f.processor.clone();
        let p2 = f.processor.clone();
        let id = participant.id;
        let a = tokio::spawn(async move { p1.apply_weekly_contribution(id, 2025, 10, 100.0).await });
        let b = tokio::spawn(async move { p2.apply_weekly_contribution(id, 2025, 10, 100.0).await });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        // 정확히 하나만 성공, 다른 하나는 Conflict
        assert!(a.is_ok() ^ b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        match loser {
            Err(ApiError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other.map(|p| p.id)),
        }

        assert_eq!(f.store.list_payments_by_cycle(2025).await.unwrap().len(), 1);
        let cycle = f.store.find_cycle_by_year(2025).await.unwrap().unwrap();
        assert!((cycle.total_funds - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn bulk_sweep_resolves_current_week_when_omitted() {
        let f = setup().await;
        activate_cycle(&f.store, 2025).await;
        seed_participant(&f.store, 1).await;

        let result = f
            .processor
            .clone()
            .bulk_pay_all_participants(2025, None, vec![])
            .await
            .unwrap();

        assert_eq!(result.week_number, current_week_number());
    }
}
