//! Repository Pattern Implementation
//!
//! # Interview Q&A
//!
//! Q: Repository 패턴이란?
//! A: 데이터 접근 로직을 추상화하는 패턴
//!
//!    장점:
//!    - 비즈니스 로직과 데이터 접근 분리
//!    - 테스트 시 Mock 구현 쉬움
//!    - DB 교체 시 영향 최소화
//!
//! Q: 이 코드에서는 왜 trait를 실제로 사용하는가?
//! A: 금융 엔진의 불변식(단일 활성 사이클, 주간 납입 유일성,
//!    상환 한도)은 DB 없이 단위 테스트로 검증되어야 함.
//!    서비스 레이어는 `TandaStore`만 알고, 프로덕션은 PostgreSQL
//!    (`Database`), 테스트는 in-memory mock을 주입한다.

use async_trait::async_trait;
use anyhow::Result;

use super::models::{AnnualCycle, Loan, LoanPayment, LoanStatus, Participant, Payment, PaymentType};

/// 영속 계층 인터페이스
///
/// insert 계열은 id가 0인 엔티티를 받아 저장소가 id를 발급한 뒤
/// 완성된 레코드를 돌려준다 (PostgreSQL: INSERT ... RETURNING).
#[async_trait]
pub trait TandaStore: Send + Sync {
    // ============ Annual Cycles ============
    async fn insert_cycle(&self, cycle: AnnualCycle) -> Result<AnnualCycle>;
    async fn update_cycle(&self, cycle: &AnnualCycle) -> Result<()>;
    /// 사이클 집계에 델타를 원자적으로 가산
    ///
    /// 납입/대출 경로는 read-modify-write 대신 이 메서드를 쓴다.
    /// 동시 납입이 서로의 증분을 덮어쓰지 않고, 스냅샷의
    /// status/closed_at을 되쓰는 일도 없다 (update_cycle은
    /// 라이프사이클 전이 전용).
    async fn increment_cycle_totals(
        &self,
        cycle_id: i64,
        funds_delta: f64,
        interest_delta: f64,
        projected_delta: f64,
    ) -> Result<()>;
    async fn find_cycle_by_year(&self, year: i32) -> Result<Option<AnnualCycle>>;
    async fn find_active_cycle(&self) -> Result<Option<AnnualCycle>>;
    async fn list_cycles(&self) -> Result<Vec<AnnualCycle>>;

    // ============ Participants ============
    async fn insert_participant(&self, participant: Participant) -> Result<Participant>;
    async fn update_participant(&self, participant: &Participant) -> Result<()>;
    async fn find_participant(&self, id: i64) -> Result<Option<Participant>>;
    /// only_active=true면 활성 조합원만
    async fn list_participants(&self, only_active: bool) -> Result<Vec<Participant>>;

    // ============ Loans ============
    async fn insert_loan(&self, loan: Loan) -> Result<Loan>;
    async fn update_loan(&self, loan: &Loan) -> Result<()>;
    async fn find_loan(&self, id: i64) -> Result<Option<Loan>>;
    /// 해당 사이클에서 참가자의 미완납(paid가 아닌) 대출
    async fn find_open_loan(&self, participant_id: i64, cycle_id: i64) -> Result<Option<Loan>>;
    async fn list_loans_by_participant(&self, participant_id: i64) -> Result<Vec<Loan>>;
    async fn list_loans_by_status(&self, statuses: &[LoanStatus]) -> Result<Vec<Loan>>;
    async fn list_loans_by_cycle(&self, cycle_id: i64) -> Result<Vec<Loan>>;

    // ============ Weekly Payments ============
    async fn insert_payment(&self, payment: Payment) -> Result<Payment>;
    async fn find_payment_by_week(
        &self,
        participant_id: i64,
        year: i32,
        week_number: i32,
    ) -> Result<Option<Payment>>;
    async fn list_payments_by_cycle(&self, year: i32) -> Result<Vec<Payment>>;

    // ============ Loan Payments ============
    async fn insert_loan_payment(&self, payment: LoanPayment) -> Result<LoanPayment>;
    async fn list_loan_payments(&self, loan_id: i64) -> Result<Vec<LoanPayment>>;
    /// 완전 중복 재시도 감지용 (같은 대출/유형/금액/연도/주차)
    async fn find_loan_payment_exact(
        &self,
        loan_id: i64,
        payment_type: PaymentType,
        amount: f64,
        year: i32,
        week_number: i32,
    ) -> Result<Option<LoanPayment>>;
}

// PostgreSQL 구현은 db/mod.rs의 Database 구조체에 있음
// 테스트용 in-memory 구현:

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// HashMap 기반 in-memory 저장소
    ///
    /// 단위 테스트 전용. id는 1부터 순차 발급.
    /// 모든 메서드는 락을 잡기 전에 한 번 스케줄러에 양보한다 —
    /// 실제 DB 왕복의 await 지점을 재현해서 동시성 테스트가
    /// 인터리빙을 실제로 타게 만든다.
    #[derive(Default)]
    pub struct InMemoryStore {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        cycles: HashMap<i64, AnnualCycle>,
        participants: HashMap<i64, Participant>,
        loans: HashMap<i64, Loan>,
        payments: HashMap<i64, Payment>,
        loan_payments: HashMap<i64, LoanPayment>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Inner {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    #[async_trait]
    impl TandaStore for InMemoryStore {
        async fn insert_cycle(&self, mut cycle: AnnualCycle) -> Result<AnnualCycle> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            cycle.id = inner.next_id();
            inner.cycles.insert(cycle.id, cycle.clone());
            Ok(cycle)
        }

        async fn update_cycle(&self, cycle: &AnnualCycle) -> Result<()> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            inner.cycles.insert(cycle.id, cycle.clone());
            Ok(())
        }

        async fn increment_cycle_totals(
            &self,
            cycle_id: i64,
            funds_delta: f64,
            interest_delta: f64,
            projected_delta: f64,
        ) -> Result<()> {
            // 락 한 번 안에서 읽고 더한다 (UPDATE ... SET x = x + d 와 동등)
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            if let Some(cycle) = inner.cycles.get_mut(&cycle_id) {
                cycle.total_funds += funds_delta;
                cycle.total_interest += interest_delta;
                cycle.projected_interest += projected_delta;
                cycle.updated_at = chrono::Utc::now();
            }
            Ok(())
        }

        async fn find_cycle_by_year(&self, year: i32) -> Result<Option<AnnualCycle>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner.cycles.values().find(|c| c.year == year).cloned())
        }

        async fn find_active_cycle(&self) -> Result<Option<AnnualCycle>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .cycles
                .values()
                .find(|c| c.status == crate::db::models::CycleStatus::Active)
                .cloned())
        }

        async fn list_cycles(&self) -> Result<Vec<AnnualCycle>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut cycles: Vec<_> = inner.cycles.values().cloned().collect();
            cycles.sort_by_key(|c| c.year);
            Ok(cycles)
        }

        async fn insert_participant(&self, mut participant: Participant) -> Result<Participant> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            participant.id = inner.next_id();
            inner.participants.insert(participant.id, participant.clone());
            Ok(participant)
        }

        async fn update_participant(&self, participant: &Participant) -> Result<()> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            inner.participants.insert(participant.id, participant.clone());
            Ok(())
        }

        async fn find_participant(&self, id: i64) -> Result<Option<Participant>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner.participants.get(&id).cloned())
        }

        async fn list_participants(&self, only_active: bool) -> Result<Vec<Participant>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut participants: Vec<_> = inner
                .participants
                .values()
                .filter(|p| !only_active || p.is_active)
                .cloned()
                .collect();
            participants.sort_by_key(|p| p.id);
            Ok(participants)
        }

        async fn insert_loan(&self, mut loan: Loan) -> Result<Loan> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            loan.id = inner.next_id();
            inner.loans.insert(loan.id, loan.clone());
            Ok(loan)
        }

        async fn update_loan(&self, loan: &Loan) -> Result<()> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            inner.loans.insert(loan.id, loan.clone());
            Ok(())
        }

        async fn find_loan(&self, id: i64) -> Result<Option<Loan>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner.loans.get(&id).cloned())
        }

        async fn find_open_loan(&self, participant_id: i64, cycle_id: i64) -> Result<Option<Loan>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .loans
                .values()
                .find(|l| {
                    l.participant_id == participant_id
                        && l.annual_cycle_id == cycle_id
                        && l.status != LoanStatus::Paid
                })
                .cloned())
        }

        async fn list_loans_by_participant(&self, participant_id: i64) -> Result<Vec<Loan>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut loans: Vec<_> = inner
                .loans
                .values()
                .filter(|l| l.participant_id == participant_id)
                .cloned()
                .collect();
            loans.sort_by_key(|l| l.id);
            Ok(loans)
        }

        async fn list_loans_by_status(&self, statuses: &[LoanStatus]) -> Result<Vec<Loan>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut loans: Vec<_> = inner
                .loans
                .values()
                .filter(|l| statuses.contains(&l.status))
                .cloned()
                .collect();
            loans.sort_by_key(|l| l.id);
            Ok(loans)
        }

        async fn list_loans_by_cycle(&self, cycle_id: i64) -> Result<Vec<Loan>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut loans: Vec<_> = inner
                .loans
                .values()
                .filter(|l| l.annual_cycle_id == cycle_id)
                .cloned()
                .collect();
            loans.sort_by_key(|l| l.id);
            Ok(loans)
        }

        async fn insert_payment(&self, mut payment: Payment) -> Result<Payment> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            payment.id = inner.next_id();
            inner.payments.insert(payment.id, payment.clone());
            Ok(payment)
        }

        async fn find_payment_by_week(
            &self,
            participant_id: i64,
            year: i32,
            week_number: i32,
        ) -> Result<Option<Payment>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .payments
                .values()
                .find(|p| {
                    p.participant_id == participant_id
                        && p.year == year
                        && p.week_number == week_number
                })
                .cloned())
        }

        async fn list_payments_by_cycle(&self, year: i32) -> Result<Vec<Payment>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut payments: Vec<_> = inner
                .payments
                .values()
                .filter(|p| p.year == year)
                .cloned()
                .collect();
            payments.sort_by_key(|p| p.id);
            Ok(payments)
        }

        async fn insert_loan_payment(&self, mut payment: LoanPayment) -> Result<LoanPayment> {
            tokio::task::yield_now().await;
            let mut inner = self.inner.lock().unwrap();
            payment.id = inner.next_id();
            inner.loan_payments.insert(payment.id, payment.clone());
            Ok(payment)
        }

        async fn list_loan_payments(&self, loan_id: i64) -> Result<Vec<LoanPayment>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            let mut payments: Vec<_> = inner
                .loan_payments
                .values()
                .filter(|p| p.loan_id == loan_id)
                .cloned()
                .collect();
            payments.sort_by_key(|p| p.id);
            Ok(payments)
        }

        async fn find_loan_payment_exact(
            &self,
            loan_id: i64,
            payment_type: PaymentType,
            amount: f64,
            year: i32,
            week_number: i32,
        ) -> Result<Option<LoanPayment>> {
            tokio::task::yield_now().await;
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .loan_payments
                .values()
                .find(|p| {
                    p.loan_id == loan_id
                        && p.payment_type == payment_type
                        && (p.amount - amount).abs() < 1e-9
                        && p.year == year
                        && p.week_number == week_number
                })
                .cloned())
        }
    }
}
