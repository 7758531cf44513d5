//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 PostgreSQL을 선택했는가?
//! A: 금융 백엔드에 적합한 이유
//!
//!    1. ACID 트랜잭션: 납입/상환 데이터 무결성 보장
//!    2. partial unique index: 단일 활성 사이클 불변식을 DB 레벨에서 강제
//!    3. 인덱싱: 참가자별, 사이클별 조회 최적화
//!    4. 생태계: SQLx, Diesel 등 Rust 라이브러리 지원
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - 커넥션 재사용 (오버헤드 감소)
//!    - 자동 health check
//!    - 타임아웃 처리

mod models;
mod repository;

pub use models::*;
pub use repository::TandaStore;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const CYCLE_COLUMNS: &str = "id, year, status, total_funds, total_interest, \
     projected_interest, total_shares, interest_per_share, closed_at, created_at, updated_at";

const LOAN_COLUMNS: &str = "id, participant_id, amount, interest_rate, total_interest, \
     projected_interest, paid_principal, paid_interest, term_weeks, status, due_date, \
     annual_cycle_id, created_at, updated_at";

#[async_trait]
impl TandaStore for Database {
    async fn insert_cycle(&self, cycle: AnnualCycle) -> Result<AnnualCycle> {
        let created = sqlx::query_as::<_, AnnualCycle>(&format!(
            r#"
            INSERT INTO annual_cycles (
                year, status, total_funds, total_interest, projected_interest,
                total_shares, interest_per_share, closed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {CYCLE_COLUMNS}
            "#
        ))
        .bind(cycle.year)
        .bind(cycle.status)
        .bind(cycle.total_funds)
        .bind(cycle.total_interest)
        .bind(cycle.projected_interest)
        .bind(cycle.total_shares)
        .bind(cycle.interest_per_share)
        .bind(cycle.closed_at)
        .bind(cycle.created_at)
        .bind(cycle.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_cycle(&self, cycle: &AnnualCycle) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE annual_cycles SET
                status = $2,
                total_funds = $3,
                total_interest = $4,
                projected_interest = $5,
                total_shares = $6,
                interest_per_share = $7,
                closed_at = $8,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cycle.id)
        .bind(cycle.status)
        .bind(cycle.total_funds)
        .bind(cycle.total_interest)
        .bind(cycle.projected_interest)
        .bind(cycle.total_shares)
        .bind(cycle.interest_per_share)
        .bind(cycle.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_cycle_totals(
        &self,
        cycle_id: i64,
        funds_delta: f64,
        interest_delta: f64,
        projected_delta: f64,
    ) -> Result<()> {
        // DB가 원자적으로 가산 — 동시 납입이 증분을 잃지 않는다
        sqlx::query(
            r#"
            UPDATE annual_cycles SET
                total_funds = total_funds + $2,
                total_interest = total_interest + $3,
                projected_interest = projected_interest + $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cycle_id)
        .bind(funds_delta)
        .bind(interest_delta)
        .bind(projected_delta)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_cycle_by_year(&self, year: i32) -> Result<Option<AnnualCycle>> {
        let cycle = sqlx::query_as::<_, AnnualCycle>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM annual_cycles WHERE year = $1"
        ))
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cycle)
    }

    async fn find_active_cycle(&self) -> Result<Option<AnnualCycle>> {
        let cycle = sqlx::query_as::<_, AnnualCycle>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM annual_cycles WHERE status = 'active'"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(cycle)
    }

    async fn list_cycles(&self) -> Result<Vec<AnnualCycle>> {
        let cycles = sqlx::query_as::<_, AnnualCycle>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM annual_cycles ORDER BY year"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(cycles)
    }

    async fn insert_participant(&self, participant: Participant) -> Result<Participant> {
        let created = sqlx::query_as::<_, Participant>(
            r#"
            INSERT INTO participants (name, email, shares, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, shares, is_active, created_at, updated_at
            "#,
        )
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(participant.shares)
        .bind(participant.is_active)
        .bind(participant.created_at)
        .bind(participant.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE participants SET
                name = $2, email = $3, shares = $4, is_active = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(participant.shares)
        .bind(participant.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_participant(&self, id: i64) -> Result<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, name, email, shares, is_active, created_at, updated_at \
             FROM participants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant)
    }

    async fn list_participants(&self, only_active: bool) -> Result<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(
            "SELECT id, name, email, shares, is_active, created_at, updated_at \
             FROM participants WHERE is_active OR NOT $1 ORDER BY id",
        )
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    async fn insert_loan(&self, loan: Loan) -> Result<Loan> {
        let created = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (
                participant_id, amount, interest_rate, total_interest, projected_interest,
                paid_principal, paid_interest, term_weeks, status, due_date,
                annual_cycle_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(loan.participant_id)
        .bind(loan.amount)
        .bind(loan.interest_rate)
        .bind(loan.total_interest)
        .bind(loan.projected_interest)
        .bind(loan.paid_principal)
        .bind(loan.paid_interest)
        .bind(loan.term_weeks)
        .bind(loan.status)
        .bind(loan.due_date)
        .bind(loan.annual_cycle_id)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_loan(&self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE loans SET
                paid_principal = $2, paid_interest = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(loan.id)
        .bind(loan.paid_principal)
        .bind(loan.paid_interest)
        .bind(loan.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_loan(&self, id: i64) -> Result<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn find_open_loan(&self, participant_id: i64, cycle_id: i64) -> Result<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans \
             WHERE participant_id = $1 AND annual_cycle_id = $2 AND status <> 'paid' \
             LIMIT 1"
        ))
        .bind(participant_id)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn list_loans_by_participant(&self, participant_id: i64) -> Result<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE participant_id = $1 ORDER BY id"
        ))
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list_loans_by_status(&self, statuses: &[LoanStatus]) -> Result<Vec<Loan>> {
        // enum 배열 바인딩 대신 text 비교 (커스텀 enum 배열 인코딩 회피)
        let names: Vec<String> = statuses
            .iter()
            .map(|s| {
                match s {
                    LoanStatus::Active => "active",
                    LoanStatus::Deferred => "deferred",
                    LoanStatus::Defaulted => "defaulted",
                    LoanStatus::Paid => "paid",
                }
                .to_string()
            })
            .collect();

        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE status::text = ANY($1) ORDER BY id"
        ))
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list_loans_by_cycle(&self, cycle_id: i64) -> Result<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE annual_cycle_id = $1 ORDER BY id"
        ))
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                participant_id, amount, year, week_number, annual_cycle_id,
                payment_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, participant_id, amount, year, week_number, annual_cycle_id,
                      payment_date, created_at
            "#,
        )
        .bind(payment.participant_id)
        .bind(payment.amount)
        .bind(payment.year)
        .bind(payment.week_number)
        .bind(payment.annual_cycle_id)
        .bind(payment.payment_date)
        .bind(payment.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_payment_by_week(
        &self,
        participant_id: i64,
        year: i32,
        week_number: i32,
    ) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT id, participant_id, amount, year, week_number, annual_cycle_id, \
                    payment_date, created_at \
             FROM payments \
             WHERE participant_id = $1 AND year = $2 AND week_number = $3",
        )
        .bind(participant_id)
        .bind(year)
        .bind(week_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn list_payments_by_cycle(&self, year: i32) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, participant_id, amount, year, week_number, annual_cycle_id, \
                    payment_date, created_at \
             FROM payments WHERE year = $1 ORDER BY id",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn insert_loan_payment(&self, payment: LoanPayment) -> Result<LoanPayment> {
        let created = sqlx::query_as::<_, LoanPayment>(
            r#"
            INSERT INTO loan_payments (
                loan_id, participant_id, amount, payment_type, week_number, year,
                weekly_summary_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, loan_id, participant_id, amount, payment_type, week_number,
                      year, weekly_summary_id, created_at
            "#,
        )
        .bind(payment.loan_id)
        .bind(payment.participant_id)
        .bind(payment.amount)
        .bind(payment.payment_type)
        .bind(payment.week_number)
        .bind(payment.year)
        .bind(payment.weekly_summary_id)
        .bind(payment.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list_loan_payments(&self, loan_id: i64) -> Result<Vec<LoanPayment>> {
        let payments = sqlx::query_as::<_, LoanPayment>(
            "SELECT id, loan_id, participant_id, amount, payment_type, week_number, \
                    year, weekly_summary_id, created_at \
             FROM loan_payments WHERE loan_id = $1 ORDER BY id",
        )
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await?;

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
        let payment = sqlx::query_as::<_, LoanPayment>(
            "SELECT id, loan_id, participant_id, amount, payment_type, week_number, \
                    year, weekly_summary_id, created_at \
             FROM loan_payments \
             WHERE loan_id = $1 AND payment_type = $2 AND amount = $3 \
               AND year = $4 AND week_number = $5 \
             LIMIT 1",
        )
        .bind(loan_id)
        .bind(payment_type)
        .bind(amount)
        .bind(year)
        .bind(week_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }
}

#[cfg(test)]
pub use repository::mock;
