//! Database Models
//!
//! Persisted entities of the cooperative: cycles, participants, loans and
//! the two payment ledgers. Wire names are camelCase to match the web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 연간 사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cycle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Pending,
    Active,
    Closed,
}

/// 대출 상태
///
/// 상태 전이:
/// - active -> paid (원금+이자 완납)
/// - active <-> deferred (관리자 유예/재개)
/// - active|deferred -> defaulted (사이클 마감 정책)
///
/// paid와 defaulted는 terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Deferred,
    Defaulted,
    Paid,
}

impl LoanStatus {
    /// 상환 가능한 상태 (active 또는 deferred)
    pub fn is_payable(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Deferred)
    }
}

/// 대출 상환 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Principal,
    Interest,
    Full,
}

/// 조합원
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// 보유 주(share) 수 - 주간 납입금과 이자 배분의 기준
    pub shares: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 연간 사이클
///
/// 불변식: 활성 사이클은 항상 최대 1개, year는 유일.
/// interest_per_share는 마감 시점에만 계산됨.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualCycle {
    pub id: i64,
    pub year: i32,
    pub status: CycleStatus,
    pub total_funds: f64,
    pub total_interest: f64,
    pub projected_interest: f64,
    pub total_shares: f64,
    pub interest_per_share: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 대출
///
/// paid_principal/paid_interest가 상환의 원천 데이터 -
/// 남은 금액 계산은 항상 이 누적치에서 다시 계산한다 (클라이언트 캐시 불신).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: i64,
    pub participant_id: i64,
    pub amount: f64,
    pub interest_rate: f64,
    pub total_interest: f64,
    pub projected_interest: f64,
    pub paid_principal: f64,
    pub paid_interest: f64,
    pub term_weeks: i32,
    pub status: LoanStatus,
    pub due_date: DateTime<Utc>,
    pub annual_cycle_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 주간 납입 (share contribution)
///
/// 불변식: (participant_id, year, week_number) 당 1건
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub participant_id: i64,
    pub amount: f64,
    pub year: i32,
    pub week_number: i32,
    pub annual_cycle_id: i64,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 대출 상환 기록
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPayment {
    pub id: i64,
    pub loan_id: i64,
    pub participant_id: i64,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub week_number: i32,
    pub year: i32,
    pub weekly_summary_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
