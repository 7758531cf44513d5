//! Loan Endpoints
//!
//! 대출 발행과 조회, 관리자용 유예/재개 전이.
//! paid 전이는 상환 경로(PaymentProcessor)에서만 일어난다.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::db::Loan;
use crate::error::ApiError;
use crate::AppState;

// ============ Request Types ============

/// 대출 생성 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub participant_id: i64,
    pub amount: f64,
    pub year: i32,
}

// ============ Handlers ============

/// POST /loans
///
/// 활성 사이클에 귀속되는 대출 생성.
/// 참가자당 사이클당 미완납 대출 1건 제한 → 409 CONFLICT.
pub async fn create_loan(
    State(state): State<AppState>,
    Json(request): Json<CreateLoanRequest>,
) -> Result<Json<Loan>, ApiError> {
    let loan = state
        .loans
        .create_loan(request.participant_id, request.amount, request.year)
        .await?;
    Ok(Json(loan))
}

/// GET /loans/active
///
/// 상환 중인 대출 (active + deferred)
pub async fn get_active_loans(
    State(state): State<AppState>,
) -> Result<Json<Vec<Loan>>, ApiError> {
    Ok(Json(state.loans.get_active().await?))
}

/// GET /loans/completed
///
/// 종결된 대출 (paid + defaulted)
pub async fn get_completed_loans(
    State(state): State<AppState>,
) -> Result<Json<Vec<Loan>>, ApiError> {
    Ok(Json(state.loans.get_completed().await?))
}

/// GET /loans/participant/:id
pub async fn get_loans_by_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<i64>,
) -> Result<Json<Vec<Loan>>, ApiError> {
    Ok(Json(state.loans.get_by_participant(participant_id).await?))
}

/// POST /loans/:id/defer
///
/// 관리자 액션: active → deferred
pub async fn defer_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<i64>,
) -> Result<Json<Loan>, ApiError> {
    Ok(Json(state.loans.defer(loan_id).await?))
}

/// POST /loans/:id/resume
///
/// 관리자 액션: deferred → active
pub async fn resume_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<i64>,
) -> Result<Json<Loan>, ApiError> {
    Ok(Json(state.loans.resume(loan_id).await?))
}
