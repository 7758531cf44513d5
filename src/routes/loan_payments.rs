//! Loan Payment Endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::LoanPayment;
use crate::error::ApiError;
use crate::services::LoanPaymentRequest;
use crate::AppState;

/// POST /loan-payments
///
/// 대출 상환 적용. paymentType은 principal | interest | full.
/// 완납되면 대출이 paid로 전이된다.
pub async fn create_loan_payment(
    State(state): State<AppState>,
    Json(request): Json<LoanPaymentRequest>,
) -> Result<Json<LoanPayment>, ApiError> {
    let payment = state.payments.apply_loan_payment(request).await?;
    Ok(Json(payment))
}

/// GET /loan-payments/:loan_id
///
/// 대출의 상환 이력
pub async fn get_loan_payments(
    State(state): State<AppState>,
    Path(loan_id): Path<i64>,
) -> Result<Json<Vec<LoanPayment>>, ApiError> {
    Ok(Json(state.payments.get_loan_payments(loan_id).await?))
}
