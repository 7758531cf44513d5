//! Weekly Payment Endpoints
//!
//! 개별 주간 납입, bulk 주간 납입, 참가자 리포트.
//! 납입 금액은 서버에서 계산 (보유 주 수 * 주당 가격) —
//! 클라이언트가 보낸 금액은 신뢰하지 않는다.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::Payment;
use crate::error::ApiError;
use crate::services::{BulkResult, ParticipantsReportsResponse};
use crate::AppState;

// ============ Request Types ============

/// 개별 납입 요청 (금액은 서버 계산)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub year: i32,
    pub week_number: i32,
}

/// bulk 주간 납입 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPaymentsRequest {
    pub year: i32,
    /// 생략 시 현재 주차
    pub week_number: Option<i32>,
    #[serde(default)]
    pub exclude_participant_ids: Vec<i64>,
}

/// 리포트 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// 생략 시 활성 사이클 기준
    pub year: Option<i32>,
}

// ============ Handlers ============

/// POST /payments/:participant_id
///
/// 참가자의 주간 납입 생성. (참가자, 연도, 주차) 중복 → 409 CONFLICT.
pub async fn create_payment(
    State(state): State<AppState>,
    Path(participant_id): Path<i64>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    let participant = state
        .store
        .find_participant(participant_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Participante {}", participant_id)))?;

    let amount = state.payments.contribution_amount(&participant);
    let payment = state
        .payments
        .apply_weekly_contribution(participant_id, request.year, request.week_number, amount)
        .await?;
    Ok(Json(payment))
}

/// GET /payments/cycle/:year
pub async fn get_cycle_payments(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.payments.get_cycle_payments(year).await?))
}

/// POST /payments/weekly
///
/// 전체 활성 참가자 주간 납입 일괄 처리.
/// 항목별 실패는 details에 skipped로 기록되고 배치는 계속된다.
pub async fn create_weekly_payments(
    State(state): State<AppState>,
    Json(request): Json<WeeklyPaymentsRequest>,
) -> Result<Json<BulkResult>, ApiError> {
    let result = state
        .payments
        .clone()
        .bulk_pay_all_participants(request.year, request.week_number, request.exclude_participant_ids)
        .await?;
    Ok(Json(result))
}

/// GET /payments/participants-reports?year=
///
/// 참가자별 납입 효율/미납/대출 요약 리포트 (읽기 전용)
pub async fn get_participants_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ParticipantsReportsResponse>, ApiError> {
    let response = state.reports.build_report(query.year).await?;
    Ok(Json(response))
}
