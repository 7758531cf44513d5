//! Annual Cycle Endpoints
//!
//! 사이클 활성화/마감과 조회. 마감된 사이클은 불변 —
//! 쓰기 후 목록/활성 조회는 최신 상태를 반영한다.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::db::AnnualCycle;
use crate::error::ApiError;
use crate::services::CloseCycleResult;
use crate::AppState;

// ============ Request Types ============

/// 활성화/마감 요청 (연도만 지정)
#[derive(Debug, Deserialize)]
pub struct CycleYearRequest {
    pub year: i32,
}

// ============ Handlers ============

/// POST /annual-cycles/activate
///
/// 새 연간 사이클 활성화. 활성 사이클 중복 → 409 CONFLICT,
/// 같은 연도 재활성화 → 409 DUPLICATE.
pub async fn activate_cycle(
    State(state): State<AppState>,
    Json(request): Json<CycleYearRequest>,
) -> Result<Json<AnnualCycle>, ApiError> {
    let cycle = state.cycles.activate(request.year).await?;
    Ok(Json(cycle))
}

/// POST /annual-cycles/close
///
/// 사이클 마감: interestPerShare 산출 후 closed로 전이.
pub async fn close_cycle(
    State(state): State<AppState>,
    Json(request): Json<CycleYearRequest>,
) -> Result<Json<CloseCycleResult>, ApiError> {
    let result = state.cycles.close(request.year).await?;
    Ok(Json(result))
}

/// GET /annual-cycles/active
///
/// 활성 사이클 조회 (없으면 null)
pub async fn get_active_cycle(
    State(state): State<AppState>,
) -> Result<Json<Option<AnnualCycle>>, ApiError> {
    let cycle = state.cycles.get_active().await?;
    Ok(Json(cycle))
}

/// GET /annual-cycles
pub async fn get_all_cycles(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnnualCycle>>, ApiError> {
    let cycles = state.cycles.get_all().await?;
    Ok(Json(cycles))
}
