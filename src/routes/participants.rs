//! Participant Endpoints
//!
//! 조합원 최소 관리 표면. 인증/권한은 외부 계층 소관.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::Participant;
use crate::error::ApiError;
use crate::AppState;

// ============ Request Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParticipantRequest {
    pub name: String,
    pub email: String,
    /// 보유 주 수 (기본 1)
    pub shares: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// true면 비활성 조합원 포함
    pub inactive: Option<bool>,
}

// ============ Handlers ============

/// POST /participants
pub async fn create_participant(
    State(state): State<AppState>,
    Json(request): Json<CreateParticipantRequest>,
) -> Result<Json<Participant>, ApiError> {
    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(ApiError::Validation(
            "El nombre y el correo son obligatorios".to_string(),
        ));
    }
    let shares = request.shares.unwrap_or(1);
    if shares < 1 {
        return Err(ApiError::Validation(
            "El número de acciones debe ser al menos 1".to_string(),
        ));
    }

    let now = Utc::now();
    let participant = state
        .store
        .insert_participant(Participant {
            id: 0,
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            shares,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(ApiError::from)?;

    Ok(Json(participant))
}

/// GET /participants?inactive=true
pub async fn get_participants(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let include_inactive = query.inactive.unwrap_or(false);
    let participants = state
        .store
        .list_participants(!include_inactive)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(participants))
}

/// GET /participants/:id
pub async fn get_participant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Participant>, ApiError> {
    let participant = state
        .store
        .find_participant(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Participante {}", id)))?;
    Ok(Json(participant))
}

/// PATCH /participants/:id/status
pub async fn update_participant_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Participant>, ApiError> {
    let mut participant = state
        .store
        .find_participant(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Participante {}", id)))?;

    participant.is_active = request.is_active;
    participant.updated_at = Utc::now();
    state
        .store
        .update_participant(&participant)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(participant))
}
