//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Uses thiserror for domain errors and integrates with tracing for structured logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (검증 실패, 중복, 상태 위반 등)
/// - 서버 에러: 5xx (내부 오류)
///
/// bulk 납입에서 `Conflict`는 항목 단위로 skipped 처리됨 (에러 전파 안 함).
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Validation failed: {0}")]
    Validation(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    /// 유일성/단일-활성 불변식 위반 (호출자가 복구 가능)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 이미 존재하는 자연키 (예: 같은 연도의 사이클)
    #[error("Duplicate: {0}")]
    Duplicate(String),

    // ============ 422 Unprocessable Entity ============
    /// 현재 엔티티 상태에서 허용되지 않는 연산
    #[error("Invalid state: {0}")]
    State(String),

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                None,
            ),
            ApiError::Duplicate(msg) => (
                StatusCode::CONFLICT,
                "DUPLICATE",
                msg.clone(),
                None,
            ),
            ApiError::State(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_STATE",
                msg.clone(),
                None,
            ),

            // 5xx 서버 에러
            ApiError::Database(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                    None,
                )
            }
            ApiError::Internal => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// SQLx 에러를 ApiError로 변환
///
/// 23505 (unique_violation)는 자연키 중복 → Conflict.
/// 애플리케이션 락을 우회한 동시 요청의 최종 방어선.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                return ApiError::Conflict("Duplicate record".to_string());
            }
        }
        tracing::error!("SQLx error: {:?}", err);
        ApiError::Database(err.to_string())
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => sqlx_err.into(),
            Err(err) => {
                tracing::error!("Anyhow error: {:?}", err);
                ApiError::Internal
            }
        }
    }
}
