//! Tanda Cooperative API Library
//!
//! # Overview
//!
//! 연간 사이클 기반 저축/대출 협동조합(tanda)의 금융 엔진.
//! 조합원은 매주 주(share) 단위로 납입하고, 풀을 담보로 대출을 받아
//! 원금+이자를 상환하며, 사이클 마감 시 이자가 주 수 비례로 배분된다.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          API                              │
//! │                                                           │
//! │  ┌─────────┐  ┌──────────────────────────┐  ┌─────────┐ │
//! │  │ Routes  │  │        Services          │  │   DB    │ │
//! │  │         │→ │ CycleLedger  LoanBook    │→ │ (sqlx)  │ │
//! │  │         │  │ PaymentProcessor         │  │         │ │
//! │  │         │  │ ReportAggregator         │  │         │ │
//! │  └─────────┘  └──────────────────────────┘  └─────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리 (협동조합 정책 파라미터 포함)
//! - `error`: 에러 타입 및 HTTP 매핑
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (사이클/대출/납입/리포트)
//! - `db`: 데이터베이스 연동 + 저장소 추상화

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;

// Re-exports for convenience
pub use config::Config;
pub use db::{Database, TandaStore};
pub use error::ApiError;
pub use services::{CycleLedger, LoanBook, PaymentProcessor, ReportAggregator};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: Arc<dyn TandaStore>,
    pub config: Arc<Config>,
    pub cycles: Arc<CycleLedger>,
    pub loans: Arc<LoanBook>,
    pub payments: Arc<PaymentProcessor>,
    pub reports: Arc<ReportAggregator>,
}
