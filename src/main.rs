//! Tanda Cooperative API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client (Frontend)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /annual-cycles/*  /loans/*  /payments/*       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  CycleLedger  LoanBook  PaymentProcessor  Reports       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (sqlx)                                       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// 라이브러리에서 가져오기
use tanda_api::{
    routes,
    services::{CarryForward, KeyedLocks},
    AppState, Config, CycleLedger, Database, LoanBook, PaymentProcessor, ReportAggregator,
    TandaStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "tanda_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Tanda Cooperative API Server");

    // 설정 로드
    let config = Arc::new(Config::from_env()?);
    tracing::info!("📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Arc::new(Database::connect(&config.database_url).await?);
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 서비스 초기화
    // 마감 정책은 이월(CarryForward)이 기본 — 조합 정책 확정 시 교체
    let store: Arc<dyn TandaStore> = db.clone();
    let locks = Arc::new(KeyedLocks::new());
    let cycles = Arc::new(CycleLedger::new(store.clone(), Arc::new(CarryForward)));
    let loans = Arc::new(LoanBook::new(store.clone(), config.clone(), locks.clone()));
    let payments = Arc::new(PaymentProcessor::new(
        store.clone(),
        config.clone(),
        loans.clone(),
        locks,
    ));
    let reports = Arc::new(ReportAggregator::new(store.clone(), config.clone()));
    tracing::info!("💰 Financial engine initialized");

    // 앱 상태 구성
    let state = AppState {
        db,
        store,
        config: config.clone(),
        cycles,
        loans,
        payments,
        reports,
    };

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET   /health                          - 서버 상태 확인
///
/// POST  /annual-cycles/activate          - 사이클 활성화
/// POST  /annual-cycles/close             - 사이클 마감
/// GET   /annual-cycles/active            - 활성 사이클 조회
/// GET   /annual-cycles                   - 전체 사이클 목록
///
/// POST  /loans                           - 대출 생성
/// GET   /loans/active                    - 상환 중 대출
/// GET   /loans/completed                 - 종결 대출
/// GET   /loans/participant/:id           - 참가자별 대출
/// POST  /loans/:id/defer                 - 대출 유예
/// POST  /loans/:id/resume                - 유예 해제
///
/// POST  /loan-payments                   - 대출 상환
/// GET   /loan-payments/:loan_id          - 상환 이력
///
/// POST  /payments/:participant_id        - 주간 납입
/// GET   /payments/cycle/:year            - 사이클 납입 목록
/// POST  /payments/weekly                 - bulk 주간 납입
/// GET   /payments/participants-reports   - 참가자 리포트
///
/// POST  /participants                    - 조합원 등록
/// GET   /participants                    - 조합원 목록
/// GET   /participants/:id                - 조합원 조회
/// PATCH /participants/:id/status         - 활성/비활성 전환
/// ```
fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 특정 도메인만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        // 프로덕션: 특정 도메인만 허용 (환경변수로 설정)
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "https://yourdomain.com".to_string());
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        // 개발: localhost 허용
        let origins: Vec<HeaderValue> = [
            "http://localhost:4200", // Angular dev server
            "http://localhost:3000",
            "http://127.0.0.1:4200",
        ]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Annual cycles
        .route("/annual-cycles/activate", post(routes::cycles::activate_cycle))
        .route("/annual-cycles/close", post(routes::cycles::close_cycle))
        .route("/annual-cycles/active", get(routes::cycles::get_active_cycle))
        .route("/annual-cycles", get(routes::cycles::get_all_cycles))

        // Loans
        .route("/loans", post(routes::loans::create_loan))
        .route("/loans/active", get(routes::loans::get_active_loans))
        .route("/loans/completed", get(routes::loans::get_completed_loans))
        .route("/loans/participant/:id", get(routes::loans::get_loans_by_participant))
        .route("/loans/:id/defer", post(routes::loans::defer_loan))
        .route("/loans/:id/resume", post(routes::loans::resume_loan))

        // Loan payments
        .route("/loan-payments", post(routes::loan_payments::create_loan_payment))
        .route("/loan-payments/:loan_id", get(routes::loan_payments::get_loan_payments))

        // Weekly payments & reports
        .route("/payments/weekly", post(routes::payments::create_weekly_payments))
        .route("/payments/participants-reports", get(routes::payments::get_participants_reports))
        .route("/payments/cycle/:year", get(routes::payments::get_cycle_payments))
        .route("/payments/:participant_id", post(routes::payments::create_payment))

        // Participants
        .route("/participants", post(routes::participants::create_participant).get(routes::participants::get_participants))
        .route("/participants/:id", get(routes::participants::get_participant))
        .route("/participants/:id/status", patch(routes::participants::update_participant_status))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
