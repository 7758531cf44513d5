//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/annual-cycles/*` - 연간 사이클 라이프사이클
//! - `/loans/*` - 대출 발행/조회/상태 전이
//! - `/loan-payments/*` - 대출 상환
//! - `/payments/*` - 주간 납입, bulk 처리, 참가자 리포트
//! - `/participants/*` - 조합원 관리

pub mod cycles;
pub mod health;
pub mod loan_payments;
pub mod loans;
pub mod participants;
pub mod payments;
