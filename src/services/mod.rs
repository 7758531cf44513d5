//! Services Module
//!
//! 금융 엔진의 비즈니스 로직 레이어
//!
//! # Services
//! - `CycleLedger`: 연간 사이클 라이프사이클과 풀 집계
//! - `LoanBook`: 대출 발행과 상태 전이
//! - `PaymentProcessor`: 주간 납입/대출 상환 적용 (유일한 변이 경로)
//! - `ReportAggregator`: 참가자별 파생 리포트 (읽기 전용)

mod cycle_ledger;
mod loan_book;
mod locks;
mod payment_processor;
mod report;

pub use cycle_ledger::{
    CarryForward, CloseCycleResult, CycleCloseStrategy, CycleLedger, DefaultOutstanding,
};
pub use loan_book::LoanBook;
pub use locks::KeyedLocks;
pub use payment_processor::{
    current_week_number, week_number_for, BulkDetail, BulkResult, BulkStatus, LoanPaymentRequest,
    PaymentProcessor,
};
pub use report::{ParticipantsReportsResponse, ReportAggregator};
