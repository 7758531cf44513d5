//! Cycle Ledger Service
//!
//! 연간 사이클의 라이프사이클(pending → active → closed)과
//! 풀 집계(총 자금, 총 이자, 주 수)를 담당.
//!
//! 불변식: 활성 사이클은 항상 최대 1개. 마감된 사이클은 불변.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{AnnualCycle, CycleStatus, LoanStatus, TandaStore};
use crate::error::ApiError;

/// 사이클 마감 시 미상환 대출 처리 정책
///
/// 자동 default 처리 vs 이월은 조합 정책으로 미확정이라
/// 전략 주입으로 열어둠. 기본값은 이월(no-op).
#[async_trait]
pub trait CycleCloseStrategy: Send + Sync {
    async fn on_cycle_close(
        &self,
        store: &dyn TandaStore,
        cycle: &AnnualCycle,
    ) -> Result<(), ApiError>;
}

/// 미상환 대출을 다음 사이클로 이월 (기본 정책)
pub struct CarryForward;

#[async_trait]
impl CycleCloseStrategy for CarryForward {
    async fn on_cycle_close(
        &self,
        _store: &dyn TandaStore,
        cycle: &AnnualCycle,
    ) -> Result<(), ApiError> {
        tracing::info!(year = cycle.year, "cycle closed, outstanding loans carried forward");
        Ok(())
    }
}

/// 마감 시점에 미상환(active/deferred) 대출을 defaulted로 전환
pub struct DefaultOutstanding;

#[async_trait]
impl CycleCloseStrategy for DefaultOutstanding {
    async fn on_cycle_close(
        &self,
        store: &dyn TandaStore,
        cycle: &AnnualCycle,
    ) -> Result<(), ApiError> {
        let loans = store.list_loans_by_cycle(cycle.id).await?;
        for mut loan in loans {
            if loan.status.is_payable() {
                loan.status = LoanStatus::Defaulted;
                loan.updated_at = Utc::now();
                store.update_loan(&loan).await?;
                tracing::warn!(loan_id = loan.id, year = cycle.year, "loan defaulted at cycle close");
            }
        }
        Ok(())
    }
}

/// 사이클 마감 응답
#[derive(Debug, serde::Serialize)]
pub struct CloseCycleResult {
    pub message: String,
}

/// 연간 사이클 서비스
pub struct CycleLedger {
    store: Arc<dyn TandaStore>,
    close_strategy: Arc<dyn CycleCloseStrategy>,
}

impl CycleLedger {
    pub fn new(store: Arc<dyn TandaStore>, close_strategy: Arc<dyn CycleCloseStrategy>) -> Self {
        Self { store, close_strategy }
    }

    /// 새 연간 사이클 활성화
    ///
    /// - 같은 연도의 사이클이 있으면 Duplicate (활성 연도 재활성화 포함)
    /// - 다른 연도의 활성 사이클이 있으면 Conflict
    /// - 집계는 0으로 초기화, total_shares는 활성 조합원 주 수 합계 스냅샷
    ///
    /// 연도 중복 검사가 활성 검사보다 먼저다: 활성 연도를 다시
    /// 활성화하는 요청은 Conflict가 아니라 Duplicate로 구분된다.
    pub async fn activate(&self, year: i32) -> Result<AnnualCycle, ApiError> {
        if self.store.find_cycle_by_year(year).await?.is_some() {
            return Err(ApiError::Duplicate(format!(
                "Ya existe un ciclo para el año {}",
                year
            )));
        }

        if let Some(active) = self.store.find_active_cycle().await? {
            return Err(ApiError::Conflict(format!(
                "Ya existe un ciclo activo (año {})",
                active.year
            )));
        }

        let participants = self.store.list_participants(true).await?;
        let total_shares: f64 = participants.iter().map(|p| p.shares as f64).sum();

        let now = Utc::now();
        let cycle = self
            .store
            .insert_cycle(AnnualCycle {
                id: 0,
                year,
                status: CycleStatus::Active,
                total_funds: 0.0,
                total_interest: 0.0,
                projected_interest: 0.0,
                total_shares,
                interest_per_share: None,
                closed_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(year, cycle_id = cycle.id, total_shares, "annual cycle activated");
        Ok(cycle)
    }

    /// 사이클 마감
    ///
    /// interest_per_share = total_interest / total_shares (주 수 0이면 0).
    /// 마감 후 미상환 대출은 주입된 전략이 처리.
    pub async fn close(&self, year: i32) -> Result<CloseCycleResult, ApiError> {
        let mut cycle = self
            .store
            .find_cycle_by_year(year)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ciclo del año {}", year)))?;

        if cycle.status != CycleStatus::Active {
            return Err(ApiError::State(format!(
                "El ciclo del año {} no está activo",
                year
            )));
        }

        cycle.interest_per_share = Some(if cycle.total_shares > 0.0 {
            cycle.total_interest / cycle.total_shares
        } else {
            0.0
        });
        cycle.status = CycleStatus::Closed;
        cycle.closed_at = Some(Utc::now());
        cycle.updated_at = Utc::now();

        self.store.update_cycle(&cycle).await?;
        self.close_strategy.on_cycle_close(self.store.as_ref(), &cycle).await?;

        tracing::info!(
            year,
            interest_per_share = cycle.interest_per_share,
            "annual cycle closed"
        );

        Ok(CloseCycleResult {
            message: format!("Ciclo del año {} cerrado correctamente", year),
        })
    }

    /// 활성 사이클 조회 (없으면 None)
    pub async fn get_active(&self) -> Result<Option<AnnualCycle>, ApiError> {
        Ok(self.store.find_active_cycle().await?)
    }

    /// 전체 사이클 목록 (연도 순)
    pub async fn get_all(&self) -> Result<Vec<AnnualCycle>, ApiError> {
        Ok(self.store.list_cycles().await?)
    }
}
