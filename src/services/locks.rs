//! Per-participant write serialization
//!
//! 같은 참가자에 대한 변이 연산(대출 생성, 납입, 상환)은 모두
//! 참가자 키 기준으로 직렬화된다. bulk 납입과 개별 납입이 같은
//! 참가자/주차로 동시에 들어와도 둘 다 성공할 수 없게 하는 1차 방어.
//! (DB unique index가 최종 방어선)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 키(참가자 id)별 비동기 뮤텍스 레지스트리
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키에 해당하는 뮤텍스 핸들 획득 (없으면 생성)
    ///
    /// 반환된 Arc를 .lock().await 하는 동안 같은 키의 다른 변이가 대기한다.
    pub fn lock_for(&self, key: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
