// ==========================================
// 零售采购订单导入系统 - 解析会话
// ==========================================
// 职责: 单次上传的解析状态（明细、待识别编码、版式、状态机）
// 生命周期: resolve_order 创建 → finalize 销毁 / 超时清理
// 隔离: 每次上传独立会话，按 UUID 索引，互不覆盖
// ==========================================

use crate::domain::order::{LayoutMetadata, LineItem, UnresolvedSet};
use crate::domain::types::SessionState;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::layouts::LayoutSelection;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

// ==========================================
// ResolutionSession
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSession {
    pub session_id: String,
    pub retailer_tag: String,
    pub mapping_bucket: String,
    pub selection: LayoutSelection,
    pub items: Vec<LineItem>,
    pub unresolved: UnresolvedSet,
    pub metadata: Option<LayoutMetadata>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResolutionSession {
    pub fn new(
        retailer_tag: &str,
        selection: LayoutSelection,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            retailer_tag: retailer_tag.trim().to_string(),
            mapping_bucket: selection.mapping_bucket().to_string(),
            selection,
            items: Vec::new(),
            unresolved: UnresolvedSet::new(),
            metadata: None,
            state: SessionState::Parsing,
            created_at: now,
            updated_at: now,
        }
    }

    /// 状态流转（只记录日志，不做合法性校验）
    pub fn transition(&mut self, next: SessionState, now: DateTime<Utc>) {
        if self.state != next {
            info!(
                session_id = %self.session_id,
                from = %self.state,
                to = %next,
                "会话状态变更"
            );
        }
        self.state = next;
        self.updated_at = now;
    }

    /// 待识别编码是否已全部覆盖
    pub fn settle(&mut self, now: DateTime<Utc>) {
        let next = if self.unresolved.is_empty() {
            SessionState::Ready
        } else {
            SessionState::AwaitingOperatorInput
        };
        self.transition(next, now);
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    pub fn ensure_state(&self, expected: &[SessionState]) -> ImportResult<()> {
        if expected.contains(&self.state) {
            return Ok(());
        }
        Err(ImportError::InvalidSessionState {
            session_id: self.session_id.clone(),
            actual: self.state.to_string(),
            expected: expected
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" | "),
        })
    }
}

// ==========================================
// SessionRegistry - 会话表
// ==========================================
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, ResolutionSession>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> ImportResult<std::sync::MutexGuard<'_, HashMap<String, ResolutionSession>>> {
        self.sessions
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    pub fn insert(&self, session: ResolutionSession) -> ImportResult<()> {
        let mut sessions = self.lock()?;
        debug!(session_id = %session.session_id, "登记会话");
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    /// 在锁内访问会话；过期会话被移除并视为不存在
    pub fn with_session<R, F>(&self, session_id: &str, now: DateTime<Utc>, f: F) -> ImportResult<R>
    where
        F: FnOnce(&mut ResolutionSession) -> ImportResult<R>,
    {
        let mut sessions = self.lock()?;
        let expired = match sessions.get(session_id) {
            Some(session) => session.is_expired(now, self.ttl),
            None => return Err(ImportError::SessionNotFound(session_id.to_string())),
        };
        if expired {
            sessions.remove(session_id);
            info!(session_id, "会话已过期");
            return Err(ImportError::SessionNotFound(session_id.to_string()));
        }
        match sessions.get_mut(session_id) {
            Some(session) => f(session),
            None => Err(ImportError::SessionNotFound(session_id.to_string())),
        }
    }

    pub fn get(&self, session_id: &str, now: DateTime<Utc>) -> ImportResult<ResolutionSession> {
        self.with_session(session_id, now, |session| Ok(session.clone()))
    }

    pub fn remove(&self, session_id: &str) -> ImportResult<Option<ResolutionSession>> {
        Ok(self.lock()?.remove(session_id))
    }

    /// 清理过期会话，返回清理数量
    pub fn purge_expired(&self, now: DateTime<Utc>) -> ImportResult<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, session| !session.is_expired(now, ttl));
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, "已清理过期会话");
        }
        Ok(purged)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MappingKind;

    fn session(now: DateTime<Utc>) -> ResolutionSession {
        ResolutionSession::new("redex", LayoutSelection::LabeledHeader, now)
    }

    #[test]
    fn test_settle_moves_to_ready_when_nothing_pending() {
        let now = Utc::now();
        let mut s = session(now);
        s.unresolved.push(MappingKind::Store, "12");
        s.settle(now);
        assert_eq!(s.state, SessionState::AwaitingOperatorInput);

        s.unresolved.retain(MappingKind::Store, |_| false);
        s.settle(now);
        assert_eq!(s.state, SessionState::Ready);
        assert_eq!(s.mapping_bucket, "redex");
    }

    #[test]
    fn test_ensure_state_reports_expected() {
        let s = session(Utc::now());
        let err = s.ensure_state(&[SessionState::Ready]).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSessionState { .. }));
        assert!(s.ensure_state(&[SessionState::Parsing]).is_ok());
    }

    #[test]
    fn test_expired_session_is_not_found() {
        let registry = SessionRegistry::new(60);
        let created = Utc::now();
        let s = session(created);
        let id = s.session_id.clone();
        registry.insert(s).unwrap();

        assert!(registry.get(&id, created + Duration::minutes(59)).is_ok());
        let err = registry.get(&id, created + Duration::minutes(61)).unwrap_err();
        assert!(matches!(err, ImportError::SessionNotFound(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_purge_expired_keeps_fresh_sessions() {
        let registry = SessionRegistry::new(10);
        let now = Utc::now();
        registry.insert(session(now - Duration::minutes(30))).unwrap();
        registry.insert(session(now)).unwrap();

        assert_eq!(registry.purge_expired(now).unwrap(), 1);
        assert_eq!(registry.len(), 1);
    }
}
