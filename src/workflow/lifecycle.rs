//! 请求生命周期管理
//!
//! ```text
//! PENDING ──▶ [PASSAGE_READY] ──▶ RUNNING ──▶ OK | FAIL
//!                                    ▲            │
//!                                    └────────────┘ 重新生成
//! ```
//!
//! 请求状态只能经由这里修改；每次迁移都在同一个 map 分片锁内完成检查与写入。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::request::{Request, RequestId, RequestStatus};

#[derive(Debug, Default)]
pub struct LifecycleManager {
    requests: DashMap<RequestId, Request>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新请求，状态一律重置为 PENDING；已存在的 id 保持原样
    pub fn register(&self, mut request: Request) -> Request {
        match self.requests.entry(request.id.clone()) {
            Entry::Occupied(existing) => {
                warn!("请求 {} 已登记，忽略重复登记", request.id);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                request.status = RequestStatus::Pending;
                request.generation = 0;
                request.draft_passage = None;
                slot.insert(request.clone());
                request
            }
        }
    }

    pub fn get(&self, id: &RequestId) -> PipelineResult<Request> {
        self.requests
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| PipelineError::UnknownRequest(id.clone()))
    }

    pub fn status(&self, id: &RequestId) -> PipelineResult<RequestStatus> {
        self.requests
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| PipelineError::UnknownRequest(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// 全部请求快照（按 id 排序）
    pub fn snapshot(&self) -> Vec<Request> {
        let mut all: Vec<Request> = self.requests.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// 进入 RUNNING（首次生成或重新生成），generation 加一
    ///
    /// 只接受 PENDING / OK / FAIL；PASSAGE_READY 必须走 `confirm_passage`。
    pub fn begin_generation(&self, id: &RequestId) -> PipelineResult<Request> {
        self.transition_if(
            id,
            RequestStatus::Running,
            |r| r.status != RequestStatus::PassageReady,
            |r| r.generation += 1,
        )
    }

    /// 两步生成：保存草稿地文并进入 PASSAGE_READY
    ///
    /// 只允许从 PENDING 进入，且请求不能带有用户地文。
    pub fn enter_passage_review(
        &self,
        id: &RequestId,
        draft: impl Into<String>,
    ) -> PipelineResult<Request> {
        let draft = draft.into();
        self.transition_if(
            id,
            RequestStatus::PassageReady,
            |r| r.status == RequestStatus::Pending && !r.has_user_passage(),
            |r| r.draft_passage = Some(draft),
        )
    }

    /// 在 PASSAGE_READY 状态下修改草稿，状态不变
    pub fn edit_passage(&self, id: &RequestId, passage: impl Into<String>) -> PipelineResult<Request> {
        let mut entry = self
            .requests
            .get_mut(id)
            .ok_or_else(|| PipelineError::UnknownRequest(id.clone()))?;
        if entry.status != RequestStatus::PassageReady {
            return Err(PipelineError::InvalidState {
                request_id: id.clone(),
                current: entry.status,
                requested: RequestStatus::PassageReady,
            });
        }
        entry.draft_passage = Some(passage.into());
        debug!("请求 {} 地文已修改", id);
        Ok(entry.clone())
    }

    /// 确认草稿：PASSAGE_READY → RUNNING
    pub fn confirm_passage(&self, id: &RequestId) -> PipelineResult<Request> {
        self.transition_if(
            id,
            RequestStatus::Running,
            |r| r.status == RequestStatus::PassageReady,
            |r| r.generation += 1,
        )
    }

    pub fn complete(&self, id: &RequestId) -> PipelineResult<Request> {
        self.transition(id, RequestStatus::Ok, |_| {})
    }

    pub fn fail(&self, id: &RequestId) -> PipelineResult<Request> {
        self.transition(id, RequestStatus::Fail, |_| {})
    }

    fn transition(
        &self,
        id: &RequestId,
        next: RequestStatus,
        mutate: impl FnOnce(&mut Request),
    ) -> PipelineResult<Request> {
        self.transition_if(id, next, |_| true, mutate)
    }

    /// 迁移表之外的额外前置条件，与迁移在同一把锁内检查
    fn transition_if(
        &self,
        id: &RequestId,
        next: RequestStatus,
        allowed: impl FnOnce(&Request) -> bool,
        mutate: impl FnOnce(&mut Request),
    ) -> PipelineResult<Request> {
        let mut entry = self
            .requests
            .get_mut(id)
            .ok_or_else(|| PipelineError::UnknownRequest(id.clone()))?;
        let current = entry.status;
        if !current.can_transition_to(next) || !allowed(&entry) {
            return Err(PipelineError::InvalidState {
                request_id: id.clone(),
                current,
                requested: next,
            });
        }
        mutate(&mut entry);
        entry.status = next;
        debug!("请求 {} 状态迁移: {} → {}", id, current, next);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::level::Level;
    use crate::models::request::ItemNo;

    fn manager_with(request: Request) -> (LifecycleManager, RequestId) {
        let manager = LifecycleManager::new();
        let id = manager.register(request).id;
        (manager, id)
    }

    fn request(id: &str) -> Request {
        Request::new(id, ItemNo::Single(20), Level::Mid)
    }

    #[test]
    fn test_register_forces_pending() {
        let mut r = request("r1");
        r.status = RequestStatus::Ok;
        r.generation = 7;
        let (manager, id) = manager_with(r);
        let stored = manager.get(&id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.generation, 0);
    }

    #[test]
    fn test_duplicate_register_keeps_existing() {
        let (manager, id) = manager_with(request("r1"));
        manager.begin_generation(&id).unwrap();
        let again = manager.register(request("r1"));
        assert_eq!(again.status, RequestStatus::Running);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_happy_path_and_regenerate() {
        let (manager, id) = manager_with(request("r1"));
        assert_eq!(manager.begin_generation(&id).unwrap().generation, 1);
        manager.complete(&id).unwrap();
        let again = manager.begin_generation(&id).unwrap();
        assert_eq!(again.status, RequestStatus::Running);
        assert_eq!(again.generation, 2);
        manager.fail(&id).unwrap();
        assert_eq!(manager.begin_generation(&id).unwrap().generation, 3);
    }

    #[test]
    fn test_two_step_passage() {
        let (manager, id) = manager_with(request("r1"));
        let ready = manager.enter_passage_review(&id, "draft").unwrap();
        assert_eq!(ready.status, RequestStatus::PassageReady);

        let edited = manager.edit_passage(&id, "edited").unwrap();
        assert_eq!(edited.status, RequestStatus::PassageReady);
        assert_eq!(edited.effective_passage(), Some("edited"));

        let running = manager.confirm_passage(&id).unwrap();
        assert_eq!(running.status, RequestStatus::Running);
        assert_eq!(running.generation, 1);
    }

    #[test]
    fn test_user_passage_never_enters_passage_ready() {
        let (manager, id) = manager_with(request("r1").with_passage("given text"));
        let err = manager.enter_passage_review(&id, "draft").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidState {
                current: RequestStatus::Pending,
                requested: RequestStatus::PassageReady,
                ..
            }
        ));
        assert_eq!(manager.status(&id).unwrap(), RequestStatus::Pending);
    }

    #[test]
    fn test_illegal_transitions() {
        let (manager, id) = manager_with(request("r1"));
        // PENDING 不能直接完成
        assert!(manager.complete(&id).is_err());
        assert!(manager.fail(&id).is_err());
        // PASSAGE_READY 之外不能编辑、确认
        assert!(manager.edit_passage(&id, "x").is_err());
        assert!(manager.confirm_passage(&id).is_err());

        manager.begin_generation(&id).unwrap();
        let err = manager.confirm_passage(&id).unwrap_err();
        match err {
            PipelineError::InvalidState {
                current, requested, ..
            } => {
                assert_eq!(current, RequestStatus::Running);
                assert_eq!(requested, RequestStatus::Running);
            }
            other => panic!("unexpected error: {other}"),
        }
        // RUNNING 不能再次进入 RUNNING，也不能回到 PASSAGE_READY
        assert!(manager.begin_generation(&id).is_err());
        assert!(manager.enter_passage_review(&id, "d").is_err());
    }

    #[test]
    fn test_passage_ready_only_leaves_through_confirm() {
        let (manager, id) = manager_with(request("r1"));
        manager.enter_passage_review(&id, "draft").unwrap();
        let err = manager.begin_generation(&id).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidState {
                current: RequestStatus::PassageReady,
                requested: RequestStatus::Running,
                ..
            }
        ));
        let stored = manager.get(&id).unwrap();
        assert_eq!(stored.status, RequestStatus::PassageReady);
        assert_eq!(stored.generation, 0);

        assert_eq!(manager.confirm_passage(&id).unwrap().generation, 1);
    }

    #[test]
    fn test_concurrent_register_keeps_one_entry() {
        let manager = std::sync::Arc::new(LifecycleManager::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let mut r = request("same");
                    r.extra = format!("writer {}", n);
                    manager.register(r).extra
                })
            })
            .collect();
        let seen: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(manager.len(), 1);
        let stored = manager.get(&RequestId::new("same")).unwrap().extra;
        // 所有登记方拿到的都是同一条记录
        assert!(seen.iter().all(|extra| *extra == stored));
    }

    #[test]
    fn test_unknown_request() {
        let manager = LifecycleManager::new();
        let err = manager.get(&RequestId::new("nope")).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownRequest(_)));
    }
}
