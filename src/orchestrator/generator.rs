//! 生成编排器 - 编排层
//!
//! 对外暴露的操作：登记、生成、重新生成、两步生成（准备地文 / 修改 / 确认并生成）。
//! 这里是唯一把 `ItemFlow` 的结果落实为状态迁移的地方：
//! 通过 → OK，其余任何错误 → FAIL（非法迁移除外，它在进入 RUNNING 之前就会被拒绝）。

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::item_set::{ItemSet, Profile};
use crate::models::record::{Output, Record};
use crate::models::request::{ItemNo, Request, RequestId, RequestStatus};
use crate::workflow::{FlowInput, ItemCtx, ItemFlow, LifecycleManager};

pub struct Generator {
    lifecycle: Arc<LifecycleManager>,
    flow: Arc<ItemFlow>,
}

impl Generator {
    pub fn new(lifecycle: Arc<LifecycleManager>, flow: Arc<ItemFlow>) -> Self {
        Self { lifecycle, flow }
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn flow(&self) -> &Arc<ItemFlow> {
        &self.flow
    }

    /// 登记请求（PENDING）并保存
    pub async fn submit(&self, request: Request) -> PipelineResult<Request> {
        let request = self.lifecycle.register(request);
        self.persist_request(&request).await?;
        Ok(request)
    }

    /// 生成或重新生成（PENDING / OK / FAIL → RUNNING）
    pub async fn generate(&self, id: &RequestId) -> PipelineResult<Output> {
        let request = self.lifecycle.begin_generation(id)?;
        self.persist_running(&request).await?;
        let input = FlowInput::for_request(&request);
        self.run_flow(request, input).await
    }

    /// 套题成员：使用共享地文，难度优先取 profile
    pub async fn generate_member(
        &self,
        id: &RequestId,
        shared_passage: Option<String>,
        profile: &Profile,
    ) -> PipelineResult<Output> {
        let request = self.lifecycle.begin_generation(id)?;
        self.persist_running(&request).await?;

        let level = profile_level(profile, request.item_no).unwrap_or(request.level);
        let passage = request
            .effective_passage()
            .map(str::to_string)
            .or(shared_passage);
        let input = FlowInput {
            level,
            passage,
            profile: (!profile.is_empty()).then(|| profile.clone()),
        };
        self.run_flow(request, input).await
    }

    /// 两步生成第一步：生成草稿地文并进入 PASSAGE_READY
    ///
    /// 地文生成重试耗尽时返回错误，请求保持 PENDING。
    pub async fn prepare_passage(&self, id: &RequestId) -> PipelineResult<Request> {
        let request = self.lifecycle.get(id)?;
        if request.status != RequestStatus::Pending || request.has_user_passage() {
            return Err(PipelineError::InvalidState {
                request_id: id.clone(),
                current: request.status,
                requested: RequestStatus::PassageReady,
            });
        }

        let ctx = ItemCtx::from_request(&request);
        let draft = self
            .flow
            .generate_passage(&request.id, request.item_no, request.level, &request.extra)
            .await
            .inspect_err(|e| warn!("{} 地文生成失败，请求保持 PENDING: {}", ctx, e))?;

        let ready = self.lifecycle.enter_passage_review(id, draft)?;
        self.persist_request(&ready).await?;
        info!("{} 📄 地文草稿已就绪，等待确认", ctx);
        Ok(ready)
    }

    /// 在 PASSAGE_READY 状态下修改草稿
    pub async fn edit_passage(&self, id: &RequestId, passage: &str) -> PipelineResult<Request> {
        let edited = self.lifecycle.edit_passage(id, passage)?;
        self.persist_request(&edited).await?;
        Ok(edited)
    }

    /// 两步生成第二步：确认草稿（→ RUNNING）并生成题目
    pub async fn confirm_and_generate(&self, id: &RequestId) -> PipelineResult<Output> {
        let request = self.lifecycle.confirm_passage(id)?;
        self.persist_running(&request).await?;
        let input = FlowInput::for_request(&request);
        self.run_flow(request, input).await
    }

    /// 套题共享地文，按全部成员的题号区间生成
    pub async fn generate_set_passage(&self, set: &ItemSet) -> PipelineResult<String> {
        let mut members = Vec::with_capacity(set.members.len());
        for id in &set.members {
            members.push(self.lifecycle.get(id)?);
        }
        let first = members
            .first()
            .ok_or_else(|| PipelineError::config(format!("套题 {} 没有成员", set.id)))?;

        let low = members.iter().map(|m| m.item_no.primary()).min().unwrap_or(0);
        let high = members
            .iter()
            .map(|m| match m.item_no {
                ItemNo::Single(n) => n,
                ItemNo::Range(_, end) => end,
            })
            .max()
            .unwrap_or(low);
        let item_no = if low == high {
            ItemNo::Single(low)
        } else {
            ItemNo::Range(low, high)
        };

        self.flow
            .generate_passage(&RequestId::new(set.id.clone()), item_no, first.level, &first.extra)
            .await
    }

    async fn run_flow(&self, request: Request, input: FlowInput) -> PipelineResult<Output> {
        let ctx = ItemCtx::from_request(&request);
        match self.flow.run(&request, &input).await {
            Ok(output) => {
                let done = self.lifecycle.complete(&request.id)?;
                self.persist_request(&done).await?;
                Ok(output)
            }
            Err(e) => {
                error!("{} ❌ 生成失败: {}", ctx, e);
                self.mark_failed(&ctx, &request.id).await;
                Err(e)
            }
        }
    }

    /// 保存 RUNNING 状态；保存失败时请求转为 FAIL，之后仍可重新生成
    async fn persist_running(&self, request: &Request) -> PipelineResult<()> {
        if let Err(e) = self.persist_request(request).await {
            let ctx = ItemCtx::from_request(request);
            error!("{} ❌ 保存 RUNNING 状态失败: {}", ctx, e);
            self.mark_failed(&ctx, &request.id).await;
            return Err(e);
        }
        Ok(())
    }

    async fn mark_failed(&self, ctx: &ItemCtx, id: &RequestId) {
        match self.lifecycle.fail(id) {
            Ok(failed) => {
                if let Err(save_err) = self.persist_request(&failed).await {
                    warn!("{} 保存失败状态时出错: {}", ctx, save_err);
                }
            }
            Err(state_err) => warn!("{} {}", ctx, state_err),
        }
    }

    async fn persist_request(&self, request: &Request) -> PipelineResult<()> {
        self.flow
            .store()
            .save(Record::Request(request.clone()))
            .await?;
        Ok(())
    }
}

/// 先按完整题号查，再按主题号查
fn profile_level(profile: &Profile, item_no: ItemNo) -> Option<crate::models::level::Level> {
    profile
        .level_for(&item_no.to_string())
        .or_else(|| profile.level_for(&item_no.primary().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, StorageError};
    use crate::feedback::PromptMetricsRegistry;
    use crate::models::level::Level;
    use crate::services::{
        InMemoryChartStore, InMemoryRecordStore, JsonResponseParser, LlmClient, RecordStore,
        TemplatePromptComposer,
    };
    use crate::validation::ValidatorChain;
    use crate::workflow::{FlowDeps, RetryPolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct GoodLlm;

    #[async_trait]
    impl LlmClient for GoodLlm {
        fn model_name(&self) -> &str {
            "good"
        }

        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, ProviderError> {
            Ok(serde_json::to_string(&crate::validation::tests::valid_item()).unwrap())
        }
    }

    /// 第一次保存 RUNNING 状态时写入失败，其余照常
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryRecordStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn save(&self, record: Record) -> Result<(), StorageError> {
            if let Record::Request(r) = &record {
                if r.status == RequestStatus::Running && !self.failed_once.swap(true, Ordering::SeqCst) {
                    return Err(StorageError::WriteFailed {
                        path: "memory".to_string(),
                        source: std::io::Error::other("disk full"),
                    });
                }
            }
            self.inner.save(record).await
        }
    }

    fn generator_with(store: Arc<FlakyStore>) -> Generator {
        let deps = FlowDeps {
            composer: Arc::new(TemplatePromptComposer::default()),
            llm: Arc::new(GoodLlm),
            parser: Arc::new(JsonResponseParser),
            charts: Arc::new(InMemoryChartStore::new()),
            store,
            chain: Arc::new(ValidatorChain::new()),
            prompt_metrics: Arc::new(PromptMetricsRegistry::new(1)),
        };
        let flow = Arc::new(ItemFlow::new(deps, RetryPolicy::default()));
        Generator::new(Arc::new(LifecycleManager::new()), flow)
    }

    #[tokio::test]
    async fn test_running_save_failure_leaves_request_regenerable() {
        let store = Arc::new(FlakyStore::default());
        let generator = generator_with(store.clone());
        let id = generator
            .submit(Request::new("r1", ItemNo::Single(20), Level::Mid))
            .await
            .unwrap()
            .id;

        let err = generator.generate(&id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert_eq!(generator.lifecycle().status(&id).unwrap(), RequestStatus::Fail);

        // FAIL → RUNNING 重新生成
        let output = generator.generate(&id).await.unwrap();
        assert_eq!(output.generation, 2);
        assert_eq!(generator.lifecycle().status(&id).unwrap(), RequestStatus::Ok);
        assert_eq!(store.inner.count_kind("output").await, 1);
    }

    #[tokio::test]
    async fn test_confirm_save_failure_marks_fail() {
        let store = Arc::new(FlakyStore::default());
        let generator = generator_with(store);
        let id = generator
            .submit(Request::new("r2", ItemNo::Single(20), Level::Mid))
            .await
            .unwrap()
            .id;
        generator
            .lifecycle()
            .enter_passage_review(&id, crate::validation::tests::SAMPLE_PASSAGE)
            .unwrap();

        assert!(generator.confirm_and_generate(&id).await.is_err());
        assert_eq!(generator.lifecycle().status(&id).unwrap(), RequestStatus::Fail);
    }

    #[test]
    fn test_profile_level_lookup() {
        let profile = Profile::parse("41:중,42:상,43-45:하");
        assert_eq!(profile_level(&profile, ItemNo::Single(42)), Some(Level::High));
        assert_eq!(profile_level(&profile, ItemNo::Range(43, 45)), Some(Level::Low));
        assert_eq!(profile_level(&profile, ItemNo::Range(41, 42)), Some(Level::Mid));
        assert_eq!(profile_level(&profile, ItemNo::Single(30)), None);
    }
}
