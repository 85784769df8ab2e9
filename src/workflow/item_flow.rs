//! 单题生成流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整生成流程
//!
//! 流程顺序（每次尝试）：
//! 1. 组装 prompt → LLM（温度随重试升高）
//! 2. 解析 JSON（失败按第一层硬失败处理）
//! 3. 校验链 → 评分
//! 4. 前三层通过：保存 Output + Metrics；否则在 `max_retry` 内重试
//!
//! 重试耗尽时保存最后一次的 Metrics，并返回带全部尝试日志的 `RetriesExhausted`。
//! 不修改请求状态，状态迁移由编排层负责。

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::feedback::PromptMetricsRegistry;
use crate::models::item::CandidateItem;
use crate::models::item_kind::ItemKind;
use crate::models::item_set::Profile;
use crate::models::level::Level;
use crate::models::metrics::Recommendation;
use crate::models::outcome::FailureKind;
use crate::models::record::{AttemptLog, MetricsRecord, Output, Record};
use crate::models::request::{ItemNo, Request, RequestId};
use crate::scoring::QualityScorer;
use crate::services::{ChartStore, LlmClient, PromptComposer, PromptExtra, RecordStore, ResponseParser};
use crate::services::response_parser::parse_json_object;
use crate::validation::{ChainReport, ValidationContext, ValidatorChain};
use crate::workflow::item_ctx::ItemCtx;

/// 重试与温度策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retry: u32,
    pub base_temperature: f32,
    pub temperature_step: f32,
    pub max_temperature: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 3,
            base_temperature: 0.7,
            temperature_step: 0.1,
            max_temperature: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retry: config.max_retry,
            base_temperature: config.base_temperature,
            temperature_step: config.temperature_step,
            max_temperature: config.max_temperature,
        }
    }

    /// 第 `attempt` 次尝试（从 1 开始）的温度，不超过上限
    pub fn temperature_for(&self, attempt: u32) -> f32 {
        let raised =
            self.base_temperature + self.temperature_step * attempt.saturating_sub(1) as f32;
        raised.min(self.max_temperature)
    }
}

/// 流程依赖的全部能力
#[derive(Clone)]
pub struct FlowDeps {
    pub composer: Arc<dyn PromptComposer>,
    pub llm: Arc<dyn LlmClient>,
    pub parser: Arc<dyn ResponseParser>,
    pub charts: Arc<dyn ChartStore>,
    pub store: Arc<dyn RecordStore>,
    pub chain: Arc<ValidatorChain>,
    pub prompt_metrics: Arc<PromptMetricsRegistry>,
}

/// 单次运行的输入（套题成员的难度、共享地文在这里覆盖）
#[derive(Debug, Clone)]
pub struct FlowInput {
    pub level: Level,
    pub passage: Option<String>,
    pub profile: Option<Profile>,
}

impl FlowInput {
    pub fn for_request(request: &Request) -> Self {
        Self {
            level: request.level,
            passage: request.effective_passage().map(str::to_string),
            profile: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PassageDraft {
    #[serde(default)]
    passage: String,
}

/// 单题生成流程
///
/// - 编排一次请求内的多次尝试
/// - 决定何时重试、何时放弃
/// - 只依赖业务能力（services / validation / scoring）
pub struct ItemFlow {
    deps: FlowDeps,
    policy: RetryPolicy,
}

impl ItemFlow {
    pub fn new(deps: FlowDeps, policy: RetryPolicy) -> Self {
        Self { deps, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn prompt_metrics(&self) -> &Arc<PromptMetricsRegistry> {
        &self.deps.prompt_metrics
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.deps.store
    }

    /// 生成一道题，请求须已处于 RUNNING
    pub async fn run(&self, request: &Request, input: &FlowInput) -> PipelineResult<Output> {
        let ctx = ItemCtx::from_request(request);
        let kind = ItemKind::from_item_no(request.item_no.primary());
        let prompt_key = self.deps.composer.prompt_key(request.item_no);

        let extra = PromptExtra {
            instructions: request.extra.clone(),
            passage: input.passage.clone(),
        };
        let prompt = self.deps.composer.compose(
            request.item_no,
            input.level,
            &extra,
            input.profile.as_ref(),
        )?;

        let chart_data = if kind == ItemKind::Chart {
            self.deps.charts.get_chart_data(&request.chart_key()).await
        } else {
            JsonValue::Object(Map::new())
        };
        let validation_ctx = ValidationContext::new(request.item_no)
            .with_passage(input.passage.clone())
            .with_chart_data(chart_data)
            .with_prompt(prompt.clone());

        info!(
            "{} 📝 开始生成 (题型 {}, 难度 {}, prompt {})",
            ctx, kind, input.level, prompt_key
        );

        let mut attempts: Vec<AttemptLog> = Vec::new();

        for attempt in 1..=self.policy.max_retry {
            let temperature = self.policy.temperature_for(attempt);
            info!(
                "{} 🤖 第 {}/{} 次尝试 (temperature {:.2})",
                ctx, attempt, self.policy.max_retry, temperature
            );

            let (candidate, report) = self
                .attempt(&ctx, &prompt, temperature, &validation_ctx)
                .await;
            let metrics = QualityScorer::score_report(&report);

            if let Some(improved) = report.improved_prompt() {
                self.deps
                    .prompt_metrics
                    .record_suggestion(&prompt_key, improved);
            }

            let log = AttemptLog {
                attempt,
                temperature,
                failure: report.failure,
                outcomes: report.outcomes,
                metrics,
            };

            match (log.failure, candidate) {
                (None, Some(mut item)) => {
                    if item.passage.is_none() {
                        item.passage = input.passage.clone();
                    }
                    return self
                        .accept(&ctx, request, &prompt_key, item, log)
                        .await;
                }
                (failure, _) => {
                    let kind = failure.unwrap_or(FailureKind::Parse);
                    self.deps.prompt_metrics.record_failure(&prompt_key, kind);
                    warn!(
                        "{} ⚠️ 第 {} 次尝试未通过 ({}), 得分 {:.2}",
                        ctx, attempt, kind, log.metrics.final_score
                    );
                    for line in log.render() {
                        debug!("{} {}", ctx, line);
                    }
                    attempts.push(log);
                }
            }
        }

        self.give_up(&ctx, request, &prompt_key, attempts).await
    }

    /// 一次尝试：调用 → 解析 → 校验
    async fn attempt(
        &self,
        ctx: &ItemCtx,
        prompt: &str,
        temperature: f32,
        validation_ctx: &ValidationContext,
    ) -> (Option<CandidateItem>, ChainReport) {
        let raw = match self.deps.llm.complete(prompt, temperature).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{} LLM 调用失败: {}", ctx, e);
                return (None, ChainReport::rejected(FailureKind::Provider, e.to_string()));
            }
        };

        let item = match self.deps.parser.parse(&raw) {
            Ok(item) => item,
            Err(e) => {
                warn!("{} 解析失败: {}", ctx, e);
                return (None, ChainReport::rejected(FailureKind::Parse, e.to_string()));
            }
        };

        debug!("{} 候选题目: {}", ctx, item);
        let report = self.deps.chain.run(&item, validation_ctx).await;
        (Some(item), report)
    }

    async fn accept(
        &self,
        ctx: &ItemCtx,
        request: &Request,
        prompt_key: &str,
        item: CandidateItem,
        log: AttemptLog,
    ) -> PipelineResult<Output> {
        let metrics = log.metrics.clone();
        info!(
            "{} ✓ 第 {} 次尝试通过: {:.2} 分, 等级 {}, 建议 {}",
            ctx, log.attempt, metrics.final_score, metrics.grade, metrics.recommendation
        );

        self.deps
            .store
            .save(Record::Metrics(MetricsRecord::from_attempt(
                request.id.clone(),
                request.generation,
                &log,
            )))
            .await?;

        let output = Output {
            request_id: request.id.clone(),
            generation: request.generation,
            prompt_key: prompt_key.to_string(),
            item,
            metrics: metrics.clone(),
            created_at: chrono::Local::now(),
        };
        self.deps.store.save(Record::Output(output.clone())).await?;

        self.deps
            .prompt_metrics
            .record_completion(prompt_key, metrics.recommendation);
        Ok(output)
    }

    async fn give_up(
        &self,
        ctx: &ItemCtx,
        request: &Request,
        prompt_key: &str,
        attempts: Vec<AttemptLog>,
    ) -> PipelineResult<Output> {
        if let Some(last) = attempts.last() {
            warn!(
                "{} ❌ 已尝试 {} 次仍未通过，最后一次得分 {:.2}",
                ctx,
                attempts.len(),
                last.metrics.final_score
            );
            self.deps
                .store
                .save(Record::Metrics(MetricsRecord::from_attempt(
                    request.id.clone(),
                    request.generation,
                    last,
                )))
                .await?;
        }
        // 重试耗尽的请求一律按 REJECT 计入，不看最后一次的分数
        self.deps
            .prompt_metrics
            .record_completion(prompt_key, Recommendation::Reject);

        Err(PipelineError::RetriesExhausted {
            request_id: request.id.clone(),
            attempts,
        })
    }

    /// 生成地文（两步生成的草稿或套题共享地文），同样受 `max_retry` 约束
    pub async fn generate_passage(
        &self,
        owner: &RequestId,
        item_no: ItemNo,
        level: Level,
        instructions: &str,
    ) -> PipelineResult<String> {
        let ctx = ItemCtx::new(owner.clone(), item_no);
        let extra = PromptExtra {
            instructions: instructions.to_string(),
            passage: None,
        };
        let prompt = self.deps.composer.compose_passage(item_no, level, &extra)?;
        let mut attempts = Vec::new();

        for attempt in 1..=self.policy.max_retry {
            let temperature = self.policy.temperature_for(attempt);
            info!("{} 📄 生成地文，第 {}/{} 次", ctx, attempt, self.policy.max_retry);

            let failure = match self.deps.llm.complete(&prompt, temperature).await {
                Err(e) => (FailureKind::Provider, e.to_string()),
                Ok(raw) => match parse_json_object::<PassageDraft>(&raw) {
                    Ok(draft) if !draft.passage.trim().is_empty() => {
                        info!(
                            "{} ✓ 地文生成完成 ({} 词)",
                            ctx,
                            draft.passage.split_whitespace().count()
                        );
                        return Ok(draft.passage.trim().to_string());
                    }
                    Ok(_) => (FailureKind::Parse, "地文为空".to_string()),
                    Err(e) => (FailureKind::Parse, e.to_string()),
                },
            };

            warn!("{} ⚠️ 地文生成失败 ({}): {}", ctx, failure.0, failure.1);
            let report = ChainReport::rejected(failure.0, failure.1);
            attempts.push(AttemptLog {
                attempt,
                temperature,
                failure: report.failure,
                metrics: QualityScorer::score_report(&report),
                outcomes: report.outcomes,
            });
        }

        Err(PipelineError::RetriesExhausted {
            request_id: owner.clone(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::metrics::AlertLevel;
    use crate::services::{InMemoryChartStore, InMemoryRecordStore, JsonResponseParser, TemplatePromptComposer};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// 按顺序返回预设响应，用完后一直返回最后一个
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        temperatures: Mutex<Vec<f32>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                temperatures: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str, temperature: f32) -> Result<String, ProviderError> {
            self.temperatures.lock().await.push(temperature);
            let mut replies = self.replies.lock().await;
            if replies.len() > 1 {
                replies.pop_front().unwrap_or_else(|| Ok(String::new()))
            } else {
                replies.front().cloned().unwrap_or_else(|| Ok(String::new()))
            }
        }
    }

    fn good_reply() -> String {
        let item = crate::validation::tests::valid_item();
        serde_json::to_string(&item).unwrap()
    }

    fn four_option_reply() -> String {
        let mut item = crate::validation::tests::valid_item();
        item.options.pop();
        serde_json::to_string(&item).unwrap()
    }

    fn flow(llm: Arc<ScriptedLlm>, store: Arc<InMemoryRecordStore>) -> ItemFlow {
        let deps = FlowDeps {
            composer: Arc::new(TemplatePromptComposer::default()),
            llm,
            parser: Arc::new(JsonResponseParser),
            charts: Arc::new(InMemoryChartStore::new()),
            store,
            chain: Arc::new(ValidatorChain::new()),
            prompt_metrics: Arc::new(PromptMetricsRegistry::new(1)),
        };
        ItemFlow::new(deps, RetryPolicy::default())
    }

    fn running_request() -> Request {
        let mut request = Request::new("r1", ItemNo::Single(20), Level::Mid);
        request.status = crate::models::request::RequestStatus::Running;
        request.generation = 1;
        request
    }

    #[test]
    fn test_temperature_schedule_is_capped() {
        let policy = RetryPolicy {
            max_retry: 5,
            base_temperature: 0.7,
            temperature_step: 0.2,
            max_temperature: 1.0,
        };
        assert!((policy.temperature_for(1) - 0.7).abs() < 1e-6);
        assert!((policy.temperature_for(2) - 0.9).abs() < 1e-6);
        assert!((policy.temperature_for(3) - 1.0).abs() < 1e-6);
        assert!((policy.temperature_for(9) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_success_after_parse_failure() {
        let llm = ScriptedLlm::new(vec![Ok("not json".to_string()), Ok(good_reply())]);
        let store = Arc::new(InMemoryRecordStore::new());
        let flow = flow(llm.clone(), store.clone());
        let request = running_request();

        let output = flow
            .run(&request, &FlowInput::for_request(&request))
            .await
            .unwrap();
        assert_eq!(output.generation, 1);
        assert_eq!(output.prompt_key, "default@builtin");
        assert_eq!(store.count_kind("output").await, 1);
        assert_eq!(store.count_kind("metrics").await, 1);

        let temps = llm.temperatures.lock().await.clone();
        assert_eq!(temps.len(), 2);
        assert!(temps[1] > temps[0]);

        let metrics = flow.prompt_metrics();
        assert_eq!(metrics.failure_counts("default@builtin"), vec![(FailureKind::Parse, 1)]);
        assert_eq!(metrics.snapshot("default@builtin").unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_every_attempt() {
        let llm = ScriptedLlm::new(vec![Ok(four_option_reply())]);
        let store = Arc::new(InMemoryRecordStore::new());
        let flow = flow(llm, store.clone());
        let request = running_request();

        let err = flow
            .run(&request, &FlowInput::for_request(&request))
            .await
            .unwrap_err();
        match &err {
            PipelineError::RetriesExhausted { attempts, .. } => {
                assert_eq!(attempts.len(), 3);
                assert!(attempts
                    .iter()
                    .all(|a| a.failure == Some(FailureKind::Structural)));
            }
            other => panic!("unexpected error: {other}"),
        }
        let last_log = err.last_attempt_log().unwrap();
        assert!(last_log.iter().any(|l| l.contains("option count")));

        // 只保存最后一次的评分，没有产出
        assert_eq!(store.count_kind("metrics").await, 1);
        assert_eq!(store.count_kind("output").await, 0);

        let snap = flow.prompt_metrics().snapshot("default@builtin").unwrap();
        assert_eq!(snap.reject_count, 1);
        assert_eq!(snap.alert_level, AlertLevel::Critical);
    }

    /// 语法题只有 4 处下划线：前两层满分，最后得分仍是 APPROVE 档
    fn four_underline_grammar_reply() -> String {
        let mut item = crate::validation::tests::valid_item();
        let mut passage = crate::validation::tests::SAMPLE_PASSAGE.to_string();
        for word in ["research", "children", "Psychologists", "Teams"] {
            passage = passage.replacen(word, &format!("<u>{}</u>", word), 1);
        }
        item.passage = Some(passage);
        serde_json::to_string(&item).unwrap()
    }

    #[tokio::test]
    async fn test_exhausted_requests_count_as_reject() {
        let llm = ScriptedLlm::new(vec![Ok(four_underline_grammar_reply())]);
        let store = Arc::new(InMemoryRecordStore::new());
        let flow = flow(llm, store);

        for n in 0..5 {
            let mut request = running_request();
            request.id = RequestId::new(format!("g{}", n));
            request.item_no = ItemNo::Single(29);
            let err = flow
                .run(&request, &FlowInput::for_request(&request))
                .await
                .unwrap_err();
            match &err {
                PipelineError::RetriesExhausted { attempts, .. } => {
                    let last = attempts.last().unwrap();
                    assert_eq!(last.failure, Some(FailureKind::Domain));
                    assert_eq!(last.metrics.recommendation, Recommendation::Approve);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        let key = flow.deps.composer.prompt_key(ItemNo::Single(29));
        let snap = flow.prompt_metrics().snapshot(&key).unwrap();
        assert_eq!(snap.total_count, 5);
        assert_eq!(snap.approve_count, 0);
        assert_eq!(snap.reject_count, 5);
        assert_eq!(snap.alert_level, AlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_provider_errors_are_retried() {
        let llm = ScriptedLlm::new(vec![
            Err(ProviderError::new("scripted", "quota")),
            Ok(good_reply()),
        ]);
        let store = Arc::new(InMemoryRecordStore::new());
        let flow = flow(llm, store);
        let request = running_request();
        assert!(flow.run(&request, &FlowInput::for_request(&request)).await.is_ok());
        assert_eq!(
            flow.prompt_metrics().failure_counts("default@builtin"),
            vec![(FailureKind::Provider, 1)]
        );
    }

    #[tokio::test]
    async fn test_generate_passage() {
        let llm = ScriptedLlm::new(vec![
            Ok("{\"passage\": \"   \"}".to_string()),
            Ok("{\"passage\": \"A fresh passage.\"}".to_string()),
        ]);
        let flow = flow(llm, Arc::new(InMemoryRecordStore::new()));
        let passage = flow
            .generate_passage(&RequestId::new("r1"), ItemNo::Single(20), Level::Mid, "")
            .await
            .unwrap();
        assert_eq!(passage, "A fresh passage.");
    }

    #[tokio::test]
    async fn test_generate_passage_exhausted() {
        let llm = ScriptedLlm::new(vec![Err(ProviderError::new("scripted", "down"))]);
        let flow = flow(llm, Arc::new(InMemoryRecordStore::new()));
        let err = flow
            .generate_passage(&RequestId::new("r1"), ItemNo::Single(20), Level::Mid, "")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RetriesExhausted { ref attempts, .. } if attempts.len() == 3));
    }
}
