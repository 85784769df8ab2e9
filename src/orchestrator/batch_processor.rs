//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、初始化日志文件、组装全部服务
//! 2. **批量加载**：扫描并加载所有任务文件（`Vec<GenerationJob>`）
//! 3. **并发控制**：单题用 Semaphore 限制并发，套题委托给 set_processor
//! 4. **失败记录**：失败请求的最后一次尝试日志写入运行日志文件
//! 5. **全局统计**：汇总结果，输出 prompt 告警并保存 prompt 表现快照

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::feedback::{FeedbackLoop, PromptAlert, PromptMetricsRegistry};
use crate::models::job::GenerationJob;
use crate::models::record::Record;
use crate::models::request::RequestId;
use crate::orchestrator::generator::Generator;
use crate::orchestrator::set_processor;
use crate::services::{
    InMemoryChartStore, JsonResponseParser, JsonlRecordWriter, LlmClient, LlmQualityEvaluator,
    LlmService, PromptCatalog, TemplatePromptComposer,
};
use crate::utils::logging::{
    append_log_line, init_log_file, log_job_complete, log_job_start, log_jobs_loaded,
    log_startup, print_final_stats,
};
use crate::validation::ValidatorChain;
use crate::workflow::{FlowDeps, ItemFlow, LifecycleManager, RetryPolicy};

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunStats {
    fn merge(&mut self, other: RunStats) {
        self.success += other.success;
        self.failed += other.failed;
        self.total += other.total;
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    generator: Arc<Generator>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        init_log_file(&config.output_log_file)?;
        log_startup(
            config.max_concurrent_items,
            config.max_retry,
            &config.llm_model_name,
        );

        let llm: Arc<dyn LlmClient> = Arc::new(LlmService::new(&config));

        let catalog = match &config.prompt_catalog_file {
            Some(path) => PromptCatalog::from_toml_file(Path::new(path))?,
            None => PromptCatalog::default(),
        };
        info!("📚 prompt 模板版本: {}", catalog.version);

        let charts = match &config.chart_folder {
            Some(folder) => InMemoryChartStore::load_from_dir(Path::new(folder))
                .await
                .with_context(|| format!("无法加载图表目录: {}", folder))?,
            None => InMemoryChartStore::new(),
        };
        info!("📈 图表数据: {} 份", charts.len());

        let mut chain = ValidatorChain::new();
        if config.enable_holistic_review {
            chain = chain.with_evaluator(Arc::new(LlmQualityEvaluator::new(llm.clone())));
        }

        let deps = FlowDeps {
            composer: Arc::new(TemplatePromptComposer::new(catalog)),
            llm,
            parser: Arc::new(JsonResponseParser),
            charts: Arc::new(charts),
            store: Arc::new(JsonlRecordWriter::new(&config.store_file)),
            chain: Arc::new(chain),
            prompt_metrics: Arc::new(PromptMetricsRegistry::new(config.alert_min_sample)),
        };
        let flow = Arc::new(ItemFlow::new(deps, RetryPolicy::from_config(&config)));
        let generator = Arc::new(Generator::new(Arc::new(LifecycleManager::new()), flow));

        Ok(Self { config, generator })
    }

    /// 使用已组装好的生成器（嵌入调用、测试）
    pub fn with_generator(config: Config, generator: Arc<Generator>) -> Self {
        Self { config, generator }
    }

    pub fn generator(&self) -> &Arc<Generator> {
        &self.generator
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let jobs = self.load_jobs().await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的任务文件，程序结束");
            return Ok(RunStats::default());
        }

        let total_items = jobs.iter().map(GenerationJob::item_count).sum();
        log_jobs_loaded(jobs.len(), total_items);

        let total_jobs = jobs.len();
        let mut stats = RunStats::default();
        for (index, job) in jobs.into_iter().enumerate() {
            let job_stats = self.process_job(index + 1, total_jobs, job).await?;
            stats.merge(job_stats);
        }

        self.report_prompts().await;

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载任务
    async fn load_jobs(&self) -> Result<Vec<GenerationJob>> {
        info!("\n📁 正在扫描待处理的任务...");
        crate::models::load_all_job_files(&self.config.job_folder).await
    }

    /// 处理单个任务文件：先并发处理单题，再逐个处理套题
    pub async fn process_job(
        &self,
        job_num: usize,
        total_jobs: usize,
        job: GenerationJob,
    ) -> Result<RunStats> {
        log_job_start(job_num, total_jobs, &job.name, job.item_count());

        let mut stats = RunStats {
            total: job.item_count(),
            ..Default::default()
        };

        let mut single_ids = Vec::with_capacity(job.requests.len());
        for spec in job.requests {
            let request = self.generator.submit(spec.into_request()).await?;
            single_ids.push(request.id);
        }
        let singles = self.process_singles(single_ids).await?;
        stats.success += singles.success;
        stats.failed += singles.failed;

        for spec in job.sets {
            let (set, members) = spec.into_parts();
            let member_count = members.len();
            for member in members {
                self.generator.submit(member).await?;
            }

            let set_id = set.id.clone();
            let member_ids = set.members.clone();
            match set_processor::process_set(
                self.generator.clone(),
                set,
                self.config.max_concurrent_items,
            )
            .await
            {
                Ok(outcome) => {
                    stats.success += outcome.succeeded;
                    stats.failed += outcome.failed;
                    for id in &member_ids {
                        self.log_if_failed(id);
                    }
                }
                Err(e) => {
                    error!("[套题 {}] ❌ 处理失败: {}", set_id, e);
                    stats.failed += member_count;
                    self.write_failure(&RequestId::new(set_id), &e);
                }
            }
        }

        log_job_complete(job_num, stats.success, stats.total);
        Ok(stats)
    }

    /// 并发处理单题
    async fn process_singles(&self, ids: Vec<RequestId>) -> Result<RunStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_items.max(1)));
        let mut handles = Vec::with_capacity(ids.len());

        for id in ids {
            let permit = semaphore.clone().acquire_owned().await?;
            let generator = self.generator.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                generator.generate(&id).await.map_err(|e| (id, e))
            });
            handles.push(handle);
        }

        let mut result = RunStats::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => result.success += 1,
                Ok(Err((id, e))) => {
                    result.failed += 1;
                    self.write_failure(&id, &e);
                }
                Err(e) => {
                    error!("任务执行失败: {}", e);
                    result.failed += 1;
                }
            }
        }
        result.total = result.success + result.failed;

        Ok(result)
    }

    /// 套题成员失败时错误已在任务内部处理，这里只补写运行日志
    fn log_if_failed(&self, id: &RequestId) {
        if let Ok(request) = self.generator.lifecycle().get(id) {
            if request.status == crate::models::request::RequestStatus::Fail {
                self.append_lines(&[format!("[FAIL] {} ({})", id, request.item_no)]);
            }
        }
    }

    /// 失败请求写入运行日志，附最后一次尝试的日志
    fn write_failure(&self, id: &RequestId, err: &PipelineError) {
        let mut lines = vec![format!("[FAIL] {}: {}", id, err)];
        if let Some(last) = err.last_attempt_log() {
            lines.extend(last.into_iter().map(|l| format!("    {}", l)));
        }
        self.append_lines(&lines);
    }

    fn append_lines(&self, lines: &[String]) {
        for line in lines {
            if let Err(e) = append_log_line(&self.config.output_log_file, line) {
                warn!("写入运行日志失败: {}", e);
                return;
            }
        }
    }

    /// 输出 prompt 告警，保存每个 prompt 的表现快照
    async fn report_prompts(&self) -> Vec<PromptAlert> {
        let registry = self.generator.flow().prompt_metrics().clone();
        let alerts = FeedbackLoop::report(&registry);
        FeedbackLoop::log_report(&alerts);

        for performance in registry.snapshots() {
            let key = performance.prompt_key.clone();
            if let Err(e) = self
                .generator
                .flow()
                .store()
                .save(Record::PromptPerformance(performance))
                .await
            {
                warn!("保存 prompt 表现失败 {}: {}", key, e);
            }
        }
        alerts
    }
}
