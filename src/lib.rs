//! # CSAT Item Gen
//!
//! 英语考试选择题的生成 - 校验 - 评分流水线
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 请求、候选题目、校验结果、评分、持久化记录
//! - `Request` - 状态机 PENDING → [PASSAGE_READY] → RUNNING → OK | FAIL
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力一个 trait
//! - `LlmClient` / `LlmService` - 调用模型拿到原始文本
//! - `ResponseParser` - 原始文本 → `CandidateItem`
//! - `PromptComposer` - 按模板目录组装 prompt
//! - `ChartStore` / `RecordStore` / `QualityEvaluator`
//!
//! ### ③ 校验与评分（Validation / Scoring）
//! - `validation/` - 四层校验链，前三层纯同步
//! - `scoring` - 加权得分、等级、建议
//!
//! ### ④ 流程层（Workflow）
//! - `LifecycleManager` - 唯一修改请求状态的地方
//! - `ItemFlow` - 一道题的完整生成流程（重试、温度、保存）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/generator` - 单个请求的对外操作
//! - `orchestrator/set_processor` - 套题并发生成
//! - `orchestrator/batch_processor` - 批量任务入口
//!
//! ### ⑥ 反馈环（Feedback）
//! - `feedback/` - 按 prompt key 统计通过率并告警
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod feedback;
pub mod models;
pub mod orchestrator;
pub mod scoring;
pub mod services;
pub mod utils;
pub mod validation;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use feedback::{FeedbackLoop, PromptMetricsRegistry};
pub use models::{CandidateItem, ItemNo, Level, Metrics, Request, RequestId, RequestStatus};
pub use orchestrator::{process_set, App, Generator, SetOutcome};
pub use scoring::QualityScorer;
pub use validation::{ValidationContext, ValidatorChain};
pub use workflow::{FlowDeps, ItemFlow, LifecycleManager, RetryPolicy};
