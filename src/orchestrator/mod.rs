//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量任务处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载任务文件（Vec<GenerationJob>）
//! - 控制单题并发数量（Semaphore）
//! - 输出全局统计和 prompt 告警
//!
//! ### `set_processor` - 套题处理器
//! - 解析共享地文（必要时生成一次）
//! - 成员并发生成，汇总成功 / 失败
//!
//! ### `generator` - 生成编排器
//! - 对单个请求的全部操作：生成、重新生成、两步生成
//! - 把流程结果落实为状态迁移
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<GenerationJob>)
//!     ↓
//! set_processor (处理 ItemSet 的成员)
//!     ↓
//! generator (单个请求 + 状态迁移)
//!     ↓
//! workflow::ItemFlow (一次请求内的多次尝试)
//!     ↓
//! validation / scoring / services
//! ```

pub mod batch_processor;
pub mod generator;
pub mod set_processor;

// 重新导出主要类型
pub use batch_processor::{App, RunStats};
pub use generator::Generator;
pub use set_processor::{process_set, process_set_with_tally, SetOutcome, SetTally};
