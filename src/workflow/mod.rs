//! 流程层（Workflow Layer）
//!
//! - `lifecycle` - 请求状态机，唯一允许修改请求状态的地方
//! - `item_ctx` - 日志上下文
//! - `item_flow` - 单题生成流程（重试、温度、持久化）

pub mod item_ctx;
pub mod item_flow;
pub mod lifecycle;

pub use item_ctx::ItemCtx;
pub use item_flow::{FlowDeps, FlowInput, ItemFlow, RetryPolicy};
pub use lifecycle::LifecycleManager;
