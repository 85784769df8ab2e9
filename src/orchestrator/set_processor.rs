//! 套题处理器 - 编排层
//!
//! ## 职责
//!
//! 处理一个套题的全部成员，是套题级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **共享地文**：套题没有地文时先生成一次，所有成员共用
//! 2. **并发生成**：每个成员一个任务，Semaphore 限制同时运行的数量
//! 3. **汇总结果**：成功 / 失败计数，套题本身不重试
//!
//! 成员任务一经 spawn 就会跑完并保存结果，即使调用方中途放弃等待；
//! 计数器可交换累加，完成顺序不影响结果。

use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::error::PipelineResult;
use crate::models::item_set::ItemSet;
use crate::orchestrator::generator::Generator;

/// 套题结果（由成员结果推导，不单独保存）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl SetOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// 成员完成时累加的计数板
#[derive(Debug, Default)]
pub struct SetTally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl SetTally {
    pub fn record(&self, ok: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> SetOutcome {
        SetOutcome {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// 处理单个套题
///
/// 共享地文生成失败时直接返回错误，成员保持 PENDING。
pub async fn process_set(
    generator: Arc<Generator>,
    set: ItemSet,
    max_concurrent: usize,
) -> PipelineResult<SetOutcome> {
    process_set_with_tally(generator, set, max_concurrent, Arc::new(SetTally::default())).await
}

/// 同 `process_set`，计数板由调用方持有（调用方放弃等待后仍可读到迟到的结果）
pub async fn process_set_with_tally(
    generator: Arc<Generator>,
    set: ItemSet,
    max_concurrent: usize,
    tally: Arc<SetTally>,
) -> PipelineResult<SetOutcome> {
    log_set_start(&set);

    if set.members.is_empty() {
        return Ok(tally.snapshot());
    }

    let passage = if set.has_passage() {
        set.passage.clone()
    } else {
        info!("[套题 {}] 📄 没有共享地文，先生成一篇", set.id);
        generator
            .generate_set_passage(&set)
            .await
            .inspect_err(|e| error!("[套题 {}] ❌ 共享地文生成失败: {}", set.id, e))?
    };

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let profile = Arc::new(set.profile.clone());
    let mut handles = Vec::with_capacity(set.members.len());

    for member_id in set.members.iter().cloned() {
        let generator = generator.clone();
        let semaphore = semaphore.clone();
        let profile = profile.clone();
        let tally = tally.clone();
        let passage = passage.clone();

        handles.push(tokio::spawn(async move {
            let ok = match semaphore.acquire_owned().await {
                Ok(_permit) => generator
                    .generate_member(&member_id, Some(passage), &profile)
                    .await
                    .is_ok(),
                Err(e) => {
                    error!("成员 {} 无法获取并发许可: {}", member_id, e);
                    false
                }
            };
            tally.record(ok);
        }));
    }

    // 等待所有成员完成
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("[套题 {}] 成员任务异常退出: {}", set.id, e);
            tally.record(false);
        }
    }

    let outcome = tally.snapshot();
    log_set_complete(&set.id, &outcome);
    Ok(outcome)
}

// ========== 日志辅助函数 ==========

fn log_set_start(set: &ItemSet) {
    info!("[套题 {}] 开始处理", set.id);
    info!("[套题 {}] 成员数: {}", set.id, set.members.len());
    if !set.profile.is_empty() {
        info!("[套题 {}] 难度配置: {}", set.id, set.profile.to_compact());
    }
}

fn log_set_complete(set_id: &str, outcome: &SetOutcome) {
    info!(
        "[套题 {}] 成员统计: 成功 {}, 失败 {}, 总计 {}",
        set_id,
        outcome.succeeded,
        outcome.failed,
        outcome.total()
    );
    info!("\n[套题 {}] ✅ 套题处理完成\n", set_id);
}
