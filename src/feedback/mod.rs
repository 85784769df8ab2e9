//! 提示词反馈环
//!
//! 只负责汇总和报告：哪些 prompt 在退化、主要失败在哪一层、第四层建议怎么改。
//! 从不修改模板本身。

pub mod prompt_metrics;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::metrics::{AlertLevel, PromptPerformance};
use crate::models::outcome::FailureKind;

pub use prompt_metrics::PromptMetricsRegistry;

/// 一条告警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptAlert {
    pub performance: PromptPerformance,
    /// 失败归类，按次数降序
    pub failure_kinds: Vec<(FailureKind, u64)>,
    pub suggested_prompt: Option<String>,
}

pub struct FeedbackLoop;

impl FeedbackLoop {
    /// 所有处于告警状态的 prompt，CRITICAL 在前
    pub fn report(registry: &PromptMetricsRegistry) -> Vec<PromptAlert> {
        let mut alerts: Vec<PromptAlert> = registry
            .snapshots()
            .into_iter()
            .filter(|p| p.alert_level != AlertLevel::None)
            .map(|performance| PromptAlert {
                failure_kinds: registry.failure_counts(&performance.prompt_key),
                suggested_prompt: registry.suggestion(&performance.prompt_key),
                performance,
            })
            .collect();
        alerts.sort_by(|a, b| {
            b.performance
                .alert_level
                .cmp(&a.performance.alert_level)
                .then_with(|| a.performance.prompt_key.cmp(&b.performance.prompt_key))
        });
        alerts
    }

    pub fn log_report(alerts: &[PromptAlert]) {
        if alerts.is_empty() {
            info!("✓ 所有 prompt 表现正常");
            return;
        }
        info!("\n{}", "=".repeat(60));
        info!("📉 Prompt 告警 ({} 个)", alerts.len());
        info!("{}", "=".repeat(60));
        for alert in alerts {
            let p = &alert.performance;
            warn!(
                "⚠️ [{}] {}: 通过率 {:.1}% ({}/{})",
                p.alert_level,
                p.prompt_key,
                p.approve_rate * 100.0,
                p.approve_count,
                p.total_count
            );
            if !alert.failure_kinds.is_empty() {
                let kinds = alert
                    .failure_kinds
                    .iter()
                    .map(|(k, n)| format!("{} × {}", k, n))
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!("   主要失败: {}", kinds);
            }
            if let Some(prompt) = &alert.suggested_prompt {
                info!("   💡 建议 prompt: {}", crate::utils::truncate_text(prompt, 120));
            }
        }
    }
}
