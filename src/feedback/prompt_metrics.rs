//! 按 prompt key 聚合的表现统计
//!
//! 每个 key 一组原子计数器，并发任务直接累加，不需要额外的锁。

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::metrics::{AlertLevel, PromptPerformance, Recommendation};
use crate::models::outcome::FailureKind;

#[derive(Debug, Default)]
struct PromptCounters {
    approve: AtomicU64,
    review: AtomicU64,
    reject: AtomicU64,
    /// 下标与 `FailureKind::ALL` 对应
    failures: [AtomicU64; 5],
}

impl PromptCounters {
    fn failure_slot(&self, kind: FailureKind) -> &AtomicU64 {
        let idx = FailureKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(0);
        &self.failures[idx]
    }
}

#[derive(Debug)]
pub struct PromptMetricsRegistry {
    counters: DashMap<String, Arc<PromptCounters>>,
    /// 第四层最近一次给出的改进 prompt
    suggestions: DashMap<String, String>,
    min_sample: u64,
}

impl Default for PromptMetricsRegistry {
    fn default() -> Self {
        Self::new(5)
    }
}

impl PromptMetricsRegistry {
    pub fn new(min_sample: u64) -> Self {
        Self {
            counters: DashMap::new(),
            suggestions: DashMap::new(),
            min_sample,
        }
    }

    pub fn min_sample(&self) -> u64 {
        self.min_sample
    }

    fn entry(&self, prompt_key: &str) -> Arc<PromptCounters> {
        self.counters
            .entry(prompt_key.to_string())
            .or_default()
            .clone()
    }

    /// 一个请求结束（成功或重试耗尽）时调用一次
    pub fn record_completion(&self, prompt_key: &str, recommendation: Recommendation) {
        let counters = self.entry(prompt_key);
        let slot = match recommendation {
            Recommendation::Approve => &counters.approve,
            Recommendation::Review => &counters.review,
            Recommendation::Reject => &counters.reject,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    /// 每次失败的尝试调用一次
    pub fn record_failure(&self, prompt_key: &str, kind: FailureKind) {
        self.entry(prompt_key)
            .failure_slot(kind)
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suggestion(&self, prompt_key: &str, improved_prompt: &str) {
        self.suggestions
            .insert(prompt_key.to_string(), improved_prompt.to_string());
    }

    pub fn suggestion(&self, prompt_key: &str) -> Option<String> {
        self.suggestions.get(prompt_key).map(|s| s.clone())
    }

    pub fn snapshot(&self, prompt_key: &str) -> Option<PromptPerformance> {
        let counters = self.counters.get(prompt_key)?.clone();
        Some(self.build_snapshot(prompt_key, &counters))
    }

    /// 所有 key 的快照，按 key 排序
    pub fn snapshots(&self) -> Vec<PromptPerformance> {
        let mut keyed: Vec<(String, Arc<PromptCounters>)> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed
            .iter()
            .map(|(key, counters)| self.build_snapshot(key, counters))
            .collect()
    }

    /// 失败归类按次数降序，次数为 0 的不返回
    pub fn failure_counts(&self, prompt_key: &str) -> Vec<(FailureKind, u64)> {
        let Some(counters) = self.counters.get(prompt_key).map(|c| c.clone()) else {
            return Vec::new();
        };
        let mut counts: Vec<(FailureKind, u64)> = FailureKind::ALL
            .iter()
            .map(|kind| (*kind, counters.failure_slot(*kind).load(Ordering::Relaxed)))
            .filter(|(_, n)| *n > 0)
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts
    }

    fn build_snapshot(&self, prompt_key: &str, counters: &PromptCounters) -> PromptPerformance {
        let approve = counters.approve.load(Ordering::Relaxed);
        let review = counters.review.load(Ordering::Relaxed);
        let reject = counters.reject.load(Ordering::Relaxed);
        let total = approve + review + reject;
        let approve_rate = if total == 0 {
            0.0
        } else {
            approve as f64 / total as f64
        };
        PromptPerformance {
            prompt_key: prompt_key.to_string(),
            total_count: total,
            approve_count: approve,
            review_count: review,
            reject_count: reject,
            approve_rate,
            alert_level: AlertLevel::classify(total, approve_rate, self.min_sample),
        }
    }
}
