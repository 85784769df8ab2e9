use serde::{Deserialize, Serialize};
use std::fmt;

/// 等级（A-F）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// 阈值取下界闭区间：A ≥ 90, B ≥ 80, C ≥ 70, D ≥ 60, 其余 F
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn recommendation(self) -> Recommendation {
        match self {
            Grade::A | Grade::B => Recommendation::Approve,
            Grade::C | Grade::D => Recommendation::Review,
            Grade::F => Recommendation::Reject,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Review => "REVIEW",
            Recommendation::Reject => "REJECT",
        };
        f.write_str(s)
    }
}

/// 一次尝试的评分结果，计算后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub layer1_score: f64,
    pub layer2_score: f64,
    pub layer3_score: f64,
    pub final_score: f64,
    pub grade: Grade,
    pub recommendation: Recommendation,
    /// 第四层整体评分（0-10），仅供参考
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holistic_score: Option<f64>,
}

/// 提示词告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    None,
    Warning,
    Critical,
}

impl AlertLevel {
    /// 样本数不足 `min_sample` 时不告警；通过率 < 50% 为 CRITICAL，< 70% 为 WARNING
    pub fn classify(total: u64, approve_rate: f64, min_sample: u64) -> Self {
        if total == 0 || total < min_sample {
            AlertLevel::None
        } else if approve_rate < 0.5 {
            AlertLevel::Critical
        } else if approve_rate < 0.7 {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertLevel::None => "NONE",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// 某个 prompt key 的累计表现（快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPerformance {
    pub prompt_key: String,
    pub total_count: u64,
    pub approve_count: u64,
    pub review_count: u64,
    pub reject_count: u64,
    pub approve_rate: f64,
    pub alert_level: AlertLevel,
}
