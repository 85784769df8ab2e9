//! 第二层：内容校验
//!
//! 子项：答案范围 30 分、选项不重复 40 分、解析长度 ≥ 10 字符 30 分。
//! 子项本身都不是硬失败，总分低于 `CONTENT_PASS_SCORE` 时本层不通过。

use std::collections::HashSet;

use crate::models::item::CandidateItem;
use crate::models::outcome::{Layer, ValidationOutcome};
use crate::validation::{LayerValidator, ValidationContext};

pub const CONTENT_PASS_SCORE: f64 = 70.0;
pub const MIN_EXPLANATION_CHARS: usize = 10;

const ANSWER_RANGE_POINTS: f64 = 30.0;
const DISTINCT_OPTIONS_POINTS: f64 = 40.0;
const EXPLANATION_POINTS: f64 = 30.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentValidator;

impl LayerValidator for ContentValidator {
    fn layer(&self) -> Layer {
        Layer::Content
    }

    fn validate(&self, item: &CandidateItem, _ctx: &ValidationContext) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new(Layer::Content);
        let mut score = 0.0;

        if item.answer_in_range() {
            score += ANSWER_RANGE_POINTS;
        } else {
            outcome.warn(format!("答案 {:?} 不在选项范围内", item.answer));
        }

        let duplicates = duplicate_options(&item.options);
        if duplicates.is_empty() {
            score += DISTINCT_OPTIONS_POINTS;
        } else {
            outcome.warn(format!("选项文本重复: {}", duplicates.join(" / ")));
        }

        let explanation_len = item
            .explanation
            .as_deref()
            .map(|e| e.trim().chars().count())
            .unwrap_or(0);
        if explanation_len >= MIN_EXPLANATION_CHARS {
            score += EXPLANATION_POINTS;
        } else {
            outcome.warn(format!(
                "解析过短 ({} 字符，至少 {})",
                explanation_len, MIN_EXPLANATION_CHARS
            ));
        }

        if score < CONTENT_PASS_SCORE {
            outcome.fail(format!("内容得分 {} 低于 {}", score, CONTENT_PASS_SCORE));
        }

        outcome.with_score(score).finish()
    }
}

/// 返回重复出现的选项（忽略大小写与首尾空白，空选项不计）
fn duplicate_options(options: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for option in options {
        let normalized = option.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if !seen.insert(normalized.clone()) && !duplicates.contains(&normalized) {
            duplicates.push(normalized);
        }
    }
    duplicates
}
