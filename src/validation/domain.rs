//! 第三层：题型校验
//!
//! 地文词数 40 分，平均句长 30 分，题型标记 30 分。
//! 标记缺失是硬失败；图表数据为空只告警，分数照给。

use regex::Regex;

use crate::models::item::CandidateItem;
use crate::models::item_kind::ItemKind;
use crate::models::outcome::{Layer, ValidationOutcome};
use crate::services::chart_store::chart_is_empty;
use crate::validation::{LayerValidator, ValidationContext};

pub const DOMAIN_PASS_SCORE: f64 = 60.0;

const WORD_COUNT_POINTS: f64 = 40.0;
const SENTENCE_POINTS: f64 = 30.0;
const MARKER_POINTS: f64 = 30.0;

const UNDERLINE_PATTERN: &str = r"(?is)<u>(.*?)</u>";
const BLANK_PATTERN: &str = r"_{3,}|\[BLANK\]";
const ORDERING_LABELS: [&str; 3] = ["(A)", "(B)", "(C)"];

#[derive(Debug, Default, Clone, Copy)]
pub struct DomainValidator;

impl LayerValidator for DomainValidator {
    fn layer(&self) -> Layer {
        Layer::Domain
    }

    fn validate(&self, item: &CandidateItem, ctx: &ValidationContext) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new(Layer::Domain);
        let kind = ctx.kind;
        let passage = resolve_passage(item, ctx);
        let mut score = 0.0;

        let words = word_count(passage);
        let (min_words, max_words) = kind.word_bounds();
        if passage.trim().is_empty() {
            outcome.warn("缺少地文，无法检查长度");
        } else if (min_words..=max_words).contains(&words) {
            score += WORD_COUNT_POINTS;
        } else {
            outcome.warn(format!(
                "地文词数 {} 不在 [{}, {}] 内",
                words, min_words, max_words
            ));
        }

        if let Some(avg) = average_sentence_length(passage) {
            let (low, high) = sentence_band(kind);
            if avg >= low && avg <= high {
                score += SENTENCE_POINTS;
            } else {
                outcome.warn(format!(
                    "平均句长 {:.1} 词不在 [{}, {}] 内",
                    avg, low, high
                ));
            }
        }

        let markers_ok = match kind {
            ItemKind::Grammar | ItemKind::Vocabulary => {
                let required = kind.required_underlines().unwrap_or(5);
                let found = count_underlines(passage);
                if found == required {
                    true
                } else {
                    outcome.fail(format!("下划线片段应为 {} 个，实际 {} 个", required, found));
                    false
                }
            }
            ItemKind::Blank => {
                let gapped = item.gapped_passage.as_deref().unwrap_or("");
                if has_blank(gapped) {
                    true
                } else {
                    outcome.fail("填空题缺少带空格的 gapped_passage");
                    false
                }
            }
            ItemKind::Chart => {
                if chart_is_empty(&ctx.chart_data) {
                    outcome.warn("图表数据为空");
                }
                true
            }
            ItemKind::Ordering => {
                let missing: Vec<&str> = ORDERING_LABELS
                    .iter()
                    .copied()
                    .filter(|label| !passage.contains(label))
                    .collect();
                if !missing.is_empty() {
                    outcome.warn(format!("排序题地文缺少段落标记: {}", missing.join(" ")));
                }
                true
            }
            ItemKind::Listening | ItemKind::LongPassage | ItemKind::Reading => true,
        };
        if markers_ok {
            score += MARKER_POINTS;
        }

        if markers_ok && score < DOMAIN_PASS_SCORE {
            outcome.fail(format!("题型得分 {} 低于 {}", score, DOMAIN_PASS_SCORE));
        }

        outcome.with_score(score).finish()
    }
}

/// 题目自带地文优先，其次是上下文中确定的地文
fn resolve_passage<'a>(item: &'a CandidateItem, ctx: &'a ValidationContext) -> &'a str {
    item.passage
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or(ctx.passage.as_deref())
        .unwrap_or("")
}

fn sentence_band(kind: ItemKind) -> (f64, f64) {
    if kind.is_listening() {
        (4.0, 25.0)
    } else {
        (8.0, 30.0)
    }
}

/// 去掉标签后按空白切词
pub fn word_count(text: &str) -> usize {
    strip_tags(text).split_whitespace().count()
}

/// 平均句长（词），没有句子时返回 None
pub fn average_sentence_length(text: &str) -> Option<f64> {
    let plain = strip_tags(text);
    let lengths: Vec<usize> = plain
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect();
    if lengths.is_empty() {
        return None;
    }
    Some(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64)
}

pub fn count_underlines(text: &str) -> usize {
    if let Ok(re) = Regex::new(UNDERLINE_PATTERN) {
        re.find_iter(text).count()
    } else {
        0
    }
}

fn has_blank(text: &str) -> bool {
    if let Ok(re) = Regex::new(BLANK_PATTERN) {
        re.is_match(text)
    } else {
        false
    }
}

fn strip_tags(text: &str) -> String {
    if let Ok(re) = Regex::new(r"</?[a-zA-Z][^>]*>") {
        re.replace_all(text, "").into_owned()
    } else {
        text.to_string()
    }
}
