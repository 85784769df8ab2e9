//! 第一层：结构校验
//!
//! 题干、选项数量、答案范围是硬条件；空选项只记警告（每个空选项一条）。

use crate::models::item::CandidateItem;
use crate::models::outcome::{Layer, ValidationOutcome};
use crate::validation::{LayerValidator, ValidationContext};

pub const REQUIRED_OPTIONS: usize = 5;

const QUESTION_POINTS: f64 = 30.0;
const OPTION_COUNT_POINTS: f64 = 40.0;
const ANSWER_POINTS: f64 = 30.0;
const EMPTY_OPTION_PENALTY: f64 = 5.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl LayerValidator for StructuralValidator {
    fn layer(&self) -> Layer {
        Layer::Structural
    }

    fn validate(&self, item: &CandidateItem, _ctx: &ValidationContext) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new(Layer::Structural);
        let mut score = 0.0;

        if item.question.trim().is_empty() {
            outcome.fail("题干 (question) 为空");
        } else {
            score += QUESTION_POINTS;
        }

        if item.options.len() != REQUIRED_OPTIONS {
            outcome.fail(format!(
                "选项数量 (option count) 应为 {}，实际为 {}",
                REQUIRED_OPTIONS,
                item.options.len()
            ));
        } else {
            score += OPTION_COUNT_POINTS;
        }

        let empty_options = item.empty_option_count();
        for (idx, option) in item.options.iter().enumerate() {
            if option.trim().is_empty() {
                outcome.warn(format!("第 {} 个选项为空", idx + 1));
            }
        }

        match item.answer.as_deref().map(str::trim) {
            None | Some("") => outcome.fail("缺少答案 (answer)"),
            Some(raw) => match raw.parse::<i64>() {
                Err(_) => outcome.fail(format!("答案 '{}' 不是整数", raw)),
                Ok(idx) if !(1..=REQUIRED_OPTIONS as i64).contains(&idx) => {
                    outcome.fail(format!("答案 {} 超出范围 [1, {}]", idx, REQUIRED_OPTIONS))
                }
                Ok(_) => score += ANSWER_POINTS,
            },
        }

        score -= EMPTY_OPTION_PENALTY * empty_options as f64;

        outcome.with_score(score.max(0.0)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::Severity;
    use crate::validation::tests::{context, valid_item};

    fn run(item: &CandidateItem) -> ValidationOutcome {
        StructuralValidator.validate(item, &context(20))
    }

    #[test]
    fn test_valid_item_passes_with_full_score() {
        let outcome = run(&valid_item());
        assert!(outcome.pass);
        assert_eq!(outcome.score, Some(100.0));
        assert_eq!(outcome.log.len(), 1);
        assert_eq!(outcome.log[0].message, "OK");
    }

    #[test]
    fn test_wrong_option_count_fails() {
        for n in [0usize, 4, 6] {
            let mut item = valid_item();
            item.options = (0..n).map(|i| format!("option {}", i)).collect();
            let outcome = run(&item);
            assert!(!outcome.pass, "{} options must fail", n);
            assert!(outcome
                .log
                .iter()
                .any(|f| f.severity == Severity::Error && f.message.contains("option count")));
        }
    }

    #[test]
    fn test_empty_options_only_warn_and_grow_monotonically() {
        let mut previous = 0;
        for empties in 1..=3 {
            let mut item = valid_item();
            for i in 0..empties {
                item.options[i] = "  ".to_string();
            }
            let outcome = run(&item);
            assert!(outcome.pass, "{} empty options is warning-only", empties);
            assert!(outcome.warning_count() > previous);
            assert_eq!(outcome.warning_count(), empties);
            previous = outcome.warning_count();
        }
    }

    #[test]
    fn test_answer_out_of_range_or_non_numeric_fails() {
        for bad in ["0", "6", "-1", "two", "", "3.5"] {
            let mut item = valid_item();
            item.answer = Some(bad.to_string());
            assert!(!run(&item).pass, "answer '{}' must fail", bad);
        }
        let mut item = valid_item();
        item.answer = None;
        assert!(!run(&item).pass);
    }

    #[test]
    fn test_blank_question_fails() {
        let mut item = valid_item();
        item.question = "   ".to_string();
        let outcome = run(&item);
        assert!(!outcome.pass);
        assert_eq!(outcome.score, Some(70.0));
    }
}
