//! 评分与分级
//!
//! `final = l1 × 0.40 + l3 × 0.35 + l2 × 0.25`，截断到 [0, 100] 并保留两位小数。
//! 纯函数：相同输入永远得到相同的 `Metrics`。

use crate::models::metrics::{Grade, Metrics};
use crate::models::outcome::Layer;
use crate::validation::ChainReport;

pub const STRUCTURAL_WEIGHT: f64 = 0.40;
pub const DOMAIN_WEIGHT: f64 = 0.35;
pub const CONTENT_WEIGHT: f64 = 0.25;

#[derive(Debug, Default, Clone, Copy)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn score(l1: f64, l2: f64, l3: f64, holistic: Option<f64>) -> Metrics {
        let raw = l1 * STRUCTURAL_WEIGHT + l3 * DOMAIN_WEIGHT + l2 * CONTENT_WEIGHT;
        let final_score = round2(raw.clamp(0.0, 100.0));
        let grade = Grade::from_score(final_score);
        Metrics {
            layer1_score: l1,
            layer2_score: l2,
            layer3_score: l3,
            final_score,
            grade,
            recommendation: grade.recommendation(),
            holistic_score: holistic.map(round2),
        }
    }

    /// 从一次尝试的校验结果评分，跳过的层按 0 分
    pub fn score_report(report: &ChainReport) -> Metrics {
        Self::score(
            report.layer_score(Layer::Structural),
            report.layer_score(Layer::Content),
            report.layer_score(Layer::Domain),
            report.holistic_score(),
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::Recommendation;
    use crate::models::outcome::FailureKind;
    use proptest::prelude::*;

    #[test]
    fn test_reference_scores() {
        let metrics = QualityScorer::score(100.0, 80.0, 70.0, None);
        assert_eq!(metrics.final_score, 84.5);
        assert_eq!(metrics.grade, Grade::B);
        assert_eq!(metrics.recommendation, Recommendation::Approve);
    }

    #[test]
    fn test_perfect_and_zero() {
        let top = QualityScorer::score(100.0, 100.0, 100.0, Some(9.0));
        assert_eq!(top.final_score, 100.0);
        assert_eq!(top.grade, Grade::A);
        assert_eq!(top.holistic_score, Some(9.0));

        let bottom = QualityScorer::score(0.0, 0.0, 0.0, None);
        assert_eq!(bottom.final_score, 0.0);
        assert_eq!(bottom.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        assert_eq!(QualityScorer::score(500.0, 500.0, 500.0, None).final_score, 100.0);
        assert_eq!(QualityScorer::score(-50.0, -50.0, -50.0, None).final_score, 0.0);
    }

    #[test]
    fn test_rejected_report_scores_zero() {
        let report = ChainReport::rejected(FailureKind::Parse, "no json");
        let metrics = QualityScorer::score_report(&report);
        assert_eq!(metrics.final_score, 0.0);
        assert_eq!(metrics.grade, Grade::F);
    }

    proptest! {
        #[test]
        fn prop_final_score_monotone_in_each_layer(
            l1 in 0.0f64..=100.0,
            l2 in 0.0f64..=100.0,
            l3 in 0.0f64..=100.0,
            bump in 0.0f64..=100.0,
        ) {
            let base = QualityScorer::score(l1, l2, l3, None).final_score;
            let up1 = QualityScorer::score((l1 + bump).min(100.0), l2, l3, None).final_score;
            let up2 = QualityScorer::score(l1, (l2 + bump).min(100.0), l3, None).final_score;
            let up3 = QualityScorer::score(l1, l2, (l3 + bump).min(100.0), None).final_score;
            prop_assert!(up1 >= base);
            prop_assert!(up2 >= base);
            prop_assert!(up3 >= base);
        }

        #[test]
        fn prop_score_is_bounded_and_stable(
            l1 in -200.0f64..=300.0,
            l2 in -200.0f64..=300.0,
            l3 in -200.0f64..=300.0,
        ) {
            let a = QualityScorer::score(l1, l2, l3, None);
            let b = QualityScorer::score(l1, l2, l3, None);
            prop_assert!(a.final_score >= 0.0 && a.final_score <= 100.0);
            prop_assert_eq!(a.clone(), b);
            prop_assert_eq!(a.recommendation, a.grade.recommendation());
        }
    }
}
