//! 第四层：LLM 整体评估
//!
//! 只在前三层全部通过后运行，结果仅供参考：评估失败记一条警告，本层永远通过。

use std::sync::Arc;
use tracing::warn;

use crate::models::item::CandidateItem;
use crate::models::outcome::{HolisticReview, Layer, ValidationOutcome};
use crate::services::quality_evaluator::QualityEvaluator;
use crate::validation::ValidationContext;

#[derive(Clone)]
pub struct HolisticValidator {
    evaluator: Arc<dyn QualityEvaluator>,
}

impl HolisticValidator {
    pub fn new(evaluator: Arc<dyn QualityEvaluator>) -> Self {
        Self { evaluator }
    }

    pub async fn review(
        &self,
        item: &CandidateItem,
        ctx: &ValidationContext,
    ) -> (ValidationOutcome, Option<HolisticReview>) {
        let mut outcome = ValidationOutcome::new(Layer::Holistic);

        match self.evaluator.evaluate(item, &ctx.prompt, ctx.kind).await {
            Ok(review) => {
                let overall = review.overall();
                outcome.info(format!(
                    "clarity {:.0} / completeness {:.0} / consistency {:.0} / specificity {:.0} / domain {:.0}",
                    review.clarity,
                    review.completeness,
                    review.consistency,
                    review.specificity,
                    review.domain_appropriateness
                ));
                for weakness in &review.weaknesses {
                    outcome.warn(weakness.clone());
                }
                if review.improved_prompt.is_some() {
                    outcome.info("评估器给出了改进后的 prompt");
                }
                (outcome.with_score(overall * 10.0).finish(), Some(review))
            }
            Err(e) => {
                warn!("{} 整体评估失败，忽略: {}", ctx, e);
                outcome.warn(format!("整体评估失败: {}", e));
                (outcome.finish(), None)
            }
        }
    }
}
