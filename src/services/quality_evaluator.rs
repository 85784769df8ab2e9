//! LLM 整体评估 - 业务能力层
//!
//! 第四层使用的评估能力：让模型按五项标准打分，并在发现弱点时给出改写后的 prompt。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::item::CandidateItem;
use crate::models::item_kind::ItemKind;
use crate::models::outcome::HolisticReview;
use crate::services::llm_service::LlmClient;
use crate::services::prompt_composer::fill_template;
use crate::services::response_parser::parse_json_object;

/// 评估器契约
#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        item: &CandidateItem,
        prompt: &str,
        kind: ItemKind,
    ) -> Result<HolisticReview, PipelineError>;
}

const EVALUATION_TEMPLATE: &str = r#"You are reviewing a generated CSAT English item ({item_kind}).
Score each criterion from 0 to 10: clarity, completeness, consistency, specificity, domain_appropriateness.
If you find weaknesses, list them and rewrite the GENERATION PROMPT (not the item) so that it avoids them.

Generation prompt:
<<<
{prompt}
>>>

Generated item (JSON):
{item_json}

Return ONLY a JSON object:
{"clarity": n, "completeness": n, "consistency": n, "specificity": n, "domain_appropriateness": n,
 "weaknesses": ["..."], "improved_prompt": "..." or null}"#;

/// 低温度，评估结果尽量稳定
const EVALUATION_TEMPERATURE: f32 = 0.2;

/// 基于 LLM 的评估器
pub struct LlmQualityEvaluator {
    llm: Arc<dyn LlmClient>,
}

impl LlmQualityEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(&self, item: &CandidateItem, prompt: &str, kind: ItemKind) -> String {
        let item_json = serde_json::to_string_pretty(item).unwrap_or_default();
        fill_template(
            EVALUATION_TEMPLATE,
            &[
                ("item_kind", kind.name()),
                ("prompt", prompt),
                ("item_json", &item_json),
            ],
        )
    }
}

#[async_trait]
impl QualityEvaluator for LlmQualityEvaluator {
    async fn evaluate(
        &self,
        item: &CandidateItem,
        prompt: &str,
        kind: ItemKind,
    ) -> Result<HolisticReview, PipelineError> {
        let evaluation_prompt = self.build_prompt(item, prompt, kind);
        let raw = self
            .llm
            .complete(&evaluation_prompt, EVALUATION_TEMPERATURE)
            .await?;
        let mut review: HolisticReview = parse_json_object(&raw)?;
        // 空字符串等同于没有改写
        review.improved_prompt = review
            .improved_prompt
            .filter(|p| !p.trim().is_empty());
        debug!("整体评估完成: {:.1}/10", review.overall());
        Ok(review)
    }
}
