//! 校验链（Validation Chain）
//!
//! 四层按固定顺序执行：
//!
//! ```text
//! Layer1 结构 → Layer2 内容 → Layer3 题型 → Layer4 LLM 整体评估
//! ```
//!
//! - 第一、二层任一硬失败，跳过第三、四层（第二层在第一层失败后仍会执行，便于评分）
//! - 第三层失败跳过第四层
//! - 第四层只提供参考意见，不会让结果失败
//!
//! 前三层是纯同步计算，第四层是唯一的异步调用。

pub mod content;
pub mod domain;
pub mod holistic;
pub mod structural;

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

use crate::models::item::CandidateItem;
use crate::models::item_kind::ItemKind;
use crate::models::outcome::{FailureKind, HolisticReview, Layer, ValidationOutcome};
use crate::models::request::ItemNo;
use crate::services::quality_evaluator::QualityEvaluator;

pub use content::ContentValidator;
pub use domain::DomainValidator;
pub use holistic::HolisticValidator;
pub use structural::StructuralValidator;

/// 单层校验器（前三层）
pub trait LayerValidator: Send + Sync {
    fn layer(&self) -> Layer;
    fn validate(&self, item: &CandidateItem, ctx: &ValidationContext) -> ValidationOutcome;
}

/// 校验时需要的题目外部信息
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub item_no: ItemNo,
    pub kind: ItemKind,
    /// 已确定的地文（用户提供、确认后的草稿或套题共享地文）
    pub passage: Option<String>,
    /// 图表题使用，其余题型为空对象
    pub chart_data: JsonValue,
    /// 本次生成使用的 prompt，第四层评估需要
    pub prompt: String,
}

impl ValidationContext {
    pub fn new(item_no: ItemNo) -> Self {
        Self {
            item_no,
            kind: ItemKind::from_item_no(item_no.primary()),
            passage: None,
            chart_data: JsonValue::Object(Map::new()),
            prompt: String::new(),
        }
    }

    pub fn with_passage(mut self, passage: Option<String>) -> Self {
        self.passage = passage.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_chart_data(mut self, chart_data: JsonValue) -> Self {
        self.chart_data = chart_data;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[#{} {}]", self.item_no, self.kind)
    }
}

/// 一次尝试的全部校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub outcomes: Vec<ValidationOutcome>,
    pub review: Option<HolisticReview>,
    /// 失败归类；None 表示前三层全部通过
    pub failure: Option<FailureKind>,
}

impl ChainReport {
    /// 调用或解析失败：记为第一层硬失败
    pub fn rejected(kind: FailureKind, message: impl Into<String>) -> Self {
        let mut outcome = ValidationOutcome::new(Layer::Structural);
        outcome.fail(message);
        Self {
            outcomes: vec![outcome.with_score(0.0)],
            review: None,
            failure: Some(kind),
        }
    }

    pub fn outcome(&self, layer: Layer) -> Option<&ValidationOutcome> {
        self.outcomes.iter().find(|o| o.layer == layer)
    }

    /// 跳过的层按 0 分计
    pub fn layer_score(&self, layer: Layer) -> f64 {
        self.outcome(layer).map(|o| o.score_or_zero()).unwrap_or(0.0)
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn holistic_score(&self) -> Option<f64> {
        self.review.as_ref().map(HolisticReview::overall)
    }

    pub fn improved_prompt(&self) -> Option<&str> {
        self.review
            .as_ref()
            .and_then(|r| r.improved_prompt.as_deref())
    }
}

fn failure_kind_for(layer: Layer) -> FailureKind {
    match layer {
        Layer::Structural => FailureKind::Structural,
        Layer::Content => FailureKind::Content,
        Layer::Domain | Layer::Holistic => FailureKind::Domain,
    }
}

/// 有序校验链
pub struct ValidatorChain {
    layers: Vec<Box<dyn LayerValidator>>,
    holistic: Option<HolisticValidator>,
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorChain {
    /// 标准三层，不带整体评估
    pub fn new() -> Self {
        Self {
            layers: vec![
                Box::new(StructuralValidator),
                Box::new(ContentValidator),
                Box::new(DomainValidator),
            ],
            holistic: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn QualityEvaluator>) -> Self {
        self.holistic = Some(HolisticValidator::new(evaluator));
        self
    }

    pub async fn run(&self, item: &CandidateItem, ctx: &ValidationContext) -> ChainReport {
        let mut outcomes = Vec::with_capacity(4);
        let mut failure = None;

        for validator in &self.layers {
            let outcome = validator.validate(item, ctx);
            if !outcome.pass && failure.is_none() {
                failure = Some(failure_kind_for(outcome.layer));
            }
            outcomes.push(outcome);
            // 第一层失败后第二层照常执行，之后短路
            if failure.is_some() && validator.layer() >= Layer::Content {
                break;
            }
        }

        let mut review = None;
        if failure.is_none() {
            if let Some(holistic) = &self.holistic {
                let (outcome, result) = holistic.review(item, ctx).await;
                outcomes.push(outcome);
                review = result;
            }
        }

        ChainReport {
            outcomes,
            review,
            failure,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const SAMPLE_PASSAGE: &str = "Many people believe that creativity is a rare gift given to only a few. \
However, research suggests that creative thinking is a skill which anyone can develop with practice. \
When children play freely, they often invent new rules and explore their surroundings without fear. \
Adults, on the other hand, tend to avoid risks because they worry about making mistakes. \
This fear slowly limits their willingness to try unfamiliar approaches at work and at home. \
Psychologists recommend setting aside time for activities that have no fixed outcome. \
Drawing, writing, or simply taking a walk while thinking can open the mind to fresh ideas. \
Teams that welcome unusual suggestions also solve problems faster than teams that punish failure. \
In the end, creativity grows when people feel safe enough to experiment. \
It is less about talent and more about the habits we choose every day.";

    pub(crate) fn valid_item() -> CandidateItem {
        CandidateItem {
            question: "What is the main idea of the passage?".to_string(),
            options: vec![
                "Creativity is an inborn talent.".to_string(),
                "Children are more talented than adults.".to_string(),
                "Creativity can be developed through practice.".to_string(),
                "Teams should punish failure.".to_string(),
                "Walking is the best way to relax.".to_string(),
            ],
            answer: Some("3".to_string()),
            explanation: Some("The passage argues that creative thinking is a learnable skill.".to_string()),
            passage: Some(SAMPLE_PASSAGE.to_string()),
            gapped_passage: None,
        }
    }

    pub(crate) fn context(item_no: u32) -> ValidationContext {
        ValidationContext::new(ItemNo::Single(item_no))
            .with_passage(Some(SAMPLE_PASSAGE.to_string()))
            .with_prompt("test prompt")
    }

    struct CountingEvaluator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEvaluator {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl QualityEvaluator for CountingEvaluator {
        async fn evaluate(
            &self,
            _item: &CandidateItem,
            _prompt: &str,
            _kind: ItemKind,
        ) -> Result<HolisticReview, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::config("evaluator offline"));
            }
            Ok(HolisticReview {
                clarity: 9.0,
                completeness: 9.0,
                consistency: 9.0,
                specificity: 8.0,
                domain_appropriateness: 10.0,
                weaknesses: vec!["distractor 5 is off-topic".to_string()],
                improved_prompt: Some("Keep every distractor on topic.".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_clean_item_runs_all_four_layers() {
        let evaluator = CountingEvaluator::new(false);
        let chain = ValidatorChain::new().with_evaluator(evaluator.clone());
        let report = chain.run(&valid_item(), &context(20)).await;

        let layers: Vec<Layer> = report.outcomes.iter().map(|o| o.layer).collect();
        assert_eq!(
            layers,
            vec![Layer::Structural, Layer::Content, Layer::Domain, Layer::Holistic]
        );
        assert!(report.passed());
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.holistic_score(), Some(9.0));
        assert_eq!(report.improved_prompt(), Some("Keep every distractor on topic."));
    }

    #[tokio::test]
    async fn test_layer1_failure_short_circuits_3_and_4() {
        let evaluator = CountingEvaluator::new(false);
        let chain = ValidatorChain::new().with_evaluator(evaluator.clone());
        let mut item = valid_item();
        item.options.pop();

        let report = chain.run(&item, &context(20)).await;
        let layers: Vec<Layer> = report.outcomes.iter().map(|o| o.layer).collect();
        assert_eq!(layers, vec![Layer::Structural, Layer::Content]);
        assert_eq!(report.failure, Some(FailureKind::Structural));
        assert_eq!(report.layer_score(Layer::Domain), 0.0);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_layer2_failure_skips_domain() {
        let chain = ValidatorChain::new();
        let mut item = valid_item();
        item.options[1] = item.options[0].clone();

        let report = chain.run(&item, &context(20)).await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failure, Some(FailureKind::Content));
    }

    #[tokio::test]
    async fn test_layer3_failure_skips_holistic() {
        let evaluator = CountingEvaluator::new(false);
        let chain = ValidatorChain::new().with_evaluator(evaluator.clone());

        let report = chain.run(&valid_item(), &context(29)).await;
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failure, Some(FailureKind::Domain));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_evaluator_error_never_blocks() {
        let chain = ValidatorChain::new().with_evaluator(CountingEvaluator::new(true));
        let report = chain.run(&valid_item(), &context(20)).await;

        assert!(report.passed());
        let holistic = report.outcome(Layer::Holistic).unwrap();
        assert!(holistic.pass);
        assert_eq!(holistic.warning_count(), 1);
        assert_eq!(report.holistic_score(), None);
    }

    #[test]
    fn test_rejected_report_is_layer1_failure() {
        let report = ChainReport::rejected(FailureKind::Parse, "no json");
        assert!(!report.passed());
        assert_eq!(report.failure, Some(FailureKind::Parse));
        assert_eq!(report.outcomes[0].layer, Layer::Structural);
        assert!(!report.outcomes[0].pass);
    }
}
