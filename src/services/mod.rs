pub mod chart_store;
pub mod llm_service;
pub mod prompt_composer;
pub mod quality_evaluator;
pub mod record_writer;
pub mod response_parser;

pub use chart_store::{ChartStore, InMemoryChartStore};
pub use llm_service::{LlmClient, LlmService};
pub use prompt_composer::{PromptCatalog, PromptComposer, PromptExtra, TemplatePromptComposer};
pub use quality_evaluator::{LlmQualityEvaluator, QualityEvaluator};
pub use record_writer::{InMemoryRecordStore, JsonlRecordWriter, RecordStore};
pub use response_parser::{JsonResponseParser, ResponseParser};
