pub mod item;
pub mod item_kind;
pub mod item_set;
pub mod job;
pub mod level;
pub mod loaders;
pub mod metrics;
pub mod outcome;
pub mod record;
pub mod request;

pub use item::CandidateItem;
pub use item_kind::ItemKind;
pub use item_set::{ItemSet, Profile};
pub use job::{GenerationJob, RequestSpec, SetSpec};
pub use level::Level;
pub use loaders::{load_all_job_files, load_job_file};
pub use metrics::{AlertLevel, Grade, Metrics, PromptPerformance, Recommendation};
pub use outcome::{FailureKind, Finding, HolisticReview, Layer, Severity, ValidationOutcome};
pub use record::{AttemptLog, MetricsRecord, Output, Record};
pub use request::{ItemNo, Request, RequestId, RequestStatus};
