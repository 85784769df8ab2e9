//! 批量生成任务文件（TOML）
//!
//! ```toml
//! name = "2026 모의고사 A"
//!
//! [[requests]]
//! id = "a-31"
//! item_no = 31
//! level = "중상"
//!
//! [[sets]]
//! id = "a-41"
//! profile = "41:중,42:중상"
//! members = [
//!     { id = "a-41-1", item_no = 41 },
//!     { id = "a-41-2", item_no = 42 },
//! ]
//! ```

use serde::Deserialize;

use crate::models::item_set::{ItemSet, Profile};
use crate::models::level::Level;
use crate::models::request::{ItemNo, Request};

/// 单个请求的描述
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    pub id: String,
    pub item_no: ItemNo,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub chart_id: Option<String>,
}

impl RequestSpec {
    pub fn into_request(self) -> Request {
        let mut request = Request::new(self.id, self.item_no, self.level)
            .with_passage(self.passage)
            .with_extra(self.extra);
        request.chart_id = self.chart_id;
        request
    }
}

/// 套题描述
#[derive(Debug, Clone, Deserialize)]
pub struct SetSpec {
    pub id: String,
    #[serde(default)]
    pub passage: String,
    /// 紧凑格式 `"41:중,42:중상"`
    #[serde(default)]
    pub profile: String,
    pub members: Vec<RequestSpec>,
}

impl SetSpec {
    /// 展开成套题 + 成员请求，成员共享 set_id
    pub fn into_parts(self) -> (ItemSet, Vec<Request>) {
        let members: Vec<Request> = self
            .members
            .into_iter()
            .map(|m| m.into_request().with_set_id(self.id.clone()))
            .collect();
        let set = ItemSet::new(
            self.id,
            members.iter().map(|m| m.id.clone()).collect(),
        )
        .with_passage(self.passage)
        .with_profile(Profile::parse(&self.profile));
        (set, members)
    }
}

/// 一个任务文件
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationJob {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
    #[serde(default)]
    pub sets: Vec<SetSpec>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl GenerationJob {
    pub fn item_count(&self) -> usize {
        self.requests.len() + self.sets.iter().map(|s| s.members.len()).sum::<usize>()
    }
}
