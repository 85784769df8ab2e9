//! 套题与难度配置（Profile）

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::level::Level;
use crate::models::request::RequestId;

/// 套题内各题的难度配置：题号（字符串） → 难度标签
///
/// 使用 `BTreeMap` 保证渲染到 prompt 时顺序稳定。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub BTreeMap<String, String>);

impl Profile {
    /// 解析紧凑格式 `"41:중,42:중상"`
    ///
    /// 格式不对的片段（分割数量不为 2、键或值为空）直接丢弃，不报错。
    pub fn parse(raw: &str) -> Self {
        let mut map = BTreeMap::new();
        for segment in raw.split(',') {
            let parts: Vec<&str> = segment.split(':').collect();
            if parts.len() != 2 {
                if !segment.trim().is_empty() {
                    debug!("丢弃格式错误的 profile 片段: '{}'", segment);
                }
                continue;
            }
            let key = parts[0].trim();
            let value = parts[1].trim();
            if key.is_empty() || value.is_empty() {
                debug!("丢弃格式错误的 profile 片段: '{}'", segment);
                continue;
            }
            map.insert(key.to_string(), value.to_string());
        }
        Profile(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, item_no: &str) -> Option<&str> {
        self.0.get(item_no).map(String::as_str)
    }

    /// 查找某题的难度，标签无法识别时返回 None
    pub fn level_for(&self, item_no: &str) -> Option<Level> {
        self.get(item_no).and_then(Level::from_label)
    }

    /// 还原成紧凑格式
    pub fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// 套题：共享同一篇地文的一组请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSet {
    pub id: String,
    /// 共享地文，空表示需要先生成
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub profile: Profile,
    pub members: Vec<RequestId>,
}

impl ItemSet {
    pub fn new(id: impl Into<String>, members: Vec<RequestId>) -> Self {
        Self {
            id: id.into(),
            passage: String::new(),
            profile: Profile::default(),
            members,
        }
    }

    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = passage.into();
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn has_passage(&self) -> bool {
        !self.passage.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse() {
        let p = Profile::parse("41:중,42:중상");
        assert_eq!(p.get("41"), Some("중"));
        assert_eq!(p.get("42"), Some("중상"));
        assert_eq!(p.0.len(), 2);
    }

    #[test]
    fn test_profile_parse_drops_malformed() {
        let p = Profile::parse("41:중,,bad:");
        assert_eq!(p.0.len(), 1);
        assert_eq!(p.get("41"), Some("중"));

        let p = Profile::parse("a:b:c, :x,43:상");
        assert_eq!(p.0.len(), 1);
        assert_eq!(p.level_for("43"), Some(Level::High));
        assert!(Profile::parse("").is_empty());
    }

    #[test]
    fn test_profile_compact_is_sorted() {
        let p = Profile::parse("45:상,43:중,44:중상");
        assert_eq!(p.to_compact(), "43:중,44:중상,45:상");
    }
}
