//! 生成请求数据结构
//!
//! 一个 `Request` 就是一道题的生成任务，状态只允许由生命周期管理器修改。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::level::Level;

/// 请求 ID（不透明标识）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 题号：单题（如 `29`）或套题区间（如 `41-42`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemNo {
    Single(u32),
    Range(u32, u32),
}

impl ItemNo {
    /// 区间题号取首题，用于类型判断
    pub fn primary(self) -> u32 {
        match self {
            ItemNo::Single(n) => n,
            ItemNo::Range(start, _) => start,
        }
    }
}

impl fmt::Display for ItemNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemNo::Single(n) => write!(f, "{}", n),
            ItemNo::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

impl FromStr for ItemNo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("无法解析题号区间: {}", s))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("无法解析题号区间: {}", s))?;
                if start > end {
                    return Err(format!("题号区间起点大于终点: {}", s));
                }
                Ok(ItemNo::Range(start, end))
            }
            None => s
                .parse()
                .map(ItemNo::Single)
                .map_err(|_| format!("无法解析题号: {}", s)),
        }
    }
}

impl Serialize for ItemNo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

// 题号既可以写成整数也可以写成字符串
impl<'de> Deserialize<'de> for ItemNo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ItemNoVisitor;

        impl<'de> Visitor<'de> for ItemNoVisitor {
            type Value = ItemNo;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an item number such as 29 or a range tag such as \"41-42\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(E::custom)
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u32::try_from(value)
                    .map(ItemNo::Single)
                    .map_err(|_| E::custom(format!("题号超出范围: {}", value)))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u32::try_from(value)
                    .map(ItemNo::Single)
                    .map_err(|_| E::custom(format!("题号超出范围: {}", value)))
            }
        }

        deserializer.deserialize_any(ItemNoVisitor)
    }
}

/// 请求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    PassageReady,
    Running,
    Ok,
    Fail,
}

impl RequestStatus {
    /// 状态迁移表
    ///
    /// - `PENDING → PASSAGE_READY | RUNNING`
    /// - `PASSAGE_READY → RUNNING`（确认地文）
    /// - `RUNNING → OK | FAIL`
    /// - `OK | FAIL → RUNNING`（重新生成）
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, PassageReady)
                | (Pending, Running)
                | (PassageReady, Running)
                | (Running, Ok)
                | (Running, Fail)
                | (Ok, Running)
                | (Fail, Running)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::PassageReady => "PASSAGE_READY",
            RequestStatus::Running => "RUNNING",
            RequestStatus::Ok => "OK",
            RequestStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub item_no: ItemNo,
    pub level: Level,
    /// 用户提供的地文，空字符串表示需要生成
    #[serde(default)]
    pub passage: String,
    /// 两步生成时由模型起草、可人工修改的地文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_passage: Option<String>,
    /// 附加指令，原样交给 prompt 组装器
    #[serde(default)]
    pub extra: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
    pub status: RequestStatus,
    /// 进入 RUNNING 的次数，用于区分重新生成后的产出
    #[serde(default)]
    pub generation: u32,
}

impl Request {
    /// 创建新请求，初始状态一律为 PENDING
    pub fn new(id: impl Into<String>, item_no: ItemNo, level: Level) -> Self {
        Self {
            id: RequestId::new(id),
            item_no,
            level,
            passage: String::new(),
            draft_passage: None,
            extra: String::new(),
            chart_id: None,
            set_id: None,
            status: RequestStatus::Pending,
            generation: 0,
        }
    }

    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = passage.into();
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    pub fn with_chart_id(mut self, chart_id: impl Into<String>) -> Self {
        self.chart_id = Some(chart_id.into());
        self
    }

    pub fn with_set_id(mut self, set_id: impl Into<String>) -> Self {
        self.set_id = Some(set_id.into());
        self
    }

    pub fn has_user_passage(&self) -> bool {
        !self.passage.trim().is_empty()
    }

    /// 生成时实际使用的地文：用户地文优先，其次是确认过的草稿
    pub fn effective_passage(&self) -> Option<&str> {
        if self.has_user_passage() {
            Some(self.passage.as_str())
        } else {
            self.draft_passage
                .as_deref()
                .filter(|p| !p.trim().is_empty())
        }
    }

    /// 图表数据键，默认使用题号
    pub fn chart_key(&self) -> String {
        self.chart_id
            .clone()
            .unwrap_or_else(|| self.item_no.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_no_parse() {
        assert_eq!("29".parse::<ItemNo>().unwrap(), ItemNo::Single(29));
        assert_eq!("41-42".parse::<ItemNo>().unwrap(), ItemNo::Range(41, 42));
        assert_eq!(" 43 - 45 ".parse::<ItemNo>().unwrap(), ItemNo::Range(43, 45));
        assert!("42-41".parse::<ItemNo>().is_err());
        assert!("abc".parse::<ItemNo>().is_err());
    }

    #[test]
    fn test_item_no_deserialize_int_or_string() {
        let a: ItemNo = serde_json::from_str("31").unwrap();
        let b: ItemNo = serde_json::from_str("\"41-42\"").unwrap();
        assert_eq!(a, ItemNo::Single(31));
        assert_eq!(b, ItemNo::Range(41, 42));
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"41-42\"");
    }

    #[test]
    fn test_transition_table() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(PassageReady));
        assert!(PassageReady.can_transition_to(Running));
        assert!(Fail.can_transition_to(Running));
        assert!(Ok.can_transition_to(Running));
        assert!(!Running.can_transition_to(PassageReady));
        assert!(!Running.can_transition_to(Running));
        assert!(!PassageReady.can_transition_to(Ok));
        assert!(!Ok.can_transition_to(PassageReady));
    }

    #[test]
    fn test_effective_passage() {
        let mut req = Request::new("r1", ItemNo::Single(31), Level::Mid);
        assert_eq!(req.effective_passage(), None);
        req.draft_passage = Some("draft".to_string());
        assert_eq!(req.effective_passage(), Some("draft"));
        let req = req.with_passage("user text");
        assert_eq!(req.effective_passage(), Some("user text"));
    }
}
