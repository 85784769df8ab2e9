//! 模型输出解析 - 业务能力层
//!
//! 从原始文本中定位 `{...}` 并反序列化。解析失败在编排层按第一层硬失败处理。

use serde::de::DeserializeOwned;

use crate::error::ParseError;
use crate::models::item::CandidateItem;
use crate::utils::truncate_text;

/// 解析器契约：`parse(rawText) → CandidateItem`
pub trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<CandidateItem, ParseError>;
}

/// 默认实现：取第一个 `{` 到最后一个 `}` 之间的内容
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
    fn parse(&self, raw: &str) -> Result<CandidateItem, ParseError> {
        parse_json_object(raw)
    }
}

/// 定位 JSON 对象片段
pub fn locate_json_object(raw: &str) -> Result<&str, ParseError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(ParseError::NoJsonObject {
            preview: truncate_text(raw.trim(), 60),
        }),
    }
}

/// 定位并反序列化成任意类型
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let fragment = locate_json_object(raw)?;
    serde_json::from_str(fragment).map_err(|e| ParseError::InvalidJson {
        message: e.to_string(),
    })
}
