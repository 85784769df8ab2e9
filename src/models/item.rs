use serde::{Deserialize, Serialize};
use std::fmt;

/// 模型生成、尚未校验的候选题目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    #[serde(default)]
    pub question: String,
    /// 选项有序，答案按 1 开始的下标引用
    #[serde(default)]
    pub options: Vec<String>,
    /// 原始答案值，模型可能返回字符串或数字
    #[serde(default, deserialize_with = "deserialize_answer")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gapped_passage: Option<String>,
}

impl CandidateItem {
    /// 答案解析为整数（不做范围检查）
    pub fn answer_index(&self) -> Option<i64> {
        self.answer
            .as_deref()
            .map(str::trim)
            .and_then(|a| a.parse::<i64>().ok())
    }

    /// 答案是否落在 [1, 选项数] 内
    pub fn answer_in_range(&self) -> bool {
        match self.answer_index() {
            Some(idx) => idx >= 1 && idx <= 5 && (idx as usize) <= self.options.len(),
            None => false,
        }
    }

    pub fn empty_option_count(&self) -> usize {
        self.options.iter().filter(|o| o.trim().is_empty()).count()
    }

    /// 预览用的题干
    pub fn question_preview(&self, max_len: usize) -> String {
        crate::utils::logging::truncate_text(&self.question, max_len)
    }
}

impl fmt::Display for CandidateItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [选项 {} 个, 答案 {:?}]",
            self.question_preview(80),
            self.options.len(),
            self.answer
        )
    }
}

// 答案既可能是 "3" 也可能是 3
fn deserialize_answer<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct AnswerVisitor;

    impl<'de> Visitor<'de> for AnswerVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer answer")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(AnswerVisitor)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }
    }

    deserializer.deserialize_any(AnswerVisitor)
}
