//! Prompt 组装 - 业务能力层
//!
//! 每个题号默认使用哪个模板由 `PromptCatalog` 显式记录，组装器持有它，
//! 流水线核心不保存任何全局"当前默认 prompt"。相同输入 + 相同模板版本必须得到相同文本。

use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::models::item_kind::ItemKind;
use crate::models::item_set::Profile;
use crate::models::level::Level;
use crate::models::request::ItemNo;

/// 传给组装器的附加信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptExtra {
    /// 用户附加指令
    pub instructions: String,
    /// 已确定的地文（用户提供 / 两步生成确认 / 套题共享）
    pub passage: Option<String>,
}

/// 组装器契约
pub trait PromptComposer: Send + Sync {
    /// 该题号使用的 prompt key，反馈环按它聚合
    fn prompt_key(&self, item_no: ItemNo) -> String;

    /// `compose(itemNo, level, extra, setProfile) → promptText`
    fn compose(
        &self,
        item_no: ItemNo,
        level: Level,
        extra: &PromptExtra,
        profile: Option<&Profile>,
    ) -> PipelineResult<String>;

    /// 生成地文用的 prompt（两步生成 / 套题共享地文）
    fn compose_passage(
        &self,
        item_no: ItemNo,
        level: Level,
        extra: &PromptExtra,
    ) -> PipelineResult<String>;
}

const DEFAULT_KEY: &str = "default";

const DEFAULT_ITEM_TEMPLATE: &str = r#"Write CSAT English item #{item_no} (type: {item_kind}) at difficulty {level}.
Difficulty profile for the set: {profile}
Additional instructions: {instructions}

Passage to use (write a new one if empty):
{passage}

Return ONLY a JSON object with the fields:
"question" (string), "options" (array of exactly 5 strings), "answer" (1-5),
"explanation" (string), "passage" (string), "gapped_passage" (string, blank items only)."#;

const DEFAULT_PASSAGE_TEMPLATE: &str = r#"Write an English reading passage for CSAT item #{item_no} (type: {item_kind}) at difficulty {level}.
Additional instructions: {instructions}
Return ONLY a JSON object: {"passage": "..."}"#;

/// 模板目录（可从 TOML 加载）
///
/// ```toml
/// version = "2026-03"
/// passage_template = "..."
///
/// [templates]
/// default = "..."
/// grammar_v2 = "..."
///
/// [defaults]
/// "29" = "grammar_v2"
/// blank = "blank_v1"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PromptCatalog {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    /// 题号或题型名 → 模板 key
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default = "default_passage_template")]
    pub passage_template: String,
}

fn default_version() -> String {
    "builtin".to_string()
}

fn default_passage_template() -> String {
    DEFAULT_PASSAGE_TEMPLATE.to_string()
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(DEFAULT_KEY.to_string(), DEFAULT_ITEM_TEMPLATE.to_string());
        Self {
            version: default_version(),
            templates,
            defaults: BTreeMap::new(),
            passage_template: default_passage_template(),
        }
    }
}

impl PromptCatalog {
    /// 从 TOML 文件加载；没有 default 模板时补上内置模板
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("无法读取模板文件 {}: {}", path.display(), e))
        })?;
        let mut catalog: PromptCatalog = toml::from_str(&content).map_err(|e| {
            PipelineError::config(format!("无法解析模板文件 {}: {}", path.display(), e))
        })?;
        catalog
            .templates
            .entry(DEFAULT_KEY.to_string())
            .or_insert_with(|| DEFAULT_ITEM_TEMPLATE.to_string());
        Ok(catalog)
    }

    /// 设置某题号的默认模板
    pub fn set_default(&mut self, item_no: impl Into<String>, key: impl Into<String>) {
        self.defaults.insert(item_no.into(), key.into());
    }

    /// 题号优先，其次题型名，最后 default
    pub fn key_for(&self, item_no: ItemNo) -> String {
        let kind = ItemKind::from_item_no(item_no.primary());
        self.defaults
            .get(&item_no.to_string())
            .or_else(|| self.defaults.get(&item_no.primary().to_string()))
            .or_else(|| self.defaults.get(kind.name()))
            .cloned()
            .unwrap_or_else(|| DEFAULT_KEY.to_string())
    }
}

/// 基于模板目录的组装器
#[derive(Debug, Clone, Default)]
pub struct TemplatePromptComposer {
    catalog: PromptCatalog,
}

impl TemplatePromptComposer {
    pub fn new(catalog: PromptCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PromptCatalog {
        &self.catalog
    }
}

impl PromptComposer for TemplatePromptComposer {
    fn prompt_key(&self, item_no: ItemNo) -> String {
        format!("{}@{}", self.catalog.key_for(item_no), self.catalog.version)
    }

    fn compose(
        &self,
        item_no: ItemNo,
        level: Level,
        extra: &PromptExtra,
        profile: Option<&Profile>,
    ) -> PipelineResult<String> {
        let key = self.catalog.key_for(item_no);
        let template = self.catalog.templates.get(&key).ok_or_else(|| {
            PipelineError::config(format!("模板不存在: {} (题号 {})", key, item_no))
        })?;

        let kind = ItemKind::from_item_no(item_no.primary());
        let item_no_str = item_no.to_string();
        let profile_str = profile
            .filter(|p| !p.is_empty())
            .map(Profile::to_compact)
            .unwrap_or_else(|| "-".to_string());

        Ok(fill_template(
            template,
            &[
                ("item_no", &item_no_str),
                ("item_kind", kind.name()),
                ("level", level.label()),
                ("instructions", extra.instructions.trim()),
                ("passage", extra.passage.as_deref().unwrap_or("").trim()),
                ("profile", &profile_str),
            ],
        ))
    }

    fn compose_passage(
        &self,
        item_no: ItemNo,
        level: Level,
        extra: &PromptExtra,
    ) -> PipelineResult<String> {
        let kind = ItemKind::from_item_no(item_no.primary());
        let item_no_str = item_no.to_string();
        Ok(fill_template(
            &self.catalog.passage_template,
            &[
                ("item_no", &item_no_str),
                ("item_kind", kind.name()),
                ("level", level.label()),
                ("instructions", extra.instructions.trim()),
            ],
        ))
    }
}

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_]+)\}";

/// `{key}` 占位符替换，只扫描模板一遍；替换进来的值不会再被展开，未知占位符原样保留
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
    let Ok(re) = Regex::new(PLACEHOLDER_PATTERN) else {
        return tpl.to_string();
    };
    re.replace_all(tpl, |caps: &Captures| {
        let key = &caps[1];
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
