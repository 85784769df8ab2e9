//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型拿到原始文本"，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务）
//!
//! 网络抖动在这里内部重试，对编排层不可见；重试仍失败才返回 `ProviderError`，
//! 由编排层计入一次失败尝试。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProviderError;

/// LLM 客户端契约：`complete(prompt, temperature) → rawText`
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;
}

const SYSTEM_MESSAGE: &str = "You are an item writer for the Korean CSAT English exam. \
Follow the instructions exactly and respond ONLY with one strict JSON object.";

/// 基于 async-openai 的 LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    transport_retries: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            transport_retries: config.llm_transport_retries,
        }
    }

    /// 通用的 LLM 调用函数（单次，不重试）
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `temperature`: 采样温度
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| self.provider_error(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.provider_error(e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(2048u32)
            .build()
            .map_err(|e| self.provider_error(e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            self.provider_error(e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::new(&self.model_name, "LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    fn provider_error(&self, e: impl std::fmt::Display) -> ProviderError {
        ProviderError::new(&self.model_name, e.to_string())
    }
}

#[async_trait]
impl LlmClient for LlmService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        let mut last_error = None;
        for transport_attempt in 0..=self.transport_retries {
            if transport_attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(transport_attempt - 1));
                debug!("LLM 网络重试 {} 次，等待 {:?}", transport_attempt, backoff);
                tokio::time::sleep(backoff).await;
            }
            match self
                .send_to_llm(prompt, Some(SYSTEM_MESSAGE), temperature)
                .await
            {
                Ok(content) => return Ok(content),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| ProviderError::new(&self.model_name, "LLM 调用失败")))
    }
}
