/// LLM 客户端
///
/// 基于 `async-openai`，兼容 OpenAI API 的服务（OpenRouter、AIPipe 等）都可以通过
/// 自定义 `api_base` 使用。
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SolveError;
use crate::infrastructure::SolvingStrategy;
use crate::utils::logging::truncate_text;

const SYSTEM_MESSAGE: &str = "You are a helpful data analysis assistant. You analyze data, perform calculations, and provide answers in the exact format requested.";

/// LLM 客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: config.timeouts().solve,
        }
    }

    /// 发送聊天请求
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn chat(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, SolveError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let build_error = |e: async_openai::error::OpenAIError| {
            SolveError::api_call_failed(&self.model_name, e)
        };

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(build_error)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(build_error)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(build_error)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| SolveError::Timeout {
                model: self.model_name.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                build_error(e)
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| SolveError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("LLM 响应: {}", truncate_text(&content, 200));

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl SolvingStrategy for LlmClient {
    async fn solve(&self, prompt: &str) -> Result<String, SolveError> {
        self.chat(prompt, Some(SYSTEM_MESSAGE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 LLM API 连接性，需要配置 LLM_API_KEY
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_llm_connectivity -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_llm_connectivity() {
        let _ = tracing_subscriber::fmt::try_init();

        let client = LlmClient::new(&Config::from_env());
        let response = client
            .solve("Question: What is 2+2?\n\nIf the answer is a number, return just the number.")
            .await
            .unwrap();

        println!("LLM 响应: {}", response);
        assert!(response.contains('4'));
    }
}
