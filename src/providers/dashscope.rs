//! 阿里云 DashScope 适配器（OpenAI 兼容模式）

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ProviderError;

use super::TEMPERATURE;

const API_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

fn build_request<'a>(model: &'a str, system: &'a str, user: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        temperature: TEMPERATURE,
    }
}

/// 聊天补全
pub async fn chat(
    client: &Client,
    settings: &Settings,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, ProviderError> {
    if settings.dashscope_api_key.is_empty() {
        return Err(ProviderError::MissingApiKey("DashScope"));
    }

    let request = build_request(&settings.dashscope_model, system_prompt, user_prompt);
    let response = client
        .post(API_URL)
        .bearer_auth(&settings.dashscope_api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::DashScope {
            status: status.as_u16(),
            body,
        });
    }

    let data: ChatResponse = response.json().await?;
    data.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(ProviderError::MissingContent)
}
