//! Ollama 本地推理服务适配器
//! `/api/chat` 出题，`/api/tags` 查询可用模型。

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ProviderError;
use crate::message::ApiStatus;

use super::TEMPERATURE;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// 构造 /api/chat 请求体
fn build_chat_request<'a>(model: &'a str, system: &'a str, user: &'a str) -> ChatRequest<'a> {
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
        stream: false,
        options: ChatOptions {
            temperature: TEMPERATURE,
            num_ctx: 4096,
        },
    }
}

/// 聊天补全
pub async fn chat(
    client: &Client,
    settings: &Settings,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}/api/chat", settings.ollama_base_url);
    let request = build_chat_request(&settings.ollama_model, system_prompt, user_prompt);

    let response = client.post(&url).json(&request).send().await?;

    if !response.status().is_success() {
        // 403 几乎总是 OLLAMA_ORIGINS 未放行，要给出可操作的提示
        if response.status().as_u16() == 403 {
            return Err(ProviderError::OllamaForbidden);
        }
        return Err(ProviderError::OllamaStatus(response.status().as_u16()));
    }

    let data: ChatResponse = response.json().await?;
    Ok(data.message.content)
}

/// 状态检查：服务可达 + 目标模型已下载
pub async fn check_status(client: &Client, settings: &Settings) -> ApiStatus {
    let url = format!("{}/api/tags", settings.ollama_base_url);

    let response = match client.get(&url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(_) | Err(_) => {
            return ApiStatus {
                success: false,
                model_exists: None,
                available_models: None,
                provider: "ollama".to_string(),
                error: Some(ProviderError::OllamaUnreachable.to_string()),
            };
        }
    };

    let data: TagsResponse = match response.json().await {
        Ok(d) => d,
        Err(e) => {
            return ApiStatus {
                success: false,
                model_exists: None,
                available_models: None,
                provider: "ollama".to_string(),
                error: Some(e.to_string()),
            };
        }
    };

    let available: Vec<String> = data.models.into_iter().map(|m| m.name).collect();
    let model_exists = available
        .iter()
        .any(|name| name.starts_with(&settings.ollama_model));

    ApiStatus {
        success: true,
        model_exists: Some(model_exists),
        available_models: Some(available),
        provider: "ollama".to_string(),
        error: None,
    }
}
