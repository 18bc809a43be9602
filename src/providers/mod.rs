//! Provider 适配层
//! 三家 LLM 服务的 HTTP 适配器。对上层只暴露一个不透明的文本结果，
//! 解析层不感知具体提供者。

pub mod dashscope;
pub mod google;
pub mod ollama;

use reqwest::Client;

use crate::config::{ProviderKind, Settings};
use crate::error::ProviderError;
use crate::message::ApiStatus;

/// 生成温度，三家统一
pub const TEMPERATURE: f32 = 0.2;

/// 调用当前配置的提供者，返回原始模型文本
pub async fn generate(
    client: &Client,
    settings: &Settings,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, ProviderError> {
    match settings.provider {
        ProviderKind::Ollama => ollama::chat(client, settings, system_prompt, user_prompt).await,
        ProviderKind::Dashscope => {
            dashscope::chat(client, settings, system_prompt, user_prompt).await
        }
        ProviderKind::Google => google::generate(client, settings, system_prompt, user_prompt).await,
    }
}

/// 检查当前提供者是否可用。本函数不报错：
/// 一切失败都折叠进 `ApiStatus { success: false, error }`。
pub async fn check_status(client: &Client, settings: &Settings) -> ApiStatus {
    match settings.provider {
        ProviderKind::Ollama => ollama::check_status(client, settings).await,
        ProviderKind::Dashscope => {
            if settings.dashscope_api_key.is_empty() {
                ApiStatus {
                    success: false,
                    model_exists: None,
                    available_models: None,
                    provider: "dashscope".to_string(),
                    error: Some("未配置 DashScope API Key".to_string()),
                }
            } else {
                ApiStatus {
                    success: true,
                    model_exists: Some(true),
                    available_models: None,
                    provider: "dashscope".to_string(),
                    error: None,
                }
            }
        }
        ProviderKind::Google => {
            if settings.google_api_key.is_empty() {
                ApiStatus {
                    success: false,
                    model_exists: None,
                    available_models: None,
                    provider: "google".to_string(),
                    error: Some("未配置 Google AI Studio API Key".to_string()),
                }
            } else {
                ApiStatus {
                    success: true,
                    model_exists: Some(true),
                    available_models: None,
                    provider: "google".to_string(),
                    error: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_status_requires_api_key() {
        let client = Client::new();
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Dashscope;
        let status = check_status(&client, &settings).await;
        assert!(!status.success);
        assert!(status.error.unwrap().contains("API Key"));

        settings.dashscope_api_key = "sk-test".to_string();
        let status = check_status(&client, &settings).await;
        assert!(status.success);
        assert_eq!(status.model_exists, Some(true));
    }

    #[tokio::test]
    async fn test_check_status_google_key() {
        let client = Client::new();
        let mut settings = Settings::default();
        settings.provider = ProviderKind::Google;
        settings.google_api_key = "key".to_string();
        let status = check_status(&client, &settings).await;
        assert!(status.success);
        assert_eq!(status.provider, "google");
    }
}
