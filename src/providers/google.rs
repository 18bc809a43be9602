//! Google AI Studio (Gemini) 适配器
//! systemInstruction 单独下发，用户文本放 contents。

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ProviderError;

use super::TEMPERATURE;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

fn build_request(system: &str, user: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: user.to_string(),
            }],
        }],
        system_instruction: Content {
            parts: vec![Part {
                text: system.to_string(),
            }],
        },
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
        },
    }
}

/// 内容生成
pub async fn generate(
    client: &Client,
    settings: &Settings,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, ProviderError> {
    if settings.google_api_key.is_empty() {
        return Err(ProviderError::MissingApiKey("Google AI Studio"));
    }

    let url = format!(
        "{}/{}:generateContent?key={}",
        API_BASE, settings.google_model, settings.google_api_key
    );
    let request = build_request(system_prompt, user_prompt);
    let response = client.post(&url).json(&request).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Google {
            status: status.as_u16(),
            body,
        });
    }

    let data: GenerateResponse = response.json().await?;
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or(ProviderError::MissingContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = build_request("系统指令", "用户输入");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "用户输入");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "系统指令");
        assert!(
            (json["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"生成结果"}],"role":"model"}}]}"#;
        let data: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(data.candidates[0].content.parts[0].text, "生成结果");
    }
}
