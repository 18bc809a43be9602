//! 消息信封
//! 前台脚本与后台服务之间的类型化消息。封闭的消息集合用带标签的
//! 和类型表达，分发处用穷举匹配，取代字符串分支。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cloze::ClozeItem;

/// 待出题段落（只携带 id 与文本，不携带节点引用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphInput {
    pub id: String,
    pub text: String,
}

/// 待补全解析的题目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// 控件 id
    pub id: String,
    pub target: String,
    pub answer: String,
}

/// 日志级别（LOG 消息转发用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

/// 发往后台服务的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "CHECK_API_STATUS")]
    CheckApiStatus { model: String },

    #[serde(rename = "GENERATE_CLOZE_BATCH")]
    GenerateClozeBatch { paragraphs: Vec<ParagraphInput> },

    #[serde(rename = "GENERATE_CLOZE_ANALYSIS_BATCH")]
    GenerateClozeAnalysisBatch { items: Vec<AnalysisInput> },

    #[serde(rename = "LOG")]
    Log { level: LogLevel, message: String },

    #[serde(rename = "TOGGLE_PANEL")]
    TogglePanel,
}

/// API 状态检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_models: Option<Vec<String>>,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 一个段落的出题结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParagraphClozes {
    pub clozes: Vec<ClozeItem>,
}

/// 批量出题响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClozeBatchResult {
    pub success: bool,
    #[serde(default)]
    pub data: BTreeMap<String, ParagraphClozes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 一条补全的解析
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub id: String,
    pub analysis: String,
}

/// 批量补全解析响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBatchResult {
    pub success: bool,
    #[serde(default)]
    pub items: Vec<AnalysisItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 后台服务的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "API_STATUS")]
    ApiStatus(ApiStatus),

    #[serde(rename = "CLOZE_BATCH")]
    ClozeBatch(ClozeBatchResult),

    #[serde(rename = "CLOZE_ANALYSIS_BATCH")]
    AnalysisBatch(AnalysisBatchResult),

    #[serde(rename = "ACK")]
    Ack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = Request::GenerateClozeBatch {
            paragraphs: vec![ParagraphInput {
                id: "cr-p-0".to_string(),
                text: "正文".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "GENERATE_CLOZE_BATCH");
        assert_eq!(json["paragraphs"][0]["id"], "cr-p-0");
    }

    #[test]
    fn test_request_roundtrip() {
        let raw = r#"{"type":"CHECK_API_STATUS","model":"qwen2.5:7b"}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        match request {
            Request::CheckApiStatus { ref model } => assert_eq!(model, "qwen2.5:7b"),
            other => panic!("解析到错误的消息类型: {:?}", other),
        }
    }

    #[test]
    fn test_log_message_levels() {
        let raw = r#"{"type":"LOG","level":"warn","message":"注意"}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            request,
            Request::Log {
                level: LogLevel::Warn,
                ..
            }
        ));
    }

    #[test]
    fn test_response_wire_format() {
        let response = Response::ApiStatus(ApiStatus {
            success: true,
            model_exists: Some(true),
            available_models: Some(vec!["qwen2.5:7b".to_string()]),
            provider: "ollama".to_string(),
            error: None,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "API_STATUS");
        assert_eq!(json["success"], true);
        // None 的字段不应出现在线格式里
        assert!(json.get("error").is_none());
    }
}
