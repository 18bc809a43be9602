//! 后台服务
//! 承接前台消息的特权端：状态检查、批量出题、解析补全。
//! 每次跨边界调用前先检查上下文有效性，失效即快速失败，
//! 不让底层错误裹着奇怪的面目冒出来。

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, warn};
use reqwest::Client;

use crate::cloze;
use crate::config::Settings;
use crate::error::ClozeError;
use crate::message::{
    AnalysisBatchResult, AnalysisInput, ApiStatus, ClozeBatchResult, LogLevel, ParagraphClozes,
    ParagraphInput, Request, Response,
};
use crate::prompt::ClozePrompt;
use crate::providers;

/// 后台服务。持有配置与共享 HTTP 客户端。
pub struct BackgroundService {
    settings: Settings,
    client: Client,
    invalidated: AtomicBool,
}

impl BackgroundService {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client: Client::new(),
            invalidated: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 标记上下文失效（宿主被重载/更新的等价物）
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    fn ensure_valid(&self) -> Result<(), ClozeError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(ClozeError::ContextInvalidated);
        }
        Ok(())
    }

    /// 检查当前提供者状态。连接失败折叠在返回值里，不抛错。
    pub async fn check_status(&self) -> Result<ApiStatus, ClozeError> {
        self.ensure_valid()?;
        Ok(providers::check_status(&self.client, &self.settings).await)
    }

    /// 批量出题。网络/提供者失败折叠为 `success: false`，
    /// 让调用方把这一批记为"完成、零成功"后继续。
    pub async fn generate_batch(
        &self,
        paragraphs: &[ParagraphInput],
    ) -> Result<ClozeBatchResult, ClozeError> {
        self.ensure_valid()?;

        let system = ClozePrompt::batch_system();
        let user = ClozePrompt::batch_user(paragraphs);
        debug!("[出题] 本批 {} 个段落", paragraphs.len());

        let raw = match providers::generate(&self.client, &self.settings, &system, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("[出题] 调用失败: {}", e);
                return Ok(ClozeBatchResult {
                    success: false,
                    data: Default::default(),
                    error: Some(e.to_string()),
                });
            }
        };

        let fallback_id = match paragraphs {
            [only] => Some(only.id.as_str()),
            _ => None,
        };
        let parsed = cloze::parse_response(&raw, fallback_id);

        let mut result = ClozeBatchResult {
            success: true,
            data: Default::default(),
            error: None,
        };
        for paragraph in paragraphs {
            let clozes = parsed.get(&paragraph.id).cloned().unwrap_or_default();
            result
                .data
                .insert(paragraph.id.clone(), ParagraphClozes { clozes });
        }
        Ok(result)
    }

    /// 批量补全解析。失败同样折叠，不影响已生成的题目。
    pub async fn generate_analysis_batch(
        &self,
        items: &[AnalysisInput],
    ) -> Result<AnalysisBatchResult, ClozeError> {
        self.ensure_valid()?;

        if items.is_empty() {
            return Ok(AnalysisBatchResult {
                success: true,
                items: Vec::new(),
                error: None,
            });
        }

        let system = ClozePrompt::analysis_system();
        let user = ClozePrompt::analysis_user(items);

        let raw = match providers::generate(&self.client, &self.settings, &system, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[解析补全] 调用失败: {}", e);
                return Ok(AnalysisBatchResult {
                    success: false,
                    items: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        };

        Ok(AnalysisBatchResult {
            success: true,
            items: parse_analysis_response(&raw),
            error: None,
        })
    }

    /// 消息分发入口：对封闭消息集穷举匹配
    pub async fn dispatch(&self, request: Request) -> Result<Response, ClozeError> {
        match request {
            Request::CheckApiStatus { model: _ } => {
                Ok(Response::ApiStatus(self.check_status().await?))
            }
            Request::GenerateClozeBatch { paragraphs } => {
                Ok(Response::ClozeBatch(self.generate_batch(&paragraphs).await?))
            }
            Request::GenerateClozeAnalysisBatch { items } => Ok(Response::AnalysisBatch(
                self.generate_analysis_batch(&items).await?,
            )),
            Request::Log { level, message } => {
                self.ensure_valid()?;
                match level {
                    LogLevel::Log => debug!("[前台] {}", message),
                    LogLevel::Warn => warn!("[前台] {}", message),
                    LogLevel::Error => error!("[前台] {}", message),
                }
                Ok(Response::Ack)
            }
            Request::TogglePanel => {
                // 无界面环境下只确认收到
                self.ensure_valid()?;
                Ok(Response::Ack)
            }
        }
    }
}

/// 解析补全响应：`{"items":[{"id","analysis"}]}`，
/// 复用出题解析的三段式容错策略之外的简化版本（失败降级为空）。
fn parse_analysis_response(raw: &str) -> Vec<crate::message::AnalysisItem> {
    let trimmed = raw.trim();
    let candidates = [
        trimmed.to_string(),
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string(),
    ];
    for candidate in &candidates {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if let Some(items) = value.get("items") {
                if let Ok(items) = serde_json::from_value(items.clone()) {
                    return items;
                }
            }
        }
    }
    warn!("[解析补全] 响应无法解析，忽略");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidated_service_fails_fast() {
        let service = BackgroundService::new(Settings::default());
        service.invalidate();

        let err = service.check_status().await.unwrap_err();
        assert!(matches!(err, ClozeError::ContextInvalidated));

        let err = service
            .generate_batch(&[ParagraphInput {
                id: "cr-p-0".to_string(),
                text: "正文".to_string(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, ClozeError::ContextInvalidated));

        let err = service
            .dispatch(Request::TogglePanel)
            .await
            .unwrap_err();
        assert!(matches!(err, ClozeError::ContextInvalidated));
    }

    #[tokio::test]
    async fn test_dispatch_log_and_toggle() {
        let service = BackgroundService::new(Settings::default());
        let response = service
            .dispatch(Request::Log {
                level: LogLevel::Log,
                message: "测试".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(response, Response::Ack));

        let response = service.dispatch(Request::TogglePanel).await.unwrap();
        assert!(matches!(response, Response::Ack));
    }

    #[tokio::test]
    async fn test_empty_analysis_batch_short_circuits() {
        let service = BackgroundService::new(Settings::default());
        let result = service.generate_analysis_batch(&[]).await.unwrap();
        assert!(result.success);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_parse_analysis_response() {
        let raw = "```json\n{\"items\":[{\"id\":\"cr-p-0-sel-0\",\"analysis\":\"核心术语\"}]}\n```";
        let items = parse_analysis_response(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].analysis, "核心术语");
        assert!(parse_analysis_response("rubbish").is_empty());
    }
}
