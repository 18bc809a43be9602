//! 错误类型定义
//! 按故障类别划分：正文提取失败、Provider 连接失败、上下文失效。
//! 模型输出解析失败不属于错误：解析层自行降级为空结果。

use thiserror::Error;

/// 正文提取错误
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("无法识别正文内容，请确认当前页面包含可识别的文章内容")]
    NoContent,
}

/// Provider 调用错误
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Ollama 403 通常是 CORS/来源白名单问题，必须给出可操作的提示
    #[error("Ollama 403 Forbidden. 请配置 OLLAMA_ORIGINS=\"*\" 后重启 Ollama 服务")]
    OllamaForbidden,

    #[error("Ollama Error: {0}")]
    OllamaStatus(u16),

    #[error("Ollama 服务未连接")]
    OllamaUnreachable,

    #[error("DashScope Error: {status} - {body}")]
    DashScope { status: u16, body: String },

    #[error("Google AI Error: {status} - {body}")]
    Google { status: u16, body: String },

    #[error("未配置 {0} API Key")]
    MissingApiKey(&'static str),

    #[error("响应中缺少生成内容")]
    MissingContent,

    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

/// 顶层错误
#[derive(Debug, Error)]
pub enum ClozeError {
    #[error("正文识别失败: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("连接失败: {0}")]
    ConnectFailed(String),

    #[error("模型 {0} 未下载或不可用")]
    ModelNotReady(String),

    /// 宿主环境在操作中途被重载。所有跨边界调用前都会检查并快速失败。
    #[error("扩展上下文已失效，请刷新页面后重试")]
    ContextInvalidated,

    /// 同一个文档只允许初始化一个会话
    #[error("当前页面已存在完形填空会话")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_forbidden_message_is_actionable() {
        // 403 不能只报一个状态码，要带上 OLLAMA_ORIGINS 配置提示
        let msg = ProviderError::OllamaForbidden.to_string();
        assert!(msg.contains("OLLAMA_ORIGINS"));
        assert!(msg.contains("403"));
    }

    #[test]
    fn test_context_invalidated_message() {
        let msg = ClozeError::ContextInvalidated.to_string();
        assert!(msg.contains("刷新页面"));
    }
}
