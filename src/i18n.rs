//! 界面文案（中 / 英）
//! 状态行只反映最近一次的状态，文案按语言在渲染时生成。

use serde::{Deserialize, Serialize};

/// 界面语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

/// 会话状态。带数据的枚举取代字符串 key + 参数表，
/// 渲染时按语言替换。
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Ready,
    CheckingConnection { provider: String },
    ConnectFailed { error: String },
    ModelNotReady { model: String },
    Parsing,
    ParseFailed { error: String },
    NoParagraphs,
    Generating { provider: String, current: usize, total: usize },
    Summary { success: usize, total: usize, seconds: f64 },
    CanContinue,
    Score { correct: usize, total: usize },
    Restored { provider: String },
    ContextInvalid,
}

/// 渲染状态行文案
pub fn render(lang: Lang, status: &Status) -> String {
    match lang {
        Lang::Zh => render_zh(status),
        Lang::En => render_en(status),
    }
}

fn render_zh(status: &Status) -> String {
    match status {
        Status::Ready => "准备就绪".to_string(),
        Status::CheckingConnection { provider } => format!("检查连接: {}...", provider),
        Status::ConnectFailed { error } => format!("连接失败: {}", error),
        Status::ModelNotReady { model } => {
            format!("模型 {} 未下载或不可用。请检查配置。", model)
        }
        Status::Parsing => "正在解析网页...".to_string(),
        Status::ParseFailed { error } => format!("正文识别失败: {}", error),
        Status::NoParagraphs => "未找到适合生成的正文段落".to_string(),
        Status::Generating { provider, current, total } => {
            format!("生成中 ({}) {}/{}...", provider, current, total)
        }
        Status::Summary { success, total, seconds } => {
            format!("生成完成! 成功 {}/{}（耗时 {:.1} 秒）", success, total, seconds)
        }
        Status::CanContinue => "可以继续做题或提交答案".to_string(),
        Status::Score { correct, total } => format!("得分: {} / {}", correct, total),
        Status::Restored { provider } => format!("已恢复原文 (当前: {})", provider),
        Status::ContextInvalid => "扩展上下文失效，请刷新页面".to_string(),
    }
}

fn render_en(status: &Status) -> String {
    match status {
        Status::Ready => "Ready".to_string(),
        Status::CheckingConnection { provider } => format!("Checking: {}...", provider),
        Status::ConnectFailed { error } => format!("Connection failed: {}", error),
        Status::ModelNotReady { model } => format!(
            "Model {} is not downloaded or unavailable. Please check configuration.",
            model
        ),
        Status::Parsing => "Parsing page...".to_string(),
        Status::ParseFailed { error } => format!("Content extraction failed: {}", error),
        Status::NoParagraphs => "No suitable paragraphs found for question generation.".to_string(),
        Status::Generating { provider, current, total } => {
            format!("Generating ({}) {}/{}...", provider, current, total)
        }
        Status::Summary { success, total, seconds } => format!(
            "Generation complete! Success {}/{} (time {:.1}s)",
            success, total, seconds
        ),
        Status::CanContinue => "You can continue practicing or submit your answers.".to_string(),
        Status::Score { correct, total } => format!("Score: {} / {}", correct, total),
        Status::Restored { provider } => format!("Original restored (current: {})", provider),
        Status::ContextInvalid => "Extension context invalid, please refresh the page.".to_string(),
    }
}
