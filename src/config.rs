//! 持久化配置
//! 键值式设置，存成一个 JSON 文件。缺失的键一律回退到内置默认值，
//! 没有 schema 版本号。

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::i18n::Lang;

/// API 提供者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Dashscope,
    Google,
}

impl ProviderKind {
    /// 展示名
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::Dashscope => "DashScope",
            ProviderKind::Google => "Google AI",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "dashscope" => Ok(ProviderKind::Dashscope),
            "google" => Ok(ProviderKind::Google),
            other => Err(format!("未知的 API 提供者: {}", other)),
        }
    }
}

/// 全部用户设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default)]
    pub dashscope_api_key: String,
    #[serde(default = "default_dashscope_model")]
    pub dashscope_model: String,
    #[serde(default)]
    pub google_api_key: String,
    #[serde(default = "default_google_model")]
    pub google_model: String,
    #[serde(default)]
    pub language: Lang,
    /// 面板上次停靠位置（如 "120px"），由界面层读写
    #[serde(default)]
    pub panel_position: Option<String>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_dashscope_model() -> String {
    "qwen-plus".to_string()
}

fn default_google_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama_base_url: default_ollama_base_url(),
            ollama_model: default_ollama_model(),
            dashscope_api_key: String::new(),
            dashscope_model: default_dashscope_model(),
            google_api_key: String::new(),
            google_model: default_google_model(),
            language: Lang::default(),
            panel_position: None,
        }
    }
}

impl Settings {
    /// 当前提供者对应的模型名
    pub fn model(&self) -> &str {
        match self.provider {
            ProviderKind::Ollama => &self.ollama_model,
            ProviderKind::Dashscope => &self.dashscope_model,
            ProviderKind::Google => &self.google_model,
        }
    }

    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "cloze-reading")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// 从指定路径（或默认路径）加载，文件不存在时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Settings::default()),
            },
        };
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(settings)
    }

    /// 保存到指定路径（或默认路径）
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().context("无法确定配置目录")?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.provider, ProviderKind::Ollama);
        assert_eq!(s.ollama_base_url, "http://localhost:11434");
        assert_eq!(s.model(), "qwen2.5:7b");
        assert_eq!(s.language, Lang::Zh);
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        // 只给部分键，其余回退默认值
        let s: Settings = serde_json::from_str(r#"{"provider":"google"}"#).unwrap();
        assert_eq!(s.provider, ProviderKind::Google);
        assert_eq!(s.model(), "gemini-2.5-flash");
        assert_eq!(s.ollama_model, "qwen2.5:7b");
        assert!(s.google_api_key.is_empty());
    }

    #[test]
    fn test_model_follows_provider() {
        let mut s = Settings::default();
        s.provider = ProviderKind::Dashscope;
        assert_eq!(s.model(), "qwen-plus");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("Google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert!("unknown".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut s = Settings::default();
        s.dashscope_api_key = "sk-test".to_string();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dashscope_api_key, "sk-test");
        assert_eq!(back.provider, ProviderKind::Ollama);
    }
}
