//! 模型输出解析
//! 把 LLM 返回的原始文本还原成结构化挖空题列表。解析永不报错：
//! 无法恢复时降级为空结果，单个坏段落不会中断整次生成。

use std::collections::{BTreeMap, HashSet};

use log::warn;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::words::is_cjk;

/// 每段最多保留的挖空数
pub const MAX_CLOZES_PER_PARAGRAPH: usize = 2;

/// 一道挖空题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClozeItem {
    /// 原文中被挖掉的词，必须与原文精确一致
    pub target: String,
    /// 恰好 4 个选项，顺序在创建时随机打乱
    pub options: Vec<String>,
    /// 正确答案，必须是 options 之一
    pub answer: String,
    /// 简短解析，可为空，等待二次补全
    #[serde(default)]
    pub analysis: String,
}

/// 按段落 id 分组的解析结果
pub type ClozeMap = BTreeMap<String, Vec<ClozeItem>>;

#[derive(Debug, Deserialize)]
struct RawCloze {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    options: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    analysis: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBatchItem {
    id: String,
    #[serde(default)]
    clozes: Vec<RawCloze>,
}

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());
static EMBEDDED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"(?:items|clozes)"\s*:\s*\[[\s\S]*?\]\s*\}"#).unwrap());

/// 三段式容错解析：直接解析 -> 去掉代码围栏重试 -> 正则抠出 JSON 子串重试。
/// 全部失败时返回 None。
fn recover_json(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced_open = FENCE_OPEN.replace(trimmed, "");
    let unfenced = FENCE_CLOSE.replace(&unfenced_open, "");
    if let Ok(value) = serde_json::from_str(unfenced.trim()) {
        return Some(value);
    }

    if let Some(found) = EMBEDDED_JSON.find(raw) {
        if let Ok(value) = serde_json::from_str(found.as_str()) {
            return Some(value);
        }
    }

    warn!("[解析] 模型输出无法恢复为 JSON，按空结果处理");
    None
}

/// 解析模型回复。`fallback_id` 用于单段形状（`{"clozes": [...]}`）的归属。
/// 批量形状为 `{"items": [{"id": ..., "clozes": [...]}]}`。
pub fn parse_response(raw: &str, fallback_id: Option<&str>) -> ClozeMap {
    let mut map = ClozeMap::new();
    let Some(value) = recover_json(raw) else {
        return map;
    };

    if let Some(items) = value.get("items").and_then(|v| v.as_array()) {
        for item in items {
            let Ok(item) = serde_json::from_value::<RawBatchItem>(item.clone()) else {
                continue;
            };
            map.insert(item.id.clone(), normalize_clozes(item.clozes));
        }
        return map;
    }

    if let Some(clozes) = value.get("clozes").and_then(|v| v.as_array()) {
        if let Some(id) = fallback_id {
            let raw_clozes: Vec<RawCloze> = clozes
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect();
            map.insert(id.to_string(), normalize_clozes(raw_clozes));
        }
    }
    map
}

/// 占位符与"空白"哨兵词
fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.contains("___") || s == "空白" || s == "空" || s.eq_ignore_ascii_case("blank")
}

/// 目标词的文种分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Chinese,
    Latin,
    Mixed,
    Other,
}

pub fn classify_script(s: &str) -> Script {
    let has_cjk = s.chars().any(is_cjk);
    let has_latin = s.chars().any(|c| c.is_ascii_alphabetic());
    match (has_cjk, has_latin) {
        (true, false) => Script::Chinese,
        (false, true) => Script::Latin,
        (true, true) => Script::Mixed,
        (false, false) => Script::Other,
    }
}

/// 目标词与选项的语言必须一致：中文题里不能混进英文选项，反之亦然
fn language_consistent(target: &str, answer: &str, options: &[String]) -> bool {
    match classify_script(target) {
        Script::Chinese => !answer.chars().any(|c| c.is_ascii_alphabetic())
            && !options.iter().any(|o| o.chars().any(|c| c.is_ascii_alphabetic())),
        Script::Latin => {
            !answer.chars().any(is_cjk) && !options.iter().any(|o| o.chars().any(is_cjk))
        }
        Script::Mixed | Script::Other => true,
    }
}

/// 清洗和验证一段的挖空列表：
/// 截断到 2 条，剔除占位符与残缺项，选项收敛到恰好 4 个并洗牌，
/// 目标词去重，语言一致性过滤。
fn normalize_clozes(raw: Vec<RawCloze>) -> Vec<ClozeItem> {
    let mut seen_targets: HashSet<String> = HashSet::new();
    let mut result = Vec::new();

    for cloze in raw.into_iter().take(MAX_CLOZES_PER_PARAGRAPH) {
        let target = cloze.target.unwrap_or_default().trim().to_string();
        if is_placeholder(&target) {
            warn!("[过滤] target 为空或占位符，丢弃");
            continue;
        }
        let Some(options) = cloze.options else {
            continue;
        };
        let valid_options: Vec<String> = options
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !is_placeholder(s))
            .collect();
        let Some(answer) = cloze.answer else {
            continue;
        };
        if valid_options.len() < 4 || !valid_options.contains(&answer) {
            continue;
        }

        // 收敛到恰好 4 个；答案若被截掉则顶替第 4 个，保证 answer ∈ options
        let mut options: Vec<String> = valid_options.iter().take(4).cloned().collect();
        if !options.contains(&answer) {
            options[3] = answer.clone();
        }
        options.shuffle(&mut rand::thread_rng());

        if !language_consistent(&target, &answer, &options) {
            warn!("[过滤] 选项语言与目标词不一致，丢弃: {}", target);
            continue;
        }
        if !seen_targets.insert(target.clone()) {
            warn!("[去重] 跳过重复的 target: {}", target);
            continue;
        }

        result.push(ClozeItem {
            target,
            options,
            answer,
            analysis: cloze.analysis.unwrap_or_default().trim().to_string(),
        });
    }
    result
}
