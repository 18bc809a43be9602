//! 提示词工程
//! 出题与补全解析两类提示词。只挖名词和概念词，答案位置要求随机，
//! 输出格式约束为纯 JSON。

use crate::message::{AnalysisInput, ParagraphInput};

/// 完形填空出题提示词
pub struct ClozePrompt;

impl ClozePrompt {
    /// 批量出题的系统提示词
    pub fn batch_system() -> String {
        r#"你是一个专业的阅读理解出题助手。请针对给出的每个段落制作"完形填空"（Cloze Test）。

**要求**:
1. **只挖名词、命名实体、概念性词汇、专业术语/技术词汇**：
   - 优先选择：
     * 专有名词（人名、地名、机构名）
     * 专业术语/技术词汇（领域特定概念，如 API、协议、算法、架构、框架、模型等）
     * 核心概念、重要名词
   - 不要挖：动词、形容词、副词、连词、虚词。
2. **每个段落最多挖 2 个空（严格限制）**：
   - 如果段落太短（少于20个词）或没有合适的名词/概念，该段落返回空列表 []。
   - **重要：如果段落在100个词以内（包括100个词），必须只挖1个空，绝对不能挖2个空！**
   - 只有超过100个词的段落才能挖2个空。
   - 挖空词必须是原文中存在的词（精确匹配，不要带标点）。
3. 为每个挖空点提供：
   - target: 原文中被挖掉的词（必须精确匹配原文，不要带标点）。不要使用占位符如 ___、空白等。
   - options: 4个选项（包含正确答案）。所有选项都必须是实际有意义的词，干扰项要有迷惑性（词性一致，语义相关但不正确）。选项语言必须与挖空词一致。
   - answer: 正确选项（必须是 options 中的一个）。
   - analysis: 简短解析（20字以内）。

**输出格式**:
必须且仅返回纯 JSON 格式，不要包含 Markdown 代码块标记。
**选项顺序要求：正确答案在 options 数组中的位置必须是随机的，不要总是放在固定位置。**
格式如下：
{
  "items": [
    {
      "id": "段落 id（与输入一致）",
      "clozes": [
        {
          "target": "挖空词",
          "options": ["正确词", "干扰1", "干扰2", "干扰3"],
          "answer": "正确词",
          "analysis": "解析..."
        }
      ]
    }
  ]
}"#
        .to_string()
    }

    /// 批量出题的用户提示词：段落以 JSON 数组给出
    pub fn batch_user(paragraphs: &[ParagraphInput]) -> String {
        let listing = serde_json::to_string_pretty(paragraphs).unwrap_or_else(|_| "[]".to_string());
        format!("**输入段落**:\n{}", listing)
    }

    /// 补全解析的系统提示词
    pub fn analysis_system() -> String {
        r#"你是一个专业的阅读理解出题助手。下面给出若干完形填空题的挖空词与正确答案，请为每一题补写一句简短解析（中文，20字以内），说明该词为什么是正确答案。

**输出格式**:
必须且仅返回纯 JSON 格式，不要包含 Markdown 代码块标记：
{
  "items": [
    { "id": "题目 id（与输入一致）", "analysis": "解析..." }
  ]
}"#
        .to_string()
    }

    /// 补全解析的用户提示词
    pub fn analysis_user(items: &[AnalysisInput]) -> String {
        let listing = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
        format!("**输入题目**:\n{}", listing)
    }
}
