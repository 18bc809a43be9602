//! 正文段落提取
//! 三级策略链：Readability 算法优先，不足时降级到容器启发式扫描，
//! 最后全文扫描。每一级只在前一级产出不足时运行。

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use log::{debug, warn};

use crate::dom::{self, Dom};
use crate::error::ExtractError;
use crate::words::count_words;

/// 策略升级阈值：上一级少于这么多段落就降级。
/// 经验值（可调），不是语义保证。
pub const GOOD_ENOUGH: usize = 3;

/// 全文扫描最多收取的段落数
pub const MAX_PARAGRAPHS: usize = 50;

/// 段落状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStatus {
    Pending,
    Processing,
    Done,
}

/// 一个可出题的正文段落。
/// `node` 指向宿主页面里的活动元素，提取器只在上面打一个 id 属性，
/// 不克隆也不移动；`original_html` 是提取时刻的子树快照，仅用于恢复。
#[derive(Debug)]
pub struct Paragraph {
    pub id: String,
    pub node: NodeRef,
    pub original_html: String,
    pub text: String,
    pub status: ParagraphStatus,
}

/// 提取期间的共享状态：id 计数器
struct ExtractState {
    next_id: usize,
}

impl ExtractState {
    fn claim(&mut self, node: &NodeRef, text: String) -> Paragraph {
        let id = format!("cr-p-{}", self.next_id);
        self.next_id += 1;
        dom::set_attr(node, "data-cr-id", &id);
        Paragraph {
            id,
            node: node.clone(),
            original_html: dom::inner_html(node),
            text,
            status: ParagraphStatus::Pending,
        }
    }
}

/// 一级提取策略
struct Strategy {
    name: &'static str,
    /// 产出不足时是否撤销本级的部分结果再降级
    reset_on_shortfall: bool,
    run: fn(&Dom, &mut ExtractState) -> Vec<Paragraph>,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "readability",
        reset_on_shortfall: true,
        run: tier_readability,
    },
    Strategy {
        name: "container",
        reset_on_shortfall: false,
        run: tier_container,
    },
    Strategy {
        name: "global",
        reset_on_shortfall: false,
        run: tier_global,
    },
];

/// 提取正文段落。全部策略跑完仍一无所获时报错。
pub fn extract(dom: &Dom) -> Result<Vec<Paragraph>, ExtractError> {
    let mut state = ExtractState { next_id: 0 };
    let mut paragraphs: Vec<Paragraph> = Vec::new();

    for strategy in STRATEGIES {
        paragraphs.extend((strategy.run)(dom, &mut state));
        debug!("[{}] 累计 {} 个段落", strategy.name, paragraphs.len());
        if paragraphs.len() >= GOOD_ENOUGH {
            break;
        }
        if strategy.reset_on_shortfall && !paragraphs.is_empty() {
            for p in &paragraphs {
                dom::remove_attr(&p.node, "data-cr-id");
            }
            paragraphs.clear();
            state.next_id = 0;
        }
    }

    if paragraphs.is_empty() {
        return Err(ExtractError::NoContent);
    }
    debug!("[正文提取] 共找到 {} 个段落", paragraphs.len());
    Ok(paragraphs)
}

// ---------- 共享判定 ----------

/// 排除区域关键词：命中元素自身或祖先的 tag/class/id 即跳过
const EXCLUDE_PATTERNS: &[&str] = &[
    "nav",
    "sidebar",
    "menu",
    "footer",
    "header",
    "comment",
    "advertisement",
    "ad-",
    "related",
    "recommend",
];

fn matches_exclude_patterns(node: &NodeRef) -> bool {
    let tag = dom::tag_name(node).unwrap_or_default();
    let class = dom::get_attr(node, "class").unwrap_or_default().to_lowercase();
    let id = dom::get_attr(node, "id").unwrap_or_default().to_lowercase();
    EXCLUDE_PATTERNS
        .iter()
        .any(|p| tag == *p || class.contains(p) || id.contains(p))
}

/// 元素是否值得处理
fn should_process_element(node: &NodeRef) -> bool {
    if node.as_element().is_none() {
        return false;
    }
    if dom::is_hidden(node) {
        return false;
    }
    // 跳过我们自己插入的控件
    if dom::self_or_ancestor_class(node, "cr-cloze-wrapper") {
        return false;
    }
    if dom::self_or_ancestor_tag(node, &["pre", "code"]) {
        return false;
    }
    if dom::has_attr(node, "data-cr-id") {
        return false;
    }
    if matches_exclude_patterns(node) {
        return false;
    }
    if node.ancestors().any(|a| matches_exclude_patterns(&a)) {
        return false;
    }
    true
}

/// 段落文本是否有效：长度 >= 15，有句读或足够长，词数 >= 10
pub fn is_valid_paragraph(text: &str) -> bool {
    if text.chars().count() < 15 {
        return false;
    }
    let has_punctuation = text
        .chars()
        .any(|c| "，。！？、；：,.!?;:".contains(c));
    let is_long_enough = text.chars().count() >= 50;
    if !has_punctuation && !is_long_enough {
        return false;
    }
    count_words(text) >= 10
}

/// Readability 匹配规则：相等，或任一方包含另一方。
/// Readability 的输出是脱离原树的副本，不能直接挂控件，
/// 必须靠文本包含关系回到原始 DOM 上找对应元素。
pub fn texts_match(original: &str, block: &str) -> bool {
    original == block
        || (original.len() >= block.len() && original.contains(block))
        || (block.len() >= original.len() && block.contains(original))
}

// ---------- 策略一：Readability ----------

/// 调用外部 Readability 算法。输入是文档的序列化副本，
/// 算法只看副本，用户看到的页面不会被改动。
fn run_readability(html: &str) -> Option<(String, String)> {
    let mut reader = match dom_smoothie::Readability::new(html, None, None) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("[Readability] 初始化失败: {:?}", e);
            return None;
        }
    };
    match reader.parse() {
        Ok(article) => Some((article.title, article.content.to_string())),
        Err(e) => {
            warn!("[Readability] 提取失败: {:?}", e);
            None
        }
    }
}

fn tier_readability(dom: &Dom, state: &mut ExtractState) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let Some((title, content)) = run_readability(&dom.to_html()) else {
        return paragraphs;
    };
    debug!("[Readability] 文章标题: {}", title);

    let fragment = kuchiki::parse_html().one(content);
    let Ok(blocks) = fragment.select("p") else {
        return paragraphs;
    };

    let original_ps: Vec<NodeRef> = match dom.document().select("p") {
        Ok(iter) => iter.map(|p| p.as_node().clone()).collect(),
        Err(()) => return paragraphs,
    };

    for block in blocks {
        let block_text = block.text_contents().trim().to_string();
        if !is_valid_paragraph(&block_text) {
            continue;
        }
        // 在原始文档里找第一个未处理且文本匹配的 <p>
        for original in &original_ps {
            if dom::has_attr(original, "data-cr-id") {
                continue;
            }
            if !should_process_element(original) {
                continue;
            }
            let original_text = original.text_contents().trim().to_string();
            if original_text.chars().count() < 20 {
                continue;
            }
            if texts_match(&original_text, &block_text) && is_valid_paragraph(&original_text) {
                paragraphs.push(state.claim(original, original_text));
                break;
            }
        }
    }

    debug!("[Readability] 匹配到 {} 个段落", paragraphs.len());
    paragraphs
}

// ---------- 策略二：容器启发式 ----------

/// 候选文章容器（按优先级排列，含常见中文平台）
const CONTAINER_SELECTORS: &[&str] = &[
    // 微信公众号
    "#js_content",
    ".rich_media_content",
    "#img-content",
    // 知乎
    ".Post-RichText",
    ".RichContent-inner",
    // 微博
    ".weibo-text",
    // 头条
    ".article-content",
    // 通用
    "article",
    "[role=\"article\"]",
    "main article",
    ".article",
    ".post",
    ".post-content",
    ".entry-content",
    ".content",
    ".markdown-body",
    ".prose",
    ".text",
    ".body",
    "main",
    "#content",
    "#main",
    ".main",
    "[class*=\"article\"]",
    "[class*=\"content\"]",
    "[class*=\"post\"]",
    "[id*=\"content\"]",
    "[id*=\"article\"]",
];

/// 段落型元素：不止 <p>，也包括常见的块级文本容器
const PARAGRAPH_SELECTOR: &str = "p, section, .paragraph, [class*=\"para\"], div > span";

/// 元素是否还嵌套着别的段落型元素（只看后代，不算自身）
fn has_nested_paragraph(node: &NodeRef) -> bool {
    node.descendants().filter(|d| d != node).any(|d| {
        matches!(dom::tag_name(&d).as_deref(), Some("p") | Some("section"))
    })
}

fn tier_container(dom: &Dom, state: &mut ExtractState) -> Vec<Paragraph> {
    let mut best: Option<(NodeRef, usize)> = None;

    for selector in CONTAINER_SELECTORS {
        let Ok(containers) = dom.document().select(selector) else {
            continue;
        };
        for container in containers {
            let container = container.as_node().clone();
            if !should_process_element(&container) {
                continue;
            }
            let Ok(candidates) = container.select(PARAGRAPH_SELECTOR) else {
                continue;
            };
            let mut valid_count = 0usize;
            let mut text_len = 0usize;
            for el in candidates {
                let text = el.text_contents().trim().to_string();
                if is_valid_paragraph(&text) {
                    valid_count += 1;
                    text_len += text.chars().count();
                }
            }
            // 段落数量权重远大于文本长度
            let score = valid_count * 100 + text_len;
            debug!("[容器评分] {} => {} ({} 段落)", selector, score, valid_count);
            if score > best.as_ref().map(|(_, s)| *s).unwrap_or(0) {
                best = Some((container, score));
            }
        }
    }

    let mut paragraphs = Vec::new();
    let Some((container, _)) = best else {
        return paragraphs;
    };

    let Ok(candidates) = container.select(PARAGRAPH_SELECTOR) else {
        return paragraphs;
    };
    let candidates: Vec<NodeRef> = candidates.map(|el| el.as_node().clone()).collect();
    for el in candidates {
        if !should_process_element(&el) {
            continue;
        }
        if has_nested_paragraph(&el) {
            continue;
        }
        let text = el.text_contents().trim().to_string();
        if !is_valid_paragraph(&text) {
            continue;
        }
        paragraphs.push(state.claim(&el, text));
    }

    debug!("[容器提取] 提取到 {} 个段落", paragraphs.len());
    paragraphs
}

// ---------- 策略三：全文扫描 ----------

fn score_candidate(el: &NodeRef, text: &str) -> f64 {
    let mut score = text.chars().count() as f64;
    let Some(parent) = el.parent() else {
        return score;
    };
    let parent_class = dom::get_attr(&parent, "class").unwrap_or_default().to_lowercase();
    let parent_id = dom::get_attr(&parent, "id").unwrap_or_default().to_lowercase();
    let parent_tag = dom::tag_name(&parent).unwrap_or_default();

    // 长文平台正文容器
    if parent_id.contains("js_content") || parent_class.contains("rich_media") {
        score *= 2.0;
    }
    // 常见正文区域
    if parent_class.contains("content")
        || parent_class.contains("article")
        || parent_class.contains("post")
    {
        score *= 1.5;
    }
    if parent_tag == "article" || parent_tag == "main" {
        score *= 1.5;
    }
    // 评论区、页脚、侧栏降权
    if parent_class.contains("comment")
        || parent_class.contains("footer")
        || parent_class.contains("sidebar")
    {
        score *= 0.3;
    }
    score
}

fn tier_global(dom: &Dom, state: &mut ExtractState) -> Vec<Paragraph> {
    let mut candidates: Vec<(NodeRef, String, f64)> = Vec::new();

    let Ok(elements) = dom.document().select(PARAGRAPH_SELECTOR) else {
        return Vec::new();
    };
    let elements: Vec<NodeRef> = elements.map(|el| el.as_node().clone()).collect();
    for el in elements {
        if !should_process_element(&el) {
            continue;
        }
        if has_nested_paragraph(&el) {
            continue;
        }
        let text = el.text_contents().trim().to_string();
        if !is_valid_paragraph(&text) {
            continue;
        }
        let score = score_candidate(&el, &text);
        candidates.push((el, text, score));
    }

    candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut paragraphs = Vec::new();
    for (el, text, _) in candidates {
        if paragraphs.len() >= MAX_PARAGRAPHS {
            break;
        }
        if dom::has_attr(&el, "data-cr-id") {
            continue;
        }
        paragraphs.push(state.claim(&el, text));
    }

    debug!("[全文扫描] 提取到 {} 个段落", paragraphs.len());
    paragraphs
}

// ---------- 快速正文检测 ----------

const QUICK_DETECT_SELECTORS: &[&str] = &[
    "article",
    "[role=\"article\"]",
    ".article",
    ".post",
    ".content",
    ".entry-content",
    ".post-content",
    ".article-content",
    "main article",
    ".markdown-body",
    ".prose",
];

/// 页面是否明显带有正文。用于在完整提取前快速筛掉空页面。
pub fn quick_detect_content(dom: &Dom) -> bool {
    for selector in QUICK_DETECT_SELECTORS {
        let Ok(mut found) = dom.document().select(selector) else {
            continue;
        };
        if let Some(el) = found.next() {
            if el.text_contents().trim().chars().count() > 500 {
                return true;
            }
        }
    }

    let Ok(paragraphs) = dom.document().select("p") else {
        return false;
    };
    let mut valid = 0usize;
    let mut total_len = 0usize;
    for p in paragraphs {
        let node = p.as_node();
        let text = node.text_contents().trim().to_string();
        if text.chars().count() <= 50 {
            continue;
        }
        if dom::self_or_ancestor_tag(node, &["nav", "footer", "header", "aside"])
            || dom::self_or_ancestor_class(node, "sidebar")
            || dom::self_or_ancestor_class(node, "nav")
            || dom::self_or_ancestor_class(node, "menu")
        {
            continue;
        }
        valid += 1;
        total_len += text.chars().count();
    }
    valid >= 3 && total_len > 500
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str = "区块链是一种分布式账本技术，广泛应用于金融领域，近年来被视为重要的基础设施创新方向之一。";
    const LONG_B: &str = "人工智能模型的训练离不开大规模的数据集，数据的质量直接决定了模型的最终表现与泛化能力。";
    const LONG_C: &str = "在分布式系统里，一致性协议负责让多个节点就同一份状态达成共识，常见的实现包括两阶段提交等方案。";
    const LONG_D: &str = "编译器的前端负责词法分析和语法分析，把源代码转换成抽象语法树，供后续的优化与代码生成使用。";

    fn article_page() -> String {
        format!(
            "<html><body>\
             <nav><p>导航导航导航导航导航导航导航导航导航导航，这里是一段足够长的导航文字。</p></nav>\
             <article class=\"post-content\">\
             <p>{}</p><p>{}</p><p>{}</p><p>{}</p>\
             <p>短句。</p>\
             </article>\
             <footer><p>版权信息版权信息版权信息版权信息版权信息，版权信息版权信息版权信息。</p></footer>\
             </body></html>",
            LONG_A, LONG_B, LONG_C, LONG_D
        )
    }

    #[test]
    fn test_is_valid_paragraph() {
        // 有句读、词数充足
        assert!(is_valid_paragraph(
            "区块链是一种分布式账本技术，广泛应用于金融领域。"
        ));
        // 太短
        assert!(!is_valid_paragraph("太短了。"));
        // 无句读且不够长
        assert!(!is_valid_paragraph("没有标点的一段中文文字但是不够五十字"));
    }

    #[test]
    fn test_texts_match() {
        assert!(texts_match("abc", "abc"));
        assert!(texts_match("abcdef", "cde"));
        assert!(texts_match("cde", "abcdef"));
        assert!(!texts_match("abc", "xyz"));
    }

    #[test]
    fn test_extract_article_paragraphs() {
        let dom = Dom::parse(&article_page());
        let paragraphs = extract(&dom).unwrap();
        assert!(paragraphs.len() >= 3, "应提取出正文段落");
        // id 单调递增，且都打上了标记
        for (i, p) in paragraphs.iter().enumerate() {
            assert_eq!(p.id, format!("cr-p-{}", i));
            assert_eq!(dom::get_attr(&p.node, "data-cr-id").as_deref(), Some(p.id.as_str()));
            assert_eq!(p.status, ParagraphStatus::Pending);
        }
        // 导航和页脚不应被收进来
        for p in &paragraphs {
            assert!(!p.text.contains("导航"));
            assert!(!p.text.contains("版权"));
        }
    }

    #[test]
    fn test_extract_does_not_change_page_text() {
        let dom = Dom::parse(&article_page());
        let before = dom.document().text_contents();
        let _ = extract(&dom).unwrap();
        assert_eq!(dom.document().text_contents(), before);
    }

    #[test]
    fn test_extract_fails_on_empty_page() {
        let dom = Dom::parse("<html><body><nav><p>菜单</p></nav></body></html>");
        assert_eq!(extract(&dom).unwrap_err(), ExtractError::NoContent);
    }

    #[test]
    fn test_hidden_paragraphs_are_skipped() {
        let html = format!(
            "<html><body><div style=\"display:none\"><p>{}</p></div>\
             <div class=\"content\"><p>{}</p><p>{}</p><p>{}</p></div></body></html>",
            LONG_A, LONG_B, LONG_C, LONG_D
        );
        let dom = Dom::parse(&html);
        let paragraphs = extract(&dom).unwrap();
        for p in &paragraphs {
            assert_ne!(p.text, LONG_A, "隐藏段落不应被提取");
        }
    }

    #[test]
    fn test_quick_detect_content() {
        let dom = Dom::parse(&article_page());
        assert!(quick_detect_content(&dom));
        let empty = Dom::parse("<html><body><p>无。</p></body></html>");
        assert!(!quick_detect_content(&empty));
    }
}
