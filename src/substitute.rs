//! 原位文本替换
//! 在段落子树里找到目标词的第一处未被占用的出现位置，把它拆成
//! 前文 / 控件 / 后文三段原位替换，并支持整段无损恢复。

use kuchiki::NodeRef;
use log::{debug, warn};

use crate::cloze::ClozeItem;
use crate::dom;
use crate::extract::Paragraph;

/// 一次替换占用的文本区间（字符偏移，跨整个子树累计）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedRange {
    pub start: usize,
    pub end: usize,
    pub target: String,
}

/// 已占用区间集合。只在单次 apply_cloze 调用内有效，
/// 用来阻止两道题认领重叠的文本区间。
#[derive(Debug, Default)]
pub struct RangeSet {
    ranges: Vec<ReplacedRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// [start, end) 是否与任一已有区间重叠
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.ranges.iter().any(|r| start < r.end && end > r.start)
    }

    pub fn insert(&mut self, range: ReplacedRange) {
        self.ranges.push(range);
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// 文本节点是否已经在某个控件内部
fn inside_widget(node: &NodeRef) -> bool {
    node.ancestors().any(|a| {
        dom::has_class(&a, "cr-cloze-wrapper")
            || dom::tag_name(&a).as_deref() == Some("select")
    })
}

/// 子树里是否已有携带该答案的控件（同一段落被处理两次且未重置的情形）
fn widget_with_answer_exists(root: &NodeRef, answer: &str) -> bool {
    let Ok(selects) = root.select("select.cr-select") else {
        return false;
    };
    for select in selects {
        let attrs = select.attributes.borrow();
        if attrs.get("data-cr-answer") == Some(answer) {
            return true;
        }
    }
    false
}

/// 构造挖空控件：
/// `<span class="cr-cloze-wrapper"><select ...><option 占位/><option ×4/></select></span>`
fn build_widget(paragraph_id: &str, index: usize, item: &ClozeItem) -> NodeRef {
    let wrapper = dom::new_element("span");
    dom::set_attr(&wrapper, "class", "cr-cloze-wrapper");

    let select = dom::new_element("select");
    dom::set_attr(&select, "class", "cr-select");
    dom::set_attr(&select, "id", &format!("{}-sel-{}", paragraph_id, index));
    dom::set_attr(&select, "data-cr-answer", &item.answer);
    dom::set_attr(&select, "data-cr-analysis", &item.analysis);

    // 空白占位项，默认选中且不可选
    let placeholder = dom::new_element("option");
    dom::set_attr(&placeholder, "value", "");
    dom::set_attr(&placeholder, "disabled", "");
    dom::set_attr(&placeholder, "selected", "");
    placeholder.append(NodeRef::new_text("\u{a0}"));
    select.append(placeholder);

    for option_text in &item.options {
        let option = dom::new_element("option");
        dom::set_attr(&option, "value", option_text);
        option.append(NodeRef::new_text(option_text.as_str()));
        select.append(option);
    }

    wrapper.append(select);
    wrapper
}

/// 在子树里找到目标词的第一处未被占用的出现位置并替换为控件。
/// 控件内部的文本节点会被跳过，但仍然推进全局偏移。
/// 返回是否替换成功。
fn replace_first_occurrence(
    root: &NodeRef,
    target: &str,
    widget: NodeRef,
    claimed: &mut RangeSet,
) -> bool {
    let mut offset = 0usize;

    for node in dom::text_nodes(root) {
        let value = match node.as_text() {
            Some(text) => text.borrow().clone(),
            None => continue,
        };
        let node_chars = value.chars().count();

        if inside_widget(&node) {
            offset += node_chars;
            continue;
        }

        // 同一节点内可能有多处出现，逐个检查直到找到不重叠的
        let mut hit: Option<usize> = None;
        for (byte_idx, _) in value.match_indices(target) {
            let char_start = offset + value[..byte_idx].chars().count();
            let char_end = char_start + target.chars().count();
            if !claimed.overlaps(char_start, char_end) {
                claimed.insert(ReplacedRange {
                    start: char_start,
                    end: char_end,
                    target: target.to_string(),
                });
                hit = Some(byte_idx);
                break;
            }
        }

        if let Some(byte_idx) = hit {
            let before = value[..byte_idx].to_string();
            let after = value[byte_idx + target.len()..].to_string();
            if !before.is_empty() {
                node.insert_before(NodeRef::new_text(before));
            }
            node.insert_before(widget.clone());
            if !after.is_empty() {
                node.insert_before(NodeRef::new_text(after));
            }
            node.detach();
            return true;
        }

        offset += node_chars;
    }
    false
}

/// 把一组挖空题应用到段落子树上，返回实际插入的控件数。
/// 未找到可用位置的题会被静默跳过，段落只是少一个空，不算错误。
pub fn apply_cloze(paragraph: &Paragraph, items: &[ClozeItem]) -> usize {
    let root = &paragraph.node;

    // 防御性二次去重：补全解析等二次生成可能重新引入同一 target
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<&ClozeItem> = items
        .iter()
        .filter(|item| seen.insert(item.target.clone()))
        .collect();

    // 从长到短替换。先替换短词可能命中长词内部，破坏后一次替换，
    // 这个排序是正确性要求。
    unique.sort_by(|a, b| b.target.chars().count().cmp(&a.target.chars().count()));

    let mut claimed = RangeSet::new();
    let mut applied = 0usize;

    for (index, item) in unique.iter().enumerate() {
        if widget_with_answer_exists(root, &item.target) {
            warn!("[跳过] {} 已经被替换过了", item.target);
            continue;
        }
        let widget = build_widget(&paragraph.id, index, item);
        if replace_first_occurrence(root, &item.target, widget, &mut claimed) {
            debug!("[替换成功] {} -> 控件 {}", item.target, index + 1);
            applied += 1;
        } else {
            warn!("[替换失败] 未找到或已占用: {}", item.target);
        }
    }

    dom::add_class(root, "cr-paragraph-processed");
    applied
}

/// 恢复段落：用提取时的快照整体换回子树，摘掉提取 id 与处理标记。
/// 对未被宿主页面另行改动过的段落，恢复结果与原始标记逐字节一致。
pub fn restore(paragraph: &Paragraph) {
    let root = &paragraph.node;
    let children: Vec<NodeRef> = root.children().collect();
    for child in children {
        child.detach();
    }
    for node in dom::parse_fragment(&paragraph.original_html) {
        root.append(node);
    }
    dom::remove_attr(root, "data-cr-id");
    dom::remove_class(root, "cr-paragraph-processed");
}

/// 判分汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSummary {
    pub correct: usize,
    pub total: usize,
}

/// 对页面上全部控件判分：对照所选值与正确答案，标记对错，
/// 错题就地展示答案与解析，并禁用继续作答。
/// 只比较当前状态，不记录历史。
pub fn grade(document: &NodeRef) -> ScoreSummary {
    let mut summary = ScoreSummary {
        correct: 0,
        total: 0,
    };

    let widgets: Vec<NodeRef> = match document.select("select.cr-select") {
        Ok(iter) => iter.map(|w| w.as_node().clone()).collect(),
        Err(()) => return summary,
    };

    for select in widgets {
        summary.total += 1;
        let user_answer = dom::get_attr(&select, "data-cr-selected").unwrap_or_default();
        let answer = dom::get_attr(&select, "data-cr-answer").unwrap_or_default();
        let analysis = dom::get_attr(&select, "data-cr-analysis").unwrap_or_default();
        let wrapper = select.parent().unwrap_or_else(|| select.clone());

        if !user_answer.is_empty() && user_answer == answer {
            summary.correct += 1;
            dom::add_class(&select, "correct");
            dom::add_class(&wrapper, "correct");
        } else {
            dom::add_class(&select, "wrong");
            dom::add_class(&wrapper, "wrong");
            let already_marked = wrapper
                .select(".cr-feedback")
                .map(|mut iter| iter.next().is_some())
                .unwrap_or(false);
            if !already_marked {
                let feedback = dom::new_element("span");
                dom::set_attr(&feedback, "class", "cr-feedback");
                feedback.append(NodeRef::new_text(format!(" ✅ {} 💡 {}", answer, analysis)));
                wrapper.append(feedback);
            }
        }
        dom::set_attr(&select, "disabled", "");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::extract::ParagraphStatus;

    fn item(target: &str, answer: &str, options: [&str; 4]) -> ClozeItem {
        ClozeItem {
            target: target.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            answer: answer.to_string(),
            analysis: String::new(),
        }
    }

    fn paragraph_from(dom: &Dom, selector: &str) -> Paragraph {
        let node = dom.document().select_first(selector).unwrap().as_node().clone();
        let text = node.text_contents();
        Paragraph {
            id: "cr-p-0".to_string(),
            node: node.clone(),
            original_html: dom::inner_html(&node),
            text,
            status: ParagraphStatus::Pending,
        }
    }

    #[test]
    fn test_range_set_overlap() {
        let mut set = RangeSet::new();
        set.insert(ReplacedRange {
            start: 3,
            end: 7,
            target: "x".to_string(),
        });
        assert!(set.overlaps(5, 9));
        assert!(set.overlaps(0, 4));
        assert!(set.overlaps(3, 7));
        assert!(!set.overlaps(0, 3));
        assert!(!set.overlaps(7, 10));
    }

    #[test]
    fn test_apply_single_cloze() {
        let dom = Dom::parse("<p>区块链是一种分布式账本技术。</p>");
        let p = paragraph_from(&dom, "p");
        let applied = apply_cloze(&p, &[item("区块链", "区块链", ["账本", "区块链", "金融", "账户"])]);
        assert_eq!(applied, 1);

        let html = dom::inner_html(&p.node);
        assert!(html.contains("cr-cloze-wrapper"));
        assert!(html.contains("data-cr-answer=\"区块链\""));
        // 周围文本原样保留
        assert!(html.contains("是一种分布式账本技术。"));
        assert!(!html.starts_with("区块链"));
        assert!(dom::has_class(&p.node, "cr-paragraph-processed"));
    }

    #[test]
    fn test_overlapping_targets_longest_first() {
        // "区块链金融" 先被整体替换，随后的 "金融" 不得命中已消耗的子串
        let dom = Dom::parse("<p>区块链金融正在重塑金融行业的格局。</p>");
        let p = paragraph_from(&dom, "p");
        let applied = apply_cloze(
            &p,
            &[
                item("金融", "金融", ["金融", "经济", "贸易", "货币"]),
                item("区块链金融", "区块链金融", ["区块链金融", "数字货币", "云计算", "大数据"]),
            ],
        );
        assert_eq!(applied, 2);

        let html = dom::inner_html(&p.node);
        // 长词整体进了控件，剩余文本里只剩下后一处 "金融" 被替换
        assert!(html.contains("data-cr-answer=\"区块链金融\""));
        assert!(html.contains("data-cr-answer=\"金融\""));
        assert!(html.contains("正在重塑"));
        assert!(html.contains("行业的格局。"));
    }

    #[test]
    fn test_missing_target_skipped_silently() {
        let dom = Dom::parse("<p>这一段完全没有那个词，替换应该被跳过。</p>");
        let p = paragraph_from(&dom, "p");
        let applied = apply_cloze(&p, &[item("不存在", "不存在", ["不存在", "乙", "丙", "丁"])]);
        assert_eq!(applied, 0);
        // 段落仍被标记为已处理
        assert!(dom::has_class(&p.node, "cr-paragraph-processed"));
    }

    #[test]
    fn test_duplicate_targets_deduped() {
        let dom = Dom::parse("<p>共识协议让节点就共识达成一致，共识是关键。</p>");
        let p = paragraph_from(&dom, "p");
        let applied = apply_cloze(
            &p,
            &[
                item("共识", "共识", ["共识", "协议", "节点", "状态"]),
                item("共识", "共识", ["共识", "算法", "模型", "框架"]),
            ],
        );
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_reapply_same_answer_skipped() {
        let dom = Dom::parse("<p>协议是分布式系统的基石，协议决定一致性。</p>");
        let p = paragraph_from(&dom, "p");
        let items = [item("协议", "协议", ["协议", "共识", "节点", "状态"])];
        assert_eq!(apply_cloze(&p, &items), 1);
        // 同一段落未重置时再来一次，答案已存在，整条跳过
        assert_eq!(apply_cloze(&p, &items), 0);
    }

    #[test]
    fn test_restore_roundtrip_byte_identical() {
        let dom = Dom::parse("<p>区块链是一种<b>分布式</b>账本技术，应用于金融领域。</p>");
        let p = paragraph_from(&dom, "p");
        let original = dom::inner_html(&p.node);

        apply_cloze(
            &p,
            &[
                item("区块链", "区块链", ["账本", "区块链", "金融", "账户"]),
                item("金融", "金融", ["金融", "经济", "贸易", "货币"]),
            ],
        );
        assert_ne!(dom::inner_html(&p.node), original);

        restore(&p);
        assert_eq!(dom::inner_html(&p.node), original);
        assert!(!dom::has_attr(&p.node, "data-cr-id"));
        assert!(!dom::has_class(&p.node, "cr-paragraph-processed"));
    }

    #[test]
    fn test_substitution_inside_nested_markup() {
        // 目标词在 <b> 内的独立文本节点里
        let dom = Dom::parse("<p>这项<b>区块链</b>技术发展迅速，应用广泛。</p>");
        let p = paragraph_from(&dom, "p");
        let applied = apply_cloze(&p, &[item("区块链", "区块链", ["账本", "区块链", "金融", "账户"])]);
        assert_eq!(applied, 1);
        let html = dom::inner_html(&p.node);
        assert!(html.contains("<b><span class=\"cr-cloze-wrapper\""));
    }

    #[test]
    fn test_grade_marks_correct_and_wrong() {
        let dom = Dom::parse("<p>区块链是技术，金融是行业，两者互相促进。</p>");
        let p = paragraph_from(&dom, "p");
        apply_cloze(
            &p,
            &[
                item("区块链", "区块链", ["账本", "区块链", "金融", "账户"]),
                item("行业", "行业", ["行业", "领域", "方向", "赛道"]),
            ],
        );

        // 模拟作答：第一题答对，第二题答错
        let selects: Vec<NodeRef> = p
            .node
            .select("select.cr-select")
            .unwrap()
            .map(|s| s.as_node().clone())
            .collect();
        assert_eq!(selects.len(), 2);
        for select in &selects {
            let answer = dom::get_attr(select, "data-cr-answer").unwrap();
            if answer == "区块链" {
                dom::set_attr(select, "data-cr-selected", "区块链");
            } else {
                dom::set_attr(select, "data-cr-selected", "领域");
            }
        }

        let summary = grade(dom.document());
        assert_eq!(summary, ScoreSummary { correct: 1, total: 2 });

        // 错题出现反馈，且所有控件被禁用
        let html = dom::inner_html(&p.node);
        assert!(html.contains("cr-feedback"));
        for select in &selects {
            assert!(dom::has_attr(select, "disabled"));
        }
        // 重复判分不会叠加反馈
        grade(dom.document());
        let twice = dom::inner_html(&p.node);
        assert_eq!(twice.matches("cr-feedback").count(), html.matches("cr-feedback").count());
    }
}
