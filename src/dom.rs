//! DOM 操作辅助
//! 基于 kuchiki 的解析、序列化与节点操作封装。页面树由调用方持有，
//! 这里的数据结构只持有节点引用，不会单独持有节点所有权。

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::TendrilSink;
use kuchiki::{Attribute, ExpandedName, NodeRef};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

fn qual_name(tag: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NS), LocalName::from(tag))
}

/// 一个已解析的 HTML 文档
#[derive(Debug)]
pub struct Dom {
    document: NodeRef,
}

impl Dom {
    /// 解析完整 HTML 文档。html5ever 会自动补全缺失的 html/head/body。
    pub fn parse(html: &str) -> Dom {
        Dom {
            document: kuchiki::parse_html().one(html.to_string()),
        }
    }

    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    /// 序列化整个文档
    pub fn to_html(&self) -> String {
        outer_html(&self.document)
    }
}

/// 序列化节点自身（含子树）
pub fn outer_html(node: &NodeRef) -> String {
    let mut buf = Vec::new();
    // 写入 Vec 不会失败
    let _ = node.serialize(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// 序列化节点的子节点（不含节点自身）
pub fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| outer_html(&child)).collect()
}

/// 把 HTML 片段解析为节点列表
pub fn parse_fragment(html: &str) -> Vec<NodeRef> {
    let doc = kuchiki::parse_fragment(qual_name("div"), Vec::new()).one(html.to_string());
    // 片段解析会包一层 <html> 根节点
    let root = match doc.first_child() {
        Some(root) => root,
        None => return Vec::new(),
    };
    let children: Vec<NodeRef> = root.children().collect();
    for child in &children {
        child.detach();
    }
    children
}

/// 创建一个无属性的 HTML 元素
pub fn new_element(tag: &str) -> NodeRef {
    NodeRef::new_element(qual_name(tag), Vec::<(ExpandedName, Attribute)>::new())
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|data| data.name.local.as_ref().to_lowercase())
}

pub fn get_attr(node: &NodeRef, name: &str) -> Option<String> {
    let data = node.as_element()?;
    let attrs = data.attributes.borrow();
    attrs.get(name).map(|v| v.to_string())
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(data) = node.as_element() {
        data.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(data) = node.as_element() {
        data.attributes.borrow_mut().remove(name);
    }
}

pub fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .map(|data| data.attributes.borrow().contains(name))
        .unwrap_or(false)
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    get_attr(node, "class")
        .map(|v| v.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub fn add_class(node: &NodeRef, class: &str) {
    if has_class(node, class) {
        return;
    }
    let current = get_attr(node, "class").unwrap_or_default();
    let merged = if current.is_empty() {
        class.to_string()
    } else {
        format!("{} {}", current, class)
    };
    set_attr(node, "class", &merged);
}

pub fn remove_class(node: &NodeRef, class: &str) {
    let Some(current) = get_attr(node, "class") else {
        return;
    };
    let kept: Vec<&str> = current
        .split_whitespace()
        .filter(|c| *c != class)
        .collect();
    if kept.is_empty() {
        remove_attr(node, "class");
    } else {
        set_attr(node, "class", &kept.join(" "));
    }
}

/// 元素自身是否被内联样式或 hidden 属性隐藏
fn is_hidden_inline(node: &NodeRef) -> bool {
    if has_attr(node, "hidden") {
        return true;
    }
    let Some(style) = get_attr(node, "style") else {
        return false;
    };
    let style: String = style.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    style.contains("display:none") || style.contains("visibility:hidden")
}

/// 元素或其任一祖先被隐藏（无布局引擎时对 offsetParent 检查的近似）
pub fn is_hidden(node: &NodeRef) -> bool {
    if is_hidden_inline(node) {
        return true;
    }
    node.ancestors().any(|a| is_hidden_inline(&a))
}

/// closest() 语义：自身或祖先的标签名命中给定集合
pub fn self_or_ancestor_tag(node: &NodeRef, tags: &[&str]) -> bool {
    if let Some(tag) = tag_name(node) {
        if tags.contains(&tag.as_str()) {
            return true;
        }
    }
    node.ancestors().any(|a| {
        tag_name(&a)
            .map(|tag| tags.contains(&tag.as_str()))
            .unwrap_or(false)
    })
}

/// closest() 语义：自身或祖先带有指定 class
pub fn self_or_ancestor_class(node: &NodeRef, class: &str) -> bool {
    has_class(node, class) || node.ancestors().any(|a| has_class(&a, class))
}

/// 按文档顺序收集子树内的全部文本节点
pub fn text_nodes(root: &NodeRef) -> Vec<NodeRef> {
    root.descendants()
        .filter(|node| node.as_text().is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let dom = Dom::parse("<html><body><p>你好</p></body></html>");
        assert!(dom.to_html().contains("<p>你好</p>"));
    }

    #[test]
    fn test_inner_and_outer_html() {
        let dom = Dom::parse("<p id=\"a\"><b>粗体</b>文本</p>");
        let p = dom.document().select_first("p").unwrap();
        assert_eq!(inner_html(p.as_node()), "<b>粗体</b>文本");
        assert!(outer_html(p.as_node()).starts_with("<p"));
    }

    #[test]
    fn test_parse_fragment_roundtrip() {
        let html = "<b>重点</b>与普通文本";
        let nodes = parse_fragment(html);
        let rendered: String = nodes.iter().map(outer_html).collect();
        assert_eq!(rendered, html);
    }

    #[test]
    fn test_class_helpers() {
        let el = new_element("span");
        add_class(&el, "cr-cloze-wrapper");
        add_class(&el, "correct");
        assert!(has_class(&el, "cr-cloze-wrapper"));
        remove_class(&el, "cr-cloze-wrapper");
        assert!(!has_class(&el, "cr-cloze-wrapper"));
        assert!(has_class(&el, "correct"));
    }

    #[test]
    fn test_is_hidden() {
        let dom = Dom::parse(
            "<div style=\"display: none\"><p id=\"inside\">x</p></div><p id=\"shown\">y</p>",
        );
        let inside = dom.document().select_first("#inside").unwrap();
        let shown = dom.document().select_first("#shown").unwrap();
        assert!(is_hidden(inside.as_node()));
        assert!(!is_hidden(shown.as_node()));
    }

    #[test]
    fn test_text_nodes_in_document_order() {
        let dom = Dom::parse("<p>一<b>二</b>三</p>");
        let p = dom.document().select_first("p").unwrap();
        let texts: Vec<String> = text_nodes(p.as_node())
            .iter()
            .map(|n| n.as_text().unwrap().borrow().clone())
            .collect();
        assert_eq!(texts, vec!["一", "二", "三"]);
    }
}
