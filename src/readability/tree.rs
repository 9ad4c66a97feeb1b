//! Arena of scored nodes built while walking a page.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::patterns::{COMMAS, HEADER_TAGS, NEW_LINES_AFTER, VOID_TAGS, WHITESPACE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Text(String),
    Element(NodeId),
}

/// Text metrics of a subtree, computed once when the node closes.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub text_length: usize,
    pub link_length: usize,
    pub commas: usize,
    /// Share of the content that sits inside links
    pub density: f64,
    pub tag_count: HashMap<String, usize>,
}

impl NodeInfo {
    pub fn count(&self, tag: &str) -> usize {
        self.tag_count.get(tag).copied().unwrap_or(0)
    }

    pub fn content_length(&self) -> usize {
        self.text_length + self.link_length
    }
}

#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Child>,
    pub parent: Option<NodeId>,
    pub tag_score: f64,
    pub attribute_score: f64,
    pub total_score: f64,
    /// Lower-cased id and class values, space separated
    pub element_data: String,
    pub info: NodeInfo,
    pub is_candidate: bool,
    /// Set for images too small to keep
    pub dropped: bool,
}

impl ScoredNode {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent,
            tag_score: 0.0,
            attribute_score: 0.0,
            total_score: 0.0,
            element_data: String::new(),
            info: NodeInfo::default(),
            is_candidate: false,
            dropped: false,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Class and id tokens used to match candidate siblings
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.element_data
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Arena {
    nodes: Vec<ScoredNode>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, tag: &str, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(ScoredNode::new(tag, parent));
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fill in `info` from the already computed infos of the children.
    pub fn compute_info(&mut self, id: NodeId) {
        let mut info = NodeInfo::default();
        for child in &self.nodes[id.0].children {
            match child {
                Child::Text(text) => {
                    info.text_length += text.trim().chars().count();
                    info.commas += COMMAS.find_iter(text).count();
                }
                Child::Element(child_id) => {
                    let child = &self.nodes[child_id.0];
                    if child.tag == "a" {
                        info.link_length += child.info.text_length + child.info.link_length;
                    } else {
                        info.text_length += child.info.text_length;
                        info.link_length += child.info.link_length;
                    }
                    info.commas += child.info.commas;
                    for (tag, count) in &child.info.tag_count {
                        *info.tag_count.entry(tag.clone()).or_insert(0) += count;
                    }
                    *info.tag_count.entry(child.tag.clone()).or_insert(0) += 1;
                }
            }
        }
        if info.link_length != 0 {
            info.density = info.link_length as f64 / info.content_length() as f64;
        }
        self.nodes[id.0].info = info;
    }

    /// Descendants of `root` in document order, `root` excluded
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.element_children(root).rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.element_children(id).rev());
        }
        out
    }

    pub fn element_children(&self, id: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.nodes[id.0].children.iter().filter_map(|child| match child {
            Child::Element(id) => Some(*id),
            Child::Text(_) => None,
        })
    }

    /// Concatenated raw text of the subtree
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack: Vec<&Child> = self.nodes[id.0].children.iter().rev().collect();
        while let Some(child) = stack.pop() {
            match child {
                Child::Text(text) => out.push_str(text),
                Child::Element(child) => stack.extend(self.nodes[child.0].children.iter().rev()),
            }
        }
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = self.visits(id);
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Child(Child::Text(text)) => out.push_str(&encode_text(text)),
                Visit::Child(Child::Element(child)) => {
                    let node = &self.nodes[child.0];
                    out.push('<');
                    out.push_str(&node.tag);
                    for (name, value) in &node.attributes {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        out.push_str(&encode_double_quoted_attribute(value));
                        out.push('"');
                    }
                    if node.children.is_empty() {
                        if VOID_TAGS.contains(&node.tag.as_str()) {
                            out.push_str("/>");
                        } else {
                            out.push_str("></");
                            out.push_str(&node.tag);
                            out.push('>');
                        }
                        continue;
                    }
                    out.push('>');
                    stack.push(Visit::Close(*child));
                    stack.extend(node.children.iter().rev().map(Visit::Child));
                }
                Visit::Close(child) => {
                    out.push_str("</");
                    out.push_str(&self.nodes[child.0].tag);
                    out.push('>');
                }
            }
        }
        out
    }

    /// Plain text with line breaks around paragraphs, headers and list items
    pub fn formatted_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = self.visits(id);
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Child(Child::Text(text)) => out.push_str(&WHITESPACE.replace_all(text, " ")),
                Visit::Child(Child::Element(child)) => {
                    let node = &self.nodes[child.0];
                    if node.tag == "p" || HEADER_TAGS.contains(&node.tag.as_str()) {
                        out.push('\n');
                    }
                    stack.push(Visit::Close(*child));
                    stack.extend(node.children.iter().rev().map(Visit::Child));
                }
                Visit::Close(child) => {
                    if NEW_LINES_AFTER.contains(&self.nodes[child.0].tag.as_str()) {
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    /// Children of `id` queued so they pop in document order
    fn visits(&self, id: NodeId) -> Vec<Visit<'_>> {
        self.nodes[id.0].children.iter().rev().map(Visit::Child).collect()
    }
}

/// Pending work of the serializers, which keep their own stack since the
/// arena can be as deep as the page.
enum Visit<'a> {
    Child(&'a Child),
    Close(NodeId),
}

impl Index<NodeId> for Arena {
    type Output = ScoredNode;

    fn index(&self, id: NodeId) -> &ScoredNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut ScoredNode {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(arena: &mut Arena, parent: NodeId, tag: &str) -> NodeId {
        let id = arena.alloc(tag, Some(parent));
        arena[parent].children.push(Child::Element(id));
        id
    }

    #[test]
    fn test_info_counts_links_and_commas() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let link = attach(&mut arena, root, "a");
        arena[link].children.push(Child::Text("click here".into()));
        arena.compute_info(link);
        arena[root].children.push(Child::Text(" one, two, three ".into()));
        arena.compute_info(root);

        let info = &arena[root].info;
        assert_eq!(info.text_length, 15);
        assert_eq!(info.link_length, 10);
        assert_eq!(info.commas, 2);
        assert_eq!(info.count("a"), 1);
        assert!((info.density - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_html_serialization() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let p = attach(&mut arena, root, "p");
        arena[p].set_attr("title", "a \"b\"");
        arena[p].children.push(Child::Text("x < y".into()));
        attach(&mut arena, root, "br");

        assert_eq!(
            arena.inner_html(root),
            r#"<p title="a &quot;b&quot;">x &lt; y</p><br/>"#
        );
        assert_eq!(arena.text(root), "x < y");
    }

    #[test]
    fn test_formatted_text() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let h = attach(&mut arena, root, "h1");
        arena[h].children.push(Child::Text("Title".into()));
        let p = attach(&mut arena, root, "p");
        arena[p].children.push(Child::Text("Body   text".into()));

        assert_eq!(arena.formatted_text(root), "\nTitle\n\nBody text\n");
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let a = attach(&mut arena, root, "section");
        let b = attach(&mut arena, a, "p");
        let c = attach(&mut arena, root, "p");
        assert_eq!(arena.descendants(root), vec![a, b, c]);
    }

    #[test]
    fn test_serializers_handle_deep_trees() {
        let mut arena = Arena::new();
        let root = arena.alloc("document", None);
        let mut parent = root;
        for _ in 0..100_000 {
            parent = attach(&mut arena, parent, "section");
        }
        arena[parent].children.push(Child::Text("bottom".into()));

        assert_eq!(arena.text(root), "bottom");
        let html = arena.inner_html(root);
        assert!(html.starts_with("<section><section>"));
        assert!(html.ends_with("</section></section>"));
        assert!(arena.formatted_text(root).contains("bottom"));
    }

    #[test]
    fn test_tokens() {
        let mut arena = Arena::new();
        let id = arena.alloc("div", None);
        arena[id].element_data = " post-body main_text".into();
        let tokens: Vec<&str> = arena[id].tokens().collect();
        assert_eq!(tokens, vec!["post", "body", "main", "text"]);
    }
}
