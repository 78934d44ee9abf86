//! Mutable HTML document tree.
//!
//! Transformers only see the [`DocumentModel`] trait, which is the full set
//! of tree operations they are allowed to perform:
//!
//! | Operation | Method |
//! |---|---|
//! | Query | [`select`](DocumentModel::select) (document order) |
//! | Attributes | [`attr`](DocumentModel::attr), [`set_attr`](DocumentModel::set_attr), [`remove_attr`](DocumentModel::remove_attr) |
//! | Classes | [`classes`](DocumentModel::classes), [`set_classes`](DocumentModel::set_classes), [`add_class`](DocumentModel::add_class), [`remove_class`](DocumentModel::remove_class) |
//! | Inline style | [`set_style`](DocumentModel::set_style) |
//! | Construction | [`create_element`](DocumentModel::create_element), [`create_text`](DocumentModel::create_text), [`deep_clone`](DocumentModel::deep_clone) |
//! | Structure | [`append_child`](DocumentModel::append_child), [`insert_after`](DocumentModel::insert_after), [`replace_with`](DocumentModel::replace_with), [`remove`](DocumentModel::remove) |
//! | Output | [`outer_html`](DocumentModel::outer_html), [`serialize`](DocumentModel::serialize) |
//!
//! [`Document`] wraps a [`scraper::Html`] tree. Parsing is html5ever's HTML5
//! tree construction, so script and style bodies stay raw text, stray `<`
//! characters become text, and implied end tags are closed the way a browser
//! closes them. Selectors are parsed and matched by `scraper`.
//!
//! Input that starts with a doctype or an `<html>` tag is parsed as a full
//! document (html5ever adds a missing `<head>`/`<body>`). Anything else is
//! parsed as a body fragment and serialized without a wrapper, so a fragment
//! never grows a `<head>`.
//!
//! Nodes are addressed by [`NodeId`]. A clone is a new set of tree slots,
//! never a shared reference, so mutating a clone cannot leak into the
//! original. Detached nodes keep their slots until the document is dropped
//! but are never selected or serialized.

mod style;

pub use ego_tree::NodeId;

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Parse a CSS selector list (`img[src]`, `img:not(.skip)`, `picture > img`, ...).
pub fn parse_selector(selector: &str) -> Result<Selector, DocumentError> {
    Selector::parse(selector).map_err(|e| DocumentError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Tree operations available to transformers.
pub trait DocumentModel {
    /// All elements matching `selector`, in document order.
    fn select(&self, selector: &str) -> Result<Vec<NodeId>, DocumentError>;

    /// Lower-cased tag name, `None` for non-element nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Attribute value. Valueless attributes read as `""`.
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Set an attribute, keeping its position if it already exists.
    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attr(&mut self, node: NodeId, name: &str);

    /// Whitespace-separated tokens of the `class` attribute.
    fn classes(&self, node: NodeId) -> Vec<String> {
        self.attr(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Replace the `class` attribute with `classes` joined by spaces.
    fn set_classes(&mut self, node: NodeId, classes: &[String]) {
        self.set_attr(node, "class", &classes.join(" "));
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_classes(node, &classes);
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() != before {
            self.set_classes(node, &classes);
        }
    }

    /// Set one declaration of the inline `style` attribute.
    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let current = self.attr(node, "style").unwrap_or("");
        let updated = style::set_declaration(current, property, value);
        self.set_attr(node, "style", &updated);
    }

    /// New detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// New detached text node. Escaped on output, except inside raw-text
    /// elements such as `<style>` and `<script>`.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Detached, independent copy of `node` and its subtree.
    fn deep_clone(&mut self, node: NodeId) -> NodeId;

    /// Parent node, `None` for top-level and detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Append `child` as the last child of `parent`, detaching it first.
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `node` as the next sibling of `anchor`, detaching it first.
    fn insert_after(&mut self, anchor: NodeId, node: NodeId);

    /// Put `replacement` where `target` is and detach `target`.
    fn replace_with(&mut self, target: NodeId, replacement: NodeId);

    /// Detach `node` (and its subtree) from the tree.
    fn remove(&mut self, node: NodeId);

    /// Markup of `node` and its subtree.
    fn outer_html(&self, node: NodeId) -> String;

    /// Markup of the whole document.
    fn serialize(&self) -> String;
}

/// HTML document backed by an html5ever-built tree.
pub struct Document {
    html: Html,
    /// Parsed as a body fragment: the tree's `<html>` element is a wrapper
    /// that is never selected or written out.
    fragment: bool,
    /// Set by every edit that can change the serialized output.
    modified: bool,
}

impl Document {
    /// Parse an HTML string. Malformed markup is recovered from, never rejected.
    pub fn parse(html: &str) -> Self {
        if is_full_document(html) {
            Self {
                html: Html::parse_document(html),
                fragment: false,
                modified: false,
            }
        } else {
            Self {
                html: Html::parse_fragment(html),
                fragment: true,
                modified: false,
            }
        }
    }

    /// Whether any attribute or tree edit has been made since parsing.
    /// Creating or cloning detached nodes does not count.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Node whose children are the top-level nodes of the input.
    fn top(&self) -> NodeId {
        if self.fragment {
            self.html.root_element().id()
        } else {
            self.html.tree.root().id()
        }
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        self.html.tree.get(id)?.value().as_element()
    }

    /// Rebuild the element's attribute list. A fresh [`Element`] keeps
    /// scraper's cached id and class lookups in step with the attributes.
    fn edit_attrs(&mut self, id: NodeId, edit: impl FnOnce(&mut Vec<(String, String)>)) {
        let Some(mut node) = self.html.tree.get_mut(id) else {
            return;
        };
        let Node::Element(element) = node.value() else {
            return;
        };
        let mut attrs: Vec<(String, String)> = element
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        edit(&mut attrs);
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(name.as_str())),
                value: StrTendril::from_slice(&value),
            })
            .collect();
        *element = Element::new(element.name.clone(), attrs);
        self.modified = true;
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            if node.parent().is_some() {
                node.detach();
                self.modified = true;
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::parse("")
    }
}

/// Doctype or `<html>` first, after whitespace and comments.
fn is_full_document(html: &str) -> bool {
    let mut rest = html.trim_start_matches('\u{feff}').trim_start();
    while let Some(comment) = rest.strip_prefix("<!--") {
        match comment.find("-->") {
            Some(end) => rest = comment[end + 3..].trim_start(),
            None => return false,
        }
    }
    starts_with_ignore_case(rest, "<!doctype") || starts_with_ignore_case(rest, "<html")
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

impl DocumentModel for Document {
    fn select(&self, selector: &str) -> Result<Vec<NodeId>, DocumentError> {
        let selector = parse_selector(selector)?;
        let top = self.top();
        Ok(self
            .html
            .tree
            .root()
            .descendants()
            .filter(|node| node.id() != top)
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(|element| element.id())
            .collect())
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.name())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(&name.to_ascii_lowercase())
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        self.edit_attrs(node, |attrs| {
            match attrs.iter().position(|(n, _)| *n == name) {
                Some(i) => attrs[i].1 = value.to_string(),
                None => attrs.push((name, value.to_string())),
            }
        });
    }

    fn remove_attr(&mut self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        self.edit_attrs(node, |attrs| attrs.retain(|(n, _)| *n != name));
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag.to_ascii_lowercase().as_str()),
        );
        self.html
            .tree
            .orphan(Node::Element(Element::new(name, Vec::new())))
            .id()
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.html
            .tree
            .orphan(Node::Text(Text {
                text: StrTendril::from_slice(text),
            }))
            .id()
    }

    fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let Some(source) = self.html.tree.get(node) else {
            return node;
        };
        let value = source.value().clone();
        let children: Vec<NodeId> = source.children().map(|child| child.id()).collect();

        let copy = self.html.tree.orphan(value).id();
        for child in children {
            let child_copy = self.deep_clone(child);
            if let Some(mut parent) = self.html.tree.get_mut(copy) {
                parent.append_id(child_copy);
            }
        }
        copy
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.html.tree.get(node)?.parent()?.id();
        (parent != self.top() && parent != self.html.tree.root().id()).then_some(parent)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child {
            return;
        }
        self.detach(child);
        if let Some(mut parent) = self.html.tree.get_mut(parent) {
            parent.append_id(child);
            self.modified = true;
        }
    }

    fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.detach(node);
        let attached = self
            .html
            .tree
            .get(anchor)
            .is_some_and(|a| a.parent().is_some());
        if !attached {
            return;
        }
        if let Some(mut anchor) = self.html.tree.get_mut(anchor) {
            anchor.insert_id_after(node);
            self.modified = true;
        }
    }

    fn replace_with(&mut self, target: NodeId, replacement: NodeId) {
        if target == replacement {
            return;
        }
        self.insert_after(target, replacement);
        self.detach(target);
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn outer_html(&self, node: NodeId) -> String {
        let Some(node) = self.html.tree.get(node) else {
            return String::new();
        };
        match node.value() {
            Node::Text(text) => String::from(&*text.text),
            _ => ElementRef::wrap(node).map(|el| el.html()).unwrap_or_default(),
        }
    }

    fn serialize(&self) -> String {
        if self.fragment {
            self.html.root_element().inner_html()
        } else {
            self.html.html()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(doc: &Document, selector: &str) -> NodeId {
        doc.select(selector).unwrap()[0]
    }

    fn round_trip(html: &str) -> String {
        Document::parse(html).serialize()
    }

    #[test]
    fn parse_and_serialize_simple_markup() {
        let html = r#"<div><p>Hello <b>world</b></p><img src="a.png"></div>"#;
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn full_document_keeps_doctype() {
        let html = "<!DOCTYPE html><html><head></head><body></body></html>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn full_document_gets_implied_head_and_body() {
        assert_eq!(
            round_trip("<!doctype html><p>x</p>"),
            "<!DOCTYPE html><html><head></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn fragment_grows_no_wrapper() {
        assert_eq!(round_trip("<p>fragment</p>"), "<p>fragment</p>");
        assert!(Document::parse("<p>fragment</p>").select("head, body, html").unwrap().is_empty());
    }

    #[test]
    fn document_detection() {
        assert!(is_full_document("<!DOCTYPE html><p></p>"));
        assert!(is_full_document("\n  <!-- generated -->\n<HTML lang=\"en\">"));
        assert!(!is_full_document("<p>hi</p>"));
        assert!(!is_full_document("<!-- unterminated"));
    }

    #[test]
    fn script_body_is_raw_text() {
        let html = r#"<script>for (var i = 0; i < n; i++) {}</script><img src="a.png">"#;
        let doc = Document::parse(html);
        assert_eq!(doc.serialize(), html);
        let img = first(&doc, "img");
        assert_eq!(doc.parent(img), None);
    }

    #[test]
    fn markup_inside_script_is_not_an_element() {
        let doc = Document::parse(
            r#"<script>document.write('<img srcset="x.jpg 800w">');</script>"#,
        );
        assert!(doc.select("img").unwrap().is_empty());
    }

    #[test]
    fn style_body_is_raw_text() {
        let html = "<style>.a > b { color: red }</style><p>x</p>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn stray_angle_brackets_become_text() {
        assert_eq!(
            round_trip("<p>1 < 2 and 3 > 2</p>"),
            "<p>1 &lt; 2 and 3 &gt; 2</p>"
        );
    }

    #[test]
    fn implied_end_tags_are_closed() {
        assert_eq!(round_trip("<p>one<p>two"), "<p>one</p><p>two</p>");
    }

    #[test]
    fn entities_survive() {
        let html = "<p>Fish &amp; chips</p>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn comments_are_kept() {
        let html = "<div><!-- note --><p>x</p></div>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn valueless_attributes_read_as_empty() {
        let doc = Document::parse("<input disabled>");
        let input = first(&doc, "input");
        assert_eq!(doc.attr(input, "disabled"), Some(""));
        assert_eq!(doc.serialize(), r#"<input disabled="">"#);
    }

    #[test]
    fn select_returns_document_order() {
        let d = Document::parse(
            r#"<div><img src="1.png"><p><img src="2.png"></p></div><img src="3.png">"#,
        );
        let srcs: Vec<&str> = d
            .select("img")
            .unwrap()
            .into_iter()
            .map(|id| d.attr(id, "src").unwrap())
            .collect();
        assert_eq!(srcs, vec!["1.png", "2.png", "3.png"]);
    }

    #[test]
    fn pseudo_classes_and_sibling_combinators() {
        let d = Document::parse(
            r#"<img class="skip" src="1.png"><img src="2.png"><span></span><img src="3.png">"#,
        );
        let not_skipped: Vec<_> = d
            .select("img:not(.skip)")
            .unwrap()
            .into_iter()
            .map(|id| d.attr(id, "src").unwrap())
            .collect();
        assert_eq!(not_skipped, vec!["2.png", "3.png"]);
        assert_eq!(d.select("span + img").unwrap().len(), 1);
        assert_eq!(d.select(".skip ~ img").unwrap().len(), 2);
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let d = Document::parse(r#"<IMG SRC="a.png">"#);
        let img = first(&d, "img");
        assert_eq!(d.tag_name(img), Some("img"));
        assert_eq!(d.attr(img, "src"), Some("a.png"));
        assert_eq!(d.attr(img, "SRC"), Some("a.png"));
    }

    #[test]
    fn set_attr_updates_in_place_and_appends() {
        let mut d = Document::parse(r#"<img src="a.png" alt="A">"#);
        let img = first(&d, "img");
        d.set_attr(img, "src", "b.png");
        d.set_attr(img, "title", "B");
        assert_eq!(d.serialize(), r#"<img src="b.png" alt="A" title="B">"#);
        d.remove_attr(img, "src");
        assert_eq!(d.serialize(), r#"<img alt="A" title="B">"#);
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut d = Document::parse("<img>");
        let img = first(&d, "img");
        d.set_attr(img, "alt", r#"say "hi" & go"#);
        assert_eq!(d.serialize(), r#"<img alt="say &quot;hi&quot; &amp; go">"#);
    }

    #[test]
    fn class_edits_are_visible_to_selectors() {
        let mut d = Document::parse(r#"<div class="a  b"></div>"#);
        let div = first(&d, "div");
        assert_eq!(d.select(".b").unwrap(), vec![div]);
        assert_eq!(d.classes(div), vec!["a", "b"]);
        d.add_class(div, "c");
        d.add_class(div, "a");
        d.remove_class(div, "b");
        assert_eq!(d.attr(div, "class"), Some("a c"));
        assert!(d.select(".b").unwrap().is_empty());
        assert_eq!(d.select("div.a.c").unwrap(), vec![div]);
    }

    #[test]
    fn set_style_builds_declarations() {
        let mut d = Document::parse("<div></div>");
        let div = first(&d, "div");
        d.set_style(div, "padding-top", "50.0000%");
        d.set_style(div, "background-image", "url(data:image/png;base64,AAAA)");
        assert_eq!(
            d.attr(div, "style"),
            Some("padding-top: 50.0000%; background-image: url(data:image/png;base64,AAAA);")
        );
        d.set_style(div, "padding-top", "75.0000%");
        assert_eq!(
            d.attr(div, "style"),
            Some("padding-top: 75.0000%; background-image: url(data:image/png;base64,AAAA);")
        );
    }

    #[test]
    fn clone_is_independent() {
        let mut d = Document::parse(r#"<p><img class="x"></p>"#);
        let img = first(&d, "img");
        let copy = d.deep_clone(img);
        d.set_attr(copy, "class", "");
        assert_eq!(d.attr(img, "class"), Some("x"));
        assert_eq!(d.parent(copy), None);
        // Detached clones are not part of the output.
        assert_eq!(d.serialize(), r#"<p><img class="x"></p>"#);
    }

    #[test]
    fn clone_copies_subtree() {
        let mut d = Document::parse("<figure><img src=\"a.png\"><figcaption>A</figcaption></figure>");
        let figure = first(&d, "figure");
        let copy = d.deep_clone(figure);
        d.insert_after(figure, copy);
        assert_eq!(d.select("figure > figcaption").unwrap().len(), 2);
        assert_eq!(d.outer_html(copy), d.outer_html(figure));
    }

    #[test]
    fn insert_after_and_remove() {
        let mut d = Document::parse("<div><a></a><b></b></div>");
        let a = first(&d, "a");
        let span = d.create_element("span");
        d.insert_after(a, span);
        assert_eq!(d.serialize(), "<div><a></a><span></span><b></b></div>");
        d.remove(a);
        assert_eq!(d.serialize(), "<div><span></span><b></b></div>");
    }

    #[test]
    fn insert_after_top_level_node() {
        let mut d = Document::parse("<img><p></p>");
        let img = first(&d, "img");
        let picture = d.create_element("picture");
        d.insert_after(img, picture);
        assert_eq!(d.serialize(), "<img><picture></picture><p></p>");
        assert_eq!(d.parent(picture), None);
    }

    #[test]
    fn replace_with_moves_replacement() {
        let mut d = Document::parse("<div><img src=\"a.png\"></div>");
        let img = first(&d, "img");
        let wrapper = d.create_element("figure");
        let copy = d.deep_clone(img);
        d.append_child(wrapper, copy);
        d.replace_with(img, wrapper);
        assert_eq!(
            d.serialize(),
            "<div><figure><img src=\"a.png\"></figure></div>"
        );
    }

    #[test]
    fn mutations_are_visible_to_later_queries() {
        let mut d = Document::parse(r#"<img src="a.png">"#);
        let img = first(&d, "img");
        let picture = d.create_element("picture");
        d.insert_after(img, picture);
        d.append_child(picture, img);
        assert_eq!(d.select("picture > img").unwrap(), vec![img]);
        assert_eq!(d.parent(img), Some(picture));
    }

    #[test]
    fn detached_nodes_are_not_selected() {
        let mut d = Document::parse(r#"<img src="a.png"><img src="b.png">"#);
        let imgs = d.select("img").unwrap();
        d.remove(imgs[0]);
        assert_eq!(d.select("img").unwrap(), vec![imgs[1]]);
        assert_eq!(d.serialize(), r#"<img src="b.png">"#);
    }

    #[test]
    fn created_style_text_is_written_raw() {
        let mut d = Document::parse("<html><head></head><body></body></html>");
        let head = first(&d, "head");
        let style = d.create_element("style");
        let css = d.create_text(".a > b { color: red }");
        d.append_child(style, css);
        d.append_child(head, style);
        assert_eq!(
            d.serialize(),
            "<html><head><style>.a > b { color: red }</style></head><body></body></html>"
        );
    }

    #[test]
    fn created_text_is_escaped_outside_raw_text_elements() {
        let mut d = Document::parse("<p></p>");
        let p = first(&d, "p");
        let text = d.create_text("a < b");
        d.append_child(p, text);
        assert_eq!(d.serialize(), "<p>a &lt; b</p>");
    }

    #[test]
    fn modification_tracking() {
        let mut d = Document::parse(r#"<p><img src="a.png"></p>"#);
        let img = first(&d, "img");
        let copy = d.deep_clone(img);
        d.create_element("picture");
        d.remove(copy);
        assert!(!d.is_modified());
        d.set_attr(copy, "alt", "");
        assert!(d.is_modified());

        let mut d = Document::parse("<p></p>");
        let p = first(&d, "p");
        let span = d.create_element("span");
        d.append_child(p, span);
        assert!(d.is_modified());
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let d = Document::parse("<p></p>");
        assert!(matches!(
            d.select("p[src"),
            Err(DocumentError::InvalidSelector { .. })
        ));
    }
}
