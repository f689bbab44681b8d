//! Tree-to-row flattening over a generic document node.
//!
//! [`flatten_node`] turns one repeated catalog element into a [`Row`]:
//! - every attribute becomes a column keyed by the attribute name
//! - every leaf child becomes a column keyed by its tag, valued with its
//!   trimmed text, or null when that text is empty
//! - every non-leaf child becomes a column keyed by its tag, valued with its
//!   serialized markup, trimmed
//!
//! Later keys overwrite earlier ones but keep their first position.

use crate::models::Row;

/// Minimal view of a document element needed for flattening.
pub trait CatalogNode: Sized {
    /// Local tag name.
    fn tag(&self) -> &str;

    /// Attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Child elements in document order (text and comments excluded).
    fn child_elements(&self) -> Vec<Self>;

    /// Concatenated text of this element's direct text children.
    fn direct_text(&self) -> String;

    /// Serialized markup of this element and its subtree.
    fn markup(&self) -> String;
}

/// Flattens `node` into a row.
///
/// When `text_column` is set and the node's own text is non-empty, that
/// text is stored under `text_column` unless a column with that name was
/// already produced from an attribute or child.
pub fn flatten_node<N: CatalogNode>(node: &N, text_column: Option<&str>) -> Row {
    let mut row = Row::new();

    for (name, value) in node.attributes() {
        row.insert(name, Some(value));
    }

    for child in node.child_elements() {
        let value = if child.child_elements().is_empty() {
            Some(child.direct_text().trim().to_string()).filter(|text| !text.is_empty())
        } else {
            Some(child.markup().trim().to_string())
        };
        row.insert(child.tag().to_string(), value);
    }

    if let Some(column) = text_column {
        let text = node.direct_text();
        let text = text.trim();
        if !text.is_empty() && !row.contains_key(column) {
            row.insert(column, Some(text.to_string()));
        }
    }

    row
}

/// Owned element tree, for building catalogs in memory.
///
/// # Example
/// ```rust
/// use feedsync_core::source::{Element, flatten_node};
///
/// let offer = Element::new("offer")
///     .with_attribute("id", "7")
///     .with_child(Element::new("price").with_text("9.99"));
///
/// let row = flatten_node(&offer, None);
/// assert_eq!(row.get("price"), Some("9.99"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Direct text content
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_xml(value, true));
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape_xml(&self.text, false));
        for child in &self.children {
            child.write_markup(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_xml(value: &str, in_attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if in_attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl<'a> CatalogNode for &'a Element {
    fn tag(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.clone()
    }

    fn child_elements(&self) -> Vec<Self> {
        let element: &'a Element = *self;
        element.children.iter().collect()
    }

    fn direct_text(&self) -> String {
        self.text.clone()
    }

    fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }
}

impl CatalogNode for Element {
    fn tag(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.clone()
    }

    fn child_elements(&self) -> Vec<Self> {
        self.children.clone()
    }

    fn direct_text(&self) -> String {
        self.text.clone()
    }

    fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }
}
