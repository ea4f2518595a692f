//! DOM Node
//!
//! Nodes live in the document arena and link to each other by `NodeId`.

use crate::NodeId;

/// DOM node
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (None for the document root and detached nodes)
    pub parent: Option<NodeId>,
    /// Children in tree order
    pub children: Vec<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    /// Create the document node
    pub fn document() -> Self {
        Self { parent: None, children: Vec::new(), data: NodeData::Document }
    }

    /// Create an element node
    pub fn element(tag: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData::new(tag)),
        }
    }

    /// Create a text node
    pub fn text(content: impl Into<String>) -> Self {
        Self { parent: None, children: Vec::new(), data: NodeData::Text(content.into()) }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

/// Element data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in insertion order
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self { tag: tag.to_ascii_lowercase(), attrs: Vec::new() }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, returning the previous value
    pub fn set_attr(&mut self, name: &str, value: String) -> Option<String> {
        for attr in self.attrs.iter_mut() {
            if attr.name.eq_ignore_ascii_case(name) {
                return Some(std::mem::replace(&mut attr.value, value));
            }
        }
        self.attrs.push(Attribute { name: name.to_ascii_lowercase(), value });
        None
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(pos).value)
    }

    /// Value of the `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}
