//! Accessibility
//!
//! Label association and accessible-name computation.

use crate::{Document, NodeId};

/// Elements a `<label>` can be associated with
const LABELABLE: &[&str] =
    &["button", "input", "meter", "output", "progress", "select", "textarea"];

impl Document {
    /// Labels associated with a labelable element: `label[for=id]` in tree
    /// order followed by the nearest ancestor `label`.
    pub fn labels(&self, node: NodeId) -> Vec<NodeId> {
        let Some(tag) = self.tag_name(node) else { return Vec::new() };
        if !LABELABLE.contains(&tag) || self.get_attribute(node, "type") == Some("hidden") {
            return Vec::new();
        }

        let mut labels: Vec<NodeId> = match self.get_attribute(node, "id") {
            Some(id) if !id.is_empty() => self.descendants(self.root())
                .into_iter()
                .filter(|&n| {
                    self.tag_name(n) == Some("label") && self.get_attribute(n, "for") == Some(id)
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            if self.tag_name(ancestor) == Some("label") {
                if !labels.contains(&ancestor) {
                    labels.push(ancestor);
                }
                break;
            }
            current = self.parent(ancestor);
        }
        labels
    }

    /// Accessible name, first non-empty of: `aria-label`, text of the
    /// `aria-labelledby` referents, associated label text, `placeholder`,
    /// `title`, own text content. Empty when none applies.
    pub fn accessible_name(&self, node: NodeId) -> String {
        if let Some(label) = self.get_attribute(node, "aria-label").map(str::trim) {
            if !label.is_empty() {
                return label.to_string();
            }
        }

        if let Some(ids) = self.get_attribute(node, "aria-labelledby") {
            let text = ids.split_ascii_whitespace()
                .filter_map(|id| self.get_element_by_id(id))
                .map(|n| self.text_content(n).trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                return text;
            }
        }

        let label_text = self.labels(node)
            .into_iter()
            .map(|n| self.text_content(n).trim().to_string())
            .find(|t| !t.is_empty());
        if let Some(text) = label_text {
            return text;
        }

        for attr in ["placeholder", "title"] {
            if let Some(value) = self.get_attribute(node, attr).map(str::trim) {
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }

        self.text_content(node).trim().to_string()
    }
}
