//! Document - High-level document API
//!
//! Generational arena of nodes with the handful of DOM operations the
//! feedback engine and its callers need.

use crate::node::{Node, NodeData};
use crate::observer::{MutationKind, MutationLog, MutationRecord};
use crate::selector::{Combinator, Compound, Selector};
use crate::{DomError, MotionPreference, NodeId, TokenList};

/// Elements that are focusable without a tabindex
const NATIVELY_FOCUSABLE: &[&str] =
    &["a", "button", "input", "select", "textarea", "details", "summary"];

/// Elements that can carry a `disabled` state
const DISABLEABLE: &[&str] =
    &["button", "input", "select", "textarea", "fieldset", "optgroup", "option"];

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// HTML document
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    active: Option<NodeId>,
    motion: MotionPreference,
    mutations: MutationLog,
}

impl Document {
    /// Create a document with `html`, `head` and `body`
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            head: NodeId { index: 0, generation: 0 },
            body: NodeId { index: 0, generation: 0 },
            active: None,
            motion: MotionPreference::default(),
            mutations: MutationLog::default(),
        };
        doc.root = doc.alloc(Node::document());
        let html = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.link(doc.root, html);
        doc.link(html, doc.head);
        doc.link(html, doc.body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ------------------------------------------------------------------
    // Arena
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId { index, generation: 0 }
            }
        }
    }

    /// Get a node by handle
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.get(id).ok_or(DomError::StaleNode(id))
    }

    /// Whether the handle still refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::text(text))
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
    }

    fn unlink(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.get_mut(child)?.parent.take()?;
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        Some(parent)
    }

    /// Append `child` to `parent`, moving it if it is already attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let p = self.node(parent)?;
        self.node(child)?;
        if p.as_text().is_some()
            || child == self.root
            || self.is_inclusive_ancestor(child, parent)
        {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        self.unlink(child);
        self.link(parent, child);
        self.mutations.push(MutationRecord {
            kind: MutationKind::Inserted(child),
            target: parent,
            old_value: None,
            new_value: None,
        });
        Ok(())
    }

    /// Detach `node` and free its subtree
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        if node == self.root {
            return Err(DomError::HierarchyRequest { parent: node, child: node });
        }
        if let Some(parent) = self.unlink(node) {
            self.mutations.push(MutationRecord {
                kind: MutationKind::Removed(node),
                target: parent,
                old_value: None,
                new_value: None,
            });
        }
        self.free_subtree(node);
        Ok(())
    }

    fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if self.active == Some(id) {
                self.active = None;
            }
            if let Some(slot) = self.slots.get_mut(id.index as usize) {
                if slot.generation == id.generation {
                    if let Some(n) = slot.node.take() {
                        stack.extend(n.children);
                        self.free.push(id.index);
                    }
                }
            }
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is attached to the document
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(node) && self.is_inclusive_ancestor(self.root, node)
    }

    /// Descendant elements of `scope` in tree order (excluding `scope`)
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.get(id).is_some_and(Node::is_element) {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    // ------------------------------------------------------------------
    // Elements and attributes
    // ------------------------------------------------------------------

    /// Lowercase tag name, None for non-elements
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.as_element().map(|e| e.tag.as_str())
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)?.as_element()?.get_attr(name)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.get_mut(node)
            .ok_or(DomError::StaleNode(node))?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        let old = element.set_attr(name, value.to_string());
        self.mutations.push(MutationRecord {
            kind: MutationKind::Attribute(name.to_ascii_lowercase()),
            target: node,
            old_value: old,
            new_value: Some(value.to_string()),
        });
        Ok(())
    }

    pub fn remove_attribute(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> Result<Option<String>, DomError> {
        let element = self.get_mut(node)
            .ok_or(DomError::StaleNode(node))?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        let old = element.remove_attr(name);
        if old.is_some() {
            self.mutations.push(MutationRecord {
                kind: MutationKind::Attribute(name.to_ascii_lowercase()),
                target: node,
                old_value: old.clone(),
                new_value: None,
            });
        }
        Ok(old)
    }

    /// Class tokens of an element
    pub fn class_list(&self, node: NodeId) -> TokenList {
        TokenList::parse(self.get_attribute(node, "class").unwrap_or(""))
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).contains(class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut list = self.class_list(node);
        if list.add(class) {
            self.set_attribute(node, "class", &list.value())?;
        }
        Ok(())
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut list = self.class_list(node);
        if list.remove(class) {
            self.set_attribute(node, "class", &list.value())?;
        }
        Ok(())
    }

    /// Add or remove `class` (forced when `force` is set), returning whether it is now present
    pub fn toggle_class(
        &mut self,
        node: NodeId,
        class: &str,
        force: Option<bool>,
    ) -> Result<bool, DomError> {
        let mut list = self.class_list(node);
        let before = list.clone();
        let present = list.toggle(class, force);
        if list != before {
            self.set_attribute(node, "class", &list.value())?;
        }
        Ok(present)
    }

    /// Swap `old` for `new` in place; false if `old` was absent
    pub fn replace_class(&mut self, node: NodeId, old: &str, new: &str) -> Result<bool, DomError> {
        let mut list = self.class_list(node);
        if !list.replace(old, new) {
            return Ok(false);
        }
        self.set_attribute(node, "class", &list.value())?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.get(node) else { return };
        match &n.data {
            NodeData::Text(t) => out.push_str(t),
            _ => {
                for &child in &n.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Replace all children with a single text node (none for "")
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        let old = self.text_content(node);
        let n = self.get_mut(node).ok_or(DomError::StaleNode(node))?;
        if let NodeData::Text(t) = &mut n.data {
            *t = text.to_string();
        } else {
            let children = std::mem::take(&mut n.children);
            for child in children {
                if let Some(c) = self.get_mut(child) {
                    c.parent = None;
                }
                self.free_subtree(child);
            }
            if !text.is_empty() {
                let text_node = self.alloc(Node::text(text));
                self.link(node, text_node);
            }
        }
        self.mutations.push(MutationRecord {
            kind: MutationKind::ChildList,
            target: node,
            old_value: Some(old),
            new_value: Some(text.to_string()),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// First connected element with the given id, in tree order
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.get_attribute(n, "id") == Some(id))
    }

    /// First element in the document matching `selector`
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        self.query_selector_in(self.root, selector)
    }

    /// First descendant of `scope` matching `selector`
    pub fn query_selector_in(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants(scope).into_iter().find(|&n| self.matches(n, &selector)))
    }

    /// All descendants of `scope` matching `selector`
    pub fn query_selector_all(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants(scope).into_iter().filter(|&n| self.matches(n, &selector)).collect())
    }

    /// Whether `node` matches a parsed selector
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        match selector.compounds().len().checked_sub(1) {
            Some(last) => self.matches_from(node, selector, last),
            None => false,
        }
    }

    fn matches_from(&self, node: NodeId, selector: &Selector, idx: usize) -> bool {
        let Some(compound) = selector.compounds().get(idx) else {
            return false;
        };
        if !self.matches_compound(node, compound) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        let Some(&combinator) = selector.combinators().get(idx - 1) else {
            return false;
        };
        match combinator {
            Combinator::Child => self.parent(node)
                .is_some_and(|p| self.matches_from(p, selector, idx - 1)),
            Combinator::Descendant => {
                let mut current = self.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_from(ancestor, selector, idx - 1) {
                        return true;
                    }
                    current = self.parent(ancestor);
                }
                false
            }
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.get(node).and_then(Node::as_element) else {
            return false;
        };
        if compound.tag.as_ref().is_some_and(|t| *t != element.tag) {
            return false;
        }
        if compound.id.as_ref().is_some_and(|id| element.id() != Some(id.as_str())) {
            return false;
        }
        if !compound.classes.is_empty() {
            let classes = TokenList::parse(element.get_attr("class").unwrap_or(""));
            if !compound.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        compound.attrs.iter().all(|a| match (&a.value, element.get_attr(&a.name)) {
            (None, found) => found.is_some(),
            (Some(want), Some(have)) => want == have,
            (Some(_), None) => false,
        })
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    /// Currently focused element
    pub fn active_element(&self) -> Option<NodeId> {
        self.active.filter(|&n| self.contains(n))
    }

    /// Clear focus
    pub fn blur(&mut self) {
        self.active = None;
    }

    /// Move focus to `node`.
    ///
    /// Like `HTMLElement.focus()`, elements that cannot take focus are
    /// ignored without error; only stale handles fail.
    pub fn focus(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        if self.can_focus(node) {
            tracing::trace!("focus -> {}", node);
            self.active = Some(node);
        }
        Ok(())
    }

    fn can_focus(&self, node: NodeId) -> bool {
        let Some(tag) = self.tag_name(node) else { return false };
        if !self.is_connected(node) || !self.is_rendered(node) || self.is_disabled(node) {
            return false;
        }
        self.is_natively_focusable(node)
            || self.get_attribute(node, "tabindex").is_some_and(|v| v.trim().parse::<i32>().is_ok())
            || self.is_content_editable(node)
            || tag == "body"
    }

    fn is_natively_focusable(&self, node: NodeId) -> bool {
        match self.tag_name(node) {
            Some("a") => self.has_attribute(node, "href"),
            Some("input") => self.get_attribute(node, "type") != Some("hidden"),
            Some(tag) => NATIVELY_FOCUSABLE.contains(&tag),
            None => false,
        }
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        matches!(self.get_attribute(node, "contenteditable"), Some("" | "true" | "plaintext-only"))
    }

    /// Disabled form control
    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some_and(|t| DISABLEABLE.contains(&t))
            && self.has_attribute(node, "disabled")
    }

    /// Reachable by sequential (Tab) navigation
    pub fn is_focusable(&self, node: NodeId) -> bool {
        if self.tag_name(node).is_none() || self.is_disabled(node) {
            return false;
        }
        if let Some(tabindex) = self.get_attribute(node, "tabindex") {
            return tabindex.trim().parse::<i32>().is_ok_and(|n| n >= 0);
        }
        self.is_natively_focusable(node) || self.is_content_editable(node)
    }

    /// False when the node or an ancestor is `hidden` or `display:none`
    pub fn is_rendered(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let hidden = self.has_attribute(id, "hidden");
            if hidden || self.get_attribute(id, "style").is_some_and(hides) {
                return false;
            }
            current = self.parent(id);
        }
        true
    }

    // ------------------------------------------------------------------
    // Media and mutation log
    // ------------------------------------------------------------------

    pub fn motion_preference(&self) -> MotionPreference {
        self.motion
    }

    pub fn set_motion_preference(&mut self, pref: MotionPreference) {
        self.motion = pref;
    }

    pub fn prefers_reduced_motion(&self) -> bool {
        self.motion.should_reduce()
    }

    /// Start or stop recording mutations (stopping drops pending records)
    pub fn record_mutations(&mut self, enabled: bool) {
        self.mutations.set_enabled(enabled);
    }

    pub fn is_recording_mutations(&self) -> bool {
        self.mutations.is_enabled()
    }

    /// Drain recorded mutations
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        self.mutations.take()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn hides(style: &str) -> bool {
    style.split(';').any(|decl| {
        let mut parts = decl.splitn(2, ':');
        let prop = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        prop.eq_ignore_ascii_case("display") && value.eq_ignore_ascii_case("none")
    })
}
