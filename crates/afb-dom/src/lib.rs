//! afb DOM - Document Object Model
//!
//! Small arena-backed document used as the ARIA environment of the
//! feedback engine. It models exactly what assistive technology observes:
//! element attributes, text content, focus and mutations.

mod node;
mod document;
mod selector;
mod classlist;
mod observer;
mod accessibility;
mod media;

pub use node::{Node, NodeData, ElementData, Attribute};
pub use document::Document;
pub use selector::{Selector, Compound, Combinator, AttrMatch};
pub use classlist::TokenList;
pub use observer::{MutationRecord, MutationKind};
pub use media::MotionPreference;

/// Node identifier: arena slot plus the generation it was allocated in.
///
/// A handle becomes stale once its node is removed; every document
/// operation checks the generation before touching the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Arena slot
    pub fn index(self) -> u32 {
        self.index
    }

    /// Allocation generation
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// DOM error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Stale node handle {0}")]
    StaleNode(NodeId),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("Cannot insert {child} into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}
