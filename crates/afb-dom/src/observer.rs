//! Mutation records
//!
//! The document can log every mutation it performs so tests (and the
//! replay tool) can see the exact sequence of states a screen reader
//! would observe, including transient ones such as a cleared live region.

use crate::NodeId;

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Attribute set or removed
    Attribute(String),
    /// Text content replaced (`old_value`/`new_value` hold the text)
    ChildList,
    /// Node inserted under `target`
    Inserted(NodeId),
    /// Node removed from `target`
    Removed(NodeId),
}

impl MutationRecord {
    /// True for text replacements on `node`
    pub fn is_text_change_of(&self, node: NodeId) -> bool {
        self.target == node && self.kind == MutationKind::ChildList
    }
}

/// Recorder owned by the document
#[derive(Debug, Default)]
pub(crate) struct MutationLog {
    enabled: bool,
    records: Vec<MutationRecord>,
}

impl MutationLog {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.records.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push(&mut self, record: MutationRecord) {
        if self.enabled {
            self.records.push(record);
        }
    }

    pub fn take(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}
