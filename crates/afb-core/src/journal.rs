//! Feedback journal
//!
//! Bounded history of pipeline outcomes for debugging and export.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::events::{FeedbackAction, FeedbackReport};
use crate::types::FeedbackType;

/// Entries kept before the oldest is dropped
pub const JOURNAL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    /// Position in the overall history (survives trimming)
    pub seq: u64,
    #[serde(flatten)]
    pub report: FeedbackReport,
}

/// Aggregates over the retained entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    pub total: usize,
    pub by_type: BTreeMap<FeedbackType, usize>,
    pub by_action: BTreeMap<FeedbackAction, usize>,
    pub focus_moved: usize,
    pub focus_blocked: usize,
    pub visual_shown: usize,
    pub deduped: usize,
    pub replaced: usize,
}

#[derive(Debug)]
pub struct FeedbackJournal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    next_seq: u64,
    /// Mirror entries to the log at info level
    verbose: bool,
}

impl Default for FeedbackJournal {
    fn default() -> Self {
        Self::with_capacity(JOURNAL_CAPACITY)
    }
}

impl FeedbackJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity, next_seq: 0, verbose: false }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn record(&mut self, report: FeedbackReport) {
        if self.verbose {
            tracing::info!(
                action = report.action.as_str(),
                kind = %report.feedback_type,
                id = %report.id,
                message = %report.message,
                region = report.region.map(|r| r.as_str()),
                focus_moved = report.focus.moved,
                focus_blocked = report.focus.blocked_reason.as_deref(),
                visual_shown = report.visual_shown,
                "feedback"
            );
        }
        self.entries.push_back(JournalEntry { seq: self.next_seq, report });
        self.next_seq += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    /// Last `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<&JournalEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }

    pub fn by_type(&self, feedback_type: FeedbackType) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| e.report.feedback_type == feedback_type).collect()
    }

    pub fn by_action(&self, action: FeedbackAction) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| e.report.action == action).collect()
    }

    pub fn stats(&self) -> JournalStats {
        let mut stats = JournalStats { total: self.entries.len(), ..Default::default() };
        for entry in &self.entries {
            let r = &entry.report;
            *stats.by_type.entry(r.feedback_type).or_default() += 1;
            *stats.by_action.entry(r.action).or_default() += 1;
            stats.focus_moved += r.focus.moved as usize;
            stats.focus_blocked += r.focus.blocked_reason.is_some() as usize;
            stats.visual_shown += r.visual_shown as usize;
            stats.deduped += r.deduped as usize;
            stats.replaced += r.replaced as usize;
        }
        stats
    }

    /// Pretty-printed JSON array of the retained entries
    pub fn export_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FocusSummary;

    fn report(action: FeedbackAction, kind: FeedbackType, n: usize) -> FeedbackReport {
        FeedbackReport {
            action,
            id: format!("e{n}"),
            message: format!("message {n}"),
            feedback_type: kind,
            region: Some(kind.aria_live()),
            focus: FocusSummary::default(),
            visual_shown: false,
            replaced: action == FeedbackAction::Replaced,
            deduped: action == FeedbackAction::Deduped,
            timestamp: n as u64,
        }
    }

    #[test]
    fn test_bounded() {
        let mut journal = FeedbackJournal::new();
        for n in 0..150 {
            journal.record(report(FeedbackAction::Announced, FeedbackType::Info, n));
        }
        assert_eq!(journal.len(), JOURNAL_CAPACITY);
        assert_eq!(journal.entries().next().map(|e| e.seq), Some(50));
        let recent = journal.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].report.id, "e149");
    }

    #[test]
    fn test_stats_and_filters() {
        let mut journal = FeedbackJournal::new();
        journal.record(report(FeedbackAction::Announced, FeedbackType::Loading, 0));
        journal.record(report(FeedbackAction::Replaced, FeedbackType::Success, 1));
        journal.record(report(FeedbackAction::Deduped, FeedbackType::Success, 2));

        let stats = journal.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type[&FeedbackType::Success], 2);
        assert_eq!(stats.by_action[&FeedbackAction::Deduped], 1);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.deduped, 1);
        assert_eq!(journal.by_type(FeedbackType::Loading).len(), 1);
        assert_eq!(journal.by_action(FeedbackAction::Replaced).len(), 1);
    }

    #[test]
    fn test_export_json() {
        let mut journal = FeedbackJournal::new();
        journal.record(report(FeedbackAction::Announced, FeedbackType::Error, 7));
        let exported = journal.export_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(json[0]["action"], "announced");
        assert_eq!(json[0]["type"], "error");
        assert_eq!(json[0]["region"], "assertive");
        assert_eq!(json[0]["seq"], 0);
    }
}
