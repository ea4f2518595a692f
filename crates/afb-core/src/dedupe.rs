//! Dedupe and replacement
//!
//! Decides whether an incoming event supersedes an active one (same id),
//! repeats recent content (same type and message) or is simply new.

use std::collections::HashMap;

use crate::types::{FeedbackEvent, FeedbackType};

/// Identical content within this window is skipped
pub const DEDUPE_WINDOW_MS: u64 = 500;

/// Resolver decision
#[derive(Debug, Clone)]
pub enum Resolution {
    /// New content, no active event with this id
    Admit,
    /// Superseded the active event sharing the id (removed from the registry)
    Replace(Box<FeedbackEvent>),
    /// Same type and message seen within the window
    Duplicate,
}

impl Resolution {
    pub fn should_skip(&self) -> bool {
        matches!(self, Resolution::Duplicate)
    }

    pub fn replaced_event(&self) -> Option<&FeedbackEvent> {
        match self {
            Resolution::Replace(previous) => Some(previous),
            _ => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Resolution::Admit => "none",
            Resolution::Replace(_) => "id_replacement",
            Resolution::Duplicate => "content_dedupe",
        }
    }
}

/// Active-event registry plus recent-content cache
#[derive(Debug)]
pub struct Resolver {
    active: HashMap<String, FeedbackEvent>,
    recent: HashMap<(FeedbackType, String), u64>,
    window_ms: u64,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::with_window(DEDUPE_WINDOW_MS)
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window_ms: u64) -> Self {
        Self { active: HashMap::new(), recent: HashMap::new(), window_ms }
    }

    /// Classify `event` at time `now`. Replacement wins over content dedupe.
    pub fn resolve(&mut self, event: &FeedbackEvent, now: u64) -> Resolution {
        if let Some(id) = event.options.replacement_id() {
            if let Some(previous) = self.active.remove(id) {
                tracing::debug!(id, "replacing active event");
                return Resolution::Replace(Box::new(previous));
            }
        }

        if !event.options.force {
            let key = (event.feedback_type, event.message.clone());
            if let Some(&seen) = self.recent.get(&key) {
                if now.saturating_sub(seen) < self.window_ms {
                    tracing::debug!(
                        message = %event.message,
                        kind = %event.feedback_type,
                        "duplicate content"
                    );
                    return Resolution::Duplicate;
                }
            }
        }

        Resolution::Admit
    }

    /// Register an admitted event under its id (no-op without an id)
    pub fn register(&mut self, event: &FeedbackEvent) {
        if let Some(id) = event.options.replacement_id() {
            self.active.insert(id.to_string(), event.clone());
        }
    }

    /// Record admitted content, evicting entries older than twice the window
    pub fn record(&mut self, event: &FeedbackEvent, now: u64) {
        let horizon = self.window_ms * 2;
        self.recent.retain(|_, &mut seen| now.saturating_sub(seen) <= horizon);
        self.recent.insert((event.feedback_type, event.message.clone()), now);
    }

    pub fn unregister(&mut self, id: &str) -> Option<FeedbackEvent> {
        self.active.remove(id)
    }

    pub fn active(&self, id: &str) -> Option<&FeedbackEvent> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn active_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.active.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackOptions;

    fn event(message: &str, kind: FeedbackType, options: FeedbackOptions) -> FeedbackEvent {
        let id = options.id.clone().unwrap_or_else(|| "generated".into());
        FeedbackEvent::new(id, message.into(), kind, options, 0)
    }

    fn admit(resolver: &mut Resolver, e: &FeedbackEvent, now: u64) -> Resolution {
        let r = resolver.resolve(e, now);
        if !r.should_skip() {
            resolver.register(e);
            resolver.record(e, now);
        }
        r
    }

    #[test]
    fn test_content_dedupe_window() {
        let mut r = Resolver::new();
        let e = event("Saved", FeedbackType::Success, FeedbackOptions::new());
        assert!(matches!(admit(&mut r, &e, 1000), Resolution::Admit));
        assert!(matches!(admit(&mut r, &e, 1499), Resolution::Duplicate));
        assert!(matches!(admit(&mut r, &e, 1500), Resolution::Admit));
    }

    #[test]
    fn test_dedupe_is_per_type() {
        let mut r = Resolver::new();
        admit(&mut r, &event("Done", FeedbackType::Success, FeedbackOptions::new()), 0);
        let info = event("Done", FeedbackType::Info, FeedbackOptions::new());
        assert!(matches!(admit(&mut r, &info, 10), Resolution::Admit));
    }

    #[test]
    fn test_force_bypasses_dedupe() {
        let mut r = Resolver::new();
        let e = event("Saved", FeedbackType::Success, FeedbackOptions::new().force(true));
        admit(&mut r, &e, 0);
        assert!(matches!(admit(&mut r, &e, 1), Resolution::Admit));
    }

    #[test]
    fn test_replacement_wins_over_dedupe() {
        let mut r = Resolver::new();
        let first = event("Saving", FeedbackType::Loading, FeedbackOptions::new().with_id("op"));
        admit(&mut r, &first, 0);
        let second = event("Saving", FeedbackType::Loading, FeedbackOptions::new().with_id("op"));
        let res = admit(&mut r, &second, 10);
        assert_eq!(res.reason(), "id_replacement");
        assert_eq!(res.replaced_event().map(|e| e.message.as_str()), Some("Saving"));
        assert!(r.is_active("op"));
    }

    #[test]
    fn test_fresh_id_still_deduped_by_content() {
        let mut r = Resolver::new();
        let saved = event("Saved", FeedbackType::Success, FeedbackOptions::new().with_id("a"));
        admit(&mut r, &saved, 0);
        let other = event("Saved", FeedbackType::Success, FeedbackOptions::new().with_id("b"));
        assert!(admit(&mut r, &other, 100).should_skip());
        assert!(!r.is_active("b"));
    }

    #[test]
    fn test_cache_eviction() {
        let mut r = Resolver::new();
        admit(&mut r, &event("a", FeedbackType::Info, FeedbackOptions::new()), 0);
        admit(&mut r, &event("b", FeedbackType::Info, FeedbackOptions::new()), 900);
        assert_eq!(r.recent_count(), 2);
        admit(&mut r, &event("c", FeedbackType::Info, FeedbackOptions::new()), 1001);
        assert_eq!(r.recent_count(), 2);
    }

    #[test]
    fn test_events_without_id_not_registered() {
        let mut r = Resolver::new();
        admit(&mut r, &event("x", FeedbackType::Info, FeedbackOptions::new().with_id("")), 0);
        assert_eq!(r.active_count(), 0);
    }
}
