//! Focus Guard
//!
//! Moves keyboard focus for feedback that asks for it, but only for types
//! whose semantics allow it. Every failure is reported in the result.

use afb_dom::{Document, NodeId};
use serde::Serialize;

use crate::config::FeedbackConfig;
use crate::types::{FeedbackEvent, FeedbackType};

/// Outcome of a focus request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusResult {
    pub moved: bool,
    /// Requested selector
    pub target: Option<String>,
    /// Accessible name captured before the move
    pub element_name: Option<String>,
    pub blocked_reason: Option<String>,
}

impl FocusResult {
    fn blocked(target: &str, reason: impl Into<String>) -> Self {
        Self {
            moved: false,
            target: Some(target.to_string()),
            element_name: None,
            blocked_reason: Some(reason.into()),
        }
    }

    /// Focus was requested (moved or not)
    pub fn was_requested(&self) -> bool {
        self.target.is_some()
    }
}

/// Focus policy and movement
#[derive(Debug, Default, Clone, Copy)]
pub struct FocusGuard;

impl FocusGuard {
    pub fn can_move_focus(feedback_type: FeedbackType) -> bool {
        feedback_type.can_move_focus()
    }

    /// Apply the event's focus request
    pub fn handle(doc: Option<&mut Document>, event: &FeedbackEvent) -> FocusResult {
        let Some(selector) = event.options.focus_target() else {
            return FocusResult::default();
        };

        if !Self::can_move_focus(event.feedback_type) {
            let reason = format!(
                "Focus movement blocked: {} type cannot move focus",
                event.feedback_type
            );
            tracing::warn!(kind = %event.feedback_type, selector, "focus blocked");
            return FocusResult::blocked(selector, reason);
        }

        match doc {
            Some(doc) => Self::move_focus(doc, selector),
            None => FocusResult::blocked(selector, "DOM not available"),
        }
    }

    /// Focus the first element matching `selector`
    pub fn move_focus(doc: &mut Document, selector: &str) -> FocusResult {
        let element = match doc.query_selector(selector) {
            Ok(Some(element)) => element,
            Ok(None) => {
                tracing::warn!(selector, "focus target not found");
                return FocusResult::blocked(selector, format!("Element not found: {selector}"));
            }
            Err(err) => {
                tracing::warn!(selector, error = %err, "focus target not found");
                return FocusResult::blocked(selector, format!("Element not found: {selector}"));
            }
        };

        if !doc.is_focusable(element) && !doc.has_attribute(element, "tabindex") {
            if let Err(err) = doc.set_attribute(element, "tabindex", "-1") {
                tracing::warn!(error = %err, "focus operation failed");
                return FocusResult::blocked(selector, "Focus operation threw an error");
            }
            tracing::debug!(selector, "added tabindex=-1 to focus target");
        }

        let name = doc.accessible_name(element);

        if let Err(err) = doc.focus(element) {
            tracing::warn!(error = %err, "focus operation failed");
            return FocusResult::blocked(selector, "Focus operation threw an error");
        }

        let moved = doc.active_element() == Some(element);
        tracing::debug!(selector, moved, "focus attempted");
        FocusResult {
            moved,
            target: Some(selector.to_string()),
            element_name: (!name.is_empty()).then_some(name),
            blocked_reason: (!moved).then(|| "Focus failed to move".to_string()),
        }
    }

    /// Message with the focus explanation appended, when asked for and focus moved
    pub fn explain(config: &FeedbackConfig, event: &FeedbackEvent, result: &FocusResult) -> String {
        if !event.options.explain_focus || !result.moved {
            return event.message.clone();
        }
        let explanation = config.explain_focus(result.element_name.as_deref());
        format!("{} {}", event.message, explanation)
    }

    /// Currently focused element
    pub fn save_focus(doc: &Document) -> Option<NodeId> {
        doc.active_element()
    }

    /// Focus a previously saved element; true if it took focus
    pub fn restore_focus(doc: &mut Document, node: Option<NodeId>) -> bool {
        let Some(node) = node else { return false };
        doc.focus(node).is_ok() && doc.active_element() == Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackOptions;

    fn doc() -> (Document, NodeId) {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "id", "email").unwrap();
        doc.set_attribute(input, "aria-label", "Email address").unwrap();
        let body = doc.body();
        doc.append_child(body, input).unwrap();
        (doc, input)
    }

    fn event(kind: FeedbackType, options: FeedbackOptions) -> FeedbackEvent {
        FeedbackEvent::new("e1".into(), "Invalid email".into(), kind, options, 0)
    }

    #[test]
    fn test_no_request_is_noop() {
        let (mut doc, _) = doc();
        let error = event(FeedbackType::Error, FeedbackOptions::new());
        let result = FocusGuard::handle(Some(&mut doc), &error);
        assert_eq!(result, FocusResult::default());
        assert!(!result.was_requested());
    }

    #[test]
    fn test_low_urgency_types_blocked() {
        for kind in [FeedbackType::Success, FeedbackType::Info, FeedbackType::Loading] {
            let (mut doc, _) = doc();
            let e = event(kind, FeedbackOptions::new().with_focus("#email"));
            let result = FocusGuard::handle(Some(&mut doc), &e);
            assert!(!result.moved);
            assert!(result.blocked_reason.unwrap().contains(kind.as_str()));
            assert_eq!(doc.active_element(), None);
        }
    }

    #[test]
    fn test_error_moves_focus() {
        let (mut doc, input) = doc();
        let e = event(FeedbackType::Error, FeedbackOptions::new().with_focus("#email"));
        let result = FocusGuard::handle(Some(&mut doc), &e);
        assert!(result.moved);
        assert_eq!(result.element_name.as_deref(), Some("Email address"));
        assert_eq!(doc.active_element(), Some(input));
    }

    #[test]
    fn test_missing_and_invalid_targets() {
        let (mut doc, _) = doc();
        let missing = FocusGuard::move_focus(&mut doc, "#missing");
        assert!(missing.blocked_reason.unwrap().contains("Element not found"));
        let invalid = FocusGuard::move_focus(&mut doc, "#");
        assert!(!invalid.moved);
        assert!(invalid.blocked_reason.is_some());
    }

    #[test]
    fn test_headless() {
        let e = event(FeedbackType::Warning, FeedbackOptions::new().with_focus("#email"));
        let result = FocusGuard::handle(None, &e);
        assert_eq!(result.blocked_reason.as_deref(), Some("DOM not available"));
    }

    #[test]
    fn test_non_focusable_gets_tabindex() {
        let (mut doc, _) = doc();
        let heading = doc.create_element("h2");
        doc.set_attribute(heading, "id", "summary").unwrap();
        doc.set_text_content(heading, "3 errors").unwrap();
        let body = doc.body();
        doc.append_child(body, heading).unwrap();

        let result = FocusGuard::move_focus(&mut doc, "#summary");
        assert!(result.moved);
        assert_eq!(doc.get_attribute(heading, "tabindex"), Some("-1"));
        assert_eq!(result.element_name.as_deref(), Some("3 errors"));
    }

    #[test]
    fn test_existing_tabindex_kept() {
        let (mut doc, _) = doc();
        let panel = doc.create_element("div");
        doc.set_attribute(panel, "id", "panel").unwrap();
        doc.set_attribute(panel, "tabindex", "-2").unwrap();
        let body = doc.body();
        doc.append_child(body, panel).unwrap();
        assert!(FocusGuard::move_focus(&mut doc, "#panel").moved);
        assert_eq!(doc.get_attribute(panel, "tabindex"), Some("-2"));
    }

    #[test]
    fn test_hidden_target_fails_to_move() {
        let (mut doc, input) = doc();
        doc.set_attribute(input, "hidden", "").unwrap();
        let result = FocusGuard::move_focus(&mut doc, "#email");
        assert!(!result.moved);
        assert_eq!(result.blocked_reason.as_deref(), Some("Focus failed to move"));
    }

    #[test]
    fn test_explanation() {
        let config = FeedbackConfig::default();
        let options = FeedbackOptions::new().with_focus("#email").explain_focus(true);
        let e = event(FeedbackType::Error, options);
        let moved = FocusResult {
            moved: true,
            element_name: Some("Email".into()),
            ..Default::default()
        };
        assert_eq!(FocusGuard::explain(&config, &e, &moved), "Invalid email Focus moved to Email.");
        let unnamed = FocusResult { moved: true, ..Default::default() };
        assert_eq!(FocusGuard::explain(&config, &e, &unnamed), "Invalid email Focus moved.");
        assert_eq!(FocusGuard::explain(&config, &e, &FocusResult::default()), "Invalid email");
    }

    #[test]
    fn test_save_and_restore() {
        let (mut doc, input) = doc();
        doc.focus(input).unwrap();
        let saved = FocusGuard::save_focus(&doc);
        doc.blur();
        assert!(FocusGuard::restore_focus(&mut doc, saved));
        assert_eq!(doc.active_element(), Some(input));
        assert!(!FocusGuard::restore_focus(&mut doc, None));
    }
}
