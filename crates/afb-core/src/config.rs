//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::types::DismissAfter;
use crate::FeedbackError;

/// Corner or edge the toast container is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
    TopCenter,
    BottomCenter,
}

impl VisualPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            VisualPosition::TopLeft => "top-left",
            VisualPosition::TopRight => "top-right",
            VisualPosition::BottomLeft => "bottom-left",
            VisualPosition::BottomRight => "bottom-right",
            VisualPosition::TopCenter => "top-center",
            VisualPosition::BottomCenter => "bottom-center",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackConfig {
    /// Mirror admitted events as toasts
    pub visual: bool,
    /// Overrides the per-type auto-dismiss defaults when set
    pub default_timeout: Option<DismissAfter>,
    /// Selector of the toast container's parent (body when unset or unmatched)
    pub visual_container: Option<String>,
    pub visual_position: VisualPosition,
    pub max_visual_items: usize,
    /// Log every journal entry at info level
    pub debug: bool,
    /// Live regions get ids `{prefix}-polite` and `{prefix}-assertive`
    pub region_prefix: String,
    /// Template for explained focus moves; `{label}` is the element name
    pub focus_explanation: String,
    /// Explanation used when the element has no accessible name
    pub focus_fallback: String,
    pub dismiss_label: String,
    pub container_label: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            visual: false,
            default_timeout: None,
            visual_container: None,
            visual_position: VisualPosition::TopRight,
            max_visual_items: 5,
            debug: false,
            region_prefix: "a11y-feedback".to_string(),
            focus_explanation: "Focus moved to {label}.".to_string(),
            focus_fallback: "Focus moved.".to_string(),
            dismiss_label: "Dismiss".to_string(),
            container_label: "Notifications".to_string(),
        }
    }
}

impl FeedbackConfig {
    /// Parse and validate a (partial) JSON configuration
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_visual_items == 0 {
            return Err(FeedbackError::InvalidConfig("max_visual_items must be at least 1".into()));
        }
        if self.region_prefix.is_empty() || self.region_prefix.chars().any(char::is_whitespace) {
            return Err(FeedbackError::InvalidConfig(format!(
                "region_prefix {:?} must be non-empty and contain no whitespace",
                self.region_prefix
            )));
        }
        Ok(())
    }

    /// Enable the toast layer
    pub fn with_visual(mut self, visual: bool) -> Self {
        self.visual = visual;
        self
    }

    pub fn with_max_visual_items(mut self, max: usize) -> Self {
        self.max_visual_items = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: impl Into<DismissAfter>) -> Self {
        self.default_timeout = Some(timeout.into());
        self
    }

    pub fn with_region_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.region_prefix = prefix.into();
        self
    }

    /// Explanation sentence for a focus move
    pub fn explain_focus(&self, label: Option<&str>) -> String {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => self.focus_explanation.replace("{label}", label),
            None => self.focus_fallback.clone(),
        }
    }

    /// Names of the fields that differ from `other`
    pub fn changed_keys(&self, other: &FeedbackConfig) -> Vec<&'static str> {
        let mut keys = Vec::new();
        macro_rules! diff {
            ($($field:ident),*) => {
                $(if self.$field != other.$field { keys.push(stringify!($field)); })*
            };
        }
        diff!(
            visual, default_timeout, visual_container, visual_position, max_visual_items, debug,
            region_prefix, focus_explanation, focus_fallback, dismiss_label, container_label
        );
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedbackConfig::default();
        assert!(!config.visual);
        assert_eq!(config.max_visual_items, 5);
        assert_eq!(config.region_prefix, "a11y-feedback");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = FeedbackConfig::from_json(
            r#"{"visual":true,"visual_position":"bottom-left","default_timeout":0}"#,
        ).unwrap();
        assert!(config.visual);
        assert_eq!(config.visual_position, VisualPosition::BottomLeft);
        assert_eq!(config.default_timeout, Some(DismissAfter::Never));
        assert_eq!(config.max_visual_items, 5);
    }

    #[test]
    fn test_validation() {
        assert!(FeedbackConfig::from_json(r#"{"max_visual_items":0}"#).is_err());
        assert!(FeedbackConfig::from_json(r#"{"region_prefix":"my regions"}"#).is_err());
        assert!(FeedbackConfig::from_json(r#"{"region_prefix":""}"#).is_err());
        assert!(FeedbackConfig::from_json(r#"{"unknown":1}"#).is_err());
    }

    #[test]
    fn test_explanation() {
        let config = FeedbackConfig::default();
        assert_eq!(config.explain_focus(Some("Email")), "Focus moved to Email.");
        assert_eq!(config.explain_focus(Some("  ")), "Focus moved.");
        assert_eq!(config.explain_focus(None), "Focus moved.");
    }

    #[test]
    fn test_changed_keys() {
        let a = FeedbackConfig::default();
        let b = a.clone().with_visual(true).with_region_prefix("app");
        assert_eq!(a.changed_keys(&b), vec!["visual", "region_prefix"]);
        assert!(a.changed_keys(&a).is_empty());
    }
}
