//! Feedback types
//!
//! The closed set of feedback types, their fixed ARIA semantics, the
//! per-call options bag and the event that flows through the pipeline.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::announcer::DeliveryTicket;
use crate::focus::FocusResult;
use crate::FeedbackError;

/// Feedback type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Success,
    Info,
    Loading,
    Warning,
    Error,
}

/// ARIA role of the live region a type is announced through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Status,
    Alert,
}

/// `aria-live` politeness; also names the announcement channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Politeness {
    Polite,
    Assertive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    High,
}

/// Static per-type semantics. Not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSemantics {
    pub role: Role,
    pub aria_live: Politeness,
    pub priority: Priority,
    pub can_move_focus: bool,
    pub auto_dismiss: bool,
    pub default_timeout: DismissAfter,
}

const SUCCESS: TypeSemantics = TypeSemantics {
    role: Role::Status,
    aria_live: Politeness::Polite,
    priority: Priority::Low,
    can_move_focus: false,
    auto_dismiss: true,
    default_timeout: DismissAfter::Millis(5000),
};

const INFO: TypeSemantics = SUCCESS;

const LOADING: TypeSemantics = TypeSemantics {
    auto_dismiss: false,
    default_timeout: DismissAfter::Never,
    ..SUCCESS
};

const WARNING: TypeSemantics = TypeSemantics {
    role: Role::Alert,
    aria_live: Politeness::Assertive,
    priority: Priority::High,
    can_move_focus: true,
    auto_dismiss: true,
    default_timeout: DismissAfter::Millis(8000),
};

const ERROR: TypeSemantics = TypeSemantics {
    auto_dismiss: false,
    default_timeout: DismissAfter::Never,
    ..WARNING
};

impl FeedbackType {
    pub const ALL: [FeedbackType; 5] = [
        FeedbackType::Success,
        FeedbackType::Info,
        FeedbackType::Loading,
        FeedbackType::Warning,
        FeedbackType::Error,
    ];

    pub fn semantics(self) -> &'static TypeSemantics {
        match self {
            FeedbackType::Success => &SUCCESS,
            FeedbackType::Info => &INFO,
            FeedbackType::Loading => &LOADING,
            FeedbackType::Warning => &WARNING,
            FeedbackType::Error => &ERROR,
        }
    }

    pub fn role(self) -> Role {
        self.semantics().role
    }

    pub fn aria_live(self) -> Politeness {
        self.semantics().aria_live
    }

    pub fn priority(self) -> Priority {
        self.semantics().priority
    }

    pub fn can_move_focus(self) -> bool {
        self.semantics().can_move_focus
    }

    pub fn auto_dismiss(self) -> bool {
        self.semantics().auto_dismiss
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Success => "success",
            FeedbackType::Info => "info",
            FeedbackType::Loading => "loading",
            FeedbackType::Warning => "warning",
            FeedbackType::Error => "error",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackType::ALL.into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FeedbackError::UnknownType(s.to_string()))
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Status => "status",
            Role::Alert => "alert",
        }
    }
}

impl Politeness {
    pub const ALL: [Politeness; 2] = [Politeness::Polite, Politeness::Assertive];

    pub fn as_str(self) -> &'static str {
        match self {
            Politeness::Polite => "polite",
            Politeness::Assertive => "assertive",
        }
    }

    /// Role of the region carrying this politeness
    pub fn role(self) -> Role {
        match self {
            Politeness::Polite => Role::Status,
            Politeness::Assertive => Role::Alert,
        }
    }
}

impl fmt::Display for Politeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auto-dismiss delay.
///
/// Serialized as milliseconds; `0` and `+inf` mean [`DismissAfter::Never`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum DismissAfter {
    Never,
    Millis(u64),
}

impl DismissAfter {
    /// Delay in milliseconds, None for `Never`
    pub fn millis(self) -> Option<u64> {
        match self {
            DismissAfter::Never => None,
            DismissAfter::Millis(ms) => Some(ms),
        }
    }
}

impl From<u64> for DismissAfter {
    fn from(ms: u64) -> Self {
        if ms == 0 { DismissAfter::Never } else { DismissAfter::Millis(ms) }
    }
}

impl TryFrom<f64> for DismissAfter {
    type Error = FeedbackError;

    fn try_from(ms: f64) -> Result<Self, Self::Error> {
        if ms.is_nan() || ms < 0.0 {
            return Err(FeedbackError::InvalidOptions(format!("timeout must be >= 0, got {ms}")));
        }
        if ms == 0.0 || ms.is_infinite() {
            return Ok(DismissAfter::Never);
        }
        Ok(DismissAfter::Millis(ms.ceil() as u64))
    }
}

impl From<DismissAfter> for f64 {
    fn from(d: DismissAfter) -> f64 {
        match d {
            DismissAfter::Never => 0.0,
            DismissAfter::Millis(ms) => ms as f64,
        }
    }
}

/// Why a visual item went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissReason {
    /// `dismiss`, `dismiss_all` or the dismiss button
    Programmatic,
    Timeout,
    /// Pushed out by a newer item at capacity
    Evicted,
}

impl DismissReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DismissReason::Programmatic => "programmatic",
            DismissReason::Timeout => "timeout",
            DismissReason::Evicted => "evicted",
        }
    }
}

/// Called with the event id once its visual item has been removed
pub type DismissCallback = Rc<dyn Fn(&str, DismissReason)>;

/// Per-call options
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackOptions {
    /// Replacement key; a later call with the same id supersedes this one
    pub id: Option<String>,
    /// Selector of the element to focus (warning and error only)
    pub focus: Option<String>,
    /// Append a sentence naming the focused element to the announcement
    pub explain_focus: bool,
    /// Announce even if identical to a recent message
    pub force: bool,
    /// Visual auto-dismiss override
    pub timeout: Option<DismissAfter>,
    /// Extra class for the visual item
    pub class_name: Option<String>,
    #[serde(skip)]
    pub on_dismiss: Option<DismissCallback>,
}

impl FeedbackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if let Some(class) = &self.class_name {
            if class.split_ascii_whitespace().any(|c| c.starts_with("a11y-feedback")) {
                return Err(FeedbackError::InvalidOptions(format!(
                    "class_name {class:?} collides with the reserved a11y-feedback prefix"
                )));
            }
        }
        Ok(())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_focus(mut self, selector: impl Into<String>) -> Self {
        self.focus = Some(selector.into());
        self
    }

    pub fn explain_focus(mut self, explain: bool) -> Self {
        self.explain_focus = explain;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<DismissAfter>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn with_class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn on_dismiss(mut self, callback: impl Fn(&str, DismissReason) + 'static) -> Self {
        self.on_dismiss = Some(Rc::new(callback));
        self
    }

    /// Non-empty replacement id
    pub fn replacement_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Non-empty focus selector
    pub fn focus_target(&self) -> Option<&str> {
        self.focus.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for FeedbackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackOptions")
            .field("id", &self.id)
            .field("focus", &self.focus)
            .field("explain_focus", &self.explain_focus)
            .field("force", &self.force)
            .field("timeout", &self.timeout)
            .field("class_name", &self.class_name)
            .field("on_dismiss", &self.on_dismiss.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Feedback event
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEvent {
    pub id: String,
    /// Message as given by the caller
    pub message: String,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub options: FeedbackOptions,
    /// Creation time (engine clock, ms)
    pub timestamp: u64,
    /// Superseded an active event with the same id
    pub replaced: bool,
    /// Suppressed as a content duplicate; no other effects happened
    pub deduped: bool,
    pub focus: FocusResult,
    /// Text handed to the announcer (message plus focus explanation)
    pub announcement: Option<String>,
    #[serde(skip)]
    pub delivery: Option<DeliveryTicket>,
}

impl FeedbackEvent {
    pub fn new(
        id: String,
        message: String,
        feedback_type: FeedbackType,
        options: FeedbackOptions,
        timestamp: u64,
    ) -> Self {
        Self {
            id,
            message,
            feedback_type,
            options,
            timestamp,
            replaced: false,
            deduped: false,
            focus: FocusResult::default(),
            announcement: None,
            delivery: None,
        }
    }

    pub fn role(&self) -> Role {
        self.feedback_type.role()
    }

    pub fn aria_live(&self) -> Politeness {
        self.feedback_type.aria_live()
    }

    pub fn priority(&self) -> Priority {
        self.feedback_type.priority()
    }

    /// Admitted events went through focus, announcement and visual stages
    pub fn is_admitted(&self) -> bool {
        !self.deduped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantics_table() {
        for t in FeedbackType::ALL {
            let s = t.semantics();
            let urgent = matches!(t, FeedbackType::Warning | FeedbackType::Error);
            assert_eq!(s.can_move_focus, urgent, "{t}");
            assert_eq!(s.aria_live == Politeness::Assertive, urgent);
            assert_eq!(s.role, s.aria_live.role());
            assert_eq!(s.priority == Priority::High, urgent);
        }
        assert!(!FeedbackType::Loading.auto_dismiss());
        assert!(!FeedbackType::Error.auto_dismiss());
        assert_eq!(FeedbackType::Warning.semantics().default_timeout, DismissAfter::Millis(8000));
        assert_eq!(FeedbackType::Info.semantics().default_timeout, DismissAfter::Millis(5000));
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("Warning".parse::<FeedbackType>().unwrap(), FeedbackType::Warning);
        assert!(matches!("fatal".parse::<FeedbackType>(), Err(FeedbackError::UnknownType(_))));
    }

    #[test]
    fn test_dismiss_after_conversion() {
        assert_eq!(DismissAfter::try_from(0.0).unwrap(), DismissAfter::Never);
        assert_eq!(DismissAfter::try_from(f64::INFINITY).unwrap(), DismissAfter::Never);
        assert_eq!(DismissAfter::try_from(1500.2).unwrap(), DismissAfter::Millis(1501));
        assert!(DismissAfter::try_from(-1.0).is_err());
        assert!(DismissAfter::try_from(f64::NAN).is_err());
        assert_eq!(DismissAfter::from(0u64), DismissAfter::Never);
    }

    #[test]
    fn test_options_from_json() {
        let opts = FeedbackOptions::from_json(
            r##"{"id":"save","focus":"#email","explain_focus":true,"timeout":3000}"##,
        ).unwrap();
        assert_eq!(opts.replacement_id(), Some("save"));
        assert_eq!(opts.focus_target(), Some("#email"));
        assert!(opts.explain_focus);
        assert_eq!(opts.timeout, Some(DismissAfter::Millis(3000)));

        assert!(FeedbackOptions::from_json(r#"{"colour":"red"}"#).is_err());
        assert!(FeedbackOptions::from_json(r#"{"timeout":-5}"#).is_err());
        assert!(FeedbackOptions::from_json(r#"{"class_name":"a11y-feedback-item"}"#).is_err());
    }

    #[test]
    fn test_empty_id_and_focus_are_absent() {
        let opts = FeedbackOptions::new().with_id("").with_focus("   ");
        assert_eq!(opts.replacement_id(), None);
        assert_eq!(opts.focus_target(), None);
    }
}
