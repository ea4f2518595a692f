//! Signals
//!
//! Observer hook for integrations (analytics, test harnesses). Listeners
//! are isolated from the pipeline: a panicking listener is logged and the
//! remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};

use afb_dom::NodeId;
use serde::Serialize;

use crate::focus::FocusResult;
use crate::types::{DismissReason, FeedbackEvent, FeedbackType, Politeness};

/// What the pipeline did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Announced,
    Replaced,
    Deduped,
}

impl FeedbackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackAction::Announced => "announced",
            FeedbackAction::Replaced => "replaced",
            FeedbackAction::Deduped => "deduped",
        }
    }
}

/// Focus side effect of an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusSummary {
    pub moved: bool,
    pub target: Option<String>,
    pub blocked_reason: Option<String>,
}

impl From<&FocusResult> for FocusSummary {
    fn from(result: &FocusResult) -> Self {
        Self {
            moved: result.moved,
            target: result.target.clone(),
            blocked_reason: result.blocked_reason.clone(),
        }
    }
}

/// Outcome of one notify call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackReport {
    pub action: FeedbackAction,
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    /// Channel the announcement went to, None for deduped events
    pub region: Option<Politeness>,
    pub focus: FocusSummary,
    pub visual_shown: bool,
    pub replaced: bool,
    pub deduped: bool,
    pub timestamp: u64,
}

impl FeedbackReport {
    pub fn new(action: FeedbackAction, event: &FeedbackEvent, visual_shown: bool) -> Self {
        Self {
            action,
            id: event.id.clone(),
            message: event.message.clone(),
            feedback_type: event.feedback_type,
            region: (action != FeedbackAction::Deduped).then(|| event.aria_live()),
            focus: FocusSummary::from(&event.focus),
            visual_shown,
            replaced: event.replaced,
            deduped: event.deduped,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Announced,
    Replaced,
    Deduped,
    FocusMoved,
    VisualShown,
    VisualDismissed,
    RegionWritten,
    ConfigChanged,
}

/// Signal payload
#[derive(Debug, Clone)]
pub enum Signal {
    Announced { event: FeedbackEvent, report: FeedbackReport },
    Replaced { event: FeedbackEvent, previous: FeedbackEvent, report: FeedbackReport },
    Deduped { event: FeedbackEvent, report: FeedbackReport },
    FocusMoved { event: FeedbackEvent, target: String, element_name: Option<String> },
    VisualShown { event: FeedbackEvent, item: NodeId },
    VisualDismissed { id: String, reason: DismissReason },
    /// Content injected into a live region
    RegionWritten { politeness: Politeness, content: String },
    ConfigChanged { changed_keys: Vec<&'static str> },
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Announced { .. } => SignalKind::Announced,
            Signal::Replaced { .. } => SignalKind::Replaced,
            Signal::Deduped { .. } => SignalKind::Deduped,
            Signal::FocusMoved { .. } => SignalKind::FocusMoved,
            Signal::VisualShown { .. } => SignalKind::VisualShown,
            Signal::VisualDismissed { .. } => SignalKind::VisualDismissed,
            Signal::RegionWritten { .. } => SignalKind::RegionWritten,
            Signal::ConfigChanged { .. } => SignalKind::ConfigChanged,
        }
    }

    pub fn report(&self) -> Option<&FeedbackReport> {
        match self {
            Signal::Announced { report, .. }
            | Signal::Replaced { report, .. }
            | Signal::Deduped { report, .. } => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    /// None listens to every signal
    kind: Option<SignalKind>,
    once: bool,
    callback: Box<dyn FnMut(&Signal)>,
}

/// Listener registry
#[derive(Default)]
pub struct SignalHub {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl std::fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHub")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(
        &mut self,
        kind: Option<SignalKind>,
        once: bool,
        callback: Box<dyn FnMut(&Signal)>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener { id, kind, once, callback });
        id
    }

    /// Listen to one kind of signal
    pub fn on(&mut self, kind: SignalKind, callback: impl FnMut(&Signal) + 'static) -> ListenerId {
        self.add(Some(kind), false, Box::new(callback))
    }

    /// Listen to every signal
    pub fn on_any(&mut self, callback: impl FnMut(&Signal) + 'static) -> ListenerId {
        self.add(None, false, Box::new(callback))
    }

    /// Listen to the next signal of a kind only
    pub fn once(
        &mut self,
        kind: SignalKind,
        callback: impl FnMut(&Signal) + 'static,
    ) -> ListenerId {
        self.add(Some(kind), true, Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    /// Remove listeners of one kind, or all listeners
    pub fn clear(&mut self, kind: Option<SignalKind>) {
        match kind {
            Some(kind) => self.listeners.retain(|l| l.kind != Some(kind)),
            None => self.listeners.clear(),
        }
    }

    /// Listeners registered for `kind` (None counts wildcard listeners)
    pub fn listener_count(&self, kind: Option<SignalKind>) -> usize {
        self.listeners.iter().filter(|l| l.kind == kind).count()
    }

    /// Whether emitting `kind` would reach anyone
    pub fn has_listeners(&self, kind: SignalKind) -> bool {
        self.listeners.iter().any(|l| l.kind.is_none() || l.kind == Some(kind))
    }

    /// Deliver a signal: kind listeners first, then wildcard listeners.
    /// Returns how many listeners ran without panicking.
    pub fn emit(&mut self, signal: &Signal) -> usize {
        let kind = signal.kind();
        let mut delivered = 0;
        let mut spent = Vec::new();

        let order = self.listeners.iter().enumerate()
            .filter(|(_, l)| l.kind == Some(kind))
            .chain(self.listeners.iter().enumerate().filter(|(_, l)| l.kind.is_none()))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        for index in order {
            let listener = &mut self.listeners[index];
            let callback = &mut listener.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(signal))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(?kind, "signal listener panicked"),
            }
            if listener.once {
                spent.push(listener.id);
            }
        }

        if !spent.is_empty() {
            self.listeners.retain(|l| !spent.contains(&l.id));
        }
        delivered
    }
}
