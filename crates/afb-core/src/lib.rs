//! afb Core - Accessible feedback engine
//!
//! Turns short feedback messages into screen-reader announcements through
//! two ARIA live regions, optionally mirrored as toasts, while only letting
//! urgent message types move keyboard focus. Long-running operations report
//! through [`ProgressHandle`].
//!
//! The engine is single-threaded and runs on virtual time: every delay is a
//! task in its own [`Scheduler`], advanced by [`FeedbackEngine::run_pending`]
//! against a [`Clock`]. [`SharedFeedback`] drives it with real smol timers.

mod types;
mod config;
mod clock;
mod scheduler;
mod regions;
mod dedupe;
mod announcer;
mod focus;
mod visual;
mod progress;
mod events;
mod journal;
mod engine;
mod driver;

pub use types::{
    FeedbackType, TypeSemantics, Role, Politeness, Priority, DismissAfter, DismissReason,
    DismissCallback, FeedbackOptions, FeedbackEvent,
};
pub use config::{FeedbackConfig, VisualPosition};
pub use clock::{Clock, SystemClock, ManualClock};
pub use scheduler::{Scheduler, TimerId};
pub use regions::LiveRegions;
pub use dedupe::{Resolver, Resolution, DEDUPE_WINDOW_MS};
pub use announcer::{
    Announcer, AnnouncerSnapshot, DeliveryState, DeliveryTicket, ANNOUNCEMENT_DEBOUNCE_MS,
    REGION_CLEAR_DELAY_MS, ZERO_WIDTH_MARKERS,
};
pub use focus::{FocusGuard, FocusResult};
pub use visual::{VisualManager, VisualItemState, VisualItemView, FRAME_MS};
pub use progress::{ProgressHandle, ProgressOptions, DEFAULT_ANNOUNCE_AT, PROGRESS_CLEANUP_MS};
pub use events::{
    FeedbackAction, FeedbackReport, FocusSummary, ListenerId, Signal, SignalHub, SignalKind,
};
pub use journal::{FeedbackJournal, JournalEntry, JournalStats, JOURNAL_CAPACITY};
pub use engine::FeedbackEngine;
pub use driver::SharedFeedback;

/// Feedback engine error
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Unknown feedback type: {0}")]
    UnknownType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DOM error: {0}")]
    Dom(#[from] afb_dom::DomError),
}

pub type Result<T> = std::result::Result<T, FeedbackError>;
