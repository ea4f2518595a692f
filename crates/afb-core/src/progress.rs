//! Progress feedback
//!
//! A long-running operation shown as one loading event whose toast carries
//! a `role=progressbar` element. Percentages are announced politely when
//! they reach a threshold. Completion replaces the loading event with a
//! success and failure replaces it with an error, both in place.

use std::collections::HashMap;

use afb_dom::{Document, DomError, NodeId};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::engine::FeedbackEngine;
use crate::scheduler::TimerId;
use crate::types::{FeedbackEvent, FeedbackOptions};
use crate::FeedbackError;

/// Percent thresholds announced when none are configured
pub const DEFAULT_ANNOUNCE_AT: [u32; 4] = [25, 50, 75, 100];

/// How long a completed operation stays queryable
pub const PROGRESS_CLEANUP_MS: u64 = 5000;

pub const PROGRESS_CLASS: &str = "a11y-feedback-progress";
pub const PROGRESS_BAR_CLASS: &str = "a11y-feedback-progress-bar";
pub const PROGRESS_INDETERMINATE_CLASS: &str = "a11y-feedback-progress--indeterminate";
pub const PROGRESS_BAR_ERROR_CLASS: &str = "a11y-feedback-progress-bar--error";

/// Progress options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressOptions {
    pub initial_value: f64,
    pub max: f64,
    /// No known completion ratio: nothing is announced until the end
    pub indeterminate: bool,
    /// Percentages announced once each, in any order
    pub announce_at: Vec<u32>,
    /// Extra classes for the toast
    pub class_name: Option<String>,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            initial_value: 0.0,
            max: 100.0,
            indeterminate: false,
            announce_at: DEFAULT_ANNOUNCE_AT.to_vec(),
            class_name: None,
        }
    }
}

impl ProgressOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !self.max.is_finite() || self.max <= 0.0 {
            return Err(FeedbackError::InvalidOptions(format!(
                "progress max must be a positive number, got {}",
                self.max
            )));
        }
        if !self.initial_value.is_finite() {
            let reason = "progress initial_value must be finite".to_string();
            return Err(FeedbackError::InvalidOptions(reason));
        }
        if let Some(threshold) = self.announce_at.iter().find(|&&t| t > 100) {
            return Err(FeedbackError::InvalidOptions(format!(
                "announce_at threshold {threshold} is above 100"
            )));
        }
        self.feedback_options().validate()
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    pub fn with_initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn indeterminate(mut self, indeterminate: bool) -> Self {
        self.indeterminate = indeterminate;
        self
    }

    pub fn with_announce_at(mut self, thresholds: impl IntoIterator<Item = u32>) -> Self {
        self.announce_at = thresholds.into_iter().collect();
        self
    }

    pub fn with_class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    fn feedback_options(&self) -> FeedbackOptions {
        FeedbackOptions { class_name: self.class_name.clone(), ..FeedbackOptions::default() }
    }
}

/// One tracked operation
#[derive(Debug, Clone)]
pub(crate) struct ProgressState {
    value: f64,
    max: f64,
    indeterminate: bool,
    /// Sorted and deduplicated
    announce_at: Vec<u32>,
    last_announced: u32,
    active: bool,
    pub(crate) message: String,
    pub(crate) class_name: Option<String>,
    pub(crate) bar: Option<NodeId>,
    pub(crate) cleanup_timer: Option<TimerId>,
}

impl ProgressState {
    pub(crate) fn new(message: String, options: &ProgressOptions) -> Self {
        let mut announce_at = options.announce_at.clone();
        announce_at.sort_unstable();
        announce_at.dedup();
        Self {
            value: options.initial_value.clamp(0.0, options.max),
            max: options.max,
            indeterminate: options.indeterminate,
            announce_at,
            last_announced: 0,
            active: true,
            message,
            class_name: options.class_name.clone(),
            bar: None,
            cleanup_timer: None,
        }
    }

    pub(crate) fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }

    pub(crate) fn percentage(&self) -> u32 {
        (self.value / self.max * 100.0).round() as u32
    }

    /// Clamp into `0..=max`. NaN is ignored.
    pub(crate) fn set_value(&mut self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.value = value.clamp(0.0, self.max);
        true
    }

    pub(crate) fn finish(&mut self, completed: bool) {
        self.active = false;
        if completed {
            self.value = self.max;
        }
    }

    /// Highest threshold reached since the last announcement. Every
    /// threshold up to it counts as announced.
    pub(crate) fn crossed_threshold(&mut self) -> Option<u32> {
        if self.indeterminate {
            return None;
        }
        let percentage = self.percentage();
        let crossed = self
            .announce_at
            .iter()
            .copied()
            .filter(|&t| t <= percentage && t > self.last_announced)
            .max()?;
        self.last_announced = crossed;
        Some(crossed)
    }

    pub(crate) fn announcement(&self) -> String {
        format!("{}: {}% complete", self.message, self.percentage())
    }
}

/// Progress operations by id
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    states: HashMap<String, ProgressState>,
}

impl ProgressTracker {
    pub(crate) fn insert(&mut self, id: String, state: ProgressState) -> Option<ProgressState> {
        self.states.insert(id, state)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ProgressState> {
        self.states.get(id)
    }

    /// State of an operation that has not completed or failed yet
    pub(crate) fn active_mut(&mut self, id: &str) -> Option<&mut ProgressState> {
        self.states.get_mut(id).filter(|s| s.active)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<ProgressState> {
        self.states.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    /// Drop bar handles after the toast layer went away
    pub(crate) fn forget_bars(&mut self) {
        for state in self.states.values_mut() {
            state.bar = None;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.states.clear();
    }
}

/// Append a progress bar to a toast, returning the bar element
pub(crate) fn render_bar(
    doc: &mut Document,
    item: NodeId,
    state: &ProgressState,
) -> Result<NodeId, DomError> {
    let track = doc.create_element("div");
    doc.set_attribute(track, "class", PROGRESS_CLASS)?;
    if state.indeterminate {
        doc.add_class(track, PROGRESS_INDETERMINATE_CLASS)?;
    }

    let bar = doc.create_element("div");
    doc.set_attribute(bar, "class", PROGRESS_BAR_CLASS)?;
    doc.set_attribute(bar, "role", "progressbar")?;
    doc.set_attribute(bar, "aria-valuemin", "0")?;
    doc.set_attribute(bar, "aria-valuemax", &state.max.to_string())?;
    doc.append_child(track, bar)?;
    doc.append_child(item, track)?;
    sync_bar(doc, bar, state)?;
    Ok(bar)
}

/// Reflect the current value on the bar
pub(crate) fn sync_bar(
    doc: &mut Document,
    bar: NodeId,
    state: &ProgressState,
) -> Result<(), DomError> {
    if state.indeterminate {
        doc.remove_attribute(bar, "aria-valuenow")?;
        return Ok(());
    }
    doc.set_attribute(bar, "aria-valuenow", &state.value.to_string())?;
    let width = state.value / state.max * 100.0;
    doc.set_attribute(bar, "style", &format!("width: {width}%"))?;
    Ok(())
}

/// Handle to an operation started with [`FeedbackEngine::progress`].
///
/// The handle is only an id; every call goes through the engine that owns
/// the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressHandle {
    id: String,
}

impl ProgressHandle {
    pub(crate) fn new(id: String) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the value, announcing the percentage if it reached a threshold.
    /// False once the operation has ended.
    pub fn update<C: Clock>(&self, engine: &mut FeedbackEngine<C>, value: f64) -> bool {
        engine.progress_update(&self.id, value, None)
    }

    /// Like `update`, also replacing the message
    pub fn update_message<C: Clock>(
        &self,
        engine: &mut FeedbackEngine<C>,
        value: f64,
        message: impl Into<String>,
    ) -> bool {
        engine.progress_update(&self.id, value, Some(message.into()))
    }

    /// Finish as a success. Without a message, "{message} - Complete" is used.
    pub fn complete<C: Clock>(
        &self,
        engine: &mut FeedbackEngine<C>,
        message: Option<&str>,
    ) -> Option<FeedbackEvent> {
        engine.progress_finish(&self.id, true, message)
    }

    /// Finish as an error. Without a message, "{message} - Failed" is used.
    pub fn fail<C: Clock>(
        &self,
        engine: &mut FeedbackEngine<C>,
        message: Option<&str>,
    ) -> Option<FeedbackEvent> {
        engine.progress_finish(&self.id, false, message)
    }

    /// Forget the operation and dismiss its toast
    pub fn dismiss<C: Clock>(&self, engine: &mut FeedbackEngine<C>) -> bool {
        engine.progress_dismiss(&self.id)
    }

    /// Current value, 0 once the operation is forgotten
    pub fn value<C: Clock>(&self, engine: &FeedbackEngine<C>) -> f64 {
        engine.progress_state(&self.id).map_or(0.0, ProgressState::value)
    }

    pub fn percentage<C: Clock>(&self, engine: &FeedbackEngine<C>) -> u32 {
        engine.progress_state(&self.id).map_or(0, ProgressState::percentage)
    }

    pub fn is_active<C: Clock>(&self, engine: &FeedbackEngine<C>) -> bool {
        engine.progress_state(&self.id).is_some_and(ProgressState::is_active)
    }
}
