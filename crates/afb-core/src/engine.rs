//! Feedback Engine
//!
//! Orchestrates one notify call: resolve, register, focus, announce, show,
//! report. Owns every piece of mutable state, so independent engines never
//! interfere with each other.

use std::panic::{catch_unwind, AssertUnwindSafe};

use afb_dom::{Document, NodeId};

use crate::announcer::{Announcer, AnnouncerSnapshot, DeliveryState, DeliveryTicket, PendingWrite};
use crate::clock::{Clock, ManualClock, SystemClock};
use crate::config::FeedbackConfig;
use crate::dedupe::{Resolution, Resolver};
use crate::events::{FeedbackAction, FeedbackReport, Signal, SignalHub, SignalKind};
use crate::focus::FocusGuard;
use crate::journal::FeedbackJournal;
use crate::progress::{
    self, ProgressHandle, ProgressOptions, ProgressState, ProgressTracker, PROGRESS_BAR_ERROR_CLASS,
    PROGRESS_CLEANUP_MS,
};
use crate::regions::LiveRegions;
use crate::scheduler::Scheduler;
use crate::types::{DismissReason, FeedbackEvent, FeedbackOptions, FeedbackType, Politeness};
use crate::visual::{RemovedItem, VisualItemView, VisualManager};

/// Deferred engine work
#[derive(Debug)]
pub(crate) enum Task {
    /// Debounce and settle delay elapsed for one write on a channel
    ChannelFire(Politeness, DeliveryTicket),
    /// Microtask after the region was cleared
    RegionInject(Politeness, PendingWrite),
    VisualEnter(String),
    VisualTimeout(String),
    VisualRemove(String),
    /// Completed progress operation ages out
    ProgressCleanup(String),
}

/// Feedback engine
#[derive(Debug)]
pub struct FeedbackEngine<C: Clock = SystemClock> {
    clock: C,
    config: FeedbackConfig,
    /// None when running without a document
    document: Option<Document>,
    scheduler: Scheduler<Task>,
    regions: LiveRegions,
    resolver: Resolver,
    announcer: Announcer,
    visual: VisualManager,
    signals: SignalHub,
    journal: FeedbackJournal,
    progress: ProgressTracker,
    id_seq: u64,
}

impl FeedbackEngine<SystemClock> {
    /// Engine on real time, writing into `document`
    pub fn new(document: Document) -> Self {
        Self::with_clock(Some(document), SystemClock::new())
    }

    /// Engine without a document: announcements are tracked but go nowhere
    pub fn headless() -> Self {
        Self::with_clock(None, SystemClock::new())
    }
}

impl<C: Clock> FeedbackEngine<C> {
    pub fn with_clock(document: Option<Document>, clock: C) -> Self {
        let config = FeedbackConfig::default();
        Self {
            clock,
            regions: LiveRegions::new(config.region_prefix.clone()),
            config,
            document,
            scheduler: Scheduler::new(),
            resolver: Resolver::new(),
            announcer: Announcer::new(),
            visual: VisualManager::new(),
            signals: SignalHub::new(),
            journal: FeedbackJournal::new(),
            progress: ProgressTracker::default(),
            id_seq: 0,
        }
    }

    /// Replace the initial configuration
    pub fn with_config(mut self, config: FeedbackConfig) -> crate::Result<Self> {
        config.validate()?;
        self.regions = LiveRegions::new(config.region_prefix.clone());
        self.journal.set_verbose(config.debug);
        self.config = config;
        Ok(self)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    pub fn signals(&mut self) -> &mut SignalHub {
        &mut self.signals
    }

    pub fn journal(&self) -> &FeedbackJournal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut FeedbackJournal {
        &mut self.journal
    }

    /// Active-event registry and content cache
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn regions(&self) -> &LiveRegions {
        &self.regions
    }

    pub fn announcer_snapshot(&self) -> AnnouncerSnapshot {
        self.announcer.snapshot()
    }

    pub fn delivery(&self, ticket: DeliveryTicket) -> Option<DeliveryState> {
        self.announcer.delivery(ticket).cloned()
    }

    /// Current text of a live region
    pub fn region_content(&self, politeness: Politeness) -> Option<String> {
        self.regions.content(self.document.as_ref()?, politeness)
    }

    pub fn visual_items(&self) -> Vec<VisualItemView> {
        self.visual.items()
    }

    /// Visual items that are not exiting
    pub fn visual_count(&self) -> usize {
        self.visual.active_count()
    }

    pub fn visual_container(&self) -> Option<NodeId> {
        self.visual.container()
    }

    /// Apply a new configuration, returning the changed keys
    pub fn set_config(&mut self, config: FeedbackConfig) -> crate::Result<Vec<&'static str>> {
        config.validate()?;
        let changed = self.config.changed_keys(&config);
        if changed.is_empty() {
            return Ok(changed);
        }
        let previous = std::mem::replace(&mut self.config, config);
        self.journal.set_verbose(self.config.debug);

        if previous.visual && !self.config.visual {
            self.destroy_visual();
        } else if let Some(doc) = self.document.as_mut() {
            if let Err(err) = self.visual.apply_config(doc, &self.config) {
                tracing::warn!(error = %err, "visual container update failed");
            }
        }

        if previous.region_prefix != self.config.region_prefix {
            match self.document.as_mut() {
                Some(doc) => {
                    if let Err(err) = self.regions.reinitialize(doc, &self.config.region_prefix) {
                        tracing::warn!(error = %err, "live region re-creation failed");
                    }
                }
                None => self.regions = LiveRegions::new(self.config.region_prefix.clone()),
            }
        }

        tracing::debug!(?changed, "configuration changed");
        let keys = changed.clone();
        self.emit(SignalKind::ConfigChanged, || Signal::ConfigChanged { changed_keys: keys });
        Ok(changed)
    }

    /// Create the live regions if needed. False without a usable document.
    pub fn ensure_initialized(&mut self) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        match self.regions.ensure(doc) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "live region setup failed");
                false
            }
        }
    }

    fn generate_id(&mut self, now: u64) -> String {
        self.id_seq += 1;
        format!("a11y-{now:x}-{}", self.id_seq)
    }

    fn emit(&mut self, kind: SignalKind, build: impl FnOnce() -> Signal) {
        if self.signals.has_listeners(kind) {
            let signal = build();
            self.signals.emit(&signal);
        }
    }

    /// Process one piece of feedback
    pub fn notify(
        &mut self,
        message: impl Into<String>,
        feedback_type: FeedbackType,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.run_pending();
        let now = self.clock.now_ms();
        self.ensure_initialized();

        let id = match options.replacement_id() {
            Some(id) => id.to_string(),
            None => self.generate_id(now),
        };
        let mut event = FeedbackEvent::new(id, message.into(), feedback_type, options, now);

        let resolution = self.resolver.resolve(&event, now);
        if resolution.should_skip() {
            event.deduped = true;
            let report = FeedbackReport::new(FeedbackAction::Deduped, &event, false);
            self.journal.record(report.clone());
            self.emit(SignalKind::Deduped, || Signal::Deduped { event: event.clone(), report });
            return event;
        }

        event.replaced = matches!(resolution, Resolution::Replace(_));
        self.resolver.register(&event);
        self.resolver.record(&event, now);

        event.focus = FocusGuard::handle(self.document.as_mut(), &event);
        let announcement = FocusGuard::explain(&self.config, &event, &event.focus);
        let ticket = self.announcer.submit(
            event.aria_live(),
            &announcement,
            event.options.force,
            now,
            &mut self.scheduler,
        );
        event.announcement = Some(announcement);
        event.delivery = Some(ticket);

        let visual_item = self.show_visual(&event, now);
        let visual_shown = visual_item.is_some();

        let action = if event.replaced {
            FeedbackAction::Replaced
        } else {
            FeedbackAction::Announced
        };
        let report = FeedbackReport::new(action, &event, visual_shown);
        self.journal.record(report.clone());
        tracing::debug!(
            id = %event.id,
            kind = %feedback_type,
            action = action.as_str(),
            visual_shown,
            "feedback processed"
        );

        match resolution {
            Resolution::Replace(previous) => {
                let previous = *previous;
                self.emit(SignalKind::Replaced, || Signal::Replaced {
                    event: event.clone(),
                    previous,
                    report,
                });
            }
            _ => self.emit(SignalKind::Announced, || Signal::Announced {
                event: event.clone(),
                report,
            }),
        }
        if event.focus.moved {
            self.emit(SignalKind::FocusMoved, || Signal::FocusMoved {
                event: event.clone(),
                target: event.focus.target.clone().unwrap_or_default(),
                element_name: event.focus.element_name.clone(),
            });
        }
        if let Some(item) = visual_item {
            self.emit(SignalKind::VisualShown, || Signal::VisualShown {
                event: event.clone(),
                item,
            });
        }

        event
    }

    pub fn success(
        &mut self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Success, options)
    }

    pub fn info(
        &mut self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Info, options)
    }

    pub fn loading(
        &mut self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Loading, options)
    }

    pub fn warning(
        &mut self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Warning, options)
    }

    pub fn error(
        &mut self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Error, options)
    }

    /// Start a progress operation: a loading event under `id` whose toast
    /// carries a progress bar. Starting an id again restarts it.
    pub fn progress(
        &mut self,
        id: impl Into<String>,
        message: impl Into<String>,
        options: ProgressOptions,
    ) -> crate::Result<ProgressHandle> {
        options.validate()?;
        let id = id.into();
        if id.trim().is_empty() {
            let reason = "progress id must not be empty".to_string();
            return Err(crate::FeedbackError::InvalidOptions(reason));
        }
        if let Some(old) = self.progress.remove(&id) {
            if let Some(timer) = old.cleanup_timer {
                self.scheduler.clear_timer(timer);
            }
            let track = old.bar.zip(self.document.as_mut()).and_then(|(bar, doc)| {
                let track = doc.parent(bar)?;
                doc.remove(track).ok()
            });
            tracing::debug!(id = %id, bar_removed = track.is_some(), "progress restarted");
        }

        let mut state = ProgressState::new(message.into(), &options);
        let mut feedback = FeedbackOptions::new().with_id(id.clone());
        feedback.class_name = state.class_name.clone();
        let event = self.notify(state.message.clone(), FeedbackType::Loading, feedback);

        if let (Some(doc), Some(item)) = (self.document.as_mut(), self.visual.item_node(&id)) {
            match progress::render_bar(doc, item, &state) {
                Ok(bar) => state.bar = Some(bar),
                Err(err) => tracing::warn!(id = %id, error = %err, "progress bar failed"),
            }
        }
        if !state.is_indeterminate() && state.value() > 0.0 {
            state.crossed_threshold();
            let now = self.clock.now_ms();
            let announcement = state.announcement();
            let scheduler = &mut self.scheduler;
            self.announcer.submit(Politeness::Polite, &announcement, false, now, scheduler);
        }
        tracing::debug!(
            id = %id,
            deduped = event.deduped,
            percent = state.percentage(),
            "progress started"
        );
        self.progress.insert(id.clone(), state);
        Ok(ProgressHandle::new(id))
    }

    pub(crate) fn progress_state(&self, id: &str) -> Option<&ProgressState> {
        self.progress.get(id)
    }

    pub(crate) fn progress_update(
        &mut self,
        id: &str,
        value: f64,
        message: Option<String>,
    ) -> bool {
        self.run_pending();
        let now = self.clock.now_ms();
        let Some(state) = self.progress.active_mut(id) else {
            return false;
        };
        if !state.set_value(value) {
            return false;
        }
        let renamed = message.is_some();
        if let Some(message) = message {
            state.message = message;
        }

        if let Some(doc) = self.document.as_mut() {
            let synced = match state.bar {
                Some(bar) => progress::sync_bar(doc, bar, state),
                None => Ok(()),
            };
            let result = if renamed {
                synced.and_then(|()| self.visual.set_message(doc, id, &state.message).map(|_| ()))
            } else {
                synced
            };
            if let Err(err) = result {
                tracing::warn!(id, error = %err, "progress element update failed");
            }
        }

        if let Some(threshold) = state.crossed_threshold() {
            let announcement = state.announcement();
            tracing::debug!(id, threshold, "progress threshold reached");
            let scheduler = &mut self.scheduler;
            self.announcer.submit(Politeness::Polite, &announcement, false, now, scheduler);
        }
        true
    }

    /// Complete (success) or fail (error) an active operation
    pub(crate) fn progress_finish(
        &mut self,
        id: &str,
        completed: bool,
        message: Option<&str>,
    ) -> Option<FeedbackEvent> {
        self.run_pending();
        let now = self.clock.now_ms();
        let state = self.progress.active_mut(id)?;
        state.finish(completed);
        let (suffix, feedback_type) = if completed {
            (" - Complete", FeedbackType::Success)
        } else {
            (" - Failed", FeedbackType::Error)
        };
        let text = message.map_or_else(|| format!("{}{suffix}", state.message), str::to_string);
        let mut feedback = FeedbackOptions::new().with_id(id);
        feedback.class_name = state.class_name.clone();

        if let (Some(doc), Some(bar)) = (self.document.as_mut(), state.bar) {
            let result = if completed {
                progress::sync_bar(doc, bar, state)
            } else {
                doc.add_class(bar, PROGRESS_BAR_ERROR_CLASS)
            };
            if let Err(err) = result {
                tracing::warn!(id, error = %err, "progress element update failed");
            }
        }
        if completed {
            let cleanup = Task::ProgressCleanup(id.to_string());
            let timer = self.scheduler.set_timeout(now, PROGRESS_CLEANUP_MS, cleanup);
            state.cleanup_timer = Some(timer);
        }
        tracing::debug!(id, completed, "progress finished");
        Some(self.notify(text, feedback_type, feedback))
    }

    /// Forget an operation and dismiss its toast
    pub(crate) fn progress_dismiss(&mut self, id: &str) -> bool {
        let Some(state) = self.progress.remove(id) else {
            return false;
        };
        if let Some(timer) = state.cleanup_timer {
            self.scheduler.clear_timer(timer);
        }
        self.dismiss(id);
        true
    }

    /// Progress operations still tracked, including recently finished ones
    pub fn progress_count(&self) -> usize {
        self.progress.len()
    }

    fn show_visual(&mut self, event: &FeedbackEvent, now: u64) -> Option<NodeId> {
        if !self.config.visual {
            return None;
        }
        let doc = self.document.as_mut()?;
        let outcome = if event.replaced {
            self.visual.update(doc, &mut self.scheduler, now, &self.config, event)
        } else {
            self.visual.show(doc, &mut self.scheduler, now, &self.config, event)
        };
        match outcome {
            Ok(outcome) => {
                for id in &outcome.evicted {
                    self.resolver.unregister(id);
                }
                // The id now belongs to `event`, so only report the old item
                for removed in outcome.finalized {
                    self.report_removed(removed);
                }
                Some(outcome.item)
            }
            Err(err) => {
                tracing::warn!(id = %event.id, error = %err, "visual feedback failed");
                None
            }
        }
    }

    /// Dismiss a visual item. Without one, the id is only dropped from the
    /// active registry.
    pub fn dismiss(&mut self, id: &str) -> bool {
        self.run_pending();
        let now = self.clock.now_ms();
        let dismissed = match self.document.as_mut() {
            Some(doc) => self
                .visual
                .dismiss(doc, &mut self.scheduler, now, id, DismissReason::Programmatic)
                .unwrap_or_else(|err| {
                    tracing::warn!(id, error = %err, "dismiss failed");
                    false
                }),
            None => false,
        };
        if dismissed || self.visual.item(id).is_some() {
            return dismissed;
        }
        self.resolver.unregister(id).is_some()
    }

    /// Dismiss every visual item
    pub fn dismiss_all(&mut self) -> usize {
        self.run_pending();
        let now = self.clock.now_ms();
        let Some(doc) = self.document.as_mut() else {
            return 0;
        };
        self.visual.dismiss_all(doc, &mut self.scheduler, now).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "dismiss all failed");
            0
        })
    }

    /// Activate a node, as a click would. Dismiss buttons dismiss their item.
    pub fn click(&mut self, node: NodeId) -> bool {
        let id = self
            .document
            .as_ref()
            .and_then(|doc| self.visual.item_for_dismiss_button(doc, node));
        match id {
            Some(id) => self.dismiss(&id),
            None => false,
        }
    }

    /// Focused element, for a later `restore_focus`
    pub fn save_focus(&self) -> Option<NodeId> {
        FocusGuard::save_focus(self.document.as_ref()?)
    }

    pub fn restore_focus(&mut self, node: Option<NodeId>) -> bool {
        match self.document.as_mut() {
            Some(doc) => FocusGuard::restore_focus(doc, node),
            None => false,
        }
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn has_pending_work(&self) -> bool {
        self.scheduler.has_pending_work()
    }

    /// Run every task due by the clock, in deadline order. Each task sees its
    /// own deadline as the current time. Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut ran = self.drain_microtasks(now);
        while let Some((deadline, task)) = self.scheduler.pop_due(now) {
            self.run_task(task, deadline);
            ran += 1 + self.drain_microtasks(deadline);
        }
        ran
    }

    fn drain_microtasks(&mut self, at: u64) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_microtask() {
            self.run_task(task, at);
            ran += 1;
        }
        ran
    }

    fn run_task(&mut self, task: Task, at: u64) {
        match task {
            Task::ChannelFire(politeness, ticket) => {
                let Some(write) = self.announcer.take_due(politeness, ticket) else {
                    return;
                };
                let Some(doc) = self.document.as_mut() else {
                    self.announcer.complete(politeness, write, at, DeliveryState::NoRegion);
                    return;
                };
                let cleared = self
                    .regions
                    .ensure(doc)
                    .and_then(|()| self.regions.clear(doc, politeness));
                match cleared {
                    Ok(true) => {
                        self.scheduler.queue_microtask(Task::RegionInject(politeness, write));
                    }
                    Ok(false) => {
                        self.announcer.complete(politeness, write, at, DeliveryState::NoRegion);
                    }
                    Err(err) => {
                        tracing::warn!(
                            channel = %politeness,
                            error = %err,
                            "live region clear failed"
                        );
                        self.announcer.complete(politeness, write, at, DeliveryState::NoRegion);
                    }
                }
            }
            Task::RegionInject(politeness, write) => {
                let written = match self.document.as_mut() {
                    Some(doc) => match self.regions.write(doc, politeness, &write.content) {
                        Ok(written) => written,
                        Err(err) => {
                            tracing::warn!(
                                channel = %politeness,
                                error = %err,
                                "live region write failed"
                            );
                            false
                        }
                    },
                    None => false,
                };
                let content = write.content.clone();
                let state = if written {
                    DeliveryState::Written { content: content.clone() }
                } else {
                    DeliveryState::NoRegion
                };
                self.announcer.complete(politeness, write, at, state);
                if written {
                    tracing::debug!(channel = %politeness, content = %content, "announced");
                    self.emit(SignalKind::RegionWritten, || Signal::RegionWritten {
                        politeness,
                        content,
                    });
                }
            }
            Task::VisualEnter(id) => {
                if let Some(doc) = self.document.as_mut() {
                    if let Err(err) = self.visual.finish_enter(doc, &id) {
                        tracing::warn!(id = %id, error = %err, "visual enter failed");
                    }
                }
            }
            Task::VisualTimeout(id) => {
                if let Some(doc) = self.document.as_mut() {
                    if let Err(err) = self.visual.expire(doc, &mut self.scheduler, at, &id) {
                        tracing::warn!(id = %id, error = %err, "visual timeout failed");
                    }
                }
            }
            Task::VisualRemove(id) => {
                let removed = self
                    .document
                    .as_mut()
                    .and_then(|doc| self.visual.finish_removal(doc, &id));
                if let Some(removed) = removed {
                    self.finalize_removed(removed);
                }
            }
            Task::ProgressCleanup(id) => {
                if self.progress.get(&id).is_some_and(|s| !s.is_active()) {
                    self.progress.remove(&id);
                    tracing::debug!(id = %id, "progress forgotten");
                }
            }
        }
    }

    fn finalize_removed(&mut self, removed: RemovedItem) {
        self.resolver.unregister(&removed.id);
        if let Some(state) = self.progress.active_mut(&removed.id) {
            state.bar = None;
        } else if self.progress.get(&removed.id).is_some_and(|s| s.cleanup_timer.is_none()) {
            // Failed operations live as long as their toast
            self.progress.remove(&removed.id);
        }
        self.report_removed(removed);
    }

    /// Run the item's `on_dismiss` and emit `VisualDismissed`
    fn report_removed(&mut self, removed: RemovedItem) {
        if let Some(callback) = &removed.on_dismiss {
            let (id, reason) = (removed.id.as_str(), removed.reason);
            if catch_unwind(AssertUnwindSafe(|| callback(id, reason))).is_err() {
                tracing::warn!(id, "on_dismiss callback panicked");
            }
        }
        let RemovedItem { id, reason, .. } = removed;
        self.emit(SignalKind::VisualDismissed, || Signal::VisualDismissed { id, reason });
    }

    fn destroy_visual(&mut self) {
        let removed = self.visual.destroy(self.document.as_mut(), &mut self.scheduler);
        self.progress.forget_bars();
        tracing::debug!(items = removed.len(), "visual layer destroyed");
        for item in removed {
            self.finalize_removed(item);
        }
    }

    /// Tear everything down: timers, regions, toasts, registries, journal
    /// and listeners. Configuration and document are kept.
    pub fn reset(&mut self) {
        self.destroy_visual();
        self.announcer.cancel_pending(&mut self.scheduler);
        self.scheduler.clear();
        match self.document.as_mut() {
            Some(doc) => self.regions.destroy(doc),
            None => self.regions.forget(),
        }
        self.resolver.clear();
        self.announcer = Announcer::new();
        self.journal.clear();
        self.progress.clear();
        self.signals.clear(None);
        tracing::debug!("engine reset");
    }
}

impl FeedbackEngine<ManualClock> {
    /// Advance the virtual clock and run what became due
    pub fn advance(&mut self, ms: u64) -> usize {
        self.clock.advance(ms);
        self.run_pending()
    }

    /// Jump from deadline to deadline until no timer is left
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = self.run_pending();
        while let Some(deadline) = self.scheduler.next_deadline() {
            self.clock.set(deadline);
            ran += self.run_pending();
        }
        ran
    }
}
