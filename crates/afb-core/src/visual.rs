//! Visual feedback
//!
//! Optional toast layer. Items live in insertion order and move through
//! `entering -> active -> exiting -> removed`. Capacity counts only items
//! that are not already exiting; the oldest of those is evicted first.

use afb_dom::{Document, DomError, NodeId};
use serde::Serialize;

use crate::config::{FeedbackConfig, VisualPosition};
use crate::engine::Task;
use crate::scheduler::{Scheduler, TimerId};
use crate::types::{DismissCallback, DismissReason, FeedbackEvent, FeedbackType};

/// Delay standing in for the next rendering frame
pub const FRAME_MS: u64 = 16;

/// Exit transition length when motion is allowed
pub const REMOVE_DELAY_MS: u64 = 200;

pub const CONTAINER_CLASS: &str = "a11y-feedback-container";
pub const ITEM_CLASS: &str = "a11y-feedback-item";
pub const DISMISS_CLASS: &str = "a11y-feedback-dismiss";
pub const ENTERING_CLASS: &str = "a11y-feedback-entering";
pub const EXITING_CLASS: &str = "a11y-feedback-exiting";
pub const REDUCED_MOTION_CLASS: &str = "a11y-feedback-reduced-motion";

pub const VISUAL_ATTR: &str = "data-a11y-feedback-visual";
pub const ITEM_ATTR: &str = "data-a11y-feedback-item";
pub const ID_ATTR: &str = "data-feedback-id";
pub const TYPE_ATTR: &str = "data-feedback-type";

fn type_class(feedback_type: FeedbackType) -> String {
    format!("{ITEM_CLASS}--{feedback_type}")
}

fn position_style(position: VisualPosition) -> &'static str {
    match position {
        VisualPosition::TopLeft => "position: fixed; top: 1rem; left: 1rem;",
        VisualPosition::TopRight => "position: fixed; top: 1rem; right: 1rem;",
        VisualPosition::BottomLeft => "position: fixed; bottom: 1rem; left: 1rem;",
        VisualPosition::BottomRight => "position: fixed; bottom: 1rem; right: 1rem;",
        VisualPosition::TopCenter => {
            "position: fixed; top: 1rem; left: 50%; transform: translateX(-50%);"
        }
        VisualPosition::BottomCenter => {
            "position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%);"
        }
    }
}

fn container_parent(doc: &Document, config: &FeedbackConfig) -> NodeId {
    match config.visual_container.as_deref() {
        Some(selector) => doc.query_selector(selector).ok().flatten().unwrap_or_else(|| {
            tracing::warn!(selector, "visual container not found, using body");
            doc.body()
        }),
        None => doc.body(),
    }
}

/// Auto-dismiss delay for an event, None if it must stay until dismissed
pub fn effective_timeout(config: &FeedbackConfig, event: &FeedbackEvent) -> Option<u64> {
    let semantics = event.feedback_type.semantics();
    if !semantics.auto_dismiss {
        return None;
    }
    event.options.timeout
        .or(config.default_timeout)
        .unwrap_or(semantics.default_timeout)
        .millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualItemState {
    Entering,
    Active,
    Exiting,
}

struct VisualItem {
    id: String,
    feedback_type: FeedbackType,
    message: String,
    class_name: Option<String>,
    node: NodeId,
    content: NodeId,
    state: VisualItemState,
    enter_timer: Option<TimerId>,
    dismiss_timer: Option<TimerId>,
    remove_timer: Option<TimerId>,
    reason: DismissReason,
    on_dismiss: Option<DismissCallback>,
}

/// Read-only view of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualItemView {
    pub id: String,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub message: String,
    pub state: VisualItemState,
    #[serde(skip)]
    pub node: NodeId,
    /// Auto-dismiss armed
    pub auto_dismiss: bool,
}

/// Result of `show`/`update`
pub struct ShowOutcome {
    pub item: NodeId,
    /// Ids pushed out to make room
    pub evicted: Vec<String>,
    /// Evicted items whose exit was cut short because their id came back
    pub finalized: Vec<RemovedItem>,
}

/// Item that finished its exit
pub struct RemovedItem {
    pub id: String,
    pub reason: DismissReason,
    pub on_dismiss: Option<DismissCallback>,
}

/// Toast lifecycle manager
#[derive(Default)]
pub struct VisualManager {
    container: Option<NodeId>,
    items: Vec<VisualItem>,
}

impl std::fmt::Debug for VisualManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualManager")
            .field("container", &self.container)
            .field("items", &self.items.iter().map(|i| (&i.id, i.state)).collect::<Vec<_>>())
            .finish()
    }
}

impl VisualManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    /// Items that are not exiting
    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|i| i.state != VisualItemState::Exiting).count()
    }

    /// All items including exiting ones
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> Vec<VisualItemView> {
        self.items.iter().map(|i| VisualItemView {
            id: i.id.clone(),
            feedback_type: i.feedback_type,
            message: i.message.clone(),
            state: i.state,
            node: i.node,
            auto_dismiss: i.dismiss_timer.is_some(),
        }).collect()
    }

    pub fn item(&self, id: &str) -> Option<VisualItemView> {
        self.items().into_iter().find(|i| i.id == id)
    }

    /// Element of an item that is not exiting
    pub fn item_node(&self, id: &str) -> Option<NodeId> {
        self.items
            .iter()
            .find(|i| i.id == id && i.state != VisualItemState::Exiting)
            .map(|i| i.node)
    }

    /// Replace an item's text without touching its timers
    pub(crate) fn set_message(
        &mut self,
        doc: &mut Document,
        id: &str,
        message: &str,
    ) -> Result<bool, DomError> {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        doc.set_text_content(item.content, message)?;
        item.message = message.to_string();
        Ok(true)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Id of the item whose dismiss button (or the item itself) is `node`
    pub fn item_for_dismiss_button(&self, doc: &Document, node: NodeId) -> Option<String> {
        if !doc.has_class(node, DISMISS_CLASS) {
            return None;
        }
        let parent = doc.parent(node)?;
        self.items.iter().find(|i| i.node == parent).map(|i| i.id.clone())
    }

    /// Create the container if it is missing. Idempotent.
    pub fn ensure_container(
        &mut self,
        doc: &mut Document,
        config: &FeedbackConfig,
    ) -> Result<NodeId, DomError> {
        if let Some(container) = self.container.filter(|&c| doc.is_connected(c)) {
            return Ok(container);
        }

        let container = doc.create_element("div");
        doc.set_attribute(container, VISUAL_ATTR, "")?;
        doc.set_attribute(container, "class", CONTAINER_CLASS)?;
        doc.set_attribute(container, "role", "region")?;
        doc.set_attribute(container, "aria-label", &config.container_label)?;
        doc.set_attribute(container, "style", position_style(config.visual_position))?;
        if doc.prefers_reduced_motion() {
            doc.add_class(container, REDUCED_MOTION_CLASS)?;
        }

        let parent = container_parent(doc, config);
        doc.append_child(parent, container)?;
        tracing::debug!(position = config.visual_position.as_str(), "visual container created");
        self.container = Some(container);
        Ok(container)
    }

    /// Bring an existing container in line with a new configuration
    pub fn apply_config(
        &mut self,
        doc: &mut Document,
        config: &FeedbackConfig,
    ) -> Result<(), DomError> {
        let Some(container) = self.container.filter(|&c| doc.is_connected(c)) else {
            return Ok(());
        };
        doc.set_attribute(container, "aria-label", &config.container_label)?;
        doc.set_attribute(container, "style", position_style(config.visual_position))?;
        let reduced = doc.prefers_reduced_motion();
        doc.toggle_class(container, REDUCED_MOTION_CLASS, Some(reduced))?;
        let parent = container_parent(doc, config);
        if doc.parent(container) != Some(parent) {
            doc.append_child(parent, container)?;
        }
        Ok(())
    }

    /// Show an event. An existing item with the same id is updated instead.
    pub(crate) fn show(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        config: &FeedbackConfig,
        event: &FeedbackEvent,
    ) -> Result<ShowOutcome, DomError> {
        if self.position(&event.id).is_some() {
            return self.update(doc, scheduler, now, config, event);
        }
        self.create(doc, scheduler, now, config, event, Vec::new())
    }

    /// Start the exit of the oldest items until one more fits
    fn make_room(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        max: usize,
    ) -> Result<Vec<String>, DomError> {
        let mut evicted = Vec::new();
        while self.active_count() >= max {
            let Some(oldest) = self
                .items
                .iter()
                .find(|i| i.state != VisualItemState::Exiting)
                .map(|i| i.id.clone())
            else {
                break;
            };
            tracing::debug!(id = %oldest, "evicting oldest visual item");
            self.dismiss(doc, scheduler, now, &oldest, DismissReason::Evicted)?;
            evicted.push(oldest);
        }
        Ok(evicted)
    }

    /// Finish an exit now instead of at its removal timer
    fn cut_exit(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        id: &str,
    ) -> Option<RemovedItem> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id && i.state == VisualItemState::Exiting)?;
        if let Some(timer) = item.remove_timer.take() {
            scheduler.clear_timer(timer);
        }
        self.finish_removal(doc, id)
    }

    fn create(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        config: &FeedbackConfig,
        event: &FeedbackEvent,
        finalized: Vec<RemovedItem>,
    ) -> Result<ShowOutcome, DomError> {
        let container = self.ensure_container(doc, config)?;
        let evicted = self.make_room(doc, scheduler, now, config.max_visual_items)?;

        let node = doc.create_element("div");
        doc.set_attribute(node, ITEM_ATTR, "")?;
        doc.set_attribute(node, ID_ATTR, &event.id)?;
        doc.set_attribute(node, TYPE_ATTR, event.feedback_type.as_str())?;
        let class = format!("{ITEM_CLASS} {} {ENTERING_CLASS}", type_class(event.feedback_type));
        doc.set_attribute(node, "class", &class)?;
        doc.set_attribute(node, "role", "status")?;
        // Already announced through the live regions
        doc.set_attribute(node, "aria-live", "off")?;

        let content = doc.create_element("span");
        doc.set_attribute(content, "data-content", "")?;
        doc.set_text_content(content, &event.message)?;
        doc.append_child(node, content)?;

        let button = doc.create_element("button");
        doc.set_attribute(button, "type", "button")?;
        doc.set_attribute(button, "class", DISMISS_CLASS)?;
        doc.set_attribute(button, "aria-label", &config.dismiss_label)?;
        doc.append_child(node, button)?;

        if let Some(class_name) = &event.options.class_name {
            for class in class_name.split_ascii_whitespace() {
                doc.add_class(node, class)?;
            }
        }
        doc.append_child(container, node)?;

        let mut item = VisualItem {
            id: event.id.clone(),
            feedback_type: event.feedback_type,
            message: event.message.clone(),
            class_name: event.options.class_name.clone(),
            node,
            content,
            state: VisualItemState::Entering,
            enter_timer: Some(scheduler.set_timeout(
                now,
                FRAME_MS,
                Task::VisualEnter(event.id.clone()),
            )),
            dismiss_timer: None,
            remove_timer: None,
            reason: DismissReason::Programmatic,
            on_dismiss: event.options.on_dismiss.clone(),
        };
        item.dismiss_timer = effective_timeout(config, event)
            .map(|ms| scheduler.set_timeout(now, ms, Task::VisualTimeout(event.id.clone())));
        tracing::debug!(
            id = %event.id,
            kind = %event.feedback_type,
            auto_dismiss = item.dismiss_timer.is_some(),
            "visual item shown"
        );
        self.items.push(item);

        Ok(ShowOutcome { item: node, evicted, finalized })
    }

    /// Replace an item's content in place and restart its auto-dismiss timer.
    /// Falls back to `show` when no item has the id. An exiting item is
    /// revived, unless it was evicted: its slot already went to a newer item,
    /// so its exit is finished and the event gets a fresh item.
    pub(crate) fn update(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        config: &FeedbackConfig,
        event: &FeedbackEvent,
    ) -> Result<ShowOutcome, DomError> {
        let Some(index) = self.position(&event.id) else {
            return self.create(doc, scheduler, now, config, event, Vec::new());
        };
        let (state, reason) = (self.items[index].state, self.items[index].reason);
        if state == VisualItemState::Exiting && reason == DismissReason::Evicted {
            let finalized = self.cut_exit(doc, scheduler, &event.id).into_iter().collect();
            return self.create(doc, scheduler, now, config, event, finalized);
        }
        let evicted = if state == VisualItemState::Exiting {
            self.make_room(doc, scheduler, now, config.max_visual_items)?
        } else {
            Vec::new()
        };
        let item = &mut self.items[index];

        doc.set_text_content(item.content, &event.message)?;
        if item.feedback_type != event.feedback_type {
            let (from, to) = (type_class(item.feedback_type), type_class(event.feedback_type));
            if !doc.replace_class(item.node, &from, &to)? {
                doc.add_class(item.node, &to)?;
            }
            doc.set_attribute(item.node, TYPE_ATTR, event.feedback_type.as_str())?;
        }
        if item.class_name != event.options.class_name {
            for class in item.class_name.iter().flat_map(|c| c.split_ascii_whitespace()) {
                doc.remove_class(item.node, class)?;
            }
            for class in event.options.class_name.iter().flat_map(|c| c.split_ascii_whitespace()) {
                doc.add_class(item.node, class)?;
            }
        }

        if item.state == VisualItemState::Exiting {
            if let Some(timer) = item.remove_timer.take() {
                scheduler.clear_timer(timer);
            }
            doc.remove_class(item.node, EXITING_CLASS)?;
            doc.remove_class(item.node, ENTERING_CLASS)?;
            item.state = VisualItemState::Active;
            item.reason = DismissReason::Programmatic;
            tracing::debug!(id = %event.id, "exiting visual item revived");
        }

        if let Some(timer) = item.dismiss_timer.take() {
            scheduler.clear_timer(timer);
        }
        item.dismiss_timer = effective_timeout(config, event)
            .map(|ms| scheduler.set_timeout(now, ms, Task::VisualTimeout(event.id.clone())));

        item.feedback_type = event.feedback_type;
        item.message = event.message.clone();
        item.class_name = event.options.class_name.clone();
        if event.options.on_dismiss.is_some() {
            item.on_dismiss = event.options.on_dismiss.clone();
        }
        tracing::debug!(id = %event.id, kind = %event.feedback_type, "visual item updated");

        Ok(ShowOutcome { item: item.node, evicted, finalized: Vec::new() })
    }

    /// Start the exit of an item. Returns false if there is no such item or
    /// it is already exiting.
    pub(crate) fn dismiss(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        id: &str,
        reason: DismissReason,
    ) -> Result<bool, DomError> {
        let reduced = doc.prefers_reduced_motion();
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id && i.state != VisualItemState::Exiting);
        let Some(item) = item else {
            return Ok(false);
        };

        for timer in [item.dismiss_timer.take(), item.enter_timer.take()].into_iter().flatten() {
            scheduler.clear_timer(timer);
        }
        if doc.contains(item.node) {
            doc.add_class(item.node, EXITING_CLASS)?;
        }
        item.state = VisualItemState::Exiting;
        item.reason = reason;
        let delay = if reduced { 0 } else { REMOVE_DELAY_MS };
        let remove = Task::VisualRemove(id.to_string());
        item.remove_timer = Some(scheduler.set_timeout(now, delay, remove));
        tracing::debug!(id, reason = reason.as_str(), delay, "visual item exiting");
        Ok(true)
    }

    /// Dismiss every item that is not already exiting, one by one
    pub(crate) fn dismiss_all(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
    ) -> Result<usize, DomError> {
        let ids: Vec<String> = self.items.iter()
            .filter(|i| i.state != VisualItemState::Exiting)
            .map(|i| i.id.clone())
            .collect();
        let mut dismissed = 0;
        for id in ids {
            let reason = DismissReason::Programmatic;
            dismissed += self.dismiss(doc, scheduler, now, &id, reason)? as usize;
        }
        Ok(dismissed)
    }

    /// Frame after creation: drop the entering state
    pub(crate) fn finish_enter(&mut self, doc: &mut Document, id: &str) -> Result<(), DomError> {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.enter_timer = None;
            if item.state == VisualItemState::Entering {
                item.state = VisualItemState::Active;
                doc.remove_class(item.node, ENTERING_CLASS)?;
            }
        }
        Ok(())
    }

    /// Auto-dismiss timer fired
    pub(crate) fn expire(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler<Task>,
        now: u64,
        id: &str,
    ) -> Result<bool, DomError> {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.dismiss_timer = None;
        }
        self.dismiss(doc, scheduler, now, id, DismissReason::Timeout)
    }

    /// Exit finished: detach the item
    pub(crate) fn finish_removal(&mut self, doc: &mut Document, id: &str) -> Option<RemovedItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == id && i.state == VisualItemState::Exiting)?;
        let item = self.items.remove(index);
        // Already gone if the host removed it
        let _ = doc.remove(item.node);
        tracing::debug!(id, reason = item.reason.as_str(), "visual item removed");
        Some(RemovedItem { id: item.id, reason: item.reason, on_dismiss: item.on_dismiss })
    }

    /// Remove every item and the container at once
    pub(crate) fn destroy(
        &mut self,
        doc: Option<&mut Document>,
        scheduler: &mut Scheduler<Task>,
    ) -> Vec<RemovedItem> {
        let items = std::mem::take(&mut self.items);
        let container = self.container.take();
        for item in &items {
            let timers = [item.enter_timer, item.dismiss_timer, item.remove_timer];
            for timer in timers.into_iter().flatten() {
                scheduler.clear_timer(timer);
            }
        }
        if let (Some(doc), Some(container)) = (doc, container) {
            let _ = doc.remove(container);
        }
        items.into_iter()
            .map(|item| RemovedItem {
                id: item.id,
                reason: if item.state == VisualItemState::Exiting {
                    item.reason
                } else {
                    DismissReason::Programmatic
                },
                on_dismiss: item.on_dismiss,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DismissAfter, FeedbackOptions};

    fn event(id: &str, message: &str, kind: FeedbackType, at: u64) -> FeedbackEvent {
        FeedbackEvent::new(id.into(), message.into(), kind, FeedbackOptions::new(), at)
    }

    struct Fixture {
        doc: Document,
        sched: Scheduler<Task>,
        config: FeedbackConfig,
        visual: VisualManager,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                doc: Document::new(),
                sched: Scheduler::new(),
                config: FeedbackConfig::default().with_visual(true),
                visual: VisualManager::new(),
            }
        }

        fn show(&mut self, id: &str, kind: FeedbackType, now: u64) -> ShowOutcome {
            let e = event(id, &format!("msg {id}"), kind, now);
            self.visual.show(&mut self.doc, &mut self.sched, now, &self.config, &e).unwrap()
        }

        /// Run due visual tasks the way the engine does
        fn run(&mut self, now: u64) -> Vec<String> {
            let mut removed = Vec::new();
            while let Some((at, task)) = self.sched.pop_due(now) {
                match task {
                    Task::VisualEnter(id) => self.visual.finish_enter(&mut self.doc, &id).unwrap(),
                    Task::VisualTimeout(id) => {
                        self.visual.expire(&mut self.doc, &mut self.sched, at, &id).unwrap();
                    }
                    Task::VisualRemove(id) => {
                        if let Some(r) = self.visual.finish_removal(&mut self.doc, &id) {
                            removed.push(r.id);
                        }
                    }
                    _ => {}
                }
            }
            removed
        }
    }

    #[test]
    fn test_item_dom() {
        let mut f = Fixture::new();
        let out = f.show("a", FeedbackType::Success, 0);
        let item = out.item;
        assert_eq!(f.doc.get_attribute(item, ID_ATTR), Some("a"));
        assert_eq!(f.doc.get_attribute(item, TYPE_ATTR), Some("success"));
        assert_eq!(f.doc.get_attribute(item, "aria-live"), Some("off"));
        assert!(f.doc.has_class(item, "a11y-feedback-item--success"));
        assert!(f.doc.has_class(item, ENTERING_CLASS));
        assert_eq!(f.doc.text_content(item), "msg a");

        f.run(FRAME_MS);
        assert!(!f.doc.has_class(item, ENTERING_CLASS));
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Active);

        let container = f.visual.container().unwrap();
        assert_eq!(f.doc.get_attribute(container, "role"), Some("region"));
        assert_eq!(f.doc.get_attribute(container, "aria-label"), Some("Notifications"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut f = Fixture::new();
        for (n, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            f.show(id, FeedbackType::Error, n as u64);
        }
        let out = f.show("f", FeedbackType::Error, 10);
        assert_eq!(out.evicted, vec!["a".to_string()]);
        assert_eq!(f.visual.active_count(), 5);
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Exiting);

        let removed = f.run(10 + REMOVE_DELAY_MS);
        assert_eq!(removed, vec!["a".to_string()]);
        assert_eq!(f.visual.len(), 5);
    }

    #[test]
    fn test_auto_dismiss_rules() {
        let mut f = Fixture::new();
        f.show("err", FeedbackType::Error, 0);
        f.show("load", FeedbackType::Loading, 0);
        f.show("ok", FeedbackType::Success, 0);
        f.show("warn", FeedbackType::Warning, 0);
        assert!(!f.visual.item("err").unwrap().auto_dismiss);
        assert!(!f.visual.item("load").unwrap().auto_dismiss);
        assert!(f.visual.item("ok").unwrap().auto_dismiss);

        f.run(5000);
        assert_eq!(f.visual.item("ok").unwrap().state, VisualItemState::Exiting);
        assert_eq!(f.visual.item("warn").unwrap().state, VisualItemState::Active);
        f.run(8000);
        assert_eq!(f.visual.item("warn").unwrap().state, VisualItemState::Exiting);
        f.run(60_000);
        assert_eq!(f.visual.len(), 2);
    }

    #[test]
    fn test_config_timeout_cannot_arm_error() {
        let config = FeedbackConfig::default().with_default_timeout(1000u64);
        let opts = FeedbackOptions::new().with_timeout(DismissAfter::Millis(50));
        let kind = FeedbackType::Error;
        let error = FeedbackEvent::new("e".into(), "x".into(), kind, opts.clone(), 0);
        let info = event("i", "x", FeedbackType::Info, 0);
        let never_opts = opts.with_timeout(DismissAfter::Never);
        let never = FeedbackEvent::new("n".into(), "x".into(), FeedbackType::Info, never_opts, 0);
        assert_eq!(effective_timeout(&config, &error), None);
        assert_eq!(effective_timeout(&config, &info), Some(1000));
        assert_eq!(effective_timeout(&config, &never), None);
    }

    #[test]
    fn test_update_in_place_rearms_timer() {
        let mut f = Fixture::new();
        let first = f.show("op", FeedbackType::Loading, 0);
        assert!(!f.visual.item("op").unwrap().auto_dismiss);

        let e = event("op", "Saved", FeedbackType::Success, 1000);
        let out = f.visual.update(&mut f.doc, &mut f.sched, 1000, &f.config, &e).unwrap();
        assert_eq!(out.item, first.item);
        assert_eq!(f.visual.len(), 1);
        assert!(f.doc.has_class(out.item, "a11y-feedback-item--success"));
        assert!(!f.doc.has_class(out.item, "a11y-feedback-item--loading"));
        assert_eq!(f.doc.get_attribute(out.item, TYPE_ATTR), Some("success"));

        f.run(5999);
        assert_eq!(f.visual.item("op").unwrap().state, VisualItemState::Active);
        f.run(6000);
        assert_eq!(f.visual.item("op").unwrap().state, VisualItemState::Exiting);
    }

    #[test]
    fn test_update_at_capacity_does_not_evict() {
        let mut f = Fixture::new();
        f.config.max_visual_items = 2;
        f.show("a", FeedbackType::Error, 0);
        f.show("b", FeedbackType::Error, 0);
        let e = event("a", "again", FeedbackType::Error, 1);
        let out = f.visual.update(&mut f.doc, &mut f.sched, 1, &f.config, &e).unwrap();
        assert!(out.evicted.is_empty());
        assert_eq!(f.visual.active_count(), 2);
    }

    #[test]
    fn test_update_revives_exiting_item() {
        let mut f = Fixture::new();
        f.show("a", FeedbackType::Error, 0);
        f.visual.dismiss(&mut f.doc, &mut f.sched, 10, "a", DismissReason::Programmatic).unwrap();
        let e = event("a", "back", FeedbackType::Error, 20);
        f.visual.show(&mut f.doc, &mut f.sched, 20, &f.config, &e).unwrap();
        assert!(f.run(1000).is_empty());
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Active);
    }

    #[test]
    fn test_revival_respects_capacity() {
        let mut f = Fixture::new();
        f.config.max_visual_items = 2;
        f.show("a", FeedbackType::Error, 0);
        f.show("b", FeedbackType::Error, 1);
        f.visual.dismiss(&mut f.doc, &mut f.sched, 2, "a", DismissReason::Programmatic).unwrap();
        f.show("c", FeedbackType::Error, 3);

        let e = event("a", "back", FeedbackType::Error, 4);
        let out = f.visual.update(&mut f.doc, &mut f.sched, 4, &f.config, &e).unwrap();
        assert_eq!(out.evicted, vec!["b".to_string()]);
        assert_eq!(f.visual.active_count(), 2);
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Active);
    }

    #[test]
    fn test_evicted_id_gets_fresh_item() {
        let mut f = Fixture::new();
        f.config.max_visual_items = 1;
        let old = f.show("a", FeedbackType::Error, 0);
        f.show("b", FeedbackType::Error, 1);
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Exiting);

        let out = f.show("a", FeedbackType::Error, 2);
        assert_ne!(out.item, old.item);
        assert!(!f.doc.contains(old.item));
        assert_eq!(out.evicted, vec!["b".to_string()]);
        let finalized: Vec<_> = out.finalized.iter().map(|r| (r.id.as_str(), r.reason)).collect();
        assert_eq!(finalized, vec![("a", DismissReason::Evicted)]);
        assert_eq!(f.visual.active_count(), 1);
        // The cut exit leaves no removal timer behind
        assert_eq!(f.run(2 + REMOVE_DELAY_MS), vec!["b".to_string()]);
        assert_eq!(f.visual.item("a").unwrap().state, VisualItemState::Active);
    }

    #[test]
    fn test_reduced_motion_removes_immediately() {
        let mut f = Fixture::new();
        f.doc.set_motion_preference(afb_dom::MotionPreference::Reduce);
        f.show("a", FeedbackType::Error, 0);
        assert!(f.doc.has_class(f.visual.container().unwrap(), REDUCED_MOTION_CLASS));
        f.visual.dismiss(&mut f.doc, &mut f.sched, 100, "a", DismissReason::Programmatic).unwrap();
        assert_eq!(f.run(100), vec!["a".to_string()]);
    }

    #[test]
    fn test_dismiss_all_and_destroy() {
        let mut f = Fixture::new();
        f.show("a", FeedbackType::Error, 0);
        f.show("b", FeedbackType::Info, 0);
        assert_eq!(f.visual.dismiss_all(&mut f.doc, &mut f.sched, 1).unwrap(), 2);
        assert_eq!(f.visual.active_count(), 0);
        assert_eq!(f.visual.dismiss_all(&mut f.doc, &mut f.sched, 2).unwrap(), 0);

        let container = f.visual.container().unwrap();
        let removed = f.visual.destroy(Some(&mut f.doc), &mut f.sched);
        assert_eq!(removed.len(), 2);
        assert!(!f.doc.contains(container));
        assert!(!f.sched.has_pending_work());
    }

    #[test]
    fn test_dismiss_button_lookup() {
        let mut f = Fixture::new();
        let out = f.show("a", FeedbackType::Error, 0);
        let selector = "button.a11y-feedback-dismiss";
        let button = f.doc.query_selector_in(out.item, selector).unwrap().unwrap();
        assert_eq!(f.doc.get_attribute(button, "aria-label"), Some("Dismiss"));
        assert_eq!(f.visual.item_for_dismiss_button(&f.doc, button).as_deref(), Some("a"));
        assert_eq!(f.visual.item_for_dismiss_button(&f.doc, out.item), None);
    }

    #[test]
    fn test_custom_container() {
        let mut f = Fixture::new();
        let host = f.doc.create_element("main");
        f.doc.set_attribute(host, "id", "app").unwrap();
        let body = f.doc.body();
        f.doc.append_child(body, host).unwrap();
        f.config.visual_container = Some("#app".into());
        f.show("a", FeedbackType::Info, 0);
        assert_eq!(f.doc.parent(f.visual.container().unwrap()), Some(host));
    }

    #[test]
    fn test_apply_config_moves_container() {
        let mut f = Fixture::new();
        f.show("a", FeedbackType::Info, 0);
        let container = f.visual.container().unwrap();

        let host = f.doc.create_element("aside");
        f.doc.set_attribute(host, "id", "toasts").unwrap();
        let body = f.doc.body();
        f.doc.append_child(body, host).unwrap();

        let mut config = f.config.clone();
        config.visual_container = Some("#toasts".into());
        config.visual_position = VisualPosition::BottomLeft;
        config.container_label = "Messages".into();
        f.visual.apply_config(&mut f.doc, &config).unwrap();

        assert_eq!(f.doc.parent(container), Some(host));
        assert_eq!(f.doc.get_attribute(container, "aria-label"), Some("Messages"));
        assert!(f.doc.get_attribute(container, "style").unwrap().contains("bottom: 1rem"));
    }
}
