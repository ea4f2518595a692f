//! Async driver
//!
//! Runs a [`FeedbackEngine`] on real time. Notify calls resolve once their
//! announcement has reached the live region (or was superseded).

use std::cell::RefCell;
use std::rc::Rc;

use smol::Timer;

use crate::announcer::{DeliveryState, DeliveryTicket};
use crate::clock::SystemClock;
use crate::engine::FeedbackEngine;
use crate::types::{FeedbackEvent, FeedbackOptions, FeedbackType};

/// Shared handle to an engine driven by smol timers
#[derive(Debug, Clone)]
pub struct SharedFeedback {
    inner: Rc<RefCell<FeedbackEngine<SystemClock>>>,
}

impl SharedFeedback {
    pub fn new(engine: FeedbackEngine<SystemClock>) -> Self {
        Self { inner: Rc::new(RefCell::new(engine)) }
    }

    /// Borrow the engine. Must not be held across an await.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut FeedbackEngine<SystemClock>) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    /// Notify and wait for the announcement to settle
    pub async fn notify(
        &self,
        message: impl Into<String>,
        feedback_type: FeedbackType,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        let event = self.inner.borrow_mut().notify(message, feedback_type, options);
        if let Some(ticket) = event.delivery {
            self.settle(ticket).await;
        }
        event
    }

    pub async fn success(
        &self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Success, options).await
    }

    pub async fn info(
        &self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Info, options).await
    }

    pub async fn loading(
        &self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Loading, options).await
    }

    pub async fn warning(
        &self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Warning, options).await
    }

    pub async fn error(
        &self,
        message: impl Into<String>,
        options: FeedbackOptions,
    ) -> FeedbackEvent {
        self.notify(message, FeedbackType::Error, options).await
    }

    /// Wait until a delivery leaves the pending state
    pub async fn settle(&self, ticket: DeliveryTicket) -> Option<DeliveryState> {
        loop {
            let wake = {
                let mut engine = self.inner.borrow_mut();
                engine.run_pending();
                match engine.delivery(ticket) {
                    Some(state) if state.is_pending() => {}
                    state => return state,
                }
                match engine.next_deadline() {
                    Some(deadline) => engine.clock().instant_at(deadline),
                    None => return engine.delivery(ticket),
                }
            };
            Timer::at(wake).await;
        }
    }

    /// Run timers until nothing is scheduled
    pub async fn run_until_idle(&self) {
        loop {
            let wake = {
                let mut engine = self.inner.borrow_mut();
                engine.run_pending();
                match engine.next_deadline() {
                    Some(deadline) => engine.clock().instant_at(deadline),
                    None => return,
                }
            };
            Timer::at(wake).await;
        }
    }

    pub fn dismiss(&self, id: &str) -> bool {
        self.inner.borrow_mut().dismiss(id)
    }

    pub fn dismiss_all(&self) -> usize {
        self.inner.borrow_mut().dismiss_all()
    }
}
