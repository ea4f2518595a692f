//! Announcer
//!
//! Per-channel debounced delivery to the live regions. A new write cancels
//! every pending write on its channel that was submitted less than the
//! debounce window ago; older pending writes still land. A write fires after
//! the remaining debounce window plus a short settle delay, clears the
//! region, and injects its content one microtask later.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::engine::Task;
use crate::scheduler::{Scheduler, TimerId};
use crate::types::Politeness;

/// Minimum spacing between writes to one channel
pub const ANNOUNCEMENT_DEBOUNCE_MS: u64 = 100;

/// Settle delay before the clear/inject sequence
pub const REGION_CLEAR_DELAY_MS: u64 = 50;

/// Invisible suffixes that make repeated text a distinct mutation
pub const ZERO_WIDTH_MARKERS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Resolved delivery states kept for lookup
const DELIVERY_HISTORY: usize = 1024;

/// Handle to one announcement's delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeliveryTicket(u64);

/// Delivery outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum DeliveryState {
    Pending,
    /// Injected into the region (content includes any marker)
    Written { content: String },
    /// Cancelled by a later write on the same channel
    Superseded,
    /// No document to write to
    NoRegion,
}

impl DeliveryState {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeliveryState::Pending)
    }
}

/// A write waiting on its channel timer or its inject microtask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub ticket: DeliveryTicket,
    /// Unmarked message, used for repeat detection
    pub message: String,
    /// Text actually written
    pub content: String,
}

#[derive(Debug)]
struct Queued {
    timer: TimerId,
    submitted_at: u64,
    write: PendingWrite,
}

#[derive(Debug, Default)]
struct Channel {
    /// Writes waiting on their channel timer, oldest first
    queued: Vec<Queued>,
    last_message: Option<String>,
    last_fired: Option<u64>,
}

/// Announcer state for inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncerSnapshot {
    pub last_polite_message: Option<String>,
    pub last_assertive_message: Option<String>,
    pub last_polite_at: Option<u64>,
    pub last_assertive_at: Option<u64>,
    pub marker_counter: u64,
    pub polite_pending: bool,
    pub assertive_pending: bool,
}

/// Dual-channel announcer
#[derive(Debug, Default)]
pub struct Announcer {
    polite: Channel,
    assertive: Channel,
    marker_counter: u64,
    next_ticket: u64,
    deliveries: HashMap<DeliveryTicket, DeliveryState>,
    resolved: VecDeque<DeliveryTicket>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, politeness: Politeness) -> &Channel {
        match politeness {
            Politeness::Polite => &self.polite,
            Politeness::Assertive => &self.assertive,
        }
    }

    fn channel_mut(&mut self, politeness: Politeness) -> &mut Channel {
        match politeness {
            Politeness::Polite => &mut self.polite,
            Politeness::Assertive => &mut self.assertive,
        }
    }

    fn next_marker(&mut self) -> char {
        let index = self.marker_counter % ZERO_WIDTH_MARKERS.len() as u64;
        let marker = ZERO_WIDTH_MARKERS[index as usize];
        self.marker_counter += 1;
        marker
    }

    /// Queue `message` on a channel, superseding pending writes submitted
    /// within the debounce window.
    pub(crate) fn submit(
        &mut self,
        politeness: Politeness,
        message: &str,
        force: bool,
        now: u64,
        scheduler: &mut Scheduler<Task>,
    ) -> DeliveryTicket {
        let repeat = self.channel(politeness).last_message.as_deref() == Some(message);
        let content = if force || repeat {
            format!("{message}{}", self.next_marker())
        } else {
            message.to_string()
        };

        let debounce = match self.channel(politeness).last_fired {
            Some(fired) if now.saturating_sub(fired) < ANNOUNCEMENT_DEBOUNCE_MS => {
                ANNOUNCEMENT_DEBOUNCE_MS - now.saturating_sub(fired)
            }
            _ => 0,
        };

        let channel = self.channel_mut(politeness);
        let (superseded, kept): (Vec<Queued>, Vec<Queued>) = std::mem::take(&mut channel.queued)
            .into_iter()
            .partition(|q| now.saturating_sub(q.submitted_at) < ANNOUNCEMENT_DEBOUNCE_MS);
        channel.queued = kept;
        for queued in superseded {
            scheduler.clear_timer(queued.timer);
            tracing::debug!(
                channel = %politeness,
                superseded = %queued.write.message,
                "pending write superseded"
            );
            self.resolve(queued.write.ticket, DeliveryState::Superseded);
        }

        let ticket = DeliveryTicket(self.next_ticket);
        self.next_ticket += 1;
        self.deliveries.insert(ticket, DeliveryState::Pending);

        let delay = debounce + REGION_CLEAR_DELAY_MS;
        let timer = scheduler.set_timeout(now, delay, Task::ChannelFire(politeness, ticket));
        tracing::debug!(channel = %politeness, delay, marked = force || repeat, "write scheduled");

        self.channel_mut(politeness).queued.push(Queued {
            timer,
            submitted_at: now,
            write: PendingWrite { ticket, message: message.to_string(), content },
        });
        ticket
    }

    /// Channel timer fired: hand over the write it was armed for
    pub(crate) fn take_due(
        &mut self,
        politeness: Politeness,
        ticket: DeliveryTicket,
    ) -> Option<PendingWrite> {
        let queued = &mut self.channel_mut(politeness).queued;
        let index = queued.iter().position(|q| q.write.ticket == ticket)?;
        Some(queued.remove(index).write)
    }

    /// A write finished (or had nowhere to go) at `now`
    pub(crate) fn complete(
        &mut self,
        politeness: Politeness,
        write: PendingWrite,
        now: u64,
        state: DeliveryState,
    ) {
        let channel = self.channel_mut(politeness);
        channel.last_message = Some(write.message);
        channel.last_fired = Some(now);
        self.resolve(write.ticket, state);
    }

    fn resolve(&mut self, ticket: DeliveryTicket, state: DeliveryState) {
        self.deliveries.insert(ticket, state);
        self.resolved.push_back(ticket);
        while self.resolved.len() > DELIVERY_HISTORY {
            if let Some(old) = self.resolved.pop_front() {
                self.deliveries.remove(&old);
            }
        }
    }

    /// Delivery state of a ticket; None once it has aged out of history
    pub fn delivery(&self, ticket: DeliveryTicket) -> Option<&DeliveryState> {
        self.deliveries.get(&ticket)
    }

    pub fn has_pending(&self, politeness: Politeness) -> bool {
        !self.channel(politeness).queued.is_empty()
    }

    /// Cancel pending writes on both channels
    pub(crate) fn cancel_pending(&mut self, scheduler: &mut Scheduler<Task>) {
        for politeness in Politeness::ALL {
            for queued in std::mem::take(&mut self.channel_mut(politeness).queued) {
                scheduler.clear_timer(queued.timer);
                self.resolve(queued.write.ticket, DeliveryState::Superseded);
            }
        }
    }

    pub fn snapshot(&self) -> AnnouncerSnapshot {
        AnnouncerSnapshot {
            last_polite_message: self.polite.last_message.clone(),
            last_assertive_message: self.assertive.last_message.clone(),
            last_polite_at: self.polite.last_fired,
            last_assertive_at: self.assertive.last_fired,
            marker_counter: self.marker_counter,
            polite_pending: self.has_pending(Politeness::Polite),
            assertive_pending: self.has_pending(Politeness::Assertive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(a: &mut Announcer, sched: &mut Scheduler<Task>, now: u64) -> Vec<(u64, String)> {
        let mut written = Vec::new();
        while let Some((at, task)) = sched.pop_due(now) {
            if let Task::ChannelFire(p, ticket) = task {
                if let Some(write) = a.take_due(p, ticket) {
                    let content = write.content.clone();
                    a.complete(p, write, at, DeliveryState::Written { content: content.clone() });
                    written.push((at, content));
                }
            }
        }
        written
    }

    #[test]
    fn test_first_write_waits_settle_delay() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        let t = a.submit(Politeness::Polite, "Saved", false, 1000, &mut sched);
        assert_eq!(sched.next_deadline(), Some(1000 + REGION_CLEAR_DELAY_MS));
        assert!(a.delivery(t).unwrap().is_pending());
        assert_eq!(fire(&mut a, &mut sched, 2000), vec![(1050, "Saved".to_string())]);
        assert_eq!(a.delivery(t), Some(&DeliveryState::Written { content: "Saved".into() }));
    }

    #[test]
    fn test_burst_coalesces_to_last() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        let first = a.submit(Politeness::Polite, "One", false, 0, &mut sched);
        let second = a.submit(Politeness::Polite, "Two", false, 20, &mut sched);
        assert_eq!(a.delivery(first), Some(&DeliveryState::Superseded));
        assert_eq!(fire(&mut a, &mut sched, 1000), vec![(70, "Two".to_string())]);
        assert!(!a.delivery(second).unwrap().is_pending());
    }

    #[test]
    fn test_debounce_counts_from_last_fire() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        a.submit(Politeness::Polite, "One", false, 0, &mut sched);
        fire(&mut a, &mut sched, 50);
        a.submit(Politeness::Polite, "Two", false, 120, &mut sched);
        // 30ms of debounce left, then the settle delay
        assert_eq!(sched.next_deadline(), Some(200));
    }

    #[test]
    fn test_pending_write_outside_window_still_lands() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        a.submit(Politeness::Polite, "Zero", false, 0, &mut sched);
        fire(&mut a, &mut sched, 50);
        // Debounced until 200
        let one = a.submit(Politeness::Polite, "One", false, 60, &mut sched);
        let two = a.submit(Politeness::Polite, "Two", false, 170, &mut sched);
        assert!(a.delivery(one).unwrap().is_pending());
        assert_eq!(
            fire(&mut a, &mut sched, 1000),
            vec![(200, "One".to_string()), (220, "Two".to_string())],
        );
        assert!(!a.delivery(two).unwrap().is_pending());
    }

    #[test]
    fn test_repeat_gets_rotating_marker() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        a.submit(Politeness::Assertive, "Failed", false, 0, &mut sched);
        let first = fire(&mut a, &mut sched, 100);
        a.submit(Politeness::Assertive, "Failed", false, 500, &mut sched);
        let second = fire(&mut a, &mut sched, 1000);
        a.submit(Politeness::Assertive, "Failed", true, 2000, &mut sched);
        let third = fire(&mut a, &mut sched, 3000);
        assert_eq!(first[0].1, "Failed");
        assert_eq!(second[0].1, "Failed\u{200B}");
        assert_eq!(third[0].1, "Failed\u{200C}");
        assert_eq!(a.snapshot().last_assertive_message.as_deref(), Some("Failed"));
    }

    #[test]
    fn test_channels_independent() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        let polite = a.submit(Politeness::Polite, "Saved", false, 0, &mut sched);
        a.submit(Politeness::Assertive, "Failed", false, 10, &mut sched);
        assert!(a.delivery(polite).unwrap().is_pending());
        let written = fire(&mut a, &mut sched, 1000);
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_cancel_pending() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        let t = a.submit(Politeness::Polite, "Saved", false, 0, &mut sched);
        a.cancel_pending(&mut sched);
        assert_eq!(a.delivery(t), Some(&DeliveryState::Superseded));
        assert!(!sched.has_pending_work());
        assert!(!a.snapshot().polite_pending);
    }

    #[test]
    fn test_delivery_history_bounded() {
        let mut a = Announcer::new();
        let mut sched = Scheduler::new();
        let first = a.submit(Politeness::Polite, "m0", false, 0, &mut sched);
        for i in 1..=DELIVERY_HISTORY + 1 {
            a.submit(Politeness::Polite, &format!("m{i}"), false, i as u64, &mut sched);
        }
        assert_eq!(a.delivery(first), None);
    }
}
