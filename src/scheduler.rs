//! # Blink Scheduler
//!
//! The active cursor position blinks: every interval the scheduler flips a
//! highlight phase and asks listeners to re-render the target. Timing is
//! delegated to a [`TimerHost`], which hands out cancellable [`TimerId`]s.
//!
//! A position or document change calls [`BlinkScheduler::restart`]: the
//! pending tick is cancelled, the phase resets, the target renders at once
//! and a fresh tick is scheduled. The cadence therefore restarts cleanly
//! instead of drifting. Ticks delivered for a cancelled id are ignored.
//!
//! [`ManualTimerHost`] is a virtual clock for tests and for scripted runs.

use crate::cursor::CursorPosition;
use crate::emitter::{Emitter, SubscriptionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Handle of one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// Source of deferred callbacks.
pub trait TimerHost {
    /// Schedule a single tick `delay` from now.
    fn schedule(&mut self, delay: Duration) -> TimerId;
    /// Cancel a tick. Unknown or already-fired ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// A deterministic clock: ticks fire only when the owner advances time.
#[derive(Debug, Default)]
pub struct ManualTimerHost {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<TimerId, Duration>,
}

impl ManualTimerHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the earliest tick due at or before `until`,
    /// moving the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerId> {
        let (&id, &deadline) = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= until)
            .min_by_key(|(id, deadline)| (**deadline, **id))?;
        self.pending.remove(&id);
        self.now = self.now.max(deadline);
        Some(id)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl TimerHost for ManualTimerHost {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, self.now.saturating_add(delay));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.remove(&id);
    }
}

/// One render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlinkFrame {
    pub position: CursorPosition,
    pub highlighted: bool,
}

#[derive(Debug)]
pub struct BlinkScheduler<H> {
    host: H,
    interval: Duration,
    pending: Option<TimerId>,
    highlighted: bool,
    target: Option<CursorPosition>,
    on_render: Emitter<BlinkFrame>,
}

impl<H: TimerHost> BlinkScheduler<H> {
    /// A zero interval is raised to one millisecond.
    pub fn new(host: H, interval: Duration) -> Self {
        Self {
            host,
            interval: interval.max(Duration::from_millis(1)),
            pending: None,
            highlighted: false,
            target: None,
            on_render: Emitter::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn target(&self) -> Option<CursorPosition> {
        self.target
    }

    pub fn on_render<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&BlinkFrame) + 'static,
    {
        self.on_render.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.on_render.unsubscribe(id)
    }

    fn render(&mut self) {
        let Some(position) = self.target else {
            return;
        };
        self.highlighted = !self.highlighted;
        let frame = BlinkFrame {
            position,
            highlighted: self.highlighted,
        };
        trace!(row = position.row, col = position.col, highlighted = frame.highlighted, "Blink");
        self.on_render.fire(&frame);
    }

    /// Start blinking at `position` from a fresh phase.
    pub fn restart(&mut self, position: CursorPosition) {
        self.cancel();
        self.target = Some(position);
        self.highlighted = false;
        self.render();
        self.pending = Some(self.host.schedule(self.interval));
    }

    /// Deliver a tick. Returns `false` for a stale or cancelled id.
    pub fn fire(&mut self, id: TimerId) -> bool {
        if self.pending != Some(id) {
            trace!(timer = id.0, "Ignoring stale blink tick");
            return false;
        }
        self.pending = None;
        self.render();
        self.pending = Some(self.host.schedule(self.interval));
        true
    }

    /// Cancel the pending tick, if any.
    pub fn cancel(&mut self) {
        if let Some(id) = self.pending.take() {
            debug!(timer = id.0, "Cancelled blink tick");
            self.host.cancel(id);
        }
    }
}

impl BlinkScheduler<ManualTimerHost> {
    /// Advance the virtual clock by `by`, delivering every tick that falls
    /// due. Returns the number of ticks delivered.
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = self.host.now().saturating_add(by);
        let mut delivered = 0;
        while let Some(id) = self.host.pop_due(until) {
            if self.fire(id) {
                delivered += 1;
            }
        }
        self.host.set_now(until);
        delivered
    }
}
