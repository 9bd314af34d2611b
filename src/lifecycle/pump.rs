//! In-process frame pump.
//!
//! Stands in for a display-refresh callback: every [`FramePump::tick`]
//! queues one ticket per active registration and [`FramePump::drain`]
//! hands them out. Tickets already queued survive a cancellation, the same
//! one-tick race a browser's animation-frame callback has, so consumers
//! must check the ticket's generation.

use super::guard::{FrameScheduler, ScheduleId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One firing of a repeating registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTicket {
    generation: u64,
}

impl LoopTicket {
    /// Creates a ticket for `generation`.
    pub fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Returns the generation of the registration that fired.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct PumpState {
    next_id: u64,
    active: Vec<(ScheduleId, u64)>,
    queued: VecDeque<LoopTicket>,
    registrations: u64,
    cancellations: u64,
    unknown_cancels: u64,
}

/// Shared-handle scheduler; clones observe the same registrations.
#[derive(Debug, Clone, Default)]
pub struct FramePump {
    state: Rc<RefCell<PumpState>>,
}

impl FramePump {
    /// Creates a pump with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every active registration once. Returns the number of tickets
    /// queued.
    pub fn tick(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let tickets: Vec<LoopTicket> = state
            .active
            .iter()
            .map(|&(_, generation)| LoopTicket::new(generation))
            .collect();
        let fired = tickets.len();
        state.queued.extend(tickets);
        fired
    }

    /// Takes every queued ticket, oldest first.
    pub fn drain(&self) -> Vec<LoopTicket> {
        self.state.borrow_mut().queued.drain(..).collect()
    }

    /// Returns the number of live registrations.
    pub fn active_registrations(&self) -> usize {
        self.state.borrow().active.len()
    }

    /// Returns the number of registrations ever made.
    pub fn total_registrations(&self) -> u64 {
        self.state.borrow().registrations
    }

    /// Returns the number of successful cancellations.
    pub fn total_cancellations(&self) -> u64 {
        self.state.borrow().cancellations
    }

    /// Cancels for ids that were not active (double cancels).
    pub fn unknown_cancels(&self) -> u64 {
        self.state.borrow().unknown_cancels
    }
}

impl FrameScheduler for FramePump {
    fn schedule_repeating(&mut self, generation: u64) -> ScheduleId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ScheduleId(state.next_id);
        state.active.push((id, generation));
        state.registrations += 1;
        id
    }

    fn cancel(&mut self, id: ScheduleId) {
        let mut state = self.state.borrow_mut();
        let before = state.active.len();
        state.active.retain(|&(active, _)| active != id);
        if state.active.len() == before {
            state.unknown_cancels += 1;
            tracing::warn!(?id, "Cancel for an inactive frame loop");
        } else {
            state.cancellations += 1;
        }
    }
}
