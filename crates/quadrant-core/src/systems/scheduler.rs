//! Timer queue - the single logical timeline for every delayed operation.
//!
//! Timers are ordered by (fire time, issue sequence), so two timers due at
//! the same instant fire in the order they were scheduled. While a timer is
//! being handled the clock reads that timer's fire time, which makes any
//! follow-up timer it schedules relative to when it actually fired rather
//! than to the end of the frame.
//!
//! Cancellation is by owner: freezing an agent drops every timer owned by
//! that agent's behavior. Graph timers have no cancellation path.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::behavior::BehaviorTask;
use super::navigation::GraphTask;

/// Who a timer belongs to, for scoped cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Delayed graph toggles and waypoint-event changes.
    Graph,
    /// An agent's behavior waits (cooldown resets, resumes).
    Behavior(Entity),
    /// An agent's clock-event resolutions.
    Events(Entity),
}

/// Work to perform when a timer fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Graph(GraphTask),
    Behavior(BehaviorTask),
    /// Run the companion resolution of the clock event in `category`.
    ResolveEvent {
        agent: Entity,
        category: &'static str,
    },
}

impl Task {
    pub fn owner(&self) -> Owner {
        match self {
            Task::Graph(_) => Owner::Graph,
            Task::Behavior(task) => Owner::Behavior(task.agent()),
            Task::ResolveEvent { agent, .. } => Owner::Events(*agent),
        }
    }
}

/// Handle for cancelling one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer {
    at: Duration,
    seq: u64,
    owner: Owner,
    task: Task,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Priority queue of (fire time, task) pairs driven by the simulation tick.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Timer>>,
}

/// Convert game seconds to a `Duration`. Negative and NaN become zero.
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position of the timeline.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `task` once `delay` has elapsed from now.
    pub fn schedule(&mut self, delay: Duration, task: Task) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let owner = task.owner();
        self.queue.push(Reverse(Timer {
            at: self.now + delay,
            seq,
            owner,
            task,
        }));
        TimerId(seq)
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its fire time.
    pub fn pop_due(&mut self, until: Duration) -> Option<Task> {
        let due = self
            .queue
            .peek()
            .is_some_and(|Reverse(timer)| timer.at <= until);
        if !due {
            return None;
        }
        let Reverse(timer) = self.queue.pop()?;
        self.now = self.now.max(timer.at);
        Some(timer.task)
    }

    /// Move the clock forward. The clock never runs backwards.
    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Drop every timer belonging to `owner`. Returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: Owner) -> usize {
        let before = self.queue.len();
        self.queue.retain(|Reverse(timer)| timer.owner != owner);
        before - self.queue.len()
    }

    /// Drop one timer. Returns `false` if it already fired or was dropped.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|Reverse(timer)| timer.seq != id.0);
        before != self.queue.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_for(&self, owner: Owner) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(timer)| timer.owner == owner)
            .count()
    }

    /// Fire time of the earliest outstanding timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(timer)| timer.at)
    }
}
