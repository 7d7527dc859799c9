//! Systems - logic that operates on components

pub mod behavior;
pub mod clock_events;
pub mod navigation;
pub mod notify;
pub mod scheduler;

pub use behavior::{behavior_system, BehaviorReport, BehaviorTask};
pub use clock_events::{
    answer_pending_call, ClockEvent, ClockEventController, EventTarget, MishapEvent, PendingCallEvent,
    TickReport,
};
pub use navigation::{GraphTask, QuadrantMapper};
pub use notify::{ListenerId, Notification, Notifier};
pub use scheduler::{seconds, Owner, Scheduler, Task, TimerId};
