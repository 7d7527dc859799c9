//! Simulation constants: retry bounds, default ranges, event categories.
//!
//! Plain values with no engine dependency. Both the core engine and the
//! simtest harness read these.

/// Maximum number of motion intents issued by a single navigation request.
pub const MAX_NAVIGATION_ATTEMPTS: u32 = 50;

/// Remaining path distance at or below which an agent counts as arrived.
pub const DEFAULT_STOPPING_RANGE: f32 = 6.10;

/// Starting health for newly spawned agents.
pub const DEFAULT_HEALTH: f32 = 100.0;

/// Event-marker and notification categories.
///
/// These are the keys written into an agent's event-marker feed, so they
/// stay stable strings rather than enum discriminants.
pub mod categories {
    pub const PENDING_CALLS: &str = "PENDING_CALLS";
    pub const MISSED_CALLS: &str = "MISSED_CALLS";
    pub const MISHAPS: &str = "MISHAPS";
    pub const COLONIST_DIED: &str = "COLONIST_DIED";
    pub const PAYING_RESPECTS: &str = "PAYING_RESPECTS";
}
