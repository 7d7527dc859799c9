//! Agent identity allocation.
//!
//! Ids come from an allocator owned by the simulation context and handed
//! to whoever spawns agents, never from process-wide state.

use serde::{Deserialize, Serialize};

/// Stable, human-facing agent identifier (the colonist personnel id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume allocation after ids that were handed out in an earlier run.
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn allocate(&mut self) -> AgentId {
        let id = AgentId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to `allocate` will return.
    pub fn peek(&self) -> AgentId {
        AgentId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), AgentId(0));
        assert_eq!(ids.allocate(), AgentId(1));
        assert_eq!(ids.peek(), AgentId(2));
    }

    #[test]
    fn test_resume_from_saved_counter() {
        let mut ids = IdAllocator::starting_at(41);
        assert_eq!(ids.allocate().to_string(), "#41");
    }
}
