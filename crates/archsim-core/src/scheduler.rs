//! Registration order and step counter for clocked entities.

use std::fmt;

use crate::entity::{MemoryId, RegisterId};

/// A clocked entity known to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ClockedHandle {
    /// A register of any variant.
    Register(RegisterId),
    /// A memory.
    Memory(MemoryId),
}

impl fmt::Display for ClockedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(id) => id.fmt(f),
            Self::Memory(id) => id.fmt(f),
        }
    }
}

/// Outcome of announcing an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// Appended to the clocking order.
    Added,
    /// Already present; appended again and clocked once per entry.
    Duplicate,
}

/// Ordered set of clocked entities plus the global step counter.
///
/// Order is registration order and is used for both clock phases.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scheduler {
    order: Vec<ClockedHandle>,
    step: u64,
}

impl Scheduler {
    /// Creates an empty scheduler at step 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            order: Vec::new(),
            step: 0,
        }
    }

    /// Appends `handle`, reporting whether it was already registered.
    pub fn announce(&mut self, handle: ClockedHandle) -> Announcement {
        let seen = self.order.contains(&handle);
        self.order.push(handle);
        if seen {
            Announcement::Duplicate
        } else {
            Announcement::Added
        }
    }

    /// Entities in clocking order.
    #[must_use]
    pub fn order(&self) -> &[ClockedHandle] {
        &self.order
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.step
    }

    /// Whether the first tick has run.
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.step > 0
    }

    pub(crate) fn advance(&mut self) {
        self.step += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{Announcement, ClockedHandle, Scheduler};
    use crate::entity::{MemoryId, RegisterId};

    #[test]
    fn duplicates_are_appended_and_reported() {
        let mut scheduler = Scheduler::new();
        let a = ClockedHandle::Register(RegisterId(0));
        let m = ClockedHandle::Memory(MemoryId(0));
        assert_eq!(scheduler.announce(a), Announcement::Added);
        assert_eq!(scheduler.announce(m), Announcement::Added);
        assert_eq!(scheduler.announce(a), Announcement::Duplicate);
        assert_eq!(scheduler.order(), &[a, m, a]);
    }

    #[test]
    fn step_counter_starts_at_zero() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.has_started());
        scheduler.advance();
        scheduler.advance();
        assert_eq!(scheduler.current_step(), 2);
        assert!(scheduler.has_started());
    }
}
