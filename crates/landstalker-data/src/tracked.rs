//! Snapshot pairs for dirty tracking
//!
//! Every mutable collection a manager owns lives alongside the value it
//! held at load time or at the last commit. Dirtiness is a plain
//! structural comparison; there is no change-event plumbing anywhere.

/// A live value paired with its last-committed snapshot
#[derive(Debug, Clone, Default)]
pub struct Tracked<T: Clone + PartialEq> {
    current: T,
    committed: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    /// Start tracking with the snapshot equal to the initial value
    pub fn new(value: T) -> Self {
        Self {
            committed: value.clone(),
            current: value,
        }
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.current
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.committed
    }

    /// Promote the current value to the snapshot
    pub fn commit(&mut self) {
        self.committed = self.current.clone();
    }

    /// Discard edits, restoring the snapshot
    pub fn revert(&mut self) {
        self.current = self.committed.clone();
    }
}

impl<T: Clone + PartialEq> std::ops::Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_cycle() {
        let mut tracked = Tracked::new(vec![1, 2, 3]);
        assert!(!tracked.is_dirty());
        tracked.get_mut().push(4);
        assert!(tracked.is_dirty());
        tracked.commit();
        assert!(!tracked.is_dirty());
        assert_eq!(tracked.committed(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_revert() {
        let mut tracked = Tracked::new(7);
        *tracked.get_mut() = 9;
        tracked.revert();
        assert_eq!(*tracked.get(), 7);
        assert!(!tracked.is_dirty());
    }
}
