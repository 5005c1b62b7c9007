//! Unit identifiers and their generators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a node in the execution graph.
///
/// Unique within one pipeline construction run. Generators hand them out
/// starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(u64);

impl UnitId {
    /// Wraps a raw id value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UnitId> for u64 {
    fn from(id: UnitId) -> Self {
        id.0
    }
}

/// Sequential [`UnitId`] generator owned by a single graph builder.
///
/// Allocation needs `&mut self`; share an [`AtomicGenId`] instead when
/// several threads must draw from one sequence.
#[derive(Debug, Default)]
pub struct GenId {
    last: u64,
}

impl GenId {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Returns a fresh id.
    pub fn new_id(&mut self) -> UnitId {
        self.last += 1;
        UnitId(self.last)
    }

    /// Returns the most recently issued id.
    #[must_use]
    pub const fn last(&self) -> Option<UnitId> {
        if self.last == 0 {
            None
        } else {
            Some(UnitId(self.last))
        }
    }
}

/// Thread-safe [`UnitId`] generator.
#[derive(Debug, Default)]
pub struct AtomicGenId {
    last: AtomicU64,
}

impl AtomicGenId {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id.
    pub fn new_id(&self) -> UnitId {
        UnitId(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns the most recently issued id.
    #[must_use]
    pub fn last(&self) -> Option<UnitId> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            n => Some(UnitId(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_gen_id_sequence_starts_at_one() {
        let mut gen = GenId::new();
        let ids: Vec<u64> = (0..5).map(|_| gen.new_id().get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_gen_id_instances_are_independent() {
        let mut a = GenId::new();
        let mut b = GenId::default();
        a.new_id();
        a.new_id();
        assert_eq!(b.new_id(), UnitId::new(1));
        assert_eq!(a.new_id(), UnitId::new(3));
    }

    #[test]
    fn test_gen_id_last() {
        let mut gen = GenId::new();
        assert_eq!(gen.last(), None);
        gen.new_id();
        gen.new_id();
        assert_eq!(gen.last(), Some(UnitId::new(2)));
    }

    #[test]
    fn test_atomic_gen_id_is_gapless_across_threads() {
        let gen = Arc::new(AtomicGenId::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || (0..250).map(|_| gen.new_id().get()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen.iter().min(), Some(&1));
        assert_eq!(seen.iter().max(), Some(&1000));
        assert_eq!(gen.last(), Some(UnitId::new(1000)));
    }

    #[test]
    fn test_unit_id_display_and_serde() {
        let id = UnitId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<UnitId>("7").unwrap(), UnitId::new(7));
        assert_eq!(u64::from(id), 42);
    }
}
