// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::atomic::{AtomicI64, Ordering};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// The kinds of entities that receive
/// run-stable, relational-style numeric identifiers.
#[derive(
    Debug, Display, EnumString, EnumCount, EnumIter, Clone, Copy, PartialEq, Eq, Hash,
)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Account,
    Dataset,
    Collection,
    Author,
    File,
    Category,
    CustomField,
    Timeline,
    Funding,
    PrivateLink,
    Group,
}

/// Process-wide counters that assign contiguous,
/// strictly increasing identifiers per entity kind.
///
/// The counters are shared between all workers of a run;
/// initial values have to be set before any
/// state-mutating ingestion begins.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counters: [AtomicI64; EntityKind::COUNT],
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the counter for `kind` to `value`.
    /// The next call to [`Self::next`] returns `value + 1`.
    pub fn set(&self, kind: EntityKind, value: i64) {
        self.counters[kind as usize].store(value, Ordering::SeqCst);
    }

    /// Claims and returns the next identifier for `kind`.
    pub fn next(&self, kind: EntityKind) -> i64 {
        self.counters[kind as usize].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last identifier handed out for `kind`
    /// (or the initial value, if none was handed out yet).
    #[must_use]
    pub fn current(&self, kind: EntityKind) -> i64 {
        self.counters[kind as usize].load(Ordering::SeqCst)
    }

    pub fn kinds() -> impl Iterator<Item = EntityKind> {
        EntityKind::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_contiguous_from_initial_value() {
        let ids = IdGenerator::new();
        ids.set(EntityKind::Dataset, 100);
        assert_eq!(ids.next(EntityKind::Dataset), 101);
        assert_eq!(ids.next(EntityKind::Dataset), 102);
        assert_eq!(ids.current(EntityKind::Dataset), 102);
        // Other kinds are unaffected.
        assert_eq!(ids.current(EntityKind::Account), 0);
        assert_eq!(ids.next(EntityKind::Account), 1);
    }

    #[test]
    fn concurrent_next_yields_no_duplicates_and_no_gaps() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let ids = Arc::new(IdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            let ids = Arc::clone(&ids);
            handles.push(std::thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| ids.next(EntityKind::Author))
                    .collect::<Vec<i64>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("worker thread panicked") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        let expected: HashSet<i64> = (1..=(THREADS * PER_THREAD) as i64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn kinds_enumerates_every_counter() {
        assert_eq!(IdGenerator::kinds().count(), EntityKind::COUNT);
        assert_eq!(EntityKind::Account.to_string(), "account");
        assert_eq!(EntityKind::CustomField.to_string(), "custom_field");
    }
}
