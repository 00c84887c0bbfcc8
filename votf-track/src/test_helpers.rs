// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Helpers for asserting on logging output in tests.
//!
//! A [`TestTracker`] records every event as the text line a
//! [`TextTracker`] would have written, so tests can match lines with
//! regular expressions.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use regex::Regex;

use crate::tracker::{EntityManager, TextTracker, str_to_level};
use crate::{Id, Track, Tracker};

/// Records all events in memory. Every entity is enabled at every level.
pub struct TestTracker {
    lines: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl TestTracker {
    /// Ids are handed out starting from `initial_id`.
    #[must_use]
    pub fn new(initial_id: u64) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(initial_id),
        }
    }

    fn record(&self, line: String) {
        println!("{line}");
        self.lines().push(line);
    }

    fn lines(&self) -> MutexGuard<'_, Vec<String>> {
        // A test that panicked while holding the lock has already failed.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the lines recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.lines().clone()
    }
}

impl Track for TestTracker {
    fn unique_id(&self) -> Id {
        Id(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn is_entity_enabled(&self, _id: Id, _level: log::Level) -> bool {
        true
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {}

    fn create(&self, created_by: Id, id: Id, name: &str) {
        self.record(format!("{created_by}: created {id}, {name}"));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.record(format!("{destroyed_by}: destroyed {id}"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.record(format!("{id}:{level}: {msg}"));
    }

    fn shutdown(&self) {}
}

/// Build a [`TestTracker`] and return it twice: once concrete for
/// assertions, once as a [`Tracker`](crate::Tracker) for entities.
///
/// ```
/// let (test_tracker, tracker) = votf_track::test_init!(10);
/// let _top = votf_track::entity::toplevel(&tracker, "top");
/// votf_track::test_helpers::check_and_clear(&test_tracker, &["0: created 10, top"]);
/// ```
#[macro_export]
macro_rules! test_init {
    ($start_id:expr) => {{
        let test_tracker = std::sync::Arc::new($crate::test_helpers::TestTracker::new($start_id));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern {pattern:?}: {e}"))
}

/// Assert that the lines recorded since the last call match `expected`
/// one-for-one, then forget them.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut lines = tracker.lines();
    assert_eq!(
        lines.len(),
        expected.len(),
        "expected {expected:#?}\ngot {:#?}",
        *lines
    );
    for (line, pattern) in lines.iter().zip(expected) {
        assert!(regex(pattern).is_match(line), "{line:?} !~ {pattern:?}");
    }
    lines.clear();
}

/// Assert that some recorded line matches `pattern`. Nothing is cleared.
pub fn check_contains(tracker: &TestTracker, pattern: &str) {
    let re = regex(pattern);
    let lines = tracker.lines();
    assert!(
        lines.iter().any(|line| re.is_match(line)),
        "No event matching {pattern:?} in {:?}",
        *lines
    );
}

/// Stdout tracker for an integration test file, called as
/// `create_tracker(file!())`.
///
/// Only warnings are shown unless `VOTF_TEST_LEVEL` asks for more.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    let level = std::env::var("VOTF_TEST_LEVEL")
        .ok()
        .and_then(|lvl| str_to_level(&lvl).ok())
        .unwrap_or(log::Level::Warn);
    let stem = Path::new(full_filepath)
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    println!("{stem}: tracking at {level}");
    Arc::new(TextTracker::new(
        EntityManager::new(level),
        Box::new(std::io::stdout()),
    ))
}
