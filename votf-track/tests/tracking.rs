// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::fs;

use votf_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use votf_track::entity::{Entity, toplevel};
use votf_track::test_helpers::check_and_clear;
use votf_track::{Track, error, info, test_init, trace, warn};

#[test]
fn entity_names_are_hierarchical() {
    let (_test_tracker, tracker) = test_init!(100);
    let top = toplevel(&tracker, "top");
    let votf = std::sync::Arc::new(Entity::new(&top, "votf"));
    let ring = Entity::new(&votf, "ring");

    assert_eq!(ring.full_name(), "top::votf::ring");
    assert_eq!(format!("{ring}"), "top::votf::ring");
    assert_eq!(top.id.0, 100);
    assert_eq!(votf.id.0, 101);
    assert_eq!(ring.id.0, 102);
}

#[test]
fn log_macros_record_level_and_id() {
    let (test_tracker, tracker) = test_init!(10);
    let top = toplevel(&tracker, "top");
    check_and_clear(&test_tracker, &["0: created 10, top"]);

    info!(top ; "ring request {}", 1);
    warn!(top ; "busy before flush");
    error!(top ; "timeout after {} polls", 10000);
    trace!(top ; "detail");

    check_and_clear(
        &test_tracker,
        &[
            "10:INFO: ring request 1",
            "10:WARN: busy before flush",
            "10:ERROR: timeout after 10000 polls",
            "10:TRACE: detail",
        ],
    );
}

#[test]
fn file_tracker_filters_by_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votf.log");
    let path_str = path.to_str().unwrap();

    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: false,
            ..Default::default()
        },
        log_file: TrackerConfig {
            enable: true,
            level: log::Level::Info,
            filter_regex: "",
            file: Some(path_str),
        },
    };
    let tracker = setup_trackers(&config).unwrap();
    let top = toplevel(&tracker, "top");
    info!(top ; "kept");
    trace!(top ; "dropped");
    tracker.shutdown();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains(":INFO: kept"));
    assert!(!contents.contains("dropped"));
}

#[test]
fn filter_regex_limits_other_entities_to_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filtered.log");
    let path_str = path.to_str().unwrap();

    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: false,
            ..Default::default()
        },
        log_file: TrackerConfig {
            enable: true,
            level: log::Level::Debug,
            filter_regex: ".*flush.*",
            file: Some(path_str),
        },
    };
    let tracker = setup_trackers(&config).unwrap();
    let top = toplevel(&tracker, "top");
    let flush = Entity::new(&top, "flush");
    info!(top ; "top info");
    error!(top ; "top error");
    info!(flush ; "flush info");
    tracker.shutdown();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(!contents.contains("top info"));
    assert!(contents.contains("top error"));
    assert!(contents.contains("flush info"));
}

#[test]
fn file_tracker_needs_a_file() {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: false,
            ..Default::default()
        },
        log_file: TrackerConfig {
            enable: true,
            ..Default::default()
        },
    };
    match setup_trackers(&config) {
        Ok(_) => panic!("expected an error"),
        Err(e) => assert!(e.0.contains("requires a file name")),
    }
}
