// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A simple front-end for running a `Scenario` on a `Platform`
//!
//! For example, run using:
//!   cargo run --bin votf-sim -- --platform votf-sim/configs/platform.yaml
//! --scenario votf-sim/configs/scenario.yaml --stdout-level debug

use anyhow::{Result, bail};
use clap::Parser;
use votf_platform::Platform;
use votf_sim::Runner;
use votf_sim::settings::{Cli, Settings};
use votf_sim::types::Scenario;
use votf_track::Track;
use votf_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use votf_track::entity::toplevel;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: settings.stdout,
            level: settings.stdout_level,
            filter_regex: &settings.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: settings.log_file.is_some(),
            level: settings.log_file_level,
            filter_regex: "",
            file: settings.log_file.as_deref(),
        },
    };
    let tracker = setup_trackers(&config)?;
    let top = toplevel(&tracker, "top");

    let platform = Platform::from_file(&top, &settings.platform)?;
    println!("{platform}");
    let scenario = Scenario::from_file(&settings.scenario)?;

    let runner = Runner::new(&top, &platform, settings.poll(platform.poll()));
    let report = runner.run(&scenario);
    tracker.shutdown();

    println!("{report}");
    if !report.passed() {
        bail!("scenario {} failed", settings.scenario.display());
    }
    Ok(())
}
