// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Scenario file format.

use std::path::Path;

use serde::Deserialize;
use votf_models::types::{DebugState, Endpoint, LinkState, LostCfg, ResetKind, ServiceCfg};
use votf_platform::ConfigError;

/// A list of steps run in order against one simulated platform.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_file(scenario_path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(scenario_path).map_err(|e| {
            ConfigError(format!("Unable to read {}: {e}", scenario_path.display()))
        })?;
        Scenario::from_string(&s)
    }

    pub fn from_string(scenario: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(scenario)
            .map_err(|e| ConfigError(format!("serde_yaml::from_str failed: {e}")))
    }
}

/// One scenario step.
///
/// Steps are either a ring manager operation, a change to the simulated
/// hardware or an expectation about the resulting state.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    // Ring manager operations
    Init,
    CreateRing,
    DestroyRing,
    CreateLink {
        src_ip: u32,
        dst_ip: u32,
    },
    DestroyLink {
        src_ip: u32,
        dst_ip: u32,
    },
    SetServiceCfg {
        endpoint: Endpoint,
        cfg: ServiceCfg,
    },
    SetServiceCfgAlone {
        endpoint: Endpoint,
        cfg: ServiceCfg,
    },
    Flush {
        endpoint: Endpoint,
    },
    FlushAlone {
        endpoint: Endpoint,
    },
    Reset {
        endpoint: Endpoint,
        kind: ResetKind,
    },
    SetFrameSize {
        endpoint: Endpoint,
        size: u32,
    },
    SetTrsLostCfg {
        endpoint: Endpoint,
        cfg: LostCfg,
    },
    CheckWaitConnection {
        src: Endpoint,
        dst: Endpoint,
    },
    CheckInvalidState {
        src: Endpoint,
        dst: Endpoint,
    },
    WrapperReset {
        base: u32,
    },
    DisableService,
    SfrDump,

    // Simulated hardware
    SetBusy {
        endpoint: Endpoint,
        busy: bool,
    },
    StickBusy {
        endpoint: Endpoint,
    },
    ReleaseBusy {
        endpoint: Endpoint,
    },
    SetDebugState {
        endpoint: Endpoint,
        state: DebugState,
    },
    StickWrapperReset {
        base: u32,
        stuck: bool,
    },
    DropRing,

    // Expectations
    ExpectLink {
        endpoint: Endpoint,
        state: LinkState,
    },
    ExpectRingRequest {
        count: u32,
    },
    ExpectRing {
        endpoint: Endpoint,
        enabled: bool,
    },
    ExpectBusy {
        endpoint: Endpoint,
        busy: bool,
    },
    ExpectRegister {
        base: u32,
        offset: u32,
        value: u32,
    },
    /// The previous operation must have failed.
    ExpectError,
}

impl Step {
    /// Short name used when logging the step.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Step::Init => "init",
            Step::CreateRing => "create_ring",
            Step::DestroyRing => "destroy_ring",
            Step::CreateLink { .. } => "create_link",
            Step::DestroyLink { .. } => "destroy_link",
            Step::SetServiceCfg { .. } => "set_service_cfg",
            Step::SetServiceCfgAlone { .. } => "set_service_cfg_alone",
            Step::Flush { .. } => "flush",
            Step::FlushAlone { .. } => "flush_alone",
            Step::Reset { .. } => "reset",
            Step::SetFrameSize { .. } => "set_frame_size",
            Step::SetTrsLostCfg { .. } => "set_trs_lost_cfg",
            Step::CheckWaitConnection { .. } => "check_wait_connection",
            Step::CheckInvalidState { .. } => "check_invalid_state",
            Step::WrapperReset { .. } => "wrapper_reset",
            Step::DisableService => "disable_service",
            Step::SfrDump => "sfr_dump",
            Step::SetBusy { .. } => "set_busy",
            Step::StickBusy { .. } => "stick_busy",
            Step::ReleaseBusy { .. } => "release_busy",
            Step::SetDebugState { .. } => "set_debug_state",
            Step::StickWrapperReset { .. } => "stick_wrapper_reset",
            Step::DropRing => "drop_ring",
            Step::ExpectLink { .. } => "expect_link",
            Step::ExpectRingRequest { .. } => "expect_ring_request",
            Step::ExpectRing { .. } => "expect_ring",
            Step::ExpectBusy { .. } => "expect_busy",
            Step::ExpectRegister { .. } => "expect_register",
            Step::ExpectError => "expect_error",
        }
    }
}
