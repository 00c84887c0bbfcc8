// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Drive the VOTF ring manager through a scenario on simulated hardware.
//!
//! The [`Runner`] owns a [`VotfDevice`] connected to a [`SimBus`] with a
//! [`HardwareModel`] attached, all built from a [`Platform`]. Each
//! [`Step`] of a [`Scenario`] is applied in turn and its outcome logged.
//!
//! Errors returned by ring manager operations are logged and remembered but
//! do not stop the run; only a failed expectation does.

use std::fmt::Display;
use std::sync::Arc;

use votf_models::VotfDevice;
use votf_models::hardware::HardwareModel;
use votf_models::registers::sim::SimBus;
use votf_models::types::{Endpoint, PollConfig};
use votf_platform::Platform;
use votf_track::entity::Entity;
use votf_track::{error, info, warn};

use crate::types::{Scenario, Step};

pub mod settings;
pub mod types;

/// Why a scenario stopped early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// Index of the failing step.
    pub step: usize,
    pub message: String,
}

/// Summary of a scenario run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Number of steps applied, including a failing one.
    pub executed: usize,
    /// Number of operations that returned an error.
    pub errors: usize,
    pub failure: Option<Failure>,
}

impl Report {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.failure {
            None => write!(
                f,
                "{} steps passed ({} operation errors)",
                self.executed, self.errors
            ),
            Some(failure) => write!(
                f,
                "step {} failed: {} ({} steps executed)",
                failure.step, failure.message, self.executed
            ),
        }
    }
}

pub struct Runner {
    entity: Arc<Entity>,
    bus: Arc<SimBus>,
    hw: HardwareModel,
    device: VotfDevice,
}

impl Runner {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, platform: &Platform, poll: PollConfig) -> Self {
        let entity = Entity::child(parent, "runner");
        let bus = Arc::new(SimBus::new());
        let hw = HardwareModel::attach(&bus, platform.table());
        let device = VotfDevice::new(parent, platform.table().clone(), bus.clone()).with_poll(poll);
        Self {
            entity,
            bus,
            hw,
            device,
        }
    }

    #[must_use]
    pub fn device(&self) -> &VotfDevice {
        &self.device
    }

    #[must_use]
    pub fn hardware(&self) -> &HardwareModel {
        &self.hw
    }

    /// Apply every step of `scenario`, stopping at the first failed
    /// expectation.
    pub fn run(&self, scenario: &Scenario) -> Report {
        let mut report = Report::default();
        let mut last_failed = false;
        for (index, step) in scenario.steps.iter().enumerate() {
            report.executed += 1;
            match self.apply(step, last_failed) {
                Ok(Applied::Op(Ok(outcome))) => {
                    info!(self.entity ; "{index}: {}: {outcome}", step.name());
                    last_failed = false;
                }
                Ok(Applied::Op(Err(e))) => {
                    warn!(self.entity ; "{index}: {}: {e}", step.name());
                    report.errors += 1;
                    last_failed = true;
                }
                Ok(Applied::Checked) => {
                    info!(self.entity ; "{index}: {}: ok", step.name());
                }
                Err(message) => {
                    error!(self.entity ; "{index}: {}: {message}", step.name());
                    report.failure = Some(Failure {
                        step: index,
                        message,
                    });
                    break;
                }
            }
        }
        info!(self.entity ; "{report}");
        report
    }

    fn apply(&self, step: &Step, last_failed: bool) -> Result<Applied, String> {
        let device = &self.device;
        let op = match step {
            Step::Init => {
                device.init();
                Ok("done".to_string())
            }
            Step::CreateRing => device.create_ring().map(|s| format!("{s:?}")),
            Step::DestroyRing => device.destroy_ring().map(|s| format!("{s:?}")),
            Step::CreateLink { src_ip, dst_ip } => device
                .create_link(*src_ip, *dst_ip)
                .map(|()| "done".to_string()),
            Step::DestroyLink { src_ip, dst_ip } => device
                .destroy_link(*src_ip, *dst_ip)
                .map(|()| "done".to_string()),
            Step::SetServiceCfg { endpoint, cfg } => device
                .set_service_cfg(endpoint, cfg)
                .map(|s| format!("{endpoint} {s:?}")),
            Step::SetServiceCfgAlone { endpoint, cfg } => device
                .set_service_cfg_alone(endpoint, cfg)
                .map(|()| format!("{endpoint} done")),
            Step::Flush { endpoint } => device
                .flush(endpoint)
                .map(|s| format!("{endpoint} {s:?}")),
            Step::FlushAlone { endpoint } => device
                .flush_alone(endpoint)
                .map(|s| format!("{endpoint} {s:?}")),
            Step::Reset { endpoint, kind } => device
                .reset(endpoint, *kind)
                .map(|()| format!("{endpoint} {kind:?}")),
            Step::SetFrameSize { endpoint, size } => device
                .set_frame_size(endpoint, *size)
                .map(|o| format!("{endpoint} {o:?}")),
            Step::SetTrsLostCfg { endpoint, cfg } => device
                .set_trs_lost_cfg(endpoint, cfg)
                .map(|o| format!("{endpoint} {o:?}")),
            Step::CheckWaitConnection { src, dst } => device
                .check_wait_connection(src, dst)
                .map(|c| format!("{c:?}")),
            Step::CheckInvalidState { src, dst } => device
                .check_invalid_state(src, dst)
                .map(|c| format!("{c:?}")),
            Step::WrapperReset { base } => device
                .wrapper_reset(*base)
                .map(|()| format!("{base:#x}")),
            Step::DisableService => {
                device.disable_service();
                Ok("done".to_string())
            }
            Step::SfrDump => Ok(format!("{} registers", device.sfr_dump().len())),
            Step::SetBusy { .. }
            | Step::StickBusy { .. }
            | Step::ReleaseBusy { .. }
            | Step::SetDebugState { .. }
            | Step::StickWrapperReset { .. }
            | Step::DropRing
            | Step::ExpectLink { .. }
            | Step::ExpectRingRequest { .. }
            | Step::ExpectRing { .. }
            | Step::ExpectBusy { .. }
            | Step::ExpectRegister { .. }
            | Step::ExpectError => return self.apply_hardware_or_check(step, last_failed),
        };
        Ok(Applied::Op(op.map_err(|e| e.to_string())))
    }

    fn apply_hardware_or_check(&self, step: &Step, last_failed: bool) -> Result<Applied, String> {
        let hw = &self.hw;
        match step {
            Step::SetBusy { endpoint, busy } => {
                require_busy_reg(endpoint, hw.set_busy(endpoint, *busy))?;
            }
            Step::StickBusy { endpoint } => {
                require_busy_reg(endpoint, hw.stick_busy(endpoint))?;
            }
            Step::ReleaseBusy { endpoint } => hw.release_busy(endpoint),
            Step::SetDebugState { endpoint, state } => hw.set_debug_state(endpoint, *state),
            Step::StickWrapperReset { base, stuck } => hw.stick_wrapper_reset(*base, *stuck),
            Step::DropRing => hw.drop_ring(),
            Step::ExpectLink { endpoint, state } => {
                let actual = self.device.link_state(endpoint).map_err(|e| e.to_string())?;
                expect_eq(&format!("{endpoint} link"), *state, actual)?;
            }
            Step::ExpectRingRequest { count } => {
                expect_eq("ring request", *count, self.device.ring_request())?;
            }
            Step::ExpectRing { endpoint, enabled } => {
                let actual = self
                    .device
                    .check_ring(endpoint.service, endpoint.ip)
                    .map_err(|e| e.to_string())?;
                expect_eq(&format!("{endpoint} ring"), *enabled, actual)?;
            }
            Step::ExpectBusy { endpoint, busy } => {
                let actual = self.device.get_busy(endpoint).map_err(|e| e.to_string())?;
                expect_eq(&format!("{endpoint} busy"), *busy, actual)?;
            }
            Step::ExpectRegister {
                base,
                offset,
                value,
            } => {
                let actual = self.bus.value(*base, *offset);
                if actual != *value {
                    return Err(format!(
                        "register {base:#x}+{offset:#x}: expected {value:#x}, got {actual:#x}"
                    ));
                }
            }
            Step::ExpectError => {
                if !last_failed {
                    return Err("previous operation succeeded".to_string());
                }
            }
            Step::Init
            | Step::CreateRing
            | Step::DestroyRing
            | Step::CreateLink { .. }
            | Step::DestroyLink { .. }
            | Step::SetServiceCfg { .. }
            | Step::SetServiceCfgAlone { .. }
            | Step::Flush { .. }
            | Step::FlushAlone { .. }
            | Step::Reset { .. }
            | Step::SetFrameSize { .. }
            | Step::SetTrsLostCfg { .. }
            | Step::CheckWaitConnection { .. }
            | Step::CheckInvalidState { .. }
            | Step::WrapperReset { .. }
            | Step::DisableService
            | Step::SfrDump => {
                return Err(format!("{} is not a hardware step", step.name()));
            }
        }
        Ok(Applied::Checked)
    }
}

enum Applied {
    /// A ring manager operation and its logged outcome.
    Op(Result<String, String>),
    Checked,
}

fn require_busy_reg(endpoint: &Endpoint, found: bool) -> Result<(), String> {
    if found {
        Ok(())
    } else {
        Err(format!("{endpoint} has no busy register"))
    }
}

fn expect_eq<T>(what: &str, expected: T, actual: T) -> Result<(), String>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
