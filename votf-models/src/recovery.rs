// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Watchdog checks driven from the hardware debug port.
//!
//! A producer and consumer that both report waiting for a connection are
//! deadlocked; a rejection token releases them. A producer waiting for a
//! token ack or a consumer waiting for a reset ack cannot be recovered and is
//! escalated to the device's [`DumpHook`]. A side that is idle but busy is
//! flushed on its own.

use votf_track::{error, info, warn};

use crate::device::{DebugInfo, VotfDevice};
use crate::hw_api::DebugSample;
use crate::table::Located;
use crate::types::{DebugState, Endpoint, Service, VotfError, VotfResult};

/// Called when the debug port reports a state that cannot be recovered.
pub trait DumpHook: Send + Sync {
    fn dump(&self, device: &VotfDevice, reason: &str);
}

/// Dumps every register of every configured block to the log.
pub struct SfrDumpHook;

impl DumpHook for SfrDumpHook {
    fn dump(&self, device: &VotfDevice, reason: &str) {
        error!(device.entity() ; "{reason}");
        device.sfr_dump();
    }
}

/// Outcome of [`VotfDevice::check_wait_connection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitCheck {
    /// The link is not deadlocked.
    Clear,
    /// Both sides were waiting and a rejection token was injected.
    Rejected {
        before: (DebugState, DebugState),
        after: (DebugState, DebugState),
    },
    /// One of the blocks has no debug port.
    Unsupported,
}

/// Outcome of [`VotfDevice::check_invalid_state`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateCheck {
    /// Producer state, `None` if its block has no debug port.
    pub tws: Option<DebugState>,
    /// Consumer state, `None` if its block has no debug port.
    pub trs: Option<DebugState>,
    /// Endpoints that were idle but busy and have been flushed.
    pub flushed: Vec<Endpoint>,
}

impl VotfDevice {
    fn check_pair(&self, src: &Endpoint, dst: &Endpoint) -> VotfResult<(Located, Located)> {
        if src.service != Service::Tws || dst.service != Service::Trs {
            error!(self.entity ; "expected a producer and consumer, got {src} and {dst}");
            return Err(VotfError::InvalidPeer {
                endpoint: *src,
                peer: *dst,
            });
        }
        Ok((self.locate(src)?, self.locate(dst)?))
    }

    /// Sample the debug port for an endpoint and record the sample.
    fn sample(&self, ep: &Endpoint, located: &Located) -> Option<DebugSample> {
        let Some(sample) = self
            .hw
            .get_debug_state(located.addr, located.module, ep.id, ep.service)
        else {
            info!(self.entity ; "{ep}: {} has no debug port", located.module);
            return None;
        };
        let info = DebugInfo {
            time: self.elapsed(),
            value: sample.value,
            dout: sample.dout,
        };
        self.lock_state()
            .set_debug_info(ep.service, located.slot, ep.id, info);
        Some(sample)
    }

    /// Release a producer and consumer that are both waiting for each other.
    pub fn check_wait_connection(&self, src: &Endpoint, dst: &Endpoint) -> VotfResult<WaitCheck> {
        let (s, d) = self.check_pair(src, dst)?;
        let (Some(tws), Some(trs)) = (self.sample(src, &s), self.sample(dst, &d)) else {
            return Ok(WaitCheck::Unsupported);
        };

        if tws.state() != DebugState::TwsWaitConnection
            || trs.state() != DebugState::TrsWaitConnection
        {
            return Ok(WaitCheck::Clear);
        }

        error!(self.entity ; "before debug state({src}: {:#x}, {dst}: {:#x})", tws.dout, trs.dout);
        if !self
            .hw
            .rejection_token(s.addr, s.module, dst.ip, dst.id, src.id)
        {
            return Ok(WaitCheck::Unsupported);
        }

        let (Some(tws_after), Some(trs_after)) = (self.sample(src, &s), self.sample(dst, &d)) else {
            return Ok(WaitCheck::Unsupported);
        };
        error!(self.entity ; "after debug state({src}: {:#x}, {dst}: {:#x})", tws_after.dout, trs_after.dout);

        Ok(WaitCheck::Rejected {
            before: (tws.state(), trs.state()),
            after: (tws_after.state(), trs_after.state()),
        })
    }

    /// Escalate unrecoverable states and flush sides that are idle but busy.
    pub fn check_invalid_state(&self, src: &Endpoint, dst: &Endpoint) -> VotfResult<StateCheck> {
        let (s, d) = self.check_pair(src, dst)?;
        let tws = self.sample(src, &s);
        let trs = self.sample(dst, &d);
        let mut check = StateCheck {
            tws: tws.map(|t| t.state()),
            trs: trs.map(|t| t.state()),
            flushed: Vec::new(),
        };

        if check.tws == Some(DebugState::WaitTokenAck) || check.trs == Some(DebugState::WaitResetAck)
        {
            let tws_state = tws.map_or(0, |t| t.dout);
            let trs_state = trs.map_or(0, |t| t.dout);
            error!(self.entity ; "debug state({src}: {tws_state:#x}, {dst}: {trs_state:#x})");
            self.dump_hook.dump(self, "VOTF invalid state");
            return Err(VotfError::UnrecoverableState {
                tws: *src,
                tws_state,
                trs: *dst,
                trs_state,
            });
        }

        for (ep, state) in [(src, check.tws), (dst, check.trs)] {
            if state == Some(DebugState::Idle) && self.get_busy(ep)? {
                self.flush_alone(ep)?;
                warn!(self.entity ; "flushed {ep}, invalid state (busy, state: idle)");
                check.flushed.push(*ep);
            }
        }
        Ok(check)
    }
}
