// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Transfer parameter setters and status getters.
//!
//! These are plain register accesses on a resolved offset. A register that
//! does not exist for the endpoint's personality or role is skipped, which
//! is reported as [`Outcome::Skipped`] or `None` rather than as an error.

use votf_track::{debug, trace};

use crate::device::VotfDevice;
use crate::offset::{
    BUSY, CROP_ENABLE, CROP_START, FINISH, FIRST_TOKEN_SIZE, FRAME_SIZE, FULLNESS, HIGH_THRESHOLD,
    IRQ, IRQ_CLEAR, IRQ_ENABLE, IRQ_STATUS, LOST_CFG, LOW_THRESHOLD, READ_BYTES,
    RegisterCandidates, START, TOKEN_SIZE,
};
use crate::types::{Endpoint, LostCfg, Outcome, Threshold, VotfResult};

fn threshold_regs(which: Threshold) -> &'static RegisterCandidates {
    match which {
        Threshold::High => &HIGH_THRESHOLD,
        Threshold::Low => &LOW_THRESHOLD,
    }
}

impl VotfDevice {
    fn write_param(
        &self,
        ep: &Endpoint,
        candidates: &RegisterCandidates,
        what: &str,
        value: u32,
    ) -> VotfResult<Outcome> {
        let located = self.locate(ep)?;
        match self.offset(ep, candidates) {
            Some(offset) => {
                trace!(self.entity ; "{ep} {what} = {value:#x}");
                self.hw.write(located.addr, offset, value);
                Ok(Outcome::Applied)
            }
            None => {
                debug!(self.entity ; "{ep} has no {what} register");
                Ok(Outcome::Skipped)
            }
        }
    }

    fn read_param(
        &self,
        ep: &Endpoint,
        candidates: &RegisterCandidates,
        what: &str,
    ) -> VotfResult<Option<u32>> {
        let located = self.locate(ep)?;
        match self.offset(ep, candidates) {
            Some(offset) => Ok(Some(self.hw.read(located.addr, offset))),
            None => {
                debug!(self.entity ; "{ep} has no {what} register");
                Ok(None)
            }
        }
    }

    /// Token size in lines (serializer) or bytes (agent).
    pub fn set_token_size(&self, ep: &Endpoint, size: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &TOKEN_SIZE, "token size", size)
    }

    /// Size of the first token. Consumers only.
    pub fn set_first_token_size(&self, ep: &Endpoint, size: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &FIRST_TOKEN_SIZE, "first token size", size)
    }

    /// Frame size in lines (serializer) or bytes (agent). Consumers only.
    pub fn set_frame_size(&self, ep: &Endpoint, size: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &FRAME_SIZE, "frame size", size)
    }

    /// What a serializer consumer does when its producer goes away.
    pub fn set_trs_lost_cfg(&self, ep: &Endpoint, cfg: &LostCfg) -> VotfResult<Outcome> {
        self.write_param(ep, &LOST_CFG, "lost connection config", cfg.value())
    }

    pub fn set_crop_start(&self, ep: &Endpoint, start: bool) -> VotfResult<Outcome> {
        self.write_param(ep, &CROP_START, "crop start", u32::from(start))
    }

    pub fn get_crop_start(&self, ep: &Endpoint) -> VotfResult<Option<u32>> {
        self.read_param(ep, &CROP_START, "crop start")
    }

    pub fn set_crop_enable(&self, ep: &Endpoint, enable: bool) -> VotfResult<Outcome> {
        self.write_param(ep, &CROP_ENABLE, "crop enable", u32::from(enable))
    }

    pub fn get_crop_enable(&self, ep: &Endpoint) -> VotfResult<Option<u32>> {
        self.read_param(ep, &CROP_ENABLE, "crop enable")
    }

    pub fn set_start(&self, ep: &Endpoint) -> VotfResult<Outcome> {
        self.write_param(ep, &START, "start", 1)
    }

    pub fn set_finish(&self, ep: &Endpoint) -> VotfResult<Outcome> {
        self.write_param(ep, &FINISH, "finish", 1)
    }

    pub fn set_threshold(&self, ep: &Endpoint, which: Threshold, value: u32) -> VotfResult<Outcome> {
        self.write_param(ep, threshold_regs(which), "threshold", value)
    }

    pub fn get_threshold(&self, ep: &Endpoint, which: Threshold) -> VotfResult<Option<u32>> {
        self.read_param(ep, threshold_regs(which), "threshold")
    }

    pub fn set_read_bytes(&self, ep: &Endpoint, bytes: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &READ_BYTES, "read bytes", bytes)
    }

    pub fn get_fullness(&self, ep: &Endpoint) -> VotfResult<Option<u32>> {
        self.read_param(ep, &FULLNESS, "fullness")
    }

    /// Whether the channel is busy. Endpoints without a busy register are
    /// never busy.
    pub fn get_busy(&self, ep: &Endpoint) -> VotfResult<bool> {
        Ok(self.read_param(ep, &BUSY, "busy")?.is_some_and(|v| v != 0))
    }

    pub fn set_irq_enable(&self, ep: &Endpoint, irq: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &IRQ_ENABLE, "irq enable", irq)
    }

    pub fn set_irq_status(&self, ep: &Endpoint, irq: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &IRQ_STATUS, "irq status", irq)
    }

    pub fn set_irq(&self, ep: &Endpoint, irq: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &IRQ, "irq", irq)
    }

    pub fn set_irq_clear(&self, ep: &Endpoint, irq: u32) -> VotfResult<Outcome> {
        self.write_param(ep, &IRQ_CLEAR, "irq clear", irq)
    }
}
