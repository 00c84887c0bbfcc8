// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Link teardown.
//!
//! A flush asks the hardware to drain a channel and then polls its busy bit.
//! The poll runs without the device lock held.

use std::sync::atomic::Ordering;

use votf_track::{error, info, warn};

use crate::device::VotfDevice;
use crate::hw_api::wait_for;
use crate::offset::{BUSY, FLUSH};
use crate::table::Located;
use crate::types::{Endpoint, FlushStatus, LinkState, VotfError, VotfResult};

impl VotfDevice {
    /// Flush an endpoint and disconnect it from its recorded peer.
    ///
    /// If other holders still use the channel the flush is deferred and only
    /// the usage count is decremented. Otherwise both sides end up
    /// disconnected even if the flush times out.
    pub fn flush(&self, ep: &Endpoint) -> VotfResult<FlushStatus> {
        let located = self.locate(ep)?;
        let (peer, peer_slot) = {
            let state = self.lock_state();
            self.recorded_peer(&state, ep, located.slot)
        };

        let id_cnt = &self.id_enable_cnt[located.slot][ep.id];
        if let Ok(prev) =
            id_cnt.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| (c > 1).then(|| c - 1))
        {
            info!(self.entity ; "{ep} votf({}) id({prev}) is still in use",
                self.ip_enable_cnt[located.slot].load(Ordering::SeqCst));
            return Ok(FlushStatus::Deferred {
                remaining: prev - 1,
            });
        }

        let result = match self.offset(ep, &FLUSH) {
            Some(offset) => {
                let flushed = self.flush_channel(ep, &located, offset);
                // Never below zero
                let _ = id_cnt.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                    (c > 0).then(|| c - 1)
                });
                flushed.map(|()| FlushStatus::Flushed)
            }
            None => Ok(FlushStatus::NotApplicable),
        };

        let mut state = self.lock_state();
        state.set_pair(ep.service, located.slot, ep.id, LinkState::Disconnected);
        match peer_slot {
            Some(peer_slot) => {
                state.set_pair(peer.service, peer_slot, peer.id, LinkState::Disconnected);
            }
            None => {
                warn!(self.entity ; "{ep}: recorded peer {peer} not found");
            }
        }
        info!(self.entity ; "{ep} and {peer} disconnected");
        result
    }

    /// Flush an endpoint without touching usage counts or link states.
    pub fn flush_alone(&self, ep: &Endpoint) -> VotfResult<FlushStatus> {
        let located = self.locate(ep)?;
        match self.offset(ep, &FLUSH) {
            Some(offset) => self
                .flush_channel(ep, &located, offset)
                .map(|()| FlushStatus::Flushed),
            None => Ok(FlushStatus::NotApplicable),
        }
    }

    fn flush_channel(&self, ep: &Endpoint, located: &Located, offset: u32) -> VotfResult<()> {
        let busy_offset = self.offset(ep, &BUSY);
        let busy = || busy_offset.is_some_and(|o| self.hw.read(located.addr, o) != 0);

        if busy() {
            warn!(self.entity ; "{ep} busy before flush");
        }

        self.hw.write(located.addr, offset, 1);
        wait_for(&self.poll, || !busy()).map_err(|iterations| {
            error!(self.entity ; "{ep} timeout waiting clear busy - flush fail");
            VotfError::Timeout {
                what: format!("{ep} flush"),
                iterations,
            }
        })
    }
}
