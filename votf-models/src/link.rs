// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Producer/consumer handshake.
//!
//! Each side of a link moves `Disconnected -> Ready -> Connected`. The
//! producer's destination register is the only hardware record of a pairing,
//! so a consumer only completes the handshake if the producer it names has
//! itself recorded this consumer as its destination. A producer completes the
//! handshake as soon as its declared consumer is ready.

use std::sync::atomic::Ordering;

use votf_track::{error, info, warn};

use crate::device::VotfDevice;
use crate::offset::{DEST, ENABLE, LIMIT, TOKEN_SIZE};
use crate::types::{
    CfgStatus, Endpoint, LinkState, Module, ResetKind, Service, ServiceCfg, VotfError,
    VotfResult,
};

/// Token and frame sizes in bytes for an agent block.
///
/// The products are formed in 64 bits and saturate at `u32::MAX`.
#[must_use]
pub fn agent_sizes(cfg: &ServiceCfg) -> (u32, u32) {
    let planes = u64::from(cfg.planes.max(1));
    let bytes = |lines: u32| {
        let size = u64::from(cfg.bitwidth) * u64::from(cfg.width) * u64::from(lines) / 8 * planes;
        u32::try_from(size).unwrap_or(u32::MAX)
    };
    (bytes(cfg.token_size), bytes(cfg.height))
}

impl VotfDevice {
    /// Configure one side of a link and advance the handshake.
    ///
    /// A zero `token_size` is replaced by the lines-in-token of the
    /// endpoint's transfer mode before anything is written.
    ///
    /// Returns [`CfgStatus::AlreadyConnected`] without touching the hardware
    /// if this endpoint or its declared peer is already connected and the
    /// change option is not set.
    pub fn set_service_cfg(&self, ep: &Endpoint, cfg: &ServiceCfg) -> VotfResult<CfgStatus> {
        let located = self.locate(ep)?;
        let cfg = &ServiceCfg {
            token_size: cfg.token_lines(ep),
            ..*cfg
        };
        let peer = Endpoint::new(
            ep.service.peer(),
            cfg.connected_ip,
            cfg.connected_id as usize,
        );
        let Some(peer_slot) = self.table.search_slot(peer.service, peer.ip, peer.id) else {
            error!(self.entity ; "{ep}: invalid peer {peer}");
            return Err(VotfError::InvalidPeer { endpoint: *ep, peer });
        };
        let (slot, id) = (located.slot, ep.id);

        let mut state = self.lock_state();

        if cfg.count() {
            self.id_enable_cnt[slot][id].fetch_add(1, Ordering::SeqCst);
        }

        if !cfg.change() {
            if state.pair(ep.service, slot, id) == LinkState::Connected {
                info!(self.entity ; "already connected service {ep}");
                return Ok(CfgStatus::AlreadyConnected);
            }
            if state.pair(peer.service, peer_slot, peer.id) == LinkState::Connected {
                info!(self.entity ; "already connected service {ep}->{peer}");
                return Ok(CfgStatus::AlreadyConnected);
            }
        }

        match ep.service {
            Service::Tws => {
                if let Some(offset) = self.offset(ep, &DEST) {
                    self.hw.write(located.addr, offset, cfg.dest());
                    let recorded = state.cfg_mut(ep.service, slot, id);
                    recorded.connected_ip = cfg.connected_ip;
                    recorded.connected_id = cfg.connected_id;
                    state.set_pair(ep.service, slot, id, LinkState::Ready);
                }

                if state.pair(ep.service, slot, id) == LinkState::Ready
                    && state.pair(peer.service, peer_slot, peer.id) == LinkState::Ready
                {
                    state.set_pair(ep.service, slot, id, LinkState::Connected);
                    state.set_pair(peer.service, peer_slot, peer.id, LinkState::Connected);
                    let back = state.cfg_mut(peer.service, peer_slot, peer.id);
                    back.connected_ip = ep.ip;
                    back.connected_id = ep.id as u32;
                    info!(self.entity ; "{ep} and {peer} connected");
                }
            }
            Service::Trs => {
                let recorded = state.cfg_mut(ep.service, slot, id);
                recorded.connected_ip = cfg.connected_ip;
                recorded.connected_id = cfg.connected_id;
                state.set_pair(ep.service, slot, id, LinkState::Ready);

                if state.pair(peer.service, peer_slot, peer.id) == LinkState::Ready {
                    let producer = state.cfg(peer.service, peer_slot, peer.id);
                    if producer.connected_ip == ep.ip && producer.connected_id as usize == ep.id {
                        state.set_pair(ep.service, slot, id, LinkState::Connected);
                        state.set_pair(peer.service, peer_slot, peer.id, LinkState::Connected);
                        info!(self.entity ; "{peer} and {ep} connected");
                    }
                }
            }
        }

        if let Some(offset) = self.offset(ep, &ENABLE) {
            self.hw.write(located.addr, offset, u32::from(cfg.enable));
            state.cfg_mut(ep.service, slot, id).enable = cfg.enable;
        }

        if let Some(offset) = self.offset(ep, &LIMIT) {
            self.hw.write(located.addr, offset, cfg.limit);
            state.cfg_mut(ep.service, slot, id).limit = cfg.limit;
        }

        let (token_size, frame_size) = match located.module {
            Module::C2Agent => agent_sizes(cfg),
            Module::C2Serv => (cfg.token_size, cfg.height),
        };
        if ep.service == Service::Trs {
            self.set_frame_size(ep, frame_size)?;
        }

        if self.offset(ep, &TOKEN_SIZE).is_some() {
            self.set_token_size(ep, token_size)?;
            if ep.service == Service::Trs {
                self.set_first_token_size(ep, token_size)?;
            }
            // Kept in lines rather than bytes
            state.cfg_mut(ep.service, slot, id).token_size = cfg.token_size;
        }

        info!(self.entity ; "{ep} configured for {peer}: {}", state.pair(ep.service, slot, id));
        Ok(CfgStatus::Applied)
    }

    /// Program an endpoint that does not take part in the handshake.
    pub fn set_service_cfg_alone(&self, ep: &Endpoint, cfg: &ServiceCfg) -> VotfResult<()> {
        let located = self.locate(ep)?;
        let token_size = cfg.token_lines(ep);
        let mut state = self.lock_state();

        if let Some(offset) = self.offset(ep, &DEST) {
            self.hw.write(located.addr, offset, cfg.dest());
        }
        if let Some(offset) = self.offset(ep, &ENABLE) {
            self.hw.write(located.addr, offset, u32::from(cfg.enable));
        }
        if let Some(offset) = self.offset(ep, &LIMIT) {
            self.hw.write(located.addr, offset, cfg.limit);
        }
        if self.offset(ep, &TOKEN_SIZE).is_some() {
            self.set_token_size(ep, token_size)?;
            state.cfg_mut(ep.service, located.slot, ep.id).token_size = token_size;
        }
        info!(self.entity ; "{ep} configured standalone");
        Ok(())
    }

    /// Reset an endpoint's block and its recorded peer's block and force
    /// both sides to disconnected.
    pub fn reset(&self, ep: &Endpoint, kind: ResetKind) -> VotfResult<()> {
        let located = self.locate(ep)?;
        let mut state = self.lock_state();
        let (peer, peer_slot) = self.recorded_peer(&state, ep, located.slot);
        let peer_block = self.table.lookup(&peer).ok();

        let pulse = |addr, module| match kind {
            ResetKind::Core => self.hw.sw_core_reset(addr, module),
            ResetKind::Full => self.hw.reset(addr, module),
        };
        pulse(located.addr, located.module);
        match &peer_block {
            Some(block) => pulse(block.addr, block.module),
            None => {
                warn!(self.entity ; "{ep}: recorded peer {peer} not found, not reset");
            }
        }

        state.set_pair(ep.service, located.slot, ep.id, LinkState::Disconnected);
        if let Some(peer_slot) = peer_slot {
            state.set_pair(peer.service, peer_slot, peer.id, LinkState::Disconnected);
        }
        info!(self.entity ; "{ep} {kind:?} reset");
        Ok(())
    }
}
