// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The ring device context.
//!
//! A [`VotfDevice`] owns all of the ring manager's mutable state. Every
//! operation takes `&self` so that one device can be shared between
//! threads. A single lock protects the ring request count, the pairing table
//! and the recorded configurations. The per-IP and per-channel usage counts
//! are atomics so that the flush fast path does not need the lock.
//!
//! The link, flush, parameter and recovery operations are implemented in
//! their own modules.

use std::array;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use votf_track::entity::Entity;
use votf_track::{error, info, warn};

use crate::hw_api::{HwApi, RegDump};
use crate::offset::{ENABLE, RegisterCandidates, resolve_offset};
use crate::recovery::{DumpHook, SfrDumpHook};
use crate::registers::SharedBus;
use crate::table::{EndpointTable, Located};
use crate::types::{
    Endpoint, ID_MAX, IP_MAX, LinkState, PollConfig, RecordedCfg, RingStatus, SERVICE_CNT,
    Service, VotfError, VotfResult,
};

/// Last debug port sample taken for an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugInfo {
    /// Time since the device was created.
    pub time: Duration,
    /// Selector written to the debug register.
    pub value: u32,
    /// Raw debug output.
    pub dout: u32,
}

type PerEndpoint<T> = [[[T; ID_MAX]; IP_MAX]; SERVICE_CNT];

/// State protected by the device lock.
pub(crate) struct RingState {
    pub(crate) ring_request: u32,
    ring_pair: PerEndpoint<LinkState>,
    votf_cfg: PerEndpoint<RecordedCfg>,
    debug_info: PerEndpoint<Option<DebugInfo>>,
}

impl RingState {
    fn new() -> Self {
        Self {
            ring_request: 0,
            ring_pair: [[[LinkState::Disconnected; ID_MAX]; IP_MAX]; SERVICE_CNT],
            votf_cfg: [[[RecordedCfg::default(); ID_MAX]; IP_MAX]; SERVICE_CNT],
            debug_info: [[[None; ID_MAX]; IP_MAX]; SERVICE_CNT],
        }
    }

    pub(crate) fn disconnect_all(&mut self) {
        self.ring_pair = [[[LinkState::Disconnected; ID_MAX]; IP_MAX]; SERVICE_CNT];
    }

    pub(crate) fn clear_cfg(&mut self) {
        self.votf_cfg = [[[RecordedCfg::default(); ID_MAX]; IP_MAX]; SERVICE_CNT];
    }

    pub(crate) fn pair(&self, service: Service, slot: usize, id: usize) -> LinkState {
        self.ring_pair[service.index()][slot][id]
    }

    pub(crate) fn set_pair(&mut self, service: Service, slot: usize, id: usize, state: LinkState) {
        self.ring_pair[service.index()][slot][id] = state;
    }

    pub(crate) fn cfg(&self, service: Service, slot: usize, id: usize) -> &RecordedCfg {
        &self.votf_cfg[service.index()][slot][id]
    }

    pub(crate) fn cfg_mut(&mut self, service: Service, slot: usize, id: usize) -> &mut RecordedCfg {
        &mut self.votf_cfg[service.index()][slot][id]
    }

    pub(crate) fn set_debug_info(
        &mut self,
        service: Service,
        slot: usize,
        id: usize,
        info: DebugInfo,
    ) {
        self.debug_info[service.index()][slot][id] = Some(info);
    }
}

/// The ring manager context.
pub struct VotfDevice {
    pub(crate) entity: Arc<Entity>,
    pub(crate) table: Arc<EndpointTable>,
    pub(crate) hw: HwApi,
    pub(crate) state: Mutex<RingState>,
    pub(crate) ip_enable_cnt: [AtomicI32; IP_MAX],
    pub(crate) id_enable_cnt: [[AtomicI32; ID_MAX]; IP_MAX],
    pub(crate) poll: PollConfig,
    pub(crate) dump_hook: Arc<dyn DumpHook>,
    started: Instant,
}

impl VotfDevice {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, table: Arc<EndpointTable>, bus: SharedBus) -> Self {
        let entity = Entity::child(parent, "votf");
        let hw = HwApi::new(&entity, bus);
        Self {
            entity,
            table,
            hw,
            state: Mutex::new(RingState::new()),
            ip_enable_cnt: array::from_fn(|_| AtomicI32::new(0)),
            id_enable_cnt: array::from_fn(|_| array::from_fn(|_| AtomicI32::new(0))),
            poll: PollConfig::default(),
            dump_hook: Arc::new(SfrDumpHook),
            started: Instant::now(),
        }
    }

    /// Replace the bounds of the busy-wait loops.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Replace what happens when an unrecoverable hardware state is seen.
    #[must_use]
    pub fn with_dump_hook(mut self, hook: Arc<dyn DumpHook>) -> Self {
        self.dump_hook = hook;
        self
    }

    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    #[must_use]
    pub fn table(&self) -> &Arc<EndpointTable> {
        &self.table
    }

    #[must_use]
    pub fn poll(&self) -> &PollConfig {
        &self.poll
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Resolve an endpoint, logging if it is not configured.
    pub(crate) fn locate(&self, ep: &Endpoint) -> VotfResult<Located> {
        self.table.lookup(ep).inspect_err(|_| {
            error!(self.entity ; "invalid votf input {ep}");
        })
    }

    pub(crate) fn offset(&self, ep: &Endpoint, candidates: &RegisterCandidates) -> Option<u32> {
        resolve_offset(&self.table, ep, candidates)
    }

    /// The peer recorded for an endpoint, if it is a configured endpoint.
    pub(crate) fn recorded_peer(
        &self,
        state: &RingState,
        ep: &Endpoint,
        slot: usize,
    ) -> (Endpoint, Option<usize>) {
        let cfg = state.cfg(ep.service, slot, ep.id);
        let peer = Endpoint::new(
            ep.service.peer(),
            cfg.connected_ip,
            cfg.connected_id as usize,
        );
        let peer_slot = self.table.search_slot(peer.service, peer.ip, peer.id);
        (peer, peer_slot)
    }

    fn slot_for_ip(&self, service: Service, ip: u32) -> VotfResult<usize> {
        self.table.search_slot(service, ip, 0).ok_or_else(|| {
            error!(self.entity ; "invalid votf {service} ip {ip:#x}");
            VotfError::InvalidIp { service, ip }
        })
    }

    /// Reset all counts and return every endpoint to disconnected.
    pub fn init(&self) {
        let mut state = self.lock_state();
        state.ring_request = 0;
        state.disconnect_all();
        state.clear_cfg();
        for (ip_cnt, id_cnts) in self.ip_enable_cnt.iter().zip(&self.id_enable_cnt) {
            ip_cnt.store(0, Ordering::SeqCst);
            for id_cnt in id_cnts {
                id_cnt.store(0, Ordering::SeqCst);
            }
        }
        info!(self.entity ; "init");
    }

    /// Request the shared ring.
    ///
    /// The first request enables the ring on every configured block. Later
    /// requests only check that the ring is still up. If it is not, a
    /// previous user went away without releasing its request, so the count
    /// restarts at one and the ring is brought up again.
    pub fn create_ring(&self) -> VotfResult<RingStatus> {
        if self.table.is_empty() {
            error!(self.entity ; "invalid request to create votf ring, no endpoints");
            return Err(VotfError::NoEndpoints);
        }

        let mut state = self.lock_state();
        state.ring_request += 1;
        info!(self.entity ; "create ring: votf_request({})", state.ring_request);

        let mut healed = false;
        if state.ring_request > 1 {
            let up = self
                .table
                .slots()
                .any(|s| self.hw.check_ring(s.record.addr, s.record.module));
            if up {
                info!(self.entity ; "votf ring has already been created({})", state.ring_request);
                return Ok(RingStatus::AlreadyCreated);
            }
            warn!(self.entity ; "votf reference count is mismatched({}), do reset", state.ring_request);
            state.ring_request = 1;
            state.disconnect_all();
            healed = true;
        }

        for slot in self.table.slots() {
            let record = slot.record;
            self.hw.create_ring(record.addr, record.ip, record.module);
            // Register set A, switched immediately
            self.hw.set_sel_reg(record.addr, 1, 1);
        }

        Ok(if healed {
            RingStatus::Healed
        } else {
            RingStatus::Created
        })
    }

    /// Release a ring request, disabling the ring when none remain.
    pub fn destroy_ring(&self) -> VotfResult<RingStatus> {
        let mut state = self.lock_state();
        if state.ring_request == 0 {
            info!(self.entity ; "votf ring has already been destroyed");
            return Ok(RingStatus::AlreadyDestroyed);
        }

        state.ring_request -= 1;
        info!(self.entity ; "destroy ring: votf_request({})", state.ring_request);
        if state.ring_request > 0 {
            info!(self.entity ; "other IPs are still using the votf ring({})", state.ring_request);
            return Ok(RingStatus::StillInUse(state.ring_request));
        }

        for slot in self.table.slots() {
            let record = slot.record;
            self.hw.destroy_ring(record.addr, record.ip, record.module);
        }
        state.disconnect_all();
        state.clear_cfg();
        Ok(RingStatus::Destroyed)
    }

    /// Bring up the ring on a producer block and a consumer block.
    ///
    /// A block whose ring is not yet up has it enabled and all of its
    /// channels of that role disabled.
    pub fn create_link(&self, src_ip: u32, dst_ip: u32) -> VotfResult<()> {
        let src = self.slot_for_ip(Service::Tws, src_ip)?;
        let dst = self.slot_for_ip(Service::Trs, dst_ip)?;

        let _state = self.lock_state();
        for slot in [src, dst] {
            let Some(slot) = self.table.slot(slot) else {
                continue;
            };
            let record = slot.record;
            let already_up = self.hw.check_ring(record.addr, record.module);
            if already_up {
                info!(self.entity ; "{:#x} votf has already been enabled", record.ip);
            } else {
                self.hw.create_ring(record.addr, record.ip, record.module);
                self.hw.set_sel_reg(record.addr, 1, 1);
                info!(self.entity ; "{:#x} votf is enabled", record.ip);
            }

            self.ip_enable_cnt[slot.index].fetch_add(1, Ordering::SeqCst);

            if !already_up {
                for id in 0..record.channels {
                    let ep = Endpoint::new(record.service, record.ip, id);
                    if let Some(offset) = self.offset(&ep, &ENABLE) {
                        self.hw.write(record.addr, offset, 0);
                    }
                }
            }
        }
        Ok(())
    }

    /// Release a producer/consumer block pair.
    ///
    /// A block whose last user goes away has its ring disabled and is reset.
    pub fn destroy_link(&self, src_ip: u32, dst_ip: u32) -> VotfResult<()> {
        let src = self.slot_for_ip(Service::Tws, src_ip)?;
        let dst = self.slot_for_ip(Service::Trs, dst_ip)?;

        let _state = self.lock_state();
        for slot in [src, dst] {
            let Some(slot) = self.table.slot(slot) else {
                continue;
            };
            let record = slot.record;
            let cnt = self.ip_enable_cnt[slot.index].fetch_sub(1, Ordering::SeqCst) - 1;
            if cnt == 0 {
                self.hw.destroy_ring(record.addr, record.ip, record.module);
                self.hw.reset(record.addr, record.module);
                info!(self.entity ; "{:#x} votf disable & sw_reset", record.ip);
                for id_cnt in &self.id_enable_cnt[slot.index] {
                    id_cnt.store(0, Ordering::SeqCst);
                }
            } else if cnt > 0 {
                info!(self.entity ; "{:#x} votf is still in use({cnt})", record.ip);
            } else {
                error!(self.entity ; "{:#x} votf has invalid count({cnt})", record.ip);
                self.ip_enable_cnt[slot.index].store(0, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Clear the enable bit of every configured channel.
    pub fn disable_service(&self) {
        for ep in self.table.endpoints() {
            let Ok(located) = self.table.lookup(&ep) else {
                continue;
            };
            if let Some(offset) = self.offset(&ep, &ENABLE) {
                self.hw.write(located.addr, offset, 0);
            }
        }
        info!(self.entity ; "disable service complete");
    }

    /// Read and log every register of every configured block.
    pub fn sfr_dump(&self) -> Vec<RegDump> {
        let mut dump = Vec::new();
        for slot in self.table.slots() {
            let record = slot.record;
            let Some(layout) = self.table.module_addr(record.module_type) else {
                continue;
            };
            info!(self.entity ; "VOTF SFR dump (base({:#x}), ip({:#x}), {})", record.addr, record.ip, record.service);
            let block = self.hw.dump(
                record.addr,
                record.module,
                layout,
                record.service,
                record.channels,
            );
            for reg in &block {
                info!(self.entity ; "  {:<40} {:#06x}: {:#010x}", reg.name, reg.offset, reg.value);
            }
            dump.extend(block);
        }
        dump
    }

    /// Whether the ring is up on the block that holds `ip` for `service`.
    pub fn check_ring(&self, service: Service, ip: u32) -> VotfResult<bool> {
        let slot = self.slot_for_ip(service, ip)?;
        Ok(self
            .table
            .slot(slot)
            .is_some_and(|s| self.hw.check_ring(s.record.addr, s.record.module)))
    }

    /// Reset the wrapper at `base`, bounded by the device's poll limits.
    pub fn wrapper_reset(&self, base: u32) -> VotfResult<()> {
        self.hw.wrapper_reset(base, &self.poll).inspect_err(|e| {
            error!(self.entity ; "{e}");
        })
    }

    #[must_use]
    pub fn ring_request(&self) -> u32 {
        self.lock_state().ring_request
    }

    pub fn link_state(&self, ep: &Endpoint) -> VotfResult<LinkState> {
        let located = self.locate(ep)?;
        Ok(self.lock_state().pair(ep.service, located.slot, ep.id))
    }

    pub fn recorded_cfg(&self, ep: &Endpoint) -> VotfResult<RecordedCfg> {
        let located = self.locate(ep)?;
        Ok(*self.lock_state().cfg(ep.service, located.slot, ep.id))
    }

    pub fn debug_info(&self, ep: &Endpoint) -> VotfResult<Option<DebugInfo>> {
        let located = self.locate(ep)?;
        Ok(self.lock_state().debug_info[ep.service.index()][located.slot][ep.id])
    }

    /// Number of links using the block that holds `ip` for `service`.
    pub fn ip_enable_count(&self, service: Service, ip: u32) -> VotfResult<i32> {
        let slot = self.slot_for_ip(service, ip)?;
        Ok(self.ip_enable_cnt[slot].load(Ordering::SeqCst))
    }

    /// Number of holders of a channel.
    pub fn id_enable_count(&self, ep: &Endpoint) -> VotfResult<i32> {
        let located = self.locate(ep)?;
        Ok(self.id_enable_cnt[located.slot][ep.id].load(Ordering::SeqCst))
    }
}
