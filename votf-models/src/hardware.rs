// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A behavioural model of the ring blocks on top of a [`SimBus`].
//!
//! The model reacts to register writes the way the hardware does for the
//! registers the ring manager relies on:
//!
//!  - a flush clears the channel's busy bit unless the channel is stuck,
//!  - selecting a channel on the debug port drives the debug output from a
//!    per-endpoint state,
//!  - a rejection token returns both addressed endpoints to idle,
//!  - software reset pulses self-clear and clear every busy bit of the block,
//!  - a wrapper reset self-clears unless the wrapper is stuck.
//!
//! Faults are injected through the public setters.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::offset::{BUSY, FLUSH, resolve_offset};
use crate::registers::sim::{Read, SimBus, Written};
use crate::registers::{C2agentReg, C2servReg, WrapperReg};
use crate::table::EndpointTable;
use crate::types::{DebugState, Endpoint, Module, Service};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegRole {
    Flush(Endpoint),
    Busy(Endpoint),
    DebugSelect,
    PktData,
    Reset,
}

#[derive(Default)]
struct FaultState {
    debug: HashMap<Endpoint, DebugState>,
    stuck: HashSet<Endpoint>,
    clear_after_reads: HashMap<Endpoint, u32>,
    wrappers: HashSet<u32>,
    stuck_wrappers: HashSet<u32>,
}

struct Behaviour {
    roles: HashMap<(u32, u32), RegRole>,
    busy_regs: HashMap<Endpoint, (u32, u32)>,
    /// Services and IPs of the blocks at each base.
    blocks: HashMap<u32, Vec<(Service, u32, usize)>>,
    faults: Mutex<FaultState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Behaviour {
    fn build(table: &EndpointTable) -> Self {
        let mut roles = HashMap::new();
        let mut busy_regs = HashMap::new();
        let mut blocks: HashMap<u32, Vec<(Service, u32, usize)>> = HashMap::new();

        for slot in table.slots() {
            let record = slot.record;
            blocks.entry(record.addr).or_default().push((
                record.service,
                record.ip,
                record.channels,
            ));

            let (reset, core_reset) = match record.module {
                Module::C2Serv => {
                    roles.insert(
                        (record.addr, C2servReg::C2comDebug.offset()),
                        RegRole::DebugSelect,
                    );
                    roles.insert(
                        (record.addr, C2servReg::VotfPktData.offset()),
                        RegRole::PktData,
                    );
                    (C2servReg::SwReset.offset(), C2servReg::SwCoreReset.offset())
                }
                Module::C2Agent => (
                    C2agentReg::SwReset.offset(),
                    C2agentReg::SwCoreReset.offset(),
                ),
            };
            roles.insert((record.addr, reset), RegRole::Reset);
            roles.insert((record.addr, core_reset), RegRole::Reset);

            for id in 0..record.channels {
                let ep = Endpoint::new(record.service, record.ip, id);
                if let Some(offset) = resolve_offset(table, &ep, &FLUSH) {
                    roles.insert((record.addr, offset), RegRole::Flush(ep));
                }
                if let Some(offset) = resolve_offset(table, &ep, &BUSY) {
                    roles.insert((record.addr, offset), RegRole::Busy(ep));
                    busy_regs.insert(ep, (record.addr, offset));
                }
            }
        }

        Self {
            roles,
            busy_regs,
            blocks,
            faults: Mutex::new(FaultState::default()),
        }
    }

    fn ip_at(&self, base: u32, service: Service) -> Option<u32> {
        self.blocks
            .get(&base)?
            .iter()
            .find(|(s, _, _)| *s == service)
            .map(|(_, ip, _)| *ip)
    }

    fn clear_busy(&self, bus: &SimBus, ep: &Endpoint) {
        if let Some((base, offset)) = self.busy_regs.get(ep) {
            bus.set(*base, *offset, 0);
        }
    }

    fn flushed(&self, bus: &SimBus, ep: Endpoint) {
        let mut faults = lock(&self.faults);
        faults.debug.insert(ep, DebugState::Idle);
        if faults.stuck.contains(&ep) || faults.clear_after_reads.contains_key(&ep) {
            return;
        }
        drop(faults);
        self.clear_busy(bus, &ep);
    }

    fn debug_selected(&self, bus: &SimBus, base: u32, value: u32) {
        let id = ((value >> 1) & 0xf) as usize;
        let service = if (value >> 5) & 1 == 0 {
            Service::Tws
        } else {
            Service::Trs
        };
        let state = match self.ip_at(base, service) {
            Some(ip) => lock(&self.faults)
                .debug
                .get(&Endpoint::new(service, ip, id))
                .copied()
                .unwrap_or(DebugState::Idle),
            None => DebugState::Idle,
        };
        bus.set(base, C2servReg::C2comDebugDout.offset(), state.code());
    }

    fn rejection(&self, base: u32, value: u32) {
        let trs_ip = value >> 16;
        let trs_id = ((value >> 4) & 0xf) as usize;
        let tws_id = (value & 0xf) as usize;
        let mut faults = lock(&self.faults);
        faults
            .debug
            .insert(Endpoint::new(Service::Trs, trs_ip, trs_id), DebugState::Idle);
        if let Some(tws_ip) = self.ip_at(base, Service::Tws) {
            faults
                .debug
                .insert(Endpoint::new(Service::Tws, tws_ip, tws_id), DebugState::Idle);
        }
    }

    fn block_reset(&self, bus: &SimBus, base: u32, offset: u32) {
        bus.set(base, offset, 0);
        let Some(block) = self.blocks.get(&base) else {
            return;
        };
        let mut faults = lock(&self.faults);
        for (service, ip, channels) in block {
            for id in 0..*channels {
                let ep = Endpoint::new(*service, *ip, id);
                faults.debug.insert(ep, DebugState::Idle);
                faults.clear_after_reads.remove(&ep);
                if !faults.stuck.contains(&ep) {
                    self.clear_busy(bus, &ep);
                }
            }
        }
    }
}

impl Written for Behaviour {
    fn written(&self, bus: &SimBus, base: u32, offset: u32, value: u32) {
        if offset == WrapperReg::Swrst.offset() && lock(&self.faults).wrappers.contains(&base) {
            if !lock(&self.faults).stuck_wrappers.contains(&base) {
                bus.set(base, offset, 0);
            }
            return;
        }

        match self.roles.get(&(base, offset)) {
            Some(RegRole::Flush(ep)) => self.flushed(bus, *ep),
            Some(RegRole::DebugSelect) => self.debug_selected(bus, base, value),
            Some(RegRole::PktData) => self.rejection(base, value),
            Some(RegRole::Reset) => self.block_reset(bus, base, offset),
            Some(RegRole::Busy(_)) | None => {}
        }
    }
}

impl Read for Behaviour {
    fn read(&self, bus: &SimBus, base: u32, offset: u32, _value_read: u32) {
        let Some(RegRole::Busy(ep)) = self.roles.get(&(base, offset)) else {
            return;
        };
        let mut faults = lock(&self.faults);
        if let Some(remaining) = faults.clear_after_reads.get_mut(ep) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                faults.clear_after_reads.remove(ep);
                if !faults.stuck.contains(ep) {
                    bus.set(base, offset, 0);
                }
            }
        }
    }
}

/// Simulated ring blocks attached to a [`SimBus`].
pub struct HardwareModel {
    bus: Arc<SimBus>,
    table: Arc<EndpointTable>,
    behaviour: Arc<Behaviour>,
}

impl HardwareModel {
    /// Install the model's callbacks on `bus` for every block in `table`.
    #[must_use]
    pub fn attach(bus: &Arc<SimBus>, table: &Arc<EndpointTable>) -> Self {
        let behaviour = Arc::new(Behaviour::build(table));
        bus.install_write_cb(behaviour.clone());
        bus.install_read_cb(behaviour.clone());
        Self {
            bus: bus.clone(),
            table: table.clone(),
            behaviour,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<SimBus> {
        &self.bus
    }

    /// Set or clear the busy bit of an endpoint.
    ///
    /// Returns false if the endpoint has no busy register.
    pub fn set_busy(&self, ep: &Endpoint, busy: bool) -> bool {
        match self.behaviour.busy_regs.get(ep) {
            Some((base, offset)) => {
                self.bus.set(*base, *offset, u32::from(busy));
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn busy(&self, ep: &Endpoint) -> bool {
        self.behaviour
            .busy_regs
            .get(ep)
            .is_some_and(|(base, offset)| self.bus.value(*base, *offset) != 0)
    }

    /// Make an endpoint busy and ignore flushes and resets until released.
    pub fn stick_busy(&self, ep: &Endpoint) -> bool {
        lock(&self.behaviour.faults).stuck.insert(*ep);
        self.set_busy(ep, true)
    }

    pub fn release_busy(&self, ep: &Endpoint) {
        lock(&self.behaviour.faults).stuck.remove(ep);
    }

    /// Make an endpoint busy until its busy register has been read `reads`
    /// times.
    pub fn set_busy_clear_delay(&self, ep: &Endpoint, reads: u32) -> bool {
        if reads > 0 {
            lock(&self.behaviour.faults)
                .clear_after_reads
                .insert(*ep, reads);
        }
        self.set_busy(ep, reads > 0)
    }

    /// State reported by the debug port for an endpoint.
    pub fn set_debug_state(&self, ep: &Endpoint, state: DebugState) {
        lock(&self.behaviour.faults).debug.insert(*ep, state);
    }

    #[must_use]
    pub fn debug_state(&self, ep: &Endpoint) -> DebugState {
        lock(&self.behaviour.faults)
            .debug
            .get(ep)
            .copied()
            .unwrap_or(DebugState::Idle)
    }

    /// Treat `base` as a wrapper block.
    pub fn add_wrapper(&self, base: u32) {
        lock(&self.behaviour.faults).wrappers.insert(base);
    }

    /// Stop a wrapper reset from completing.
    pub fn stick_wrapper_reset(&self, base: u32, stuck: bool) {
        let mut faults = lock(&self.behaviour.faults);
        faults.wrappers.insert(base);
        if stuck {
            faults.stuck_wrappers.insert(base);
        } else {
            faults.stuck_wrappers.remove(&base);
        }
    }

    /// Disable the ring on every block without going through the bus, as
    /// if the blocks had been power cycled.
    pub fn drop_ring(&self) {
        for slot in self.table.slots() {
            let (clk_en, ring_en) = match slot.record.module {
                Module::C2Serv => (
                    C2servReg::C2comRingClkEn.offset(),
                    C2servReg::C2comRingEnable.offset(),
                ),
                Module::C2Agent => (
                    C2agentReg::C2comRingClkEn.offset(),
                    C2agentReg::C2comRingEnable.offset(),
                ),
            };
            self.bus.set(slot.record.addr, clk_en, 0);
            self.bus.set(slot.record.addr, ring_en, 0);
        }
    }
}
