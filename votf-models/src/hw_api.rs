// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Register-level sequences of the ring blocks.
//!
//! Nothing in here keeps state: every function is a short sequence of reads
//! and writes on one block.

use std::sync::Arc;
use std::thread;

use votf_track::entity::Entity;
use votf_track::{debug, info, trace, warn};

use crate::registers::{C2agentReg, C2servReg, RegScope, SharedBus, WrapperReg};
use crate::table::ModuleTypeAddr;
use crate::types::{DebugState, Module, PollConfig, Service, VotfError, VotfResult};

/// Token type of a rejection packet.
pub const REJECTION_TOKEN: u32 = 0x0a;

/// Value written to the wrapper reset register.
pub const WRAPPER_RESET_VALUE: u32 = 0x11;

/// One read of the debug port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugSample {
    /// Selector written to the debug register.
    pub value: u32,
    /// Raw value read back from the debug output register.
    pub dout: u32,
}

impl DebugSample {
    #[must_use]
    pub fn state(&self) -> DebugState {
        DebugState::from_dout(self.dout)
    }
}

/// A register value captured by an SFR dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegDump {
    pub base: u32,
    pub name: String,
    pub offset: u32,
    pub value: u32,
}

/// Debug port selector for channel `id` of `service`.
#[must_use]
pub fn debug_select(id: usize, service: Service) -> u32 {
    let sel = match service {
        Service::Tws => 0,
        Service::Trs => 1,
    };
    1 | ((id as u32) << 1) | (sel << 5)
}

/// Packet that releases a producer and consumer both waiting for each other.
#[must_use]
pub fn rejection_packet(trs_ip: u32, trs_id: usize, tws_id: usize) -> u32 {
    (trs_ip << 16) | (REJECTION_TOKEN << 8) | ((trs_id as u32) << 4) | tws_id as u32
}

/// Poll `done` until it returns true or the iteration cap is reached.
///
/// Returns the number of failed polls on timeout.
pub fn wait_for(poll: &PollConfig, mut done: impl FnMut() -> bool) -> Result<(), u32> {
    let mut tries = 0;
    while !done() {
        tries += 1;
        if tries >= poll.max_iterations {
            return Err(tries);
        }
        if !poll.delay.is_zero() {
            thread::sleep(poll.delay);
        }
    }
    Ok(())
}

fn common(module: Module, serv: C2servReg, agent: C2agentReg) -> u32 {
    match module {
        Module::C2Serv => serv.offset(),
        Module::C2Agent => agent.offset(),
    }
}

/// Register sequences on top of a [`RegisterBus`](crate::registers::RegisterBus).
pub struct HwApi {
    entity: Arc<Entity>,
    bus: SharedBus,
}

impl HwApi {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, bus: SharedBus) -> Self {
        Self {
            entity: Entity::child(parent, "hw"),
            bus,
        }
    }

    pub fn read(&self, base: u32, offset: u32) -> u32 {
        let value = self.bus.read(base, offset);
        trace!(self.entity ; "read {base:#x}+{offset:#x} = {value:#x}");
        value
    }

    pub fn write(&self, base: u32, offset: u32, value: u32) {
        trace!(self.entity ; "write {base:#x}+{offset:#x} = {value:#x}");
        self.bus.write(base, offset, value);
    }

    /// Enable the ring clock and ring on a block.
    pub fn create_ring(&self, base: u32, ip: u32, module: Module) {
        self.set_ring(base, ip, module, 1);
    }

    pub fn destroy_ring(&self, base: u32, ip: u32, module: Module) {
        self.set_ring(base, ip, module, 0);
    }

    fn set_ring(&self, base: u32, ip: u32, module: Module, value: u32) {
        self.write(
            base,
            common(module, C2servReg::C2comLocalIp, C2agentReg::C2comLocalIp),
            ip,
        );
        self.write(
            base,
            common(module, C2servReg::C2comRingClkEn, C2agentReg::C2comRingClkEn),
            value,
        );
        self.write(
            base,
            common(
                module,
                C2servReg::C2comRingEnable,
                C2agentReg::C2comRingEnable,
            ),
            value,
        );
    }

    /// Select the active register set and how it is switched.
    pub fn set_sel_reg(&self, base: u32, set: u32, mode: u32) {
        self.write(base, C2servReg::Selregistermode.offset(), mode);
        self.write(base, C2servReg::Selregister.offset(), set);
    }

    /// Whether both the ring clock and the ring are enabled on a block.
    pub fn check_ring(&self, base: u32, module: Module) -> bool {
        let clk_en = self.read(
            base,
            common(module, C2servReg::C2comRingClkEn, C2agentReg::C2comRingClkEn),
        );
        let ring_en = self.read(
            base,
            common(
                module,
                C2servReg::C2comRingEnable,
                C2agentReg::C2comRingEnable,
            ),
        );
        clk_en != 0 && ring_en != 0
    }

    /// Pulse the software reset of a block.
    pub fn reset(&self, base: u32, module: Module) {
        self.write(
            base,
            common(module, C2servReg::SwReset, C2agentReg::SwReset),
            1,
        );
    }

    /// Pulse the core reset, which flushes the DMA and resets all registers
    /// but the APB ones.
    pub fn sw_core_reset(&self, base: u32, module: Module) {
        self.write(
            base,
            common(module, C2servReg::SwCoreReset, C2agentReg::SwCoreReset),
            1,
        );
    }

    /// Reset a wrapper and wait for the reset to complete.
    pub fn wrapper_reset(&self, base: u32, poll: &PollConfig) -> VotfResult<()> {
        let offset = WrapperReg::Swrst.offset();
        self.write(base, offset, WRAPPER_RESET_VALUE);
        wait_for(poll, || self.read(base, offset) == 0).map_err(|iterations| {
            VotfError::Timeout {
                what: format!("wrapper reset of {base:#x}"),
                iterations,
            }
        })
    }

    /// Sample the debug port for one channel.
    ///
    /// Only the serializer has a debug port.
    pub fn get_debug_state(
        &self,
        base: u32,
        module: Module,
        id: usize,
        service: Service,
    ) -> Option<DebugSample> {
        match module {
            Module::C2Serv => {
                let value = debug_select(id, service);
                self.write(base, C2servReg::C2comDebug.offset(), value);
                let dout = self.read(base, C2servReg::C2comDebugDout.offset());
                debug!(self.entity ; "debug set({value:#x}), dout({dout:#x})");
                Some(DebugSample { value, dout })
            }
            Module::C2Agent => None,
        }
    }

    /// Inject a rejection token on the producer's block.
    ///
    /// Returns false if the block cannot send one.
    pub fn rejection_token(
        &self,
        base: u32,
        module: Module,
        trs_ip: u32,
        trs_id: usize,
        tws_id: usize,
    ) -> bool {
        match module {
            Module::C2Serv => {
                let value = rejection_packet(trs_ip, trs_id, tws_id);
                let offset = C2servReg::VotfPktData.offset();
                self.write(base, offset, value);
                info!(self.entity ; "PKT_DATA({base:#x}+{offset:#x}: {value:#x})");
                true
            }
            Module::C2Agent => false,
        }
    }

    /// Read every register of one block.
    ///
    /// Common registers are read once, channel registers for each of the
    /// `channels` channels of `service`.
    pub fn dump(
        &self,
        base: u32,
        module: Module,
        layout: &ModuleTypeAddr,
        service: Service,
        channels: usize,
    ) -> Vec<RegDump> {
        let regs: Vec<(&'static str, u32, RegScope)> = match module {
            Module::C2Serv => C2servReg::ALL
                .iter()
                .map(|r| (r.name(), r.offset(), r.scope()))
                .collect(),
            Module::C2Agent => C2agentReg::ALL
                .iter()
                .map(|r| (r.name(), r.offset(), r.scope()))
                .collect(),
        };
        let channel_scope = match service {
            Service::Tws => RegScope::Tws,
            Service::Trs => RegScope::Trs,
        };

        let mut dump = Vec::new();
        for (name, offset, _) in regs.iter().filter(|r| r.2 == RegScope::Common) {
            dump.push(RegDump {
                base,
                name: (*name).to_string(),
                offset: *offset,
                value: self.read(base, *offset),
            });
        }
        for id in 0..channels {
            let Some(start) = layout.channel_start(service, id) else {
                warn!(self.entity ; "{service} channel {id} of {base:#x} is out of range");
                break;
            };
            for (name, offset, _) in regs.iter().filter(|r| r.2 == channel_scope) {
                let Some(offset) = start.checked_add(*offset) else {
                    continue;
                };
                dump.push(RegDump {
                    base,
                    name: format!("{name}[{id}]"),
                    offset,
                    value: self.read(base, offset),
                });
            }
        }
        dump
    }
}
