// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Helpers shared by the tests: standard tables and a device wired to the
//! simulated hardware.

use std::sync::Arc;
use std::time::Duration;

use votf_track::Tracker;
use votf_track::entity::toplevel;
use votf_track::test_helpers::create_tracker;

use crate::device::VotfDevice;
use crate::hardware::HardwareModel;
use crate::registers::sim::SimBus;
use crate::table::{EndpointRecord, EndpointTable, ModuleTypeAddr};
use crate::types::{Endpoint, Module, ModuleType, PollConfig, Service, ServiceCfg};

/// Serializer producer.
pub const SERV_TWS_IP: u32 = 0x10;
pub const SERV_TWS_BASE: u32 = 0x1000_0000;
/// Agent consumer.
pub const AGENT_TRS_IP: u32 = 0x20;
pub const AGENT_TRS_BASE: u32 = 0x2000_0000;
/// Serializer consumer.
pub const SERV_TRS_IP: u32 = 0x30;
pub const SERV_TRS_BASE: u32 = 0x3000_0000;
/// Agent producer.
pub const AGENT_TWS_IP: u32 = 0x40;
pub const AGENT_TWS_BASE: u32 = 0x4000_0000;

/// Poll limits that time out quickly.
pub const TEST_POLL: PollConfig = PollConfig {
    max_iterations: 50,
    delay: Duration::ZERO,
};

/// Channel layouts of the simulated blocks.
#[must_use]
pub fn default_module_types() -> Vec<(ModuleType, ModuleTypeAddr)> {
    ModuleType::ALL
        .iter()
        .map(|&module_type| {
            let addr = match module_type {
                ModuleType::M6S4 => ModuleTypeAddr {
                    tws_addr: 0x100,
                    tws_gap: 0x40,
                    trs_addr: 0x800,
                    trs_gap: 0x50,
                    quirks: Vec::new(),
                },
                _ => ModuleTypeAddr {
                    tws_addr: 0x100,
                    tws_gap: 0x1c,
                    trs_addr: 0x400,
                    trs_gap: 0x20,
                    quirks: module_type.default_quirks(),
                },
            };
            (module_type, addr)
        })
        .collect()
}

fn record(
    addr: u32,
    ip: u32,
    module: Module,
    service: Service,
    module_type: ModuleType,
) -> EndpointRecord {
    EndpointRecord {
        addr,
        ip,
        channels: 2,
        module,
        service,
        module_type,
    }
}

/// One serializer producer and one agent consumer.
#[must_use]
pub fn example_records() -> Vec<EndpointRecord> {
    vec![
        record(
            SERV_TWS_BASE,
            SERV_TWS_IP,
            Module::C2Serv,
            Service::Tws,
            ModuleType::M0S4,
        ),
        record(
            AGENT_TRS_BASE,
            AGENT_TRS_IP,
            Module::C2Agent,
            Service::Trs,
            ModuleType::M6S4,
        ),
    ]
}

/// Both personalities in both roles.
#[must_use]
pub fn standard_records() -> Vec<EndpointRecord> {
    let mut records = example_records();
    records.push(record(
        SERV_TRS_BASE,
        SERV_TRS_IP,
        Module::C2Serv,
        Service::Trs,
        ModuleType::M2S2,
    ));
    records.push(record(
        AGENT_TWS_BASE,
        AGENT_TWS_IP,
        Module::C2Agent,
        Service::Tws,
        ModuleType::M6S4,
    ));
    records
}

#[must_use]
pub fn serv_tws(id: usize) -> Endpoint {
    Endpoint::new(Service::Tws, SERV_TWS_IP, id)
}

#[must_use]
pub fn agent_trs(id: usize) -> Endpoint {
    Endpoint::new(Service::Trs, AGENT_TRS_IP, id)
}

#[must_use]
pub fn serv_trs(id: usize) -> Endpoint {
    Endpoint::new(Service::Trs, SERV_TRS_IP, id)
}

#[must_use]
pub fn agent_tws(id: usize) -> Endpoint {
    Endpoint::new(Service::Tws, AGENT_TWS_IP, id)
}

/// Configuration pointing at `peer`.
#[must_use]
pub fn cfg_to(peer: &Endpoint) -> ServiceCfg {
    ServiceCfg {
        enable: true,
        limit: 0xff,
        token_size: 4,
        width: 640,
        height: 480,
        bitwidth: 8,
        connected_ip: peer.ip,
        connected_id: peer.id as u32,
        ..Default::default()
    }
}

/// A device driving simulated hardware.
pub struct TestRig {
    pub tracker: Tracker,
    pub bus: Arc<SimBus>,
    pub hw: HardwareModel,
    pub device: VotfDevice,
}

/// Build a rig for `records` using the default module types.
///
/// # Panics
///
/// If the records do not form a valid table.
#[must_use]
pub fn create_rig(full_filepath: &str, records: &[EndpointRecord]) -> TestRig {
    let table = EndpointTable::build(records, &default_module_types())
        .unwrap_or_else(|e| panic!("bad test table: {e}"));
    create_rig_with_table(create_tracker(full_filepath), table)
}

/// Build a rig that logs to `tracker`.
#[must_use]
pub fn create_rig_with_table(tracker: Tracker, table: EndpointTable) -> TestRig {
    let top = toplevel(&tracker, "top");
    let table = Arc::new(table);
    let bus = Arc::new(SimBus::new());
    let hw = HardwareModel::attach(&bus, &table);
    let device = VotfDevice::new(&top, table, bus.clone()).with_poll(TEST_POLL);
    device.init();
    TestRig {
        tracker,
        bus,
        hw,
        device,
    }
}

/// Rig with [`standard_records`].
#[must_use]
pub fn standard_rig(full_filepath: &str) -> TestRig {
    create_rig(full_filepath, &standard_records())
}

/// Rig with [`standard_records`] that logs to `tracker`.
///
/// # Panics
///
/// Never, the standard records form a valid table.
#[must_use]
pub fn standard_rig_tracked(tracker: Tracker) -> TestRig {
    let table = EndpointTable::build(&standard_records(), &default_module_types())
        .unwrap_or_else(|e| panic!("bad test table: {e}"));
    create_rig_with_table(tracker, table)
}
