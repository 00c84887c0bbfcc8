// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Endpoint and module-type tables.
//!
//! The endpoint table is built once from an ordered list of block records.
//! Record `n` occupies IP slot `n` and marks channels `0..channels` of its
//! service as in use. A cell `[service][slot][id]` is in use only if the
//! record at `slot` has that service and `id < channels`.
//!
//! The module-type table maps each [`ModuleType`] to the start and spacing
//! of its producer and consumer channel blocks, plus any irregular spacing
//! the layout has.

use serde::{Deserialize, Serialize};

use crate::registers::{RegScope, max_offset};
use crate::types::{
    Endpoint, ID_MAX, IP_LIMIT, IP_MAX, MODULE_TYPE_CNT, Module, ModuleType, Service, VotfError,
    VotfResult,
};

/// One block record as found in the platform description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointRecord {
    /// Base address of the block.
    pub addr: u32,
    /// Logical IP identifier.
    pub ip: u32,
    /// Number of channels starting at 0.
    pub channels: usize,
    pub module: Module,
    pub service: Service,
    pub module_type: ModuleType,
}

/// Extra spacing inserted between channels of one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum LayoutQuirk {
    /// Add `extra` bytes to every channel from `from_id` onwards.
    From {
        service: Service,
        from_id: usize,
        extra: u32,
    },
    /// Add `extra` bytes for each complete group of `period` channels
    /// before the one being addressed.
    Every {
        service: Service,
        period: usize,
        extra: u32,
    },
}

impl LayoutQuirk {
    /// Extra bytes this quirk adds to channel `id` of `service`, `None` if
    /// that does not fit in 32 bits.
    #[must_use]
    pub fn extra_for(&self, service: Service, id: usize) -> Option<u32> {
        match *self {
            LayoutQuirk::From {
                service: s,
                from_id,
                extra,
            } if s == service && id >= from_id => Some(extra),
            LayoutQuirk::Every {
                service: s,
                period,
                extra,
            } if s == service && period > 0 => {
                u32::try_from(id / period).ok()?.checked_mul(extra)
            }
            _ => Some(0),
        }
    }
}

impl ModuleType {
    /// Irregular spacing of the hardware layouts.
    ///
    /// On the 16x16 serializer the ninth producer channel onwards sits 4
    /// bytes further out, and every fifth consumer channel starts a new
    /// group 0x24 bytes further out.
    #[must_use]
    pub fn default_quirks(self) -> Vec<LayoutQuirk> {
        match self {
            ModuleType::M16S16 => vec![
                LayoutQuirk::From {
                    service: Service::Tws,
                    from_id: 9,
                    extra: 0x4,
                },
                LayoutQuirk::Every {
                    service: Service::Trs,
                    period: 5,
                    extra: 0x24,
                },
            ],
            _ => Vec::new(),
        }
    }
}

/// Channel block layout of one module type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleTypeAddr {
    pub tws_addr: u32,
    pub tws_gap: u32,
    pub trs_addr: u32,
    pub trs_gap: u32,
    pub quirks: Vec<LayoutQuirk>,
}

impl ModuleTypeAddr {
    /// Offset of the start of channel `id` of `service` from the block base.
    ///
    /// `None` if the offset does not fit in 32 bits. Tables that passed
    /// [`EndpointTable::build`] never hit this for an in-use channel.
    #[must_use]
    pub fn channel_start(&self, service: Service, id: usize) -> Option<u32> {
        let (base, gap) = match service {
            Service::Tws => (self.tws_addr, self.tws_gap),
            Service::Trs => (self.trs_addr, self.trs_gap),
        };
        let mut start = u32::try_from(id).ok()?.checked_mul(gap)?.checked_add(base)?;
        for quirk in &self.quirks {
            start = start.checked_add(quirk.extra_for(service, id)?)?;
        }
        Some(start)
    }

    /// Offset of the highest channel register of channel `id`.
    fn last_channel_reg(&self, module: Module, service: Service, id: usize) -> Option<u32> {
        let scope = match service {
            Service::Tws => RegScope::Tws,
            Service::Trs => RegScope::Trs,
        };
        self.channel_start(service, id)?
            .checked_add(max_offset(module, scope))
    }
}

/// A table cell that is in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Located {
    pub slot: usize,
    pub addr: u32,
    pub module: Module,
    pub module_type: ModuleType,
}

/// A configured IP slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub record: EndpointRecord,
}

/// The static endpoint configuration consumed by the ring manager.
#[derive(Clone, Debug, Default)]
pub struct EndpointTable {
    slots: Vec<EndpointRecord>,
    module_addrs: [Option<ModuleTypeAddr>; MODULE_TYPE_CNT],
}

impl EndpointTable {
    /// Build and validate the tables.
    pub fn build(
        records: &[EndpointRecord],
        module_types: &[(ModuleType, ModuleTypeAddr)],
    ) -> VotfResult<Self> {
        if records.len() > IP_MAX {
            return Err(VotfError::Config(format!(
                "{} endpoint records, at most {IP_MAX} supported",
                records.len()
            )));
        }

        let mut module_addrs: [Option<ModuleTypeAddr>; MODULE_TYPE_CNT] = Default::default();
        for (module_type, addr) in module_types {
            if module_addrs[module_type.index()]
                .replace(addr.clone())
                .is_some()
            {
                return Err(VotfError::Config(format!(
                    "module type {module_type} defined more than once"
                )));
            }
        }

        for (i, record) in records.iter().enumerate() {
            if record.channels == 0 || record.channels > ID_MAX {
                return Err(VotfError::Config(format!(
                    "record {i} (ip {:#x}) has {} channels, expected 1..={ID_MAX}",
                    record.ip, record.channels
                )));
            }
            if records[..i]
                .iter()
                .any(|r| r.service == record.service && r.ip == record.ip)
            {
                return Err(VotfError::Config(format!(
                    "{} ip {:#x} defined more than once",
                    record.service, record.ip
                )));
            }
            if record.ip > IP_LIMIT {
                return Err(VotfError::Config(format!(
                    "ip {:#x} out of range, at most {IP_LIMIT:#x}",
                    record.ip
                )));
            }
            let Some(layout) = &module_addrs[record.module_type.index()] else {
                return Err(VotfError::Config(format!(
                    "record {i} (ip {:#x}) uses module type {} which has no address entry",
                    record.ip, record.module_type
                )));
            };
            // Quirks only ever move later channels further out.
            let last = record.channels - 1;
            let highest = layout
                .last_channel_reg(record.module, record.service, last)
                .map(|reg| reg.max(max_offset(record.module, RegScope::Common)))
                .and_then(|reg| record.addr.checked_add(reg));
            if highest.is_none() {
                return Err(VotfError::AddressOverflow(Endpoint::new(
                    record.service,
                    record.ip,
                    last,
                )));
            }
        }

        Ok(Self {
            slots: records.to_vec(),
            module_addrs,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All configured slots in slot order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, record)| Slot {
                index,
                record: *record,
            })
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<Slot> {
        self.slots.get(index).map(|record| Slot {
            index,
            record: *record,
        })
    }

    /// Whether the cell `[service][slot][id]` is in use.
    #[must_use]
    pub fn in_use(&self, service: Service, slot: usize, id: usize) -> bool {
        self.slots
            .get(slot)
            .is_some_and(|r| r.service == service && id < r.channels)
    }

    /// Find the slot holding `ip` with channel `id` in use for `service`.
    #[must_use]
    pub fn search_slot(&self, service: Service, ip: u32, id: usize) -> Option<usize> {
        if id >= ID_MAX {
            return None;
        }
        self.slots
            .iter()
            .position(|r| r.service == service && r.ip == ip && id < r.channels)
    }

    /// Resolve an endpoint to its in-use table cell.
    pub fn lookup(&self, endpoint: &Endpoint) -> VotfResult<Located> {
        let slot = self
            .search_slot(endpoint.service, endpoint.ip, endpoint.id)
            .ok_or(VotfError::InvalidEndpoint(*endpoint))?;
        let record = &self.slots[slot];
        Ok(Located {
            slot,
            addr: record.addr,
            module: record.module,
            module_type: record.module_type,
        })
    }

    #[must_use]
    pub fn module_addr(&self, module_type: ModuleType) -> Option<&ModuleTypeAddr> {
        self.module_addrs[module_type.index()].as_ref()
    }

    /// The endpoints of every in-use cell.
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.slots.iter().flat_map(|r| {
            (0..r.channels).map(move |id| Endpoint::new(r.service, r.ip, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m0s4() -> (ModuleType, ModuleTypeAddr) {
        (
            ModuleType::M0S4,
            ModuleTypeAddr {
                tws_addr: 0x100,
                tws_gap: 0x1c,
                trs_addr: 0x400,
                trs_gap: 0x20,
                quirks: Vec::new(),
            },
        )
    }

    fn record(service: Service, ip: u32, channels: usize) -> EndpointRecord {
        EndpointRecord {
            addr: 0x1000_0000 + ip * 0x1_0000,
            ip,
            channels,
            module: Module::C2Serv,
            service,
            module_type: ModuleType::M0S4,
        }
    }

    #[test]
    fn cells_in_use() {
        let table = EndpointTable::build(
            &[record(Service::Tws, 0x10, 2), record(Service::Trs, 0x20, 1)],
            &[m0s4()],
        )
        .unwrap();

        assert!(table.in_use(Service::Tws, 0, 1));
        assert!(!table.in_use(Service::Tws, 0, 2));
        assert!(!table.in_use(Service::Trs, 0, 0));
        assert!(table.in_use(Service::Trs, 1, 0));
        assert_eq!(table.search_slot(Service::Trs, 0x20, 0), Some(1));
        assert_eq!(table.search_slot(Service::Trs, 0x10, 0), None);
        assert_eq!(table.search_slot(Service::Tws, 0x10, ID_MAX), None);
        assert_eq!(table.endpoints().count(), 3);
    }

    #[test]
    fn lookup_unknown_endpoint() {
        let table = EndpointTable::build(&[record(Service::Tws, 0x10, 1)], &[m0s4()]).unwrap();
        let ep = Endpoint::new(Service::Tws, 0x11, 0);
        assert_eq!(table.lookup(&ep), Err(VotfError::InvalidEndpoint(ep)));
    }

    #[test]
    fn too_many_channels() {
        let err = EndpointTable::build(&[record(Service::Tws, 0x10, 17)], &[m0s4()]).unwrap_err();
        assert!(matches!(err, VotfError::Config(msg) if msg.contains("17 channels")));
    }

    #[test]
    fn duplicate_ip() {
        let err = EndpointTable::build(
            &[record(Service::Tws, 0x10, 1), record(Service::Tws, 0x10, 2)],
            &[m0s4()],
        )
        .unwrap_err();
        assert!(matches!(err, VotfError::Config(msg) if msg.contains("more than once")));
    }

    #[test]
    fn missing_module_type() {
        let err = EndpointTable::build(&[record(Service::Tws, 0x10, 1)], &[]).unwrap_err();
        assert!(matches!(err, VotfError::Config(msg) if msg.contains("no address entry")));
    }

    #[test]
    fn too_many_records() {
        let records: Vec<_> = (0..=IP_MAX as u32)
            .map(|ip| record(Service::Tws, ip, 1))
            .collect();
        assert!(EndpointTable::build(&records, &[m0s4()]).is_err());
    }

    fn at(addr: u32, channels: usize) -> EndpointRecord {
        EndpointRecord {
            addr,
            ..record(Service::Tws, 0x10, channels)
        }
    }

    #[test]
    fn channel_gap_overflows() {
        let layout = ModuleTypeAddr {
            tws_addr: 0xffff_ff00,
            tws_gap: 0x100,
            ..m0s4().1
        };
        assert_eq!(layout.channel_start(Service::Tws, 0), Some(0xffff_ff00));
        assert_eq!(layout.channel_start(Service::Tws, 1), None);

        let err = EndpointTable::build(&[at(0, 2)], &[(ModuleType::M0S4, layout)]).unwrap_err();
        assert_eq!(
            err,
            VotfError::AddressOverflow(Endpoint::new(Service::Tws, 0x10, 1))
        );
    }

    #[test]
    fn registers_at_address_limit() {
        // Channel 0 starts at 0x100 and its last register is at 0x14.
        let highest = 0x100 + max_offset(Module::C2Serv, RegScope::Tws);
        let base = 0xffff_fffc - highest;
        assert!(EndpointTable::build(&[at(base, 1)], &[m0s4()]).is_ok());

        let err = EndpointTable::build(&[at(base + 4, 1)], &[m0s4()]).unwrap_err();
        assert!(matches!(err, VotfError::AddressOverflow(_)));
        assert!(err.to_string().contains("TWS(0x0010-0)"));
    }

    #[test]
    fn quirk_overflow() {
        let layout = ModuleTypeAddr {
            quirks: vec![LayoutQuirk::Every {
                service: Service::Trs,
                period: 1,
                extra: 0x8000_0000,
            }],
            ..m0s4().1
        };
        assert!(layout.channel_start(Service::Trs, 1).is_some());
        assert_eq!(layout.channel_start(Service::Trs, 2), None);
    }

    #[test]
    fn ip_above_limit() {
        let big = EndpointRecord {
            ip: IP_LIMIT + 1,
            ..at(0x1000_0000, 1)
        };
        let err = EndpointTable::build(&[big], &[m0s4()]).unwrap_err();
        assert!(matches!(err, VotfError::Config(msg) if msg.contains("out of range")));

        let max = EndpointRecord {
            ip: IP_LIMIT,
            ..big
        };
        assert!(EndpointTable::build(&[max], &[m0s4()]).is_ok());
    }

    #[test]
    fn m16s16_spacing() {
        let layout = ModuleTypeAddr {
            tws_addr: 0x100,
            tws_gap: 0x1c,
            trs_addr: 0x400,
            trs_gap: 0x20,
            quirks: ModuleType::M16S16.default_quirks(),
        };
        assert_eq!(layout.channel_start(Service::Tws, 8), Some(0x100 + 8 * 0x1c));
        assert_eq!(layout.channel_start(Service::Tws, 9), Some(0x100 + 9 * 0x1c + 4));
        assert_eq!(layout.channel_start(Service::Trs, 4), Some(0x400 + 4 * 0x20));
        assert_eq!(layout.channel_start(Service::Trs, 5), Some(0x400 + 5 * 0x20 + 0x24));
        assert_eq!(layout.channel_start(Service::Trs, 10), Some(0x400 + 10 * 0x20 + 0x48));
        assert_eq!(layout.channel_start(Service::Trs, 15), Some(0x400 + 15 * 0x20 + 0x6c));
    }
}
