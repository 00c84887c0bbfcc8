// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Platform descriptions for the VOTF ring manager.
//!
//! A platform lists the channel layout of each module type used, the IP
//! blocks that take part in the ring and, optionally, the limits of the
//! hardware polling loops. It plays the part of the device-tree nodes a
//! driver would be bound to.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use votf_models::VotfError;
use votf_models::table::{EndpointRecord, EndpointTable, ModuleTypeAddr};
use votf_models::types::PollConfig;
use votf_track::entity::Entity;
use votf_track::info;

use crate::types::{EndpointSection, PlatformConfig};

pub mod types;

pub use votf_models::types::IP_LIMIT;

/// Return a [`ConfigError`] from the enclosing function.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        Err($crate::ConfigError(format!($($arg)+)))
    };
}

/// The `ConfigError` is what should be returned for an invalid platform
#[derive(Debug)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for ConfigError {}

impl From<VotfError> for ConfigError {
    fn from(e: VotfError) -> Self {
        match e {
            VotfError::Config(msg) => ConfigError(msg),
            other => ConfigError(other.to_string()),
        }
    }
}

pub struct Platform {
    entity: Arc<Entity>,
    table: Arc<EndpointTable>,
    poll: PollConfig,
    names: Vec<Option<String>>,
    slot_by_name: HashMap<String, usize>,
}

impl Platform {
    pub fn from_file(parent: &Arc<Entity>, platform_path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(platform_path).map_err(|e| {
            ConfigError(format!("Unable to read {}: {e}", platform_path.display()))
        })?;
        Platform::from_string(parent, &s)
    }

    pub fn from_string(parent: &Arc<Entity>, platform_config: &str) -> Result<Self, ConfigError> {
        let cfg: PlatformConfig = serde_yaml::from_str(platform_config)
            .map_err(|e| ConfigError(format!("serde_yaml::from_str failed: {e}")))?;
        Platform::build(parent, &cfg)
    }

    fn build(parent: &Arc<Entity>, cfg: &PlatformConfig) -> Result<Self, ConfigError> {
        let records = build_records(&cfg.endpoints);
        let module_types: Vec<_> = cfg
            .module_types
            .iter()
            .map(|mt| {
                let addr = ModuleTypeAddr {
                    tws_addr: mt.tws_addr,
                    tws_gap: mt.tws_gap,
                    trs_addr: mt.trs_addr,
                    trs_gap: mt.trs_gap,
                    quirks: mt
                        .quirks
                        .clone()
                        .unwrap_or_else(|| mt.module_type.default_quirks()),
                };
                (mt.module_type, addr)
            })
            .collect();
        let table = EndpointTable::build(&records, &module_types)?;

        let mut poll = PollConfig::default();
        if let Some(section) = &cfg.poll {
            if let Some(max_iterations) = section.max_iterations {
                if max_iterations == 0 {
                    return config_error!("poll max_iterations must be at least 1");
                }
                poll.max_iterations = max_iterations;
            }
            if let Some(delay_us) = section.delay_us {
                poll.delay = Duration::from_micros(delay_us);
            }
        }

        let mut slot_by_name = HashMap::new();
        for (slot, endpoint) in cfg.endpoints.iter().enumerate() {
            let Some(name) = &endpoint.name else {
                continue;
            };
            if slot_by_name.insert(name.clone(), slot).is_some() {
                return config_error!("Duplicate endpoint name {name}");
            }
        }

        let entity = Entity::child(parent, "platform");
        info!(entity ; "{} endpoint blocks, {} module types", records.len(), module_types.len());
        Ok(Platform {
            entity,
            table: Arc::new(table),
            poll,
            names: cfg.endpoints.iter().map(|e| e.name.clone()).collect(),
            slot_by_name,
        })
    }

    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// The validated endpoint and module-type tables.
    #[must_use]
    pub fn table(&self) -> &Arc<EndpointTable> {
        &self.table
    }

    /// Polling limits, defaulted where the platform does not set them.
    #[must_use]
    pub fn poll(&self) -> PollConfig {
        self.poll
    }

    #[must_use]
    pub fn num_endpoints(&self) -> usize {
        self.names.len()
    }

    pub fn slot_from_name(&self, name: &str) -> Result<usize, ConfigError> {
        match self.slot_by_name.get(name) {
            Some(slot) => Ok(*slot),
            None => config_error!("No endpoint '{name}'"),
        }
    }

    pub fn record(&self, name: &str) -> Result<EndpointRecord, ConfigError> {
        let slot = self.slot_from_name(name)?;
        match self.table.slot(slot) {
            Some(slot) => Ok(slot.record),
            None => config_error!("No endpoint '{name}'"),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Endpoints:")?;
        for slot in self.table.slots() {
            let r = slot.record;
            let name = self.names[slot.index].as_deref().unwrap_or("-");
            writeln!(
                f,
                "  {}: {name} {} ip {:#06x} @ {:#010x}, {} x{} ({})",
                slot.index, r.module, r.ip, r.addr, r.service, r.channels, r.module_type
            )?;
        }
        writeln!(
            f,
            "\nPoll: {} x {:?}",
            self.poll.max_iterations, self.poll.delay
        )
    }
}

fn build_records(endpoints: &[EndpointSection]) -> Vec<EndpointRecord> {
    endpoints
        .iter()
        .map(|e| EndpointRecord {
            addr: e.addr,
            ip: e.ip,
            channels: e.channels,
            module: e.module,
            service: e.service,
            module_type: e.module_type,
        })
        .collect()
}
