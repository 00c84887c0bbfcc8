// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of IP blocks (table slots) that can take part in the ring.
pub const IP_MAX: usize = 16;

/// Largest IP identifier that fits in a rejection packet.
pub const IP_LIMIT: u32 = 0xffff;

/// Maximum number of channels within one IP block.
pub const ID_MAX: usize = 16;

/// Number of service roles.
pub const SERVICE_CNT: usize = 2;

/// Number of fixed module-type layouts.
pub const MODULE_TYPE_CNT: usize = 7;

/// `option` bit requesting that a connected link is reconfigured anyway.
pub const OPTION_CHANGE: u32 = 1 << 0;

/// `option` bit requesting that the channel access count is incremented.
pub const OPTION_COUNT: u32 = 1 << 1;

/// Role of an endpoint on the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Service {
    /// Producer (write service).
    Tws = 0,
    /// Consumer (read service).
    Trs = 1,
}

impl Service {
    pub const ALL: [Service; SERVICE_CNT] = [Service::Tws, Service::Trs];

    /// The role on the other end of a link.
    #[must_use]
    pub fn peer(self) -> Self {
        match self {
            Service::Tws => Service::Trs,
            Service::Trs => Service::Tws,
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Service::Tws => write!(f, "TWS"),
            Service::Trs => write!(f, "TRS"),
        }
    }
}

/// Hardware personality of the block that owns an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Module {
    /// Serializer-class block.
    C2Serv = 0,
    /// Agent-class block.
    C2Agent = 1,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Module::C2Serv => write!(f, "C2SERV"),
            Module::C2Agent => write!(f, "C2AGENT"),
        }
    }
}

/// Register layout variant of a block, named by its producer/consumer
/// channel counts.
///
/// The numeric values index the module-type address table and must not be
/// reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ModuleType {
    M16S16 = 0,
    M1S3 = 1,
    M2S3 = 2,
    M0S4 = 3,
    M2S2 = 4,
    M3S1 = 5,
    M6S4 = 6,
}

impl ModuleType {
    pub const ALL: [ModuleType; MODULE_TYPE_CNT] = [
        ModuleType::M16S16,
        ModuleType::M1S3,
        ModuleType::M2S3,
        ModuleType::M0S4,
        ModuleType::M2S2,
        ModuleType::M3S1,
        ModuleType::M6S4,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for ModuleType {
    type Error = VotfError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ModuleType::ALL
            .into_iter()
            .find(|mt| *mt as u32 == value)
            .ok_or_else(|| VotfError::Config(format!("unknown module type {value}")))
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Shape of the transfer carried by an endpoint.
///
/// This only affects how many lines make up a token, never the identity of
/// the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    #[default]
    Normal,
    /// Frame-rate scaled sensor output.
    FrameRateScaled,
    /// Consumer reads two lines for every produced line.
    HeightX2,
}

impl TransferMode {
    /// Number of lines that make up one token for this mode.
    #[must_use]
    pub fn lines_in_token(self, service: Service) -> u32 {
        match (self, service) {
            (TransferMode::FrameRateScaled, _) => 40,
            (TransferMode::HeightX2, Service::Trs) => 2,
            _ => 1,
        }
    }
}

/// Logical identity of one DMA endpoint.
///
/// Equality and hashing only consider `service`, `ip` and `id`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub service: Service,
    pub ip: u32,
    pub id: usize,
    #[serde(default)]
    pub mode: TransferMode,
}

impl Endpoint {
    #[must_use]
    pub fn new(service: Service, ip: u32, id: usize) -> Self {
        Self {
            service,
            ip,
            id,
            mode: TransferMode::Normal,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    fn key(&self) -> (Service, u32, usize) {
        (self.service, self.ip, self.id)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Endpoint {}

impl std::hash::Hash for Endpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({:#06x}-{})", self.service, self.ip, self.id)
    }
}

/// Connection state of one side of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    #[default]
    Disconnected,
    /// Peer pointer written, waiting for the other side.
    Ready,
    /// Both sides agree on the pairing.
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "DISCONNECTED"),
            LinkState::Ready => write!(f, "READY"),
            LinkState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// State reported by the hardware debug port in bits [3:0].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugState {
    Idle,
    TrsWaitConnection,
    TwsWaitConnection,
    Connected,
    WaitTokenAck,
    WaitResetAck,
    Unknown(u32),
}

impl DebugState {
    const MASK: u32 = 0xf;

    /// Decode the state field of a debug port read.
    #[must_use]
    pub fn from_dout(dout: u32) -> Self {
        match dout & Self::MASK {
            0 => DebugState::Idle,
            1 => DebugState::TrsWaitConnection,
            2 => DebugState::TwsWaitConnection,
            3 => DebugState::Connected,
            4 => DebugState::WaitTokenAck,
            5 => DebugState::WaitResetAck,
            other => DebugState::Unknown(other),
        }
    }

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            DebugState::Idle => 0,
            DebugState::TrsWaitConnection => 1,
            DebugState::TwsWaitConnection => 2,
            DebugState::Connected => 3,
            DebugState::WaitTokenAck => 4,
            DebugState::WaitResetAck => 5,
            DebugState::Unknown(code) => code & Self::MASK,
        }
    }
}

/// Reset applied by [`VotfDevice::reset`](crate::device::VotfDevice::reset).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetKind {
    /// Flushes the DMA and resets everything but the APB registers.
    Core,
    /// Full software reset.
    Full,
}

/// Which of the two fullness thresholds to access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    High,
    Low,
}

/// Transfer configuration requested for one side of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceCfg {
    pub enable: bool,
    /// Buffering limit in lines.
    pub limit: u32,
    /// Token size in lines. Zero takes the size implied by the endpoint's
    /// [`TransferMode`].
    pub token_size: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Memory bits per pixel.
    pub bitwidth: u32,
    /// Number of planes, zero is treated as one.
    pub planes: u32,
    pub connected_ip: u32,
    pub connected_id: u32,
    /// Combination of [`OPTION_CHANGE`] and [`OPTION_COUNT`].
    pub option: u32,
}

impl ServiceCfg {
    #[must_use]
    pub fn change(&self) -> bool {
        self.option & OPTION_CHANGE != 0
    }

    #[must_use]
    pub fn count(&self) -> bool {
        self.option & OPTION_COUNT != 0
    }

    /// Token size in lines to program into `ep`.
    #[must_use]
    pub fn token_lines(&self, ep: &Endpoint) -> u32 {
        match self.token_size {
            0 => ep.mode.lines_in_token(ep.service),
            lines => lines,
        }
    }

    /// Value of the producer destination register.
    #[must_use]
    pub fn dest(&self) -> u32 {
        (self.connected_ip << 4) | self.connected_id
    }
}

/// Configuration last applied to an endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordedCfg {
    pub connected_ip: u32,
    pub connected_id: u32,
    pub enable: bool,
    pub limit: u32,
    /// Token size in lines, as requested rather than as written.
    pub token_size: u32,
}

/// Consumer behaviour when the connection to the producer is lost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LostCfg {
    pub recover_enable: bool,
    pub flush_enable: bool,
}

impl LostCfg {
    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.recover_enable) | (u32::from(self.flush_enable) << 1)
    }
}

/// Bounds for the hardware busy-wait loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub max_iterations: u32,
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            delay: Duration::from_micros(10),
        }
    }
}

/// Result of a register-level setter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The register does not exist for this endpoint's personality or role.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingStatus {
    Created,
    AlreadyCreated,
    /// The reference count was out of step with the hardware and was reset.
    Healed,
    Destroyed,
    StillInUse(u32),
    AlreadyDestroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfgStatus {
    Applied,
    AlreadyConnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushStatus {
    Flushed,
    /// Another holder still uses the channel.
    Deferred { remaining: i32 },
    /// The endpoint has no flush register.
    NotApplicable,
}

// VOTF errors

/// The `VotfError` is what should be returned in the case of an error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VotfError {
    /// Endpoint is not a configured, in-use table entry.
    InvalidEndpoint(Endpoint),
    /// The peer named by a configuration is not a configured endpoint.
    InvalidPeer { endpoint: Endpoint, peer: Endpoint },
    /// No table slot with this IP for the service.
    InvalidIp { service: Service, ip: u32 },
    /// The endpoint table is empty.
    NoEndpoints,
    /// A busy-wait loop exceeded its iteration cap.
    Timeout { what: String, iterations: u32 },
    /// The debug port reports a state that cannot be recovered.
    UnrecoverableState {
        tws: Endpoint,
        tws_state: u32,
        trs: Endpoint,
        trs_state: u32,
    },
    /// A channel register of `endpoint` lies beyond the 32-bit address space.
    AddressOverflow(Endpoint),
    Config(String),
}

impl fmt::Display for VotfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VotfError::InvalidEndpoint(ep) => write!(f, "Error: invalid endpoint {ep}"),
            VotfError::InvalidPeer { endpoint, peer } => {
                write!(f, "Error: {endpoint} has invalid peer {peer}")
            }
            VotfError::InvalidIp { service, ip } => {
                write!(f, "Error: invalid {service} ip {ip:#x}")
            }
            VotfError::NoEndpoints => write!(f, "Error: no endpoints configured"),
            VotfError::Timeout { what, iterations } => {
                write!(f, "Error: timeout waiting for {what} after {iterations} polls")
            }
            VotfError::UnrecoverableState {
                tws,
                tws_state,
                trs,
                trs_state,
            } => write!(
                f,
                "Error: unrecoverable state {tws}: {tws_state:#x}, {trs}: {trs_state:#x}"
            ),
            VotfError::AddressOverflow(ep) => {
                write!(f, "Error: registers of {ep} overflow the address space")
            }
            VotfError::Config(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl Error for VotfError {}

/// The VotfResult is the return type for most ring manager functions
pub type VotfResult<T> = Result<T, VotfError>;
