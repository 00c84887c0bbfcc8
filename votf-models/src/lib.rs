// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! VOTF ring, link and token-connection manager.
//!
//! A [`VotfDevice`](device::VotfDevice) coordinates producer (TWS) and
//! consumer (TRS) DMA endpoints that share an on-chip ring:
//!
//!  - the shared ring is reference counted and self-heals when a caller
//!    leaks a reference ([`device`]),
//!  - producer/consumer pairs are connected with an asymmetric handshake
//!    ([`link`]),
//!  - links are torn down with a bounded busy-wait flush ([`flush`]),
//!  - stuck links are detected and recovered from the hardware debug port
//!    ([`recovery`]),
//!  - transfer parameters are programmed on top of an established link
//!    ([`params`]).
//!
//! All register accesses go through a [`RegisterBus`](registers::RegisterBus)
//! so that the manager can be driven against the
//! [simulated hardware](hardware::HardwareModel).

pub mod device;
pub mod flush;
pub mod hardware;
pub mod hw_api;
pub mod link;
pub mod offset;
pub mod params;
pub mod recovery;
pub mod registers;
pub mod table;
pub mod test_helpers;
pub mod types;

pub use device::VotfDevice;
pub use types::{VotfError, VotfResult};
