// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Register access primitives.

use std::sync::Arc;

/// Interface to the register space of the ring blocks.
///
/// Accesses are assumed to always succeed.
pub trait RegisterBus: Send + Sync {
    /// Read the 32-bit register at `offset` from the block at `base`.
    fn read(&self, base: u32, offset: u32) -> u32;

    /// Write the 32-bit register at `offset` from the block at `base`.
    fn write(&self, base: u32, offset: u32, value: u32);
}

/// A bus shared between the ring manager and whoever owns the hardware.
pub type SharedBus = Arc<dyn RegisterBus>;
