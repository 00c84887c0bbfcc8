// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A simulated register file.
//!
//! [`SimBus`] stores every register that has been written and returns zero
//! for anything else. Behaviour is attached with `write` and `read`
//! callbacks, which is how the [hardware model](crate::hardware) emulates
//! self-clearing and status registers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::registers::RegisterBus;

/// Called after a register has been written through the bus.
pub trait Written: Send + Sync {
    fn written(&self, bus: &SimBus, base: u32, offset: u32, value: u32);
}

/// Called after a register has been read through the bus.
pub trait Read: Send + Sync {
    fn read(&self, bus: &SimBus, base: u32, offset: u32, value_read: u32);
}

pub type WrittenCallback = Arc<dyn Written + 'static>;
pub type ReadCallback = Arc<dyn Read + 'static>;

/// One write seen by the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegWrite {
    pub base: u32,
    pub offset: u32,
    pub value: u32,
}

#[derive(Default)]
pub struct SimBus {
    space: Mutex<HashMap<(u32, u32), u32>>,
    writes: Mutex<Vec<RegWrite>>,
    write_callbacks: Mutex<Vec<WrittenCallback>>,
    read_callbacks: Mutex<Vec<ReadCallback>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback function to be called whenever a `write` completes
    pub fn install_write_cb(&self, cb: WrittenCallback) {
        lock(&self.write_callbacks).push(cb);
    }

    /// Install a callback function to be called whenever a `read` completes
    pub fn install_read_cb(&self, cb: ReadCallback) {
        lock(&self.read_callbacks).push(cb);
    }

    /// Set a register without recording the write or triggering callbacks.
    pub fn set(&self, base: u32, offset: u32, value: u32) {
        lock(&self.space).insert((base, offset), value);
    }

    /// Return a register value without triggering callbacks.
    #[must_use]
    pub fn value(&self, base: u32, offset: u32) -> u32 {
        lock(&self.space).get(&(base, offset)).copied().unwrap_or(0)
    }

    /// All writes seen since creation or the last [`SimBus::clear_writes`].
    #[must_use]
    pub fn writes(&self) -> Vec<RegWrite> {
        lock(&self.writes).clone()
    }

    /// Values written to one register, oldest first.
    #[must_use]
    pub fn writes_to(&self, base: u32, offset: u32) -> Vec<u32> {
        lock(&self.writes)
            .iter()
            .filter(|w| w.base == base && w.offset == offset)
            .map(|w| w.value)
            .collect()
    }

    pub fn clear_writes(&self) {
        lock(&self.writes).clear();
    }
}

impl RegisterBus for SimBus {
    fn read(&self, base: u32, offset: u32) -> u32 {
        let value = self.value(base, offset);
        // Callbacks may access the bus so the list lock is not held.
        let callbacks = lock(&self.read_callbacks).clone();
        for cb in &callbacks {
            cb.read(self, base, offset, value);
        }
        value
    }

    fn write(&self, base: u32, offset: u32, value: u32) {
        self.set(base, offset, value);
        lock(&self.writes).push(RegWrite {
            base,
            offset,
            value,
        });
        let callbacks = lock(&self.write_callbacks).clone();
        for cb in &callbacks {
            cb.written(self, base, offset, value);
        }
    }
}
