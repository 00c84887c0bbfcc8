// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Register maps of the ring blocks, the bus used to access them and a
//! simulated register file.
//!
//! Each block personality has a set of common registers at fixed offsets from
//! the block base and per-channel registers whose offsets are relative to the
//! start of a producer or consumer channel. The channel start is computed by
//! the [offset resolver](crate::offset).

pub use paste::paste;

pub mod bus;
pub mod map;
pub mod sim;

pub use bus::{RegisterBus, SharedBus};
pub use map::{C2agentReg, C2servReg, WrapperReg};

use crate::types::Module;

/// Where a register lives within a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegScope {
    /// Fixed offset from the block base.
    Common,
    /// Offset within a producer channel.
    Tws,
    /// Offset within a consumer channel.
    Trs,
    /// Offset from a wrapper base.
    Wrapper,
}

/// Largest offset of a `module` register in `scope`, zero if it has none.
#[must_use]
pub fn max_offset(module: Module, scope: RegScope) -> u32 {
    let in_scope = |(s, offset): (RegScope, u32)| (s == scope).then_some(offset);
    match module {
        Module::C2Serv => C2servReg::ALL
            .iter()
            .filter_map(|r| in_scope((r.scope(), r.offset())))
            .max(),
        Module::C2Agent => C2agentReg::ALL
            .iter()
            .filter_map(|r| in_scope((r.scope(), r.offset())))
            .max(),
    }
    .unwrap_or(0)
}

/// Build a register map enum.
///
/// Each register is given as `snake_name : Scope @ offset` and becomes a
/// `CamelName` variant of `<Map>Reg` with `offset()`, `scope()` and `name()`
/// accessors and an `ALL` list in declaration order.
#[macro_export]
macro_rules! build_register_map {
    (
        $(#[$($map_attrs:tt)*])*
        $map:ident ;
        $(
            $(#[$($reg_attrs:tt)*])*
            $reg:ident : $scope:ident @ $offset:expr
        ),+ $(,)*
    ) => {
    $crate::registers::paste! {
        $(#[$($map_attrs)*])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum [< $map Reg >] {
            $(
                $(#[$($reg_attrs)*])*
                [< $reg:camel >],
            )+
        }

        impl [< $map Reg >] {
            /// Every register of the map in declaration order.
            pub const ALL: &'static [[< $map Reg >]] = &[
                $( [< $map Reg >]::[< $reg:camel >], )+
            ];

            /// Offset from the block base (common) or the channel start.
            #[must_use]
            pub const fn offset(self) -> u32 {
                match self {
                    $( Self::[< $reg:camel >] => $offset, )+
                }
            }

            #[must_use]
            pub const fn scope(self) -> $crate::registers::RegScope {
                match self {
                    $( Self::[< $reg:camel >] => $crate::registers::RegScope::$scope, )+
                }
            }

            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::[< $reg:camel >] => stringify!($reg), )+
                }
            }
        }
    }}
}
