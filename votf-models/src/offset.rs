// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Resolve the register offset of a logical endpoint.
//!
//! Callers name the register they want for each of the four
//! (personality, role) combinations. Combinations where the register does
//! not exist are given as `None` and resolve to `None`, which callers treat
//! as "skip" rather than as an error.

use crate::registers::{C2agentReg, C2servReg, RegScope};
use crate::table::EndpointTable;
use crate::types::{Endpoint, Module, Service};

/// The register to use for each (personality, role) combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterCandidates {
    pub serv_tws: Option<C2servReg>,
    pub serv_trs: Option<C2servReg>,
    pub agent_tws: Option<C2agentReg>,
    pub agent_trs: Option<C2agentReg>,
}

impl RegisterCandidates {
    #[must_use]
    pub const fn new(
        serv_tws: Option<C2servReg>,
        serv_trs: Option<C2servReg>,
        agent_tws: Option<C2agentReg>,
        agent_trs: Option<C2agentReg>,
    ) -> Self {
        Self {
            serv_tws,
            serv_trs,
            agent_tws,
            agent_trs,
        }
    }

    /// Local offset and scope of the register selected for `module` and
    /// `service`.
    #[must_use]
    pub fn select(&self, module: Module, service: Service) -> Option<(u32, RegScope)> {
        match (module, service) {
            (Module::C2Serv, Service::Tws) => self.serv_tws.map(|r| (r.offset(), r.scope())),
            (Module::C2Serv, Service::Trs) => self.serv_trs.map(|r| (r.offset(), r.scope())),
            (Module::C2Agent, Service::Tws) => self.agent_tws.map(|r| (r.offset(), r.scope())),
            (Module::C2Agent, Service::Trs) => self.agent_trs.map(|r| (r.offset(), r.scope())),
        }
    }
}

/// Offset of a register from the base of the endpoint's block.
///
/// Returns `None` if the endpoint is not in use, the register does not apply
/// to its personality and role, or the register belongs to the other role.
/// Offsets beyond 32 bits are also `None`; [`EndpointTable::build`] rejects
/// such layouts up front.
#[must_use]
pub fn resolve_offset(
    table: &EndpointTable,
    endpoint: &Endpoint,
    candidates: &RegisterCandidates,
) -> Option<u32> {
    let located = table.lookup(endpoint).ok()?;
    let (reg_offset, scope) = candidates.select(located.module, endpoint.service)?;

    let expected_scope = match endpoint.service {
        Service::Tws => RegScope::Tws,
        Service::Trs => RegScope::Trs,
    };
    if scope != expected_scope {
        return None;
    }

    let layout = table.module_addr(located.module_type)?;
    layout
        .channel_start(endpoint.service, endpoint.id)?
        .checked_add(reg_offset)
}

macro_rules! candidates {
    ($name:ident, $st:expr, $sr:expr, $at:expr, $ar:expr) => {
        pub const $name: RegisterCandidates = RegisterCandidates::new($st, $sr, $at, $ar);
    };
}

candidates!(
    ENABLE,
    Some(C2servReg::TwsEnable),
    Some(C2servReg::TrsEnable),
    Some(C2agentReg::TwsEnable),
    Some(C2agentReg::TrsEnable)
);
candidates!(
    LIMIT,
    Some(C2servReg::TwsLimit),
    Some(C2servReg::TrsLimit),
    Some(C2agentReg::TwsLimit),
    Some(C2agentReg::TrsLimit)
);
candidates!(
    DEST,
    Some(C2servReg::TwsDest),
    None,
    Some(C2agentReg::TwsDest),
    None
);
candidates!(
    TOKEN_SIZE,
    Some(C2servReg::TwsLinesInToken),
    Some(C2servReg::TrsLinesInToken),
    Some(C2agentReg::TwsTokenSize),
    Some(C2agentReg::TrsTokenSize)
);
candidates!(
    FIRST_TOKEN_SIZE,
    None,
    Some(C2servReg::TrsLinesInFirstToken),
    None,
    Some(C2agentReg::TrsCropFirstTokenSize)
);
candidates!(
    FRAME_SIZE,
    None,
    Some(C2servReg::TrsLinesCount),
    None,
    Some(C2agentReg::TrsFrameSize)
);
// Agent consumers have no flush register.
candidates!(
    FLUSH,
    Some(C2servReg::TwsFlush),
    Some(C2servReg::TrsFlush),
    Some(C2agentReg::TwsFlush),
    None
);
candidates!(
    BUSY,
    Some(C2servReg::TwsBusy),
    Some(C2servReg::TrsBusy),
    Some(C2agentReg::TwsBusy),
    Some(C2agentReg::TrsBusy)
);
candidates!(
    LOST_CFG,
    None,
    Some(C2servReg::TrsConnectionLostRecoverEnable),
    None,
    None
);
candidates!(
    CROP_START,
    None,
    None,
    None,
    Some(C2agentReg::TrsCropTokensStart)
);
candidates!(
    CROP_ENABLE,
    None,
    None,
    None,
    Some(C2agentReg::TrsCropEnable)
);
candidates!(
    START,
    None,
    None,
    Some(C2agentReg::TwsStart),
    Some(C2agentReg::TrsStart)
);
candidates!(
    FINISH,
    None,
    None,
    Some(C2agentReg::TwsFinish),
    Some(C2agentReg::TrsFinish)
);
candidates!(
    HIGH_THRESHOLD,
    None,
    None,
    Some(C2agentReg::TwsHighThreshold),
    Some(C2agentReg::TrsHighThreshold)
);
candidates!(
    LOW_THRESHOLD,
    None,
    None,
    Some(C2agentReg::TwsLowThreshold),
    Some(C2agentReg::TrsLowThreshold)
);
candidates!(
    READ_BYTES,
    None,
    None,
    None,
    Some(C2agentReg::TrsReadBytes)
);
candidates!(
    FULLNESS,
    None,
    None,
    Some(C2agentReg::TwsFullness),
    Some(C2agentReg::TrsFullness)
);
candidates!(
    IRQ_ENABLE,
    None,
    None,
    Some(C2agentReg::TwsIrqEnable),
    Some(C2agentReg::TrsIrqEnable)
);
candidates!(
    IRQ_STATUS,
    None,
    None,
    Some(C2agentReg::TwsIrqStatus),
    Some(C2agentReg::TrsIrqStatus)
);
candidates!(
    IRQ,
    None,
    None,
    Some(C2agentReg::TwsIrq),
    Some(C2agentReg::TrsIrq)
);
candidates!(
    IRQ_CLEAR,
    None,
    None,
    Some(C2agentReg::TwsIrqClear),
    Some(C2agentReg::TrsIrqClear)
);
