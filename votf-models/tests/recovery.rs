// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use votf_models::VotfDevice;
use votf_models::hw_api::{debug_select, rejection_packet};
use votf_models::recovery::{DumpHook, StateCheck, WaitCheck};
use votf_models::registers::{C2servReg, WrapperReg};
use votf_models::test_helpers::{
    SERV_TRS_IP, SERV_TWS_BASE, agent_trs, cfg_to, serv_trs, serv_tws, standard_rig,
    standard_rig_tracked,
};
use votf_models::types::{DebugState, Service, VotfError};
use votf_track::test_helpers::check_contains;
use votf_track::test_init;

const WRAPPER_BASE: u32 = 0x5000_0000;

#[derive(Default)]
struct CountingHook {
    calls: AtomicUsize,
}

impl DumpHook for CountingHook {
    fn dump(&self, _device: &VotfDevice, reason: &str) {
        assert_eq!(reason, "VOTF invalid state");
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn deadlock_is_released() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    rig.hw.set_debug_state(&tws, DebugState::TwsWaitConnection);
    rig.hw.set_debug_state(&trs, DebugState::TrsWaitConnection);

    assert_eq!(
        rig.device.check_wait_connection(&tws, &trs),
        Ok(WaitCheck::Rejected {
            before: (DebugState::TwsWaitConnection, DebugState::TrsWaitConnection),
            after: (DebugState::Idle, DebugState::Idle),
        })
    );
    assert_eq!(
        rig.bus
            .writes_to(SERV_TWS_BASE, C2servReg::VotfPktData.offset()),
        vec![rejection_packet(SERV_TRS_IP, 0, 0)]
    );
    assert_eq!(rejection_packet(SERV_TRS_IP, 0, 0), 0x0030_0a00);
    assert_eq!(rig.hw.debug_state(&tws), DebugState::Idle);
    assert_eq!(rig.hw.debug_state(&trs), DebugState::Idle);
}

#[test]
fn samples_are_recorded() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(1), serv_trs(1));
    assert_eq!(rig.device.debug_info(&tws), Ok(None));

    rig.hw.set_debug_state(&tws, DebugState::Connected);
    assert_eq!(
        rig.device.check_wait_connection(&tws, &trs),
        Ok(WaitCheck::Clear)
    );

    let info = rig.device.debug_info(&tws).unwrap().unwrap();
    assert_eq!(info.value, debug_select(1, Service::Tws));
    assert_eq!(info.dout, DebugState::Connected.code());
    let info = rig.device.debug_info(&trs).unwrap().unwrap();
    assert_eq!(info.value, debug_select(1, Service::Trs));
    assert_eq!(info.value, 0x23);
}

#[test]
fn one_side_waiting_is_clear() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    rig.hw.set_debug_state(&tws, DebugState::TwsWaitConnection);
    assert_eq!(
        rig.device.check_wait_connection(&tws, &trs),
        Ok(WaitCheck::Clear)
    );
    assert!(
        rig.bus
            .writes_to(SERV_TWS_BASE, C2servReg::VotfPktData.offset())
            .is_empty()
    );
}

#[test]
fn agent_has_no_debug_port() {
    let rig = standard_rig(file!());
    assert_eq!(
        rig.device.check_wait_connection(&serv_tws(0), &agent_trs(0)),
        Ok(WaitCheck::Unsupported)
    );
    assert_eq!(rig.device.debug_info(&agent_trs(0)), Ok(None));

    let check = rig
        .device
        .check_invalid_state(&serv_tws(0), &agent_trs(0))
        .unwrap();
    assert_eq!(
        check,
        StateCheck {
            tws: Some(DebugState::Idle),
            trs: None,
            flushed: Vec::new(),
        }
    );
}

#[test]
fn roles_must_match() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    assert_eq!(
        rig.device.check_wait_connection(&trs, &tws),
        Err(VotfError::InvalidPeer {
            endpoint: trs,
            peer: tws
        })
    );
    assert!(matches!(
        rig.device.check_invalid_state(&tws, &serv_tws(1)),
        Err(VotfError::InvalidPeer { .. })
    ));
}

#[test]
fn unrecoverable_states_are_escalated() {
    for (tws_state, trs_state) in [
        (DebugState::WaitTokenAck, DebugState::Idle),
        (DebugState::Connected, DebugState::WaitResetAck),
    ] {
        let rig = standard_rig(file!());
        let hook = Arc::new(CountingHook::default());
        let device = rig.device.with_dump_hook(hook.clone());
        let (tws, trs) = (serv_tws(0), serv_trs(0));
        rig.hw.set_debug_state(&tws, tws_state);
        rig.hw.set_debug_state(&trs, trs_state);

        assert_eq!(
            device.check_invalid_state(&tws, &trs),
            Err(VotfError::UnrecoverableState {
                tws,
                tws_state: tws_state.code(),
                trs,
                trs_state: trs_state.code(),
            })
        );
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn default_hook_dumps_registers() {
    let (test_tracker, tracker) = test_init!(1);
    let rig = standard_rig_tracked(tracker);
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    rig.hw.set_debug_state(&trs, DebugState::WaitResetAck);

    assert!(matches!(
        rig.device.check_invalid_state(&tws, &trs),
        Err(VotfError::UnrecoverableState { .. })
    ));
    check_contains(&test_tracker, "ERROR: VOTF invalid state");
    check_contains(&test_tracker, "VOTF SFR dump");
}

#[test]
fn idle_but_busy_is_flushed() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    rig.device.set_service_cfg(&tws, &cfg_to(&trs)).unwrap();
    rig.device.set_service_cfg(&trs, &cfg_to(&tws)).unwrap();
    assert!(rig.hw.set_busy(&trs, true));

    let check = rig.device.check_invalid_state(&tws, &trs).unwrap();
    assert_eq!(check.flushed, vec![trs]);
    assert!(!rig.hw.busy(&trs));
    // A standalone flush leaves the link up
    assert_eq!(
        rig.device.link_state(&trs),
        Ok(votf_models::types::LinkState::Connected)
    );
}

#[test]
fn idle_but_stuck_fails() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), serv_trs(0));
    assert!(rig.hw.stick_busy(&tws));

    assert!(matches!(
        rig.device.check_invalid_state(&tws, &trs),
        Err(VotfError::Timeout { iterations: 50, .. })
    ));
}

#[test]
fn wrapper_reset() {
    let rig = standard_rig(file!());
    rig.hw.add_wrapper(WRAPPER_BASE);

    assert_eq!(rig.device.wrapper_reset(WRAPPER_BASE), Ok(()));
    assert_eq!(
        rig.bus
            .writes_to(WRAPPER_BASE, WrapperReg::Swrst.offset()),
        vec![0x11]
    );
    assert_eq!(rig.bus.value(WRAPPER_BASE, WrapperReg::Swrst.offset()), 0);

    rig.hw.stick_wrapper_reset(WRAPPER_BASE, true);
    assert_eq!(
        rig.device.wrapper_reset(WRAPPER_BASE),
        Err(VotfError::Timeout {
            what: "wrapper reset of 0x50000000".to_string(),
            iterations: 50
        })
    );
}

#[test]
fn register_dump() {
    let rig = standard_rig(file!());
    rig.device
        .set_service_cfg(&serv_tws(1), &cfg_to(&agent_trs(1)))
        .unwrap();

    let dump = rig.device.sfr_dump();
    let dest = dump
        .iter()
        .find(|r| r.base == SERV_TWS_BASE && r.name == "tws_dest[1]")
        .unwrap();
    assert_eq!(dest.offset, 0x100 + 0x1c + C2servReg::TwsDest.offset());
    assert_eq!(dest.value, cfg_to(&agent_trs(1)).dest());

    // Common registers once per block, channel registers per channel
    assert_eq!(
        dump.iter()
            .filter(|r| r.base == SERV_TWS_BASE && r.name == "sw_reset")
            .count(),
        1
    );
    assert!(dump.iter().any(|r| r.name == "trs_crop_enable[1]"));
    assert!(!dump.iter().any(|r| r.name == "tws_dest[2]"));
}
