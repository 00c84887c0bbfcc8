// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A complete session on the smallest useful platform: one serializer
//! producer feeding one agent consumer.

use votf_models::registers::{C2agentReg, C2servReg};
use votf_models::test_helpers::{
    AGENT_TRS_BASE, AGENT_TRS_IP, SERV_TWS_BASE, SERV_TWS_IP, agent_trs, cfg_to, create_rig,
    example_records, serv_tws,
};
use votf_models::types::{CfgStatus, FlushStatus, LinkState, RingStatus, Service};

#[test]
fn producer_to_agent_session() {
    let rig = create_rig(file!(), &example_records());
    let (tws, trs) = (serv_tws(0), agent_trs(0));

    assert_eq!(rig.device.create_ring(), Ok(RingStatus::Created));
    assert_eq!(rig.device.check_ring(Service::Tws, SERV_TWS_IP), Ok(true));
    assert_eq!(rig.device.check_ring(Service::Trs, AGENT_TRS_IP), Ok(true));

    assert_eq!(
        rig.device.set_service_cfg(&tws, &cfg_to(&trs)),
        Ok(CfgStatus::Applied)
    );
    assert_eq!(
        rig.bus
            .value(SERV_TWS_BASE, 0x100 + C2servReg::TwsDest.offset()),
        0x200
    );
    assert_eq!(
        rig.device.set_service_cfg(&trs, &cfg_to(&tws)),
        Ok(CfgStatus::Applied)
    );
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Connected));
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Connected));
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsFrameSize.offset()),
        640 * 480
    );

    // Frames flow, then the producer is torn down.
    assert!(rig.hw.set_busy(&tws, true));
    assert_eq!(rig.device.flush(&tws), Ok(FlushStatus::Flushed));
    assert_eq!(rig.bus.writes_to(SERV_TWS_BASE, 0x110), vec![1]);
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Disconnected));
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Disconnected));

    assert_eq!(rig.device.destroy_ring(), Ok(RingStatus::Destroyed));
    assert_eq!(rig.device.ring_request(), 0);
    assert_eq!(rig.device.check_ring(Service::Tws, SERV_TWS_IP), Ok(false));
    assert_eq!(rig.device.check_ring(Service::Trs, AGENT_TRS_IP), Ok(false));
}
