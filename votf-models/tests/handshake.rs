// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use votf_models::registers::{C2agentReg, C2servReg};
use votf_models::test_helpers::{
    AGENT_TRS_BASE, AGENT_TRS_IP, SERV_TRS_BASE, SERV_TWS_BASE, SERV_TWS_IP, agent_trs, cfg_to,
    serv_trs, serv_tws, standard_rig,
};
use votf_models::types::{
    CfgStatus, Endpoint, LinkState, OPTION_CHANGE, OPTION_COUNT, ResetKind, Service,
    TransferMode, VotfError,
};

#[test]
fn producer_first() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), agent_trs(0));

    assert_eq!(
        rig.device.set_service_cfg(&tws, &cfg_to(&trs)),
        Ok(CfgStatus::Applied)
    );
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Ready));
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Disconnected));

    assert_eq!(
        rig.device.set_service_cfg(&trs, &cfg_to(&tws)),
        Ok(CfgStatus::Applied)
    );
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Connected));
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Connected));
}

#[test]
fn consumer_first() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(1), agent_trs(1));

    rig.device.set_service_cfg(&trs, &cfg_to(&tws)).unwrap();
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Ready));
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Disconnected));

    rig.device.set_service_cfg(&tws, &cfg_to(&trs)).unwrap();
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Connected));
    assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Connected));

    let recorded = rig.device.recorded_cfg(&trs).unwrap();
    assert_eq!(recorded.connected_ip, SERV_TWS_IP);
    assert_eq!(recorded.connected_id, 1);
}

#[test]
fn consumer_checks_producer_destination() {
    let rig = standard_rig(file!());
    let tws = serv_tws(0);

    // Producer points at consumer channel 1
    rig.device
        .set_service_cfg(&tws, &cfg_to(&agent_trs(1)))
        .unwrap();

    // Consumer channel 0 claims the producer, which does not point back.
    rig.device
        .set_service_cfg(&agent_trs(0), &cfg_to(&tws))
        .unwrap();
    assert_eq!(rig.device.link_state(&agent_trs(0)), Ok(LinkState::Ready));
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Ready));

    rig.device
        .set_service_cfg(&agent_trs(1), &cfg_to(&tws))
        .unwrap();
    assert_eq!(rig.device.link_state(&agent_trs(1)), Ok(LinkState::Connected));
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Connected));
    assert_eq!(rig.device.link_state(&agent_trs(0)), Ok(LinkState::Ready));
}

#[test]
fn connected_link_is_not_reconfigured() {
    let rig = standard_rig(file!());
    let (tws, trs) = (serv_tws(0), agent_trs(0));
    let dest = 0x100 + C2servReg::TwsDest.offset();

    rig.device.set_service_cfg(&tws, &cfg_to(&trs)).unwrap();
    rig.device.set_service_cfg(&trs, &cfg_to(&tws)).unwrap();
    assert_eq!(rig.bus.value(SERV_TWS_BASE, dest), AGENT_TRS_IP << 4);

    let elsewhere = cfg_to(&agent_trs(1));
    assert_eq!(
        rig.device.set_service_cfg(&tws, &elsewhere),
        Ok(CfgStatus::AlreadyConnected)
    );
    assert_eq!(
        rig.device.set_service_cfg(&trs, &cfg_to(&serv_tws(1))),
        Ok(CfgStatus::AlreadyConnected)
    );
    assert_eq!(rig.device.recorded_cfg(&tws).unwrap().connected_id, 0);
    assert_eq!(rig.bus.writes_to(SERV_TWS_BASE, dest).len(), 1);

    // Producer 1 declares a consumer that is already connected
    assert_eq!(
        rig.device.set_service_cfg(&serv_tws(1), &cfg_to(&trs)),
        Ok(CfgStatus::AlreadyConnected)
    );
    assert_eq!(
        rig.device.link_state(&serv_tws(1)),
        Ok(LinkState::Disconnected)
    );

    let change = ServiceCfgExt::with_option(elsewhere, OPTION_CHANGE);
    assert_eq!(
        rig.device.set_service_cfg(&tws, &change),
        Ok(CfgStatus::Applied)
    );
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Ready));
    assert_eq!(rig.bus.value(SERV_TWS_BASE, dest), (AGENT_TRS_IP << 4) | 1);
}

trait ServiceCfgExt {
    fn with_option(self, option: u32) -> Self;
}

impl ServiceCfgExt for votf_models::types::ServiceCfg {
    fn with_option(mut self, option: u32) -> Self {
        self.option = option;
        self
    }
}

#[test]
fn agent_consumer_sizes() {
    let rig = standard_rig(file!());
    let trs = agent_trs(0);
    rig.device.set_service_cfg(&trs, &cfg_to(&serv_tws(0))).unwrap();

    let token = 8 * 640 * 4 / 8;
    let frame = 8 * 640 * 480 / 8;
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsTokenSize.offset()),
        token
    );
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsCropFirstTokenSize.offset()),
        token
    );
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsFrameSize.offset()),
        frame
    );
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsLimit.offset()),
        0xff
    );
    // Recorded in lines
    assert_eq!(rig.device.recorded_cfg(&trs).unwrap().token_size, 4);
}

#[test]
fn serializer_consumer_sizes() {
    let rig = standard_rig(file!());
    let trs = serv_trs(1);
    rig.device.set_service_cfg(&trs, &cfg_to(&serv_tws(1))).unwrap();

    let start = 0x400 + 0x20;
    assert_eq!(
        rig.bus
            .value(SERV_TRS_BASE, start + C2servReg::TrsLinesInToken.offset()),
        4
    );
    assert_eq!(
        rig.bus
            .value(SERV_TRS_BASE, start + C2servReg::TrsLinesInFirstToken.offset()),
        4
    );
    assert_eq!(
        rig.bus
            .value(SERV_TRS_BASE, start + C2servReg::TrsLinesCount.offset()),
        480
    );
    assert_eq!(
        rig.bus
            .value(SERV_TRS_BASE, start + C2servReg::TrsEnable.offset()),
        1
    );
}

#[test]
fn producer_writes_token_in_lines() {
    let rig = standard_rig(file!());
    rig.device
        .set_service_cfg(&serv_tws(0), &cfg_to(&serv_trs(0)))
        .unwrap();
    assert_eq!(
        rig.bus
            .value(SERV_TWS_BASE, 0x100 + C2servReg::TwsLinesInToken.offset()),
        4
    );
    let recorded = rig.device.recorded_cfg(&serv_tws(0)).unwrap();
    assert!(recorded.enable);
    assert_eq!(recorded.limit, 0xff);
}

#[test]
fn token_size_from_transfer_mode() {
    // (mode, producer lines, consumer lines)
    let expected = [
        (TransferMode::Normal, 1, 1),
        (TransferMode::FrameRateScaled, 40, 40),
        (TransferMode::HeightX2, 1, 2),
    ];
    for (mode, tws_lines, trs_lines) in expected {
        let rig = standard_rig(file!());
        let tws = serv_tws(0).with_mode(mode);
        let trs = serv_trs(0).with_mode(mode);
        let mut to_trs = cfg_to(&trs);
        to_trs.token_size = 0;
        let mut to_tws = cfg_to(&tws);
        to_tws.token_size = 0;

        rig.device.set_service_cfg(&tws, &to_trs).unwrap();
        rig.device.set_service_cfg(&trs, &to_tws).unwrap();

        assert_eq!(
            rig.bus
                .value(SERV_TWS_BASE, 0x100 + C2servReg::TwsLinesInToken.offset()),
            tws_lines,
            "{mode:?}"
        );
        assert_eq!(
            rig.bus
                .value(SERV_TRS_BASE, 0x400 + C2servReg::TrsLinesInToken.offset()),
            trs_lines,
            "{mode:?}"
        );
        assert_eq!(
            rig.device.recorded_cfg(&trs).unwrap().token_size,
            trs_lines
        );
    }
}

#[test]
fn agent_token_bytes_follow_transfer_mode() {
    let rig = standard_rig(file!());
    let trs = agent_trs(0).with_mode(TransferMode::HeightX2);
    let mut cfg = cfg_to(&serv_tws(0));
    cfg.token_size = 0;
    rig.device.set_service_cfg(&trs, &cfg).unwrap();

    // Two lines of 640 8-bit pixels
    assert_eq!(
        rig.bus
            .value(AGENT_TRS_BASE, 0x800 + C2agentReg::TrsTokenSize.offset()),
        8 * 640 * 2 / 8
    );
}

#[test]
fn standalone_cfg_uses_transfer_mode() {
    let rig = standard_rig(file!());
    let tws = serv_tws(1).with_mode(TransferMode::FrameRateScaled);
    let mut cfg = cfg_to(&agent_trs(1));
    cfg.token_size = 0;
    rig.device.set_service_cfg_alone(&tws, &cfg).unwrap();

    assert_eq!(
        rig.bus
            .value(SERV_TWS_BASE, 0x100 + 0x1c + C2servReg::TwsLinesInToken.offset()),
        40
    );
}

#[test]
fn invalid_endpoint_and_peer() {
    let rig = standard_rig(file!());
    let unknown = Endpoint::new(Service::Tws, 0x99, 0);
    assert_eq!(
        rig.device.set_service_cfg(&unknown, &cfg_to(&agent_trs(0))),
        Err(VotfError::InvalidEndpoint(unknown))
    );

    // Channel 2 is not configured
    let out_of_range = Endpoint::new(Service::Tws, SERV_TWS_IP, 2);
    assert!(matches!(
        rig.device.set_service_cfg(&out_of_range, &cfg_to(&agent_trs(0))),
        Err(VotfError::InvalidEndpoint(_))
    ));

    let tws = serv_tws(0);
    let mut cfg = cfg_to(&agent_trs(0));
    cfg.connected_ip = 0x77;
    cfg.option = OPTION_COUNT;
    assert_eq!(
        rig.device.set_service_cfg(&tws, &cfg),
        Err(VotfError::InvalidPeer {
            endpoint: tws,
            peer: Endpoint::new(Service::Trs, 0x77, 0)
        })
    );
    assert_eq!(rig.device.id_enable_count(&tws), Ok(0));
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Disconnected));
}

#[test]
fn count_option() {
    let rig = standard_rig(file!());
    let tws = serv_tws(0);
    let mut cfg = cfg_to(&agent_trs(0));
    cfg.option = OPTION_COUNT;

    rig.device.set_service_cfg(&tws, &cfg).unwrap();
    rig.device.set_service_cfg(&tws, &cfg).unwrap();
    assert_eq!(rig.device.id_enable_count(&tws), Ok(2));
}

#[test]
fn standalone_cfg() {
    let rig = standard_rig(file!());
    let tws = serv_tws(1);
    let mut cfg = cfg_to(&agent_trs(1));
    cfg.token_size = 7;
    rig.device.set_service_cfg_alone(&tws, &cfg).unwrap();

    let start = 0x100 + 0x1c;
    assert_eq!(
        rig.bus
            .value(SERV_TWS_BASE, start + C2servReg::TwsDest.offset()),
        (AGENT_TRS_IP << 4) | 1
    );
    assert_eq!(
        rig.bus
            .value(SERV_TWS_BASE, start + C2servReg::TwsLinesInToken.offset()),
        7
    );
    assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Disconnected));
    assert_eq!(rig.device.recorded_cfg(&tws).unwrap().token_size, 7);
}

#[test]
fn reset_disconnects_both_sides() {
    for kind in [ResetKind::Full, ResetKind::Core] {
        let rig = standard_rig(file!());
        let (tws, trs) = (serv_tws(0), agent_trs(0));
        rig.device.set_service_cfg(&tws, &cfg_to(&trs)).unwrap();
        rig.device.set_service_cfg(&trs, &cfg_to(&tws)).unwrap();

        rig.device.reset(&trs, kind).unwrap();
        assert_eq!(rig.device.link_state(&tws), Ok(LinkState::Disconnected));
        assert_eq!(rig.device.link_state(&trs), Ok(LinkState::Disconnected));

        let (serv_reg, agent_reg) = match kind {
            ResetKind::Full => (C2servReg::SwReset, C2agentReg::SwReset),
            ResetKind::Core => (C2servReg::SwCoreReset, C2agentReg::SwCoreReset),
        };
        assert_eq!(
            rig.bus.writes_to(SERV_TWS_BASE, serv_reg.offset()),
            vec![1]
        );
        assert_eq!(
            rig.bus.writes_to(AGENT_TRS_BASE, agent_reg.offset()),
            vec![1]
        );
    }
}

#[test]
fn reset_without_peer() {
    let rig = standard_rig(file!());
    let tws = serv_tws(0);
    rig.device.reset(&tws, ResetKind::Full).unwrap();
    assert_eq!(
        rig.bus
            .writes_to(SERV_TWS_BASE, C2servReg::SwReset.offset()),
        vec![1]
    );
    assert!(
        rig.bus
            .writes_to(AGENT_TRS_BASE, C2agentReg::SwReset.offset())
            .is_empty()
    );
}
