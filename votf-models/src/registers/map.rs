// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Register maps for the serializer and agent personalities.
//!
//! Offsets are those of the simulated blocks.

use crate::build_register_map;

build_register_map! {
    /// Serializer-class (C2SERV) registers.
    C2serv ;
    c2com_local_ip: Common @ 0x00,
    c2com_ring_clk_en: Common @ 0x04,
    c2com_ring_enable: Common @ 0x08,
    selregister: Common @ 0x0c,
    selregistermode: Common @ 0x10,
    sw_reset: Common @ 0x14,
    sw_core_reset: Common @ 0x18,
    /// Debug port select: `en | id << 1 | sel << 5`.
    c2com_debug: Common @ 0x1c,
    c2com_debug_dout: Common @ 0x20,
    votf_pkt_data: Common @ 0x24,

    tws_enable: Tws @ 0x00,
    tws_limit: Tws @ 0x04,
    /// `connected_ip << 4 | connected_id`
    tws_dest: Tws @ 0x08,
    tws_lines_in_token: Tws @ 0x0c,
    tws_flush: Tws @ 0x10,
    tws_busy: Tws @ 0x14,

    trs_enable: Trs @ 0x00,
    trs_limit: Trs @ 0x04,
    trs_lines_in_token: Trs @ 0x08,
    trs_lines_in_first_token: Trs @ 0x0c,
    trs_lines_count: Trs @ 0x10,
    trs_flush: Trs @ 0x14,
    trs_busy: Trs @ 0x18,
    trs_connection_lost_recover_enable: Trs @ 0x1c,
}

build_register_map! {
    /// Agent-class (C2AGENT) registers.
    C2agent ;
    c2com_local_ip: Common @ 0x00,
    c2com_ring_clk_en: Common @ 0x04,
    c2com_ring_enable: Common @ 0x08,
    selregister: Common @ 0x0c,
    selregistermode: Common @ 0x10,
    sw_reset: Common @ 0x14,
    sw_core_reset: Common @ 0x18,

    tws_enable: Tws @ 0x00,
    tws_limit: Tws @ 0x04,
    tws_dest: Tws @ 0x08,
    tws_token_size: Tws @ 0x0c,
    tws_flush: Tws @ 0x10,
    tws_busy: Tws @ 0x14,
    tws_start: Tws @ 0x18,
    tws_finish: Tws @ 0x1c,
    tws_high_threshold: Tws @ 0x20,
    tws_low_threshold: Tws @ 0x24,
    tws_fullness: Tws @ 0x28,
    tws_irq_enable: Tws @ 0x2c,
    tws_irq_status: Tws @ 0x30,
    tws_irq: Tws @ 0x34,
    tws_irq_clear: Tws @ 0x38,

    trs_enable: Trs @ 0x00,
    trs_limit: Trs @ 0x04,
    trs_token_size: Trs @ 0x08,
    trs_frame_size: Trs @ 0x0c,
    trs_crop_first_token_size: Trs @ 0x10,
    trs_crop_tokens_start: Trs @ 0x14,
    trs_crop_enable: Trs @ 0x18,
    trs_busy: Trs @ 0x1c,
    trs_start: Trs @ 0x20,
    trs_finish: Trs @ 0x24,
    trs_high_threshold: Trs @ 0x28,
    trs_low_threshold: Trs @ 0x2c,
    trs_read_bytes: Trs @ 0x30,
    trs_fullness: Trs @ 0x34,
    trs_irq_enable: Trs @ 0x38,
    trs_irq_status: Trs @ 0x3c,
    trs_irq: Trs @ 0x40,
    trs_irq_clear: Trs @ 0x44,
}

build_register_map! {
    /// Wrapper block registers.
    Wrapper ;
    /// Write `0x11` to reset, reads back zero once complete.
    swrst: Wrapper @ 0x00,
}
