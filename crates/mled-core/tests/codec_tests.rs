//! Codec tests for MLED core

use mled_core::{
    Ack, Body, CueFire, CuePrepare, Flags, Header, MsgType, Packet, Pattern, PatternConfig, Pong,
    Rgb, TargetMode, TimeResp, HEADER_SIZE,
};

fn roundtrip(pkt: Packet) {
    let wire = pkt.encode().unwrap();
    assert_eq!(wire.len(), HEADER_SIZE + pkt.header.payload_len as usize);
    let decoded = Packet::decode(&wire).expect("decode failed");
    assert_eq!(decoded, pkt);
}

#[test]
fn test_roundtrip_beacon() {
    roundtrip(Packet::beacon(0xA1B2_C3D4, 17, 98_765));
}

#[test]
fn test_roundtrip_ping_pong() {
    roundtrip(Packet::ping(0, 42));
    roundtrip(Packet::pong(
        9,
        42,
        0x1234_5678,
        Pong {
            uptime_ms: 3_600_000,
            rssi_dbm: -48,
            state_flags: 0x05,
            brightness_pct: 75,
            pattern_type: 4,
            frame_ms: 16,
            active_cue_id: 7,
            controller_epoch: 9,
            show_ms_now: 123_456,
            name: "stage-right".to_string(),
        },
    ));
}

#[test]
fn test_roundtrip_time_exchange() {
    roundtrip(Packet::time_req(5, 1001, 0xCAFE_F00D));
    roundtrip(Packet::time_resp(
        5,
        77,
        0xCAFE_F00D,
        TimeResp {
            req_msg_id: 1001,
            master_rx_show_ms: 5100,
            master_tx_show_ms: 5105,
        },
    ));
}

#[test]
fn test_roundtrip_cue_messages() {
    let prepare = CuePrepare {
        cue_id: 42,
        fade_in_ms: 250,
        fade_out_ms: 500,
        pattern: PatternConfig::new(
            Pattern::Sparkle {
                speed: 10,
                color: Rgb::WHITE,
                density_pct: 30,
                fade_speed: 50,
                color_mode: 2,
                bg: Rgb::BLACK,
            },
            60,
        ),
    };
    let mut pkt = Packet::cue_prepare(3, 8, prepare);
    pkt.header.flags = Flags {
        target_mode: TargetMode::Node,
        ack_req: true,
    };
    pkt.header.target = 0xAB;
    roundtrip(pkt);

    roundtrip(Packet::cue_fire(3, 9, 42, 500_000));
    roundtrip(Packet::cue_cancel(3, 10, 42));
    roundtrip(Packet::ack(
        3,
        0xAB,
        Ack {
            ack_for_msg_id: 8,
            code: 0,
        },
    ));
}

#[test]
fn test_decode_never_panics_on_short_input() {
    for len in 0..HEADER_SIZE {
        assert!(Packet::decode(&vec![0u8; len]).is_err());
    }
}

#[test]
fn test_decode_rejects_framing_violations() {
    let wire = Packet::ping(0, 1).encode().unwrap();

    let mut bad_magic = wire.to_vec();
    bad_magic[2] = b'!';
    assert!(Packet::decode(&bad_magic).is_err());

    let mut bad_version = wire.to_vec();
    bad_version[4] = 0;
    assert!(Packet::decode(&bad_version).is_err());

    let mut bad_hdr_len = wire.to_vec();
    bad_hdr_len[7] = 31;
    assert!(Packet::decode(&bad_hdr_len).is_err());

    // payload_len pointing past the datagram
    let mut overrun = wire.to_vec();
    overrun[28] = 10;
    assert!(Packet::decode(&overrun).is_err());
}

#[test]
fn test_decode_enforces_minimum_payload_per_type() {
    // A PONG framed correctly but with an 8-byte payload is malformed.
    let mut header = Header::new(MsgType::Pong);
    header.payload_len = 8;
    let mut wire = Vec::new();
    {
        use bytes::BufMut;
        let mut buf = bytes::BytesMut::new();
        header.encode_to(&mut buf);
        buf.put_slice(&[0u8; 8]);
        wire.extend_from_slice(&buf);
    }
    assert!(Packet::decode(&wire).is_err());
}

#[test]
fn test_payload_growth_is_forward_compatible() {
    // An ACK with trailing bytes beyond the 8-byte minimum still decodes.
    let pkt = Packet::ack(
        1,
        2,
        Ack {
            ack_for_msg_id: 3,
            code: 0,
        },
    );
    let mut wire = pkt.encode().unwrap().to_vec();
    wire.extend_from_slice(&[0x55; 4]);
    wire[28] = 12; // payload_len now covers the extra bytes
    let decoded = Packet::decode(&wire).unwrap();
    assert_eq!(
        decoded.body,
        Body::Ack(Ack {
            ack_for_msg_id: 3,
            code: 0
        })
    );
}

#[test]
fn test_unknown_message_type_keeps_header_and_payload() {
    let mut header = Header::new(MsgType::Ping);
    header.msg_type = 0x55;
    header.epoch_id = 77;
    let pkt = Packet::new(header, Body::Unknown(bytes::Bytes::from_static(&[1, 2, 3])));
    let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
    assert_eq!(decoded.header.epoch_id, 77);
    assert_eq!(decoded.body, Body::Unknown(bytes::Bytes::from_static(&[1, 2, 3])));
}

#[test]
fn test_fire_payload_matches_cancel_payload() {
    let fire = Packet::cue_fire(1, 2, 9, 0).encode().unwrap();
    let cancel = Packet::cue_cancel(1, 2, 9).encode().unwrap();
    assert_eq!(fire[HEADER_SIZE..], cancel[HEADER_SIZE..]);
    assert_eq!(
        Packet::decode(&cancel).unwrap().body,
        Body::CueCancel(CueFire { cue_id: 9 })
    );
}
