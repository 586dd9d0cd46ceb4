//! Packet encoding/decoding
//!
//! A [`Packet`] pairs the fixed header with a typed [`Body`]. Decoding
//! enforces the four framing checks (magic, version, hdr_len, payload bound)
//! and the per-type minimum payload length; everything else is the caller's
//! concern. A recognized header with an unrecognized message type decodes to
//! [`Body::Unknown`] so future message types pass through intact.

use crate::header::Header;
use crate::payload::{Ack, CueFire, CuePrepare, Pong, TimeResp};
use crate::types::{Flags, MsgType, TargetMode};
use crate::{Error, Result, HEADER_SIZE};
use bytes::{Bytes, BytesMut};

/// Typed message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No payload; header `execute_at_ms` carries controller show-time
    Beacon,
    /// No payload; node asks for a precise offset sample
    TimeReq,
    TimeResp(TimeResp),
    CuePrepare(CuePrepare),
    /// Header `execute_at_ms` is the scheduled activation show-time
    CueFire(CueFire),
    CueCancel(CueFire),
    Ping,
    Pong(Pong),
    Ack(Ack),
    /// Valid header, unrecognized message type; raw payload preserved
    Unknown(Bytes),
}

impl Body {
    fn encode_payload(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            Body::Beacon | Body::TimeReq | Body::Ping => {}
            Body::TimeResp(p) => p.encode_to(&mut buf),
            Body::CuePrepare(p) => p.encode_to(&mut buf),
            Body::CueFire(p) | Body::CueCancel(p) => p.encode_to(&mut buf),
            Body::Pong(p) => p.encode_to(&mut buf),
            Body::Ack(p) => p.encode_to(&mut buf),
            Body::Unknown(raw) => buf.extend_from_slice(raw),
        }
        buf
    }
}

/// A complete MLED packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub body: Body,
}

impl Packet {
    /// Pair a header with a body, normalizing `payload_len`
    pub fn new(mut header: Header, body: Body) -> Self {
        header.payload_len = body.encode_payload().len() as u16;
        Self { header, body }
    }

    /// Encode to exactly `32 + payload_len` wire bytes
    pub fn encode(&self) -> Result<Bytes> {
        let payload = self.body.encode_payload();
        if payload.len() > u16::MAX as usize {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let mut header = self.header;
        header.payload_len = payload.len() as u16;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        header.encode_to(&mut buf);
        buf.extend_from_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode and validate a datagram
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = Header::decode(buf)?;

        let end = HEADER_SIZE + header.payload_len as usize;
        if end > buf.len() {
            return Err(Error::TruncatedPayload {
                declared: header.payload_len,
                available: buf.len() - HEADER_SIZE,
            });
        }
        let payload = &buf[HEADER_SIZE..end];

        let body = match header.kind() {
            Some(MsgType::Beacon) => Body::Beacon,
            Some(MsgType::TimeReq) => Body::TimeReq,
            Some(MsgType::TimeResp) => Body::TimeResp(TimeResp::decode(payload)?),
            Some(MsgType::CuePrepare) => Body::CuePrepare(CuePrepare::decode(payload)?),
            Some(MsgType::CueFire) => Body::CueFire(CueFire::decode(payload)?),
            Some(MsgType::CueCancel) => Body::CueCancel(CueFire::decode(payload)?),
            Some(MsgType::Ping) => Body::Ping,
            Some(MsgType::Pong) => Body::Pong(Pong::decode(payload)?),
            Some(MsgType::Ack) => Body::Ack(Ack::decode(payload)?),
            None => Body::Unknown(Bytes::copy_from_slice(payload)),
        };

        Ok(Self { header, body })
    }

    // Builders for the messages each side originates. Senders tweak flags
    // and target on the returned packet where needed.

    pub fn beacon(epoch_id: u32, msg_id: u32, show_ms: u32) -> Self {
        let mut header = Header::new(MsgType::Beacon);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        header.execute_at_ms = show_ms;
        Self::new(header, Body::Beacon)
    }

    pub fn ping(epoch_id: u32, msg_id: u32) -> Self {
        let mut header = Header::new(MsgType::Ping);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        Self::new(header, Body::Ping)
    }

    pub fn time_req(epoch_id: u32, msg_id: u32, sender_id: u32) -> Self {
        let mut header = Header::new(MsgType::TimeReq);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        header.sender_id = sender_id;
        Self::new(header, Body::TimeReq)
    }

    pub fn time_resp(epoch_id: u32, msg_id: u32, target_node: u32, resp: TimeResp) -> Self {
        let mut header = Header::new(MsgType::TimeResp);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        header.target = target_node;
        header.flags = Flags {
            target_mode: TargetMode::Node,
            ack_req: false,
        };
        Self::new(header, Body::TimeResp(resp))
    }

    pub fn cue_prepare(epoch_id: u32, msg_id: u32, prepare: CuePrepare) -> Self {
        let mut header = Header::new(MsgType::CuePrepare);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        Self::new(header, Body::CuePrepare(prepare))
    }

    pub fn cue_fire(epoch_id: u32, msg_id: u32, cue_id: u32, execute_at_ms: u32) -> Self {
        let mut header = Header::new(MsgType::CueFire);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        header.execute_at_ms = execute_at_ms;
        Self::new(header, Body::CueFire(CueFire { cue_id }))
    }

    pub fn cue_cancel(epoch_id: u32, msg_id: u32, cue_id: u32) -> Self {
        let mut header = Header::new(MsgType::CueCancel);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        Self::new(header, Body::CueCancel(CueFire { cue_id }))
    }

    pub fn pong(epoch_id: u32, msg_id: u32, sender_id: u32, pong: Pong) -> Self {
        let mut header = Header::new(MsgType::Pong);
        header.epoch_id = epoch_id;
        header.msg_id = msg_id;
        header.sender_id = sender_id;
        Self::new(header, Body::Pong(pong))
    }

    pub fn ack(epoch_id: u32, sender_id: u32, ack: Ack) -> Self {
        let mut header = Header::new(MsgType::Ack);
        header.epoch_id = epoch_id;
        header.sender_id = sender_id;
        Self::new(header, Body::Ack(ack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Pattern, PatternConfig};

    #[test]
    fn test_beacon_is_header_only() {
        let pkt = Packet::beacon(1, 2, 3);
        let wire = pkt.encode().unwrap();
        assert_eq!(wire.len(), HEADER_SIZE);
        assert_eq!(Packet::decode(&wire).unwrap(), pkt);
    }

    #[test]
    fn test_prepare_length() {
        let prepare = CuePrepare {
            cue_id: 42,
            fade_in_ms: 0,
            fade_out_ms: 0,
            pattern: PatternConfig::new(Pattern::Off, 0),
        };
        let wire = Packet::cue_prepare(1, 2, prepare).encode().unwrap();
        assert_eq!(wire.len(), HEADER_SIZE + 28);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let pkt = Packet::cue_fire(1, 2, 42, 0);
        let wire = pkt.encode().unwrap();
        assert!(matches!(
            Packet::decode(&wire[..wire.len() - 1]),
            Err(Error::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn test_unknown_msg_type_passthrough() {
        let mut header = Header::new(MsgType::Ping);
        header.msg_type = 0x6E;
        let pkt = Packet::new(header, Body::Unknown(Bytes::from_static(b"later")));
        let wire = pkt.encode().unwrap();
        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded, pkt);
        assert_eq!(decoded.header.kind(), None);
    }
}
