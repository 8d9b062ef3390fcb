use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use thiserror::Error;

/// Fixed header size: type (1) + seq (1) + checksum (1) + length (4).
pub const HEADER_LEN: usize = 7;

/// Payload carried by every ACK packet. The ACK checksum covers it.
pub const ACK_PAYLOAD: &[u8] = b"ACK";

/// Sum of payload bytes modulo 256. The header is not covered.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data,
    Ack,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PacketType::Data),
            1 => Some(PacketType::Ack),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            PacketType::Data => 0,
            PacketType::Ack => 1,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Data => write!(f, "DATA"),
            PacketType::Ack => write!(f, "ACK"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("frame of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Truncated { len: usize },
    #[error("declared payload length {declared} does not match actual {actual}")]
    LengthMismatch { declared: i32, actual: usize },
    #[error("unknown packet type byte {0:#04x}")]
    UnknownType(u8),
}

/// The on-wire unit: a 7-byte big-endian header followed by the payload.
///
/// The `length` field is serialized as a signed 32-bit integer for wire
/// compatibility; payloads never approach that range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub seq: u8,
    pub checksum: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a DATA packet, computing the checksum over `payload`.
    pub fn data(seq: u8, payload: Vec<u8>) -> Self {
        Self {
            packet_type: PacketType::Data,
            seq,
            checksum: checksum(&payload),
            payload,
        }
    }

    /// Build an ACK packet carrying the fixed `ACK` payload.
    pub fn ack(seq: u8) -> Self {
        Self {
            packet_type: PacketType::Ack,
            seq,
            checksum: checksum(ACK_PAYLOAD),
            payload: ACK_PAYLOAD.to_vec(),
        }
    }

    /// Whether the stored checksum disagrees with the payload.
    ///
    /// `decode` does not reject corrupt packets; corruption is a protocol
    /// concern, malformedness a codec concern.
    pub fn is_corrupt(&self) -> bool {
        checksum(&self.payload) != self.checksum
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.packet_type.as_byte());
        buf.put_u8(self.seq);
        buf.put_u8(self.checksum);
        buf.put_i32(self.payload.len() as i32);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < HEADER_LEN {
            return Err(WireError::Truncated { len: frame.len() });
        }
        let mut buf = frame;
        let type_byte = buf.get_u8();
        let seq = buf.get_u8();
        let checksum = buf.get_u8();
        let declared = buf.get_i32();

        let packet_type =
            PacketType::from_byte(type_byte).ok_or(WireError::UnknownType(type_byte))?;
        if declared < 0 || declared as usize != buf.remaining() {
            return Err(WireError::LengthMismatch {
                declared,
                actual: buf.remaining(),
            });
        }

        Ok(Self {
            packet_type,
            seq,
            checksum,
            payload: buf.to_vec(),
        })
    }
}

/// Read `(type, seq, declared length)` from a frame header without touching
/// the payload. Used for trace lines, where the declared length is wanted
/// even when it disagrees with the frame.
pub fn peek_header(frame: &[u8]) -> Option<(PacketType, u8, i32)> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    let mut buf = frame;
    let packet_type = PacketType::from_byte(buf.get_u8())?;
    let seq = buf.get_u8();
    buf.get_u8();
    let declared = buf.get_i32();
    Some((packet_type, seq, declared))
}
