//! MQTT 3.1.1 packet encoding
//!
//! Only what a publish-only sensor needs: CONNECT, PUBLISH at QoS 0,
//! PINGREQ and DISCONNECT going out, CONNACK and the fixed header of
//! anything coming back.

use crate::BoardError;

const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 0x04;
const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;

/// Largest value the variable length encoding can carry
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Control packet types (upper nibble of the first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
}

impl PacketType {
    pub fn from_header(byte: u8) -> Option<Self> {
        let packet_type = match byte >> 4 {
            1 => PacketType::Connect,
            2 => PacketType::ConnAck,
            3 => PacketType::Publish,
            4 => PacketType::PubAck,
            5 => PacketType::PubRec,
            6 => PacketType::PubRel,
            7 => PacketType::PubComp,
            8 => PacketType::Subscribe,
            9 => PacketType::SubAck,
            10 => PacketType::Unsubscribe,
            11 => PacketType::UnsubAck,
            12 => PacketType::PingReq,
            13 => PacketType::PingResp,
            14 => PacketType::Disconnect,
            _ => return None,
        };
        Some(packet_type)
    }
}

/// CONNACK return code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted,
    UnacceptableProtocol,
    IdentifierRejected,
    ServerUnavailable,
    BadCredentials,
    NotAuthorized,
}

impl ConnectReturnCode {
    fn from_byte(byte: u8) -> Result<Self, BoardError> {
        match byte {
            0 => Ok(ConnectReturnCode::Accepted),
            1 => Ok(ConnectReturnCode::UnacceptableProtocol),
            2 => Ok(ConnectReturnCode::IdentifierRejected),
            3 => Ok(ConnectReturnCode::ServerUnavailable),
            4 => Ok(ConnectReturnCode::BadCredentials),
            5 => Ok(ConnectReturnCode::NotAuthorized),
            _ => Err(BoardError::ProtocolError),
        }
    }
}

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
    /// Bytes taken by the fixed header itself
    pub header_len: usize,
}

impl FixedHeader {
    /// Whole packet size on the wire
    pub fn packet_len(&self) -> usize {
        self.header_len + self.remaining_length
    }
}

/// Sequential writer over a caller supplied buffer
struct PacketWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> PacketWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_u8(&mut self, byte: u8) -> Result<(), BoardError> {
        let slot = self.buf.get_mut(self.pos).ok_or(BoardError::ProtocolError)?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }

    fn put_u16(&mut self, value: u16) -> Result<(), BoardError> {
        self.put_bytes(&value.to_be_bytes())
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), BoardError> {
        let end = self.pos + bytes.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(BoardError::ProtocolError)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Length prefixed UTF-8 string
    fn put_str(&mut self, value: &str) -> Result<(), BoardError> {
        let len = u16::try_from(value.len()).map_err(|_| BoardError::ProtocolError)?;
        self.put_u16(len)?;
        self.put_bytes(value.as_bytes())
    }

    fn put_remaining_length(&mut self, len: usize) -> Result<(), BoardError> {
        let mut scratch = [0u8; 4];
        let used = encode_remaining_length(len, &mut scratch)?;
        self.put_bytes(&scratch[..used])
    }

    fn finish(self) -> usize {
        self.pos
    }
}

/// Variable length encoding, 7 bits per byte, least significant first
pub fn encode_remaining_length(mut len: usize, buf: &mut [u8]) -> Result<usize, BoardError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(BoardError::ProtocolError);
    }

    let mut used = 0;
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        *buf.get_mut(used).ok_or(BoardError::ProtocolError)? = byte;
        used += 1;
        if len == 0 {
            return Ok(used);
        }
    }
}

/// Decode a variable length field; returns (value, bytes used)
pub fn decode_remaining_length(data: &[u8]) -> Result<(usize, usize), BoardError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for (i, &byte) in data.iter().take(4).enumerate() {
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }

    Err(BoardError::ProtocolError)
}

/// CONNECT with a clean session and no credentials
pub fn encode_connect(
    buf: &mut [u8],
    client_id: &str,
    keep_alive_secs: u16,
) -> Result<usize, BoardError> {
    let remaining = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id.len();

    let mut writer = PacketWriter::new(buf);
    writer.put_u8(0x10)?;
    writer.put_remaining_length(remaining)?;
    writer.put_u16(PROTOCOL_NAME.len() as u16)?;
    writer.put_bytes(PROTOCOL_NAME)?;
    writer.put_u8(PROTOCOL_LEVEL)?;
    writer.put_u8(CONNECT_FLAG_CLEAN_SESSION)?;
    writer.put_u16(keep_alive_secs)?;
    writer.put_str(client_id)?;
    Ok(writer.finish())
}

/// PUBLISH at QoS 0, not retained
pub fn encode_publish(buf: &mut [u8], topic: &str, payload: &[u8]) -> Result<usize, BoardError> {
    if topic.is_empty() {
        return Err(BoardError::ProtocolError);
    }
    let remaining = 2 + topic.len() + payload.len();

    let mut writer = PacketWriter::new(buf);
    writer.put_u8(0x30)?;
    writer.put_remaining_length(remaining)?;
    writer.put_str(topic)?;
    writer.put_bytes(payload)?;
    Ok(writer.finish())
}

pub fn encode_pingreq(buf: &mut [u8]) -> Result<usize, BoardError> {
    let mut writer = PacketWriter::new(buf);
    writer.put_bytes(&[0xC0, 0x00])?;
    Ok(writer.finish())
}

pub fn encode_disconnect(buf: &mut [u8]) -> Result<usize, BoardError> {
    let mut writer = PacketWriter::new(buf);
    writer.put_bytes(&[0xE0, 0x00])?;
    Ok(writer.finish())
}

/// Parse the fixed header at the start of `data`
pub fn parse_fixed_header(data: &[u8]) -> Result<FixedHeader, BoardError> {
    let first = *data.first().ok_or(BoardError::ProtocolError)?;
    let packet_type = PacketType::from_header(first).ok_or(BoardError::ProtocolError)?;
    let (remaining_length, len_bytes) = decode_remaining_length(&data[1..])?;

    Ok(FixedHeader {
        packet_type,
        flags: first & 0x0F,
        remaining_length,
        header_len: 1 + len_bytes,
    })
}

/// Return code carried by a CONNACK
pub fn decode_connack(data: &[u8]) -> Result<ConnectReturnCode, BoardError> {
    let header = parse_fixed_header(data)?;
    if header.packet_type != PacketType::ConnAck || header.remaining_length != 2 {
        return Err(BoardError::ProtocolError);
    }

    let body = data
        .get(header.header_len..header.packet_len())
        .ok_or(BoardError::ProtocolError)?;
    ConnectReturnCode::from_byte(body[1])
}

/// Walks the complete packets at the start of a received chunk
///
/// Yields one fixed header per whole packet and stops at the first partial
/// or malformed one; [`Packets::remainder`] is what was left unclassified.
pub struct Packets<'a> {
    data: &'a [u8],
}

impl<'a> Packets<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed as whole packets
    pub fn remainder(&self) -> usize {
        self.data.len()
    }
}

impl Iterator for Packets<'_> {
    type Item = FixedHeader;

    fn next(&mut self) -> Option<FixedHeader> {
        let header = parse_fixed_header(self.data).ok()?;
        self.data = self.data.get(header.packet_len()..)?;
        Some(header)
    }
}
