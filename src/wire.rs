//! # MQTT 3.1.1 Wire Format
//!
//! Parsing and serialization of standard MQTT control packets. The transport parses the
//! bytes an MQTT client hands to its send hook, and serializes the packets it rebuilds
//! from compact BLE messages so the client can read them back as an ordinary byte
//! stream.

use alloc::vec::Vec;

use crate::error::{MqttBleError, ParameterError};
use crate::packet::{
    ConnAck, Connect, ConnectReturnCode, MqttPacket, PacketType, PubAck, Publish, QoS,
    RawPacket, SubAck, Subscribe, Subscription, UnsubAck, Unsubscribe,
};
use crate::util::{
    read_binary, read_u16, read_utf8_string, read_variable_byte_integer, try_vec,
    variable_byte_integer_len, write_binary, write_u16, write_utf8_string,
    write_variable_byte_integer,
};

/// Name of the protocol in the CONNECT variable header.
const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level of MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

const CONNECT_FLAG_RESERVED: u8 = 0x01;
const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;
const CONNECT_FLAG_WILL: u8 = 0x04;
const CONNECT_FLAG_WILL_RETAIN: u8 = 0x20;
const CONNECT_FLAG_PASSWORD: u8 = 0x40;
const CONNECT_FLAG_USERNAME: u8 = 0x80;

const PUBLISH_FLAG_RETAIN: u8 = 0x01;
const PUBLISH_FLAG_DUP: u8 = 0x08;

/// Fixed-header flags MQTT 3.1.1 mandates for SUBSCRIBE, UNSUBSCRIBE and PUBREL.
const FLAGS_RESERVED_0010: u8 = 0x02;

/// SUBACK return code for a refused subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// A trait for packets that can be encoded into MQTT wire format.
pub trait EncodePacket {
    /// Total number of bytes the encoded packet occupies, fixed header included.
    fn encoded_len(&self) -> usize;

    /// Writes the packet into `buf` and returns the number of bytes written.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError>;
}

/// A trait for packets that can be decoded from MQTT wire format.
///
/// `buf` holds one whole packet, starting at its fixed header. Grammar violations come
/// back as [`MqttBleError::BadParameter`]; packets that own a list report
/// [`MqttBleError::NoMemory`] when it cannot be allocated.
pub trait DecodePacket<'a>: Sized {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError>;
}

/// The decoded fixed header of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    /// The lower nibble of the first byte.
    pub flags: u8,
    pub remaining_length: usize,
    /// Size of the fixed header itself, first byte and remaining-length field.
    pub header_len: usize,
}

impl FixedHeader {
    /// Reads the fixed header at the start of `buf`.
    pub fn read(buf: &[u8]) -> Result<Self, ParameterError> {
        let first = *buf.first().ok_or(ParameterError::MalformedPacket)?;
        let packet_type =
            PacketType::from_header(first).ok_or(ParameterError::UnsupportedPacketType(first >> 4))?;
        let mut cursor = 1;
        let remaining_length = read_variable_byte_integer(&mut cursor, buf)?;
        Ok(Self {
            packet_type,
            flags: first & 0x0F,
            remaining_length,
            header_len: cursor,
        })
    }

    /// Total size of the packet this header announces.
    pub fn packet_len(&self) -> usize {
        self.header_len + self.remaining_length
    }
}

/// Splits `buf` into its fixed header and a descriptor over the remaining data.
///
/// The buffer must hold the whole packet.
pub fn split_packet(buf: &[u8]) -> Result<(FixedHeader, RawPacket<'_>), ParameterError> {
    let header = FixedHeader::read(buf)?;
    let body = buf
        .get(header.header_len..header.packet_len())
        .ok_or(ParameterError::MalformedPacket)?;
    if buf.len() != header.packet_len() {
        return Err(ParameterError::MalformedPacket);
    }
    Ok((header, RawPacket::new(header.packet_type, body)))
}

fn expect_header(
    buf: &[u8],
    packet_type: PacketType,
    flags: u8,
) -> Result<(FixedHeader, RawPacket<'_>), ParameterError> {
    let (header, raw) = split_packet(buf)?;
    if header.packet_type != packet_type || header.flags != flags {
        return Err(ParameterError::MalformedPacket);
    }
    Ok((header, raw))
}

fn write_fixed_header(
    cursor: &mut usize,
    buf: &mut [u8],
    first_byte: u8,
    remaining_length: usize,
) -> Result<(), ParameterError> {
    *buf.get_mut(*cursor).ok_or(ParameterError::BufferTooSmall)? = first_byte;
    *cursor += 1;
    write_variable_byte_integer(cursor, buf, remaining_length)
}

fn packet_len(remaining_length: usize) -> usize {
    1 + variable_byte_integer_len(remaining_length) + remaining_length
}

fn ensure_capacity(buf: &[u8], needed: usize) -> Result<(), ParameterError> {
    if buf.len() < needed {
        return Err(ParameterError::BufferTooSmall);
    }
    Ok(())
}

fn non_zero_packet_id(id: u16) -> Result<u16, ParameterError> {
    if id == 0 {
        return Err(ParameterError::MissingPacketId);
    }
    Ok(id)
}

// --- CONNECT ---

/// Parses a CONNECT packet.
///
/// Will topic and will message are read to keep the cursor in step but are not
/// returned: BLE has no field to carry them.
pub fn parse_connect(buf: &[u8]) -> Result<Connect<'_>, ParameterError> {
    let (_, raw) = expect_header(buf, PacketType::Connect, 0)?;
    let body = raw.remaining_data;
    let mut cursor = 0;

    if read_utf8_string(&mut cursor, body)? != PROTOCOL_NAME {
        return Err(ParameterError::MalformedPacket);
    }
    let level = *body.get(cursor).ok_or(ParameterError::MalformedPacket)?;
    if level != PROTOCOL_LEVEL {
        return Err(ParameterError::UnsupportedProtocolLevel(level));
    }
    cursor += 1;

    let flags = *body.get(cursor).ok_or(ParameterError::MalformedPacket)?;
    cursor += 1;
    if flags & CONNECT_FLAG_RESERVED != 0 {
        return Err(ParameterError::ReservedFlagSet);
    }
    let has_will = flags & CONNECT_FLAG_WILL != 0;
    let will_qos = (flags >> 3) & 0x03;
    let will_retain = flags & CONNECT_FLAG_WILL_RETAIN != 0;
    let has_username = flags & CONNECT_FLAG_USERNAME != 0;
    let has_password = flags & CONNECT_FLAG_PASSWORD != 0;
    if will_qos > 1 {
        return Err(ParameterError::UnsupportedQos(will_qos));
    }
    if !has_will && (will_qos != 0 || will_retain) {
        return Err(ParameterError::MalformedPacket);
    }
    if has_password && !has_username {
        return Err(ParameterError::MalformedPacket);
    }

    let keep_alive = read_u16(&mut cursor, body)?;

    let client_id = read_utf8_string(&mut cursor, body)?;
    if client_id.is_empty() {
        return Err(ParameterError::MissingClientId);
    }

    if has_will {
        let will_topic = read_utf8_string(&mut cursor, body)?;
        let will_message = read_binary(&mut cursor, body)?;
        if will_topic.is_empty() || will_message.is_empty() {
            return Err(ParameterError::EmptyField);
        }
        warn!("Will message is not forwarded over BLE.");
    }

    let username = if has_username {
        let username = read_utf8_string(&mut cursor, body)?;
        if username.is_empty() {
            return Err(ParameterError::EmptyField);
        }
        Some(username)
    } else {
        None
    };

    let password = if has_password {
        let password = read_binary(&mut cursor, body)?;
        if password.is_empty() {
            return Err(ParameterError::EmptyField);
        }
        Some(password)
    } else {
        None
    };

    if cursor != body.len() {
        return Err(ParameterError::MalformedPacket);
    }

    Ok(Connect {
        clean_session: flags & CONNECT_FLAG_CLEAN_SESSION != 0,
        keep_alive,
        client_id,
        username,
        password,
    })
}

impl<'a> DecodePacket<'a> for Connect<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        Ok(parse_connect(buf)?)
    }
}

impl Connect<'_> {
    fn remaining_length(&self) -> usize {
        let mut len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + self.client_id.len();
        if let Some(username) = self.username {
            len += 2 + username.len();
        }
        if let Some(password) = self.password {
            len += 2 + password.len();
        }
        len
    }
}

impl EncodePacket for Connect<'_> {
    fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        if self.password.is_some() && self.username.is_none() {
            return Err(ParameterError::MalformedPacket);
        }
        ensure_capacity(buf, self.encoded_len())?;
        let mut cursor = 0;
        write_fixed_header(&mut cursor, buf, 0x10, self.remaining_length())?;
        write_utf8_string(&mut cursor, buf, PROTOCOL_NAME)?;
        buf[cursor] = PROTOCOL_LEVEL;
        cursor += 1;

        let mut flags = 0;
        if self.clean_session {
            flags |= CONNECT_FLAG_CLEAN_SESSION;
        }
        if self.username.is_some() {
            flags |= CONNECT_FLAG_USERNAME;
        }
        if self.password.is_some() {
            flags |= CONNECT_FLAG_PASSWORD;
        }
        buf[cursor] = flags;
        cursor += 1;

        write_u16(&mut cursor, buf, self.keep_alive)?;
        write_utf8_string(&mut cursor, buf, self.client_id)?;
        if let Some(username) = self.username {
            write_utf8_string(&mut cursor, buf, username)?;
        }
        if let Some(password) = self.password {
            write_binary(&mut cursor, buf, password)?;
        }
        Ok(cursor)
    }
}

// --- CONNACK ---

impl<'a> DecodePacket<'a> for ConnAck {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        let (_, raw) = expect_header(buf, PacketType::ConnAck, 0)?;
        match raw.remaining_data {
            [ack_flags, return_code] if ack_flags & 0xFE == 0 => Ok(ConnAck {
                session_present: ack_flags & 0x01 != 0,
                return_code: ConnectReturnCode::from(*return_code),
            }),
            _ => Err(ParameterError::MalformedPacket.into()),
        }
    }
}

impl EncodePacket for ConnAck {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        ensure_capacity(buf, 4)?;
        buf[..4].copy_from_slice(&[
            0x20,
            0x02,
            u8::from(self.session_present),
            u8::from(self.return_code),
        ]);
        Ok(4)
    }
}

// --- PUBLISH ---

/// A PUBLISH as parsed from one send call.
///
/// `publish.payload` holds the payload bytes present in the buffer, which may be fewer
/// than `payload_len` when the client delivers the payload in a later call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPublish<'a> {
    pub publish: Publish<'a>,
    /// Payload size announced by the remaining length.
    pub payload_len: usize,
}

impl ParsedPublish<'_> {
    pub fn is_complete(&self) -> bool {
        self.publish.payload.len() == self.payload_len
    }

    /// Number of payload bytes still to arrive.
    pub fn missing(&self) -> usize {
        self.payload_len - self.publish.payload.len()
    }
}

/// Parses a PUBLISH whose payload may be absent or partial.
///
/// The fixed and variable headers must be complete. Bytes beyond the announced
/// remaining length are rejected.
pub fn parse_publish(buf: &[u8]) -> Result<ParsedPublish<'_>, ParameterError> {
    let header = FixedHeader::read(buf)?;
    if header.packet_type != PacketType::Publish {
        return Err(ParameterError::MalformedPacket);
    }
    let qos = match (header.flags >> 1) & 0x03 {
        3 => return Err(ParameterError::MalformedPacket),
        level => QoS::try_from(level)?,
    };
    let dup = header.flags & PUBLISH_FLAG_DUP != 0;
    let retain = header.flags & PUBLISH_FLAG_RETAIN != 0;
    if qos == QoS::AtMostOnce && dup {
        return Err(ParameterError::MalformedPacket);
    }

    let mut cursor = header.header_len;
    let topic = read_utf8_string(&mut cursor, buf)?;
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        QoS::AtLeastOnce => Some(non_zero_packet_id(read_u16(&mut cursor, buf)?)?),
    };

    let variable_header_len = cursor - header.header_len;
    let payload_len = header
        .remaining_length
        .checked_sub(variable_header_len)
        .ok_or(ParameterError::MalformedPacket)?;
    let payload = &buf[cursor..];
    if payload.len() > payload_len {
        return Err(ParameterError::MalformedPacket);
    }

    Ok(ParsedPublish {
        publish: Publish {
            topic,
            qos,
            retain,
            dup,
            packet_id,
            payload,
        },
        payload_len,
    })
}

impl<'a> DecodePacket<'a> for Publish<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        let parsed = parse_publish(buf)?;
        if !parsed.is_complete() {
            return Err(ParameterError::MalformedPacket.into());
        }
        Ok(parsed.publish)
    }
}

impl Publish<'_> {
    fn remaining_length(&self) -> usize {
        let id_len = if self.qos == QoS::AtLeastOnce { 2 } else { 0 };
        2 + self.topic.len() + id_len + self.payload.len()
    }

    fn first_byte(&self) -> u8 {
        let mut first = 0x30 | ((self.qos as u8) << 1);
        if self.dup {
            first |= PUBLISH_FLAG_DUP;
        }
        if self.retain {
            first |= PUBLISH_FLAG_RETAIN;
        }
        first
    }

    /// Size of the fixed and variable headers, everything but the payload.
    pub fn header_len(&self) -> usize {
        self.encoded_len() - self.payload.len()
    }

    /// Writes the fixed and variable headers only.
    ///
    /// The remaining length still accounts for the payload, which the caller delivers
    /// separately.
    pub fn encode_header(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        self.validate()?;
        ensure_capacity(buf, self.header_len())?;
        let mut cursor = 0;
        write_fixed_header(&mut cursor, buf, self.first_byte(), self.remaining_length())?;
        write_utf8_string(&mut cursor, buf, self.topic)?;
        if let (QoS::AtLeastOnce, Some(id)) = (self.qos, self.packet_id) {
            write_u16(&mut cursor, buf, id)?;
        }
        Ok(cursor)
    }
}

impl EncodePacket for Publish<'_> {
    fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        ensure_capacity(buf, self.encoded_len())?;
        let cursor = self.encode_header(buf)?;
        let end = cursor + self.payload.len();
        buf[cursor..end].copy_from_slice(self.payload);
        Ok(end)
    }
}

// --- PUBACK ---

/// Parses a PUBACK; the remaining length must be exactly two.
pub fn parse_puback(buf: &[u8]) -> Result<PubAck, ParameterError> {
    let (_, raw) = expect_header(buf, PacketType::PubAck, 0)?;
    if raw.remaining_length != 2 {
        return Err(ParameterError::MalformedPacket);
    }
    let mut cursor = 0;
    let packet_id = non_zero_packet_id(read_u16(&mut cursor, raw.remaining_data)?)?;
    Ok(PubAck { packet_id })
}

impl<'a> DecodePacket<'a> for PubAck {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        Ok(parse_puback(buf)?)
    }
}

fn encode_id_only(buf: &mut [u8], first_byte: u8, packet_id: u16) -> Result<usize, ParameterError> {
    ensure_capacity(buf, 4)?;
    let mut cursor = 0;
    write_fixed_header(&mut cursor, buf, first_byte, 2)?;
    write_u16(&mut cursor, buf, packet_id)?;
    Ok(cursor)
}

impl EncodePacket for PubAck {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        encode_id_only(buf, 0x40, self.packet_id)
    }
}

// --- SUBSCRIBE / UNSUBSCRIBE ---

/// Counts the topic filters in a SUBSCRIBE or UNSUBSCRIBE payload.
///
/// `payload` starts right after the packet identifier. With `subscribe` set, every
/// filter is followed by one requested-QoS byte.
pub fn count_subscriptions(payload: &[u8], subscribe: bool) -> Result<usize, ParameterError> {
    let entry_suffix = usize::from(subscribe);
    let mut cursor = 0;
    let mut count = 0;
    while cursor < payload.len() {
        let _ = read_binary(&mut cursor, payload)?;
        cursor += entry_suffix;
        if cursor > payload.len() {
            return Err(ParameterError::MalformedPacket);
        }
        count += 1;
    }
    Ok(count)
}

/// Packet identifier and validated topic-filter entries of a SUBSCRIBE or UNSUBSCRIBE.
struct FilterList<'a> {
    packet_id: u16,
    entries: &'a [u8],
    count: usize,
}

fn read_filter_list(buf: &[u8], subscribe: bool) -> Result<FilterList<'_>, ParameterError> {
    let packet_type = if subscribe {
        PacketType::Subscribe
    } else {
        PacketType::Unsubscribe
    };
    let (_, raw) = expect_header(buf, packet_type, FLAGS_RESERVED_0010)?;
    let body = raw.remaining_data;
    let mut cursor = 0;
    let packet_id = non_zero_packet_id(read_u16(&mut cursor, body)?)?;

    let entries = &body[cursor..];
    let count = count_subscriptions(entries, subscribe)?;
    if count == 0 {
        return Err(ParameterError::EmptySubscriptionList);
    }
    Ok(FilterList {
        packet_id,
        entries,
        count,
    })
}

/// Parses a SUBSCRIBE; any topic requesting QoS 2 is rejected.
pub fn parse_subscribe(buf: &[u8]) -> Result<Subscribe<'_>, MqttBleError> {
    let list = read_filter_list(buf, true)?;
    let mut subscriptions = try_vec(list.count)?;
    let mut cursor = 0;
    for _ in 0..list.count {
        let topic_filter = read_utf8_string(&mut cursor, list.entries)?;
        let requested = list.entries[cursor];
        cursor += 1;
        if requested & 0xFC != 0 {
            return Err(ParameterError::MalformedPacket.into());
        }
        let qos = QoS::try_from(requested)?;
        subscriptions.push(Subscription { topic_filter, qos });
    }
    Ok(Subscribe {
        packet_id: list.packet_id,
        subscriptions,
    })
}

/// Parses an UNSUBSCRIBE.
pub fn parse_unsubscribe(buf: &[u8]) -> Result<Unsubscribe<'_>, MqttBleError> {
    let list = read_filter_list(buf, false)?;
    let mut topic_filters = try_vec(list.count)?;
    let mut cursor = 0;
    for _ in 0..list.count {
        topic_filters.push(read_utf8_string(&mut cursor, list.entries)?);
    }
    Ok(Unsubscribe {
        packet_id: list.packet_id,
        topic_filters,
    })
}

impl<'a> DecodePacket<'a> for Subscribe<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        parse_subscribe(buf)
    }
}

impl<'a> DecodePacket<'a> for Unsubscribe<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        parse_unsubscribe(buf)
    }
}

impl Subscribe<'_> {
    fn remaining_length(&self) -> usize {
        2 + self
            .subscriptions
            .iter()
            .map(|s| 2 + s.topic_filter.len() + 1)
            .sum::<usize>()
    }
}

impl EncodePacket for Subscribe<'_> {
    fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        if self.subscriptions.is_empty() {
            return Err(ParameterError::EmptySubscriptionList);
        }
        non_zero_packet_id(self.packet_id)?;
        ensure_capacity(buf, self.encoded_len())?;
        let mut cursor = 0;
        write_fixed_header(&mut cursor, buf, 0x80 | FLAGS_RESERVED_0010, self.remaining_length())?;
        write_u16(&mut cursor, buf, self.packet_id)?;
        for subscription in &self.subscriptions {
            write_utf8_string(&mut cursor, buf, subscription.topic_filter)?;
            buf[cursor] = subscription.qos as u8;
            cursor += 1;
        }
        Ok(cursor)
    }
}

impl Unsubscribe<'_> {
    fn remaining_length(&self) -> usize {
        2 + self
            .topic_filters
            .iter()
            .map(|filter| 2 + filter.len())
            .sum::<usize>()
    }
}

impl EncodePacket for Unsubscribe<'_> {
    fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        if self.topic_filters.is_empty() {
            return Err(ParameterError::EmptySubscriptionList);
        }
        non_zero_packet_id(self.packet_id)?;
        ensure_capacity(buf, self.encoded_len())?;
        let mut cursor = 0;
        write_fixed_header(&mut cursor, buf, 0xA0 | FLAGS_RESERVED_0010, self.remaining_length())?;
        write_u16(&mut cursor, buf, self.packet_id)?;
        for filter in &self.topic_filters {
            write_utf8_string(&mut cursor, buf, filter)?;
        }
        Ok(cursor)
    }
}

// --- SUBACK / UNSUBACK ---

impl<'a> DecodePacket<'a> for SubAck {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        let (_, raw) = expect_header(buf, PacketType::SubAck, 0)?;
        let mut cursor = 0;
        let packet_id = read_u16(&mut cursor, raw.remaining_data)?;
        let codes = &raw.remaining_data[cursor..];
        if codes.is_empty() {
            return Err(ParameterError::MalformedPacket.into());
        }
        let mut return_codes = try_vec(codes.len())?;
        return_codes.extend_from_slice(codes);
        Ok(SubAck {
            packet_id,
            return_codes,
        })
    }
}

impl EncodePacket for SubAck {
    fn encoded_len(&self) -> usize {
        packet_len(2 + self.return_codes.len())
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        ensure_capacity(buf, self.encoded_len())?;
        let mut cursor = 0;
        write_fixed_header(&mut cursor, buf, 0x90, 2 + self.return_codes.len())?;
        write_u16(&mut cursor, buf, self.packet_id)?;
        let end = cursor + self.return_codes.len();
        buf[cursor..end].copy_from_slice(&self.return_codes);
        Ok(end)
    }
}

impl<'a> DecodePacket<'a> for UnsubAck {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        let (_, raw) = expect_header(buf, PacketType::UnsubAck, 0)?;
        if raw.remaining_length != 2 {
            return Err(ParameterError::MalformedPacket.into());
        }
        let mut cursor = 0;
        let packet_id = read_u16(&mut cursor, raw.remaining_data)?;
        Ok(UnsubAck { packet_id })
    }
}

impl EncodePacket for UnsubAck {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        encode_id_only(buf, 0xB0, self.packet_id)
    }
}

// --- PINGREQ / PINGRESP / DISCONNECT ---

/// Validates a packet that consists of a fixed header with zero remaining length.
pub fn parse_empty(buf: &[u8], packet_type: PacketType) -> Result<(), ParameterError> {
    if buf != &[packet_type.code() << 4, 0x00][..] {
        return Err(ParameterError::MalformedPacket);
    }
    Ok(())
}

fn encode_empty(buf: &mut [u8], packet_type: PacketType) -> Result<usize, ParameterError> {
    ensure_capacity(buf, 2)?;
    buf[..2].copy_from_slice(&[packet_type.code() << 4, 0x00]);
    Ok(2)
}

// --- Any packet ---

/// Decodes one whole wire-format packet of any type BLE carries.
///
/// QoS 2 packet types are rejected as unsupported.
pub fn decode_packet(buf: &[u8]) -> Result<MqttPacket<'_>, MqttBleError> {
    let header = FixedHeader::read(buf)?;
    let packet = match header.packet_type {
        PacketType::Connect => MqttPacket::Connect(Connect::decode(buf)?),
        PacketType::ConnAck => MqttPacket::ConnAck(ConnAck::decode(buf)?),
        PacketType::Publish => MqttPacket::Publish(Publish::decode(buf)?),
        PacketType::PubAck => MqttPacket::PubAck(PubAck::decode(buf)?),
        PacketType::Subscribe => MqttPacket::Subscribe(Subscribe::decode(buf)?),
        PacketType::SubAck => MqttPacket::SubAck(SubAck::decode(buf)?),
        PacketType::Unsubscribe => MqttPacket::Unsubscribe(Unsubscribe::decode(buf)?),
        PacketType::UnsubAck => MqttPacket::UnsubAck(UnsubAck::decode(buf)?),
        PacketType::PingReq => {
            parse_empty(buf, PacketType::PingReq)?;
            MqttPacket::PingReq
        }
        PacketType::PingResp => {
            parse_empty(buf, PacketType::PingResp)?;
            MqttPacket::PingResp
        }
        PacketType::Disconnect => {
            parse_empty(buf, PacketType::Disconnect)?;
            MqttPacket::Disconnect
        }
        other @ (PacketType::PubRec | PacketType::PubRel | PacketType::PubComp) => {
            return Err(ParameterError::UnsupportedPacketType(other.code()).into());
        }
    };
    Ok(packet)
}

impl<'a> DecodePacket<'a> for MqttPacket<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, MqttBleError> {
        decode_packet(buf)
    }
}

impl EncodePacket for MqttPacket<'_> {
    fn encoded_len(&self) -> usize {
        match self {
            MqttPacket::Connect(p) => p.encoded_len(),
            MqttPacket::ConnAck(p) => p.encoded_len(),
            MqttPacket::Publish(p) => p.encoded_len(),
            MqttPacket::PubAck(p) => p.encoded_len(),
            MqttPacket::Subscribe(p) => p.encoded_len(),
            MqttPacket::SubAck(p) => p.encoded_len(),
            MqttPacket::Unsubscribe(p) => p.encoded_len(),
            MqttPacket::UnsubAck(p) => p.encoded_len(),
            MqttPacket::PingReq | MqttPacket::PingResp | MqttPacket::Disconnect => 2,
        }
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize, ParameterError> {
        match self {
            MqttPacket::Connect(p) => p.encode(buf),
            MqttPacket::ConnAck(p) => p.encode(buf),
            MqttPacket::Publish(p) => p.encode(buf),
            MqttPacket::PubAck(p) => p.encode(buf),
            MqttPacket::Subscribe(p) => p.encode(buf),
            MqttPacket::SubAck(p) => p.encode(buf),
            MqttPacket::Unsubscribe(p) => p.encode(buf),
            MqttPacket::UnsubAck(p) => p.encode(buf),
            MqttPacket::PingReq => encode_empty(buf, PacketType::PingReq),
            MqttPacket::PingResp => encode_empty(buf, PacketType::PingResp),
            MqttPacket::Disconnect => encode_empty(buf, PacketType::Disconnect),
        }
    }
}

/// Serializes `packet` into a freshly allocated buffer of exactly the right size.
pub fn to_vec<P: EncodePacket + ?Sized>(packet: &P) -> Result<Vec<u8>, MqttBleError> {
    let len = packet.encoded_len();
    let mut buf = try_vec(len)?;
    buf.resize(len, 0);
    let written = packet.encode(&mut buf)?;
    buf.truncate(written);
    Ok(buf)
}
