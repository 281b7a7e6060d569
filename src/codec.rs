//! Field-level mapping between MQTT packet fields and the compact encoding.
//!
//! Every BLE message is a single definite-length CBOR map whose keys are the
//! one-letter strings below. The key strings and the numeric codes are a wire contract
//! shared with the companion SDKs and must not change.
//!
//! Encoding runs twice over the same code: once into a [`Sink::Measure`] that only
//! counts bytes, then into a buffer of exactly that size.

use alloc::vec::Vec;

use minicbor::data::Type;
use minicbor::decode;
use minicbor::encode::Write;
use minicbor::encode::write::{Cursor, EndOfSlice};
use minicbor::Decoder;

use crate::error::{DecodeError, MqttBleError};
use crate::packet::PacketType;
use crate::util::try_vec;

pub const KEY_MSG_TYPE: &str = "w";
pub const KEY_CLIENT_ID: &str = "d";
pub const KEY_BROKER_ENDPOINT: &str = "a";
pub const KEY_CLEAN_SESSION: &str = "c";
pub const KEY_TOPIC: &str = "u";
pub const KEY_TOPIC_LIST: &str = "v";
pub const KEY_QOS: &str = "n";
pub const KEY_QOS_LIST: &str = "o";
pub const KEY_MESSAGE_ID: &str = "i";
pub const KEY_PAYLOAD: &str = "k";
pub const KEY_STATUS: &str = "s";

/// Message-type code of a packet the companion device does not recognize.
pub const MSG_TYPE_INVALID: u8 = 0xFF;

/// Connection states reported in the status field of a BLE CONNACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectionStatus {
    Connecting = 1,
    Connected = 2,
    Disconnected = 3,
    ConnectionRefused = 4,
    ConnectionError = 5,
    ProtocolError = 6,
}

impl ConnectionStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Disconnected),
            4 => Some(Self::ConnectionRefused),
            5 => Some(Self::ConnectionError),
            6 => Some(Self::ProtocolError),
            _ => None,
        }
    }

    /// A CONNACK with this status completes the MQTT connection.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

// --- Encoding ---

/// Errors of an encoding pass. Only a write into a short buffer can fail.
pub type EncodeError = minicbor::encode::Error<EndOfSlice>;

/// Where an encoding pass puts its bytes.
pub enum Sink<'b> {
    /// Counts bytes without storing them.
    Measure(usize),
    Buffer(Cursor<&'b mut [u8]>),
}

impl Sink<'_> {
    /// Bytes produced so far.
    pub fn position(&self) -> usize {
        match self {
            Sink::Measure(len) => *len,
            Sink::Buffer(cursor) => cursor.position(),
        }
    }
}

impl Write for Sink<'_> {
    type Error = EndOfSlice;

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        match self {
            Sink::Measure(len) => {
                *len += buf.len();
                Ok(())
            }
            Sink::Buffer(cursor) => cursor.write_all(buf),
        }
    }
}

pub type Encoder<'b> = minicbor::Encoder<Sink<'b>>;

/// An encoder for the measuring pass.
pub fn measuring() -> Encoder<'static> {
    minicbor::Encoder::new(Sink::Measure(0))
}

/// An encoder that writes into `buf`.
pub fn writing(buf: &mut [u8]) -> Encoder<'_> {
    minicbor::Encoder::new(Sink::Buffer(Cursor::new(buf)))
}

/// Bytes produced by `enc` so far.
pub fn encoded_len(enc: &Encoder<'_>) -> usize {
    enc.writer().position()
}

/// A scalar value stored under one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Int(i64),
    Bool(bool),
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Appends `key` and its scalar `value` to the open map.
pub fn encode_field(enc: &mut Encoder<'_>, key: &str, value: Field<'_>) -> Result<(), EncodeError> {
    enc.str(key)?;
    match value {
        Field::Int(val) => enc.i64(val)?,
        Field::Bool(val) => enc.bool(val)?,
        Field::Text(val) => enc.str(val)?,
        Field::Bytes(val) => enc.bytes(val)?,
    };
    Ok(())
}

/// Opens a map of `pairs` entries and writes the message-type entry every BLE
/// message starts with.
pub fn encode_header(enc: &mut Encoder<'_>, pairs: u64, packet_type: PacketType) -> Result<(), EncodeError> {
    enc.map(pairs)?;
    encode_field(enc, KEY_MSG_TYPE, Field::Int(i64::from(packet_type.code())))
}

// --- Decoding ---

/// A validated top-level map. Values are decoded on lookup.
#[derive(Debug, Clone, Copy)]
pub struct Map<'a> {
    input: &'a [u8],
    entries: usize,
    len: u64,
}

impl<'a> Map<'a> {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a decoder positioned at the value stored under `key`.
    ///
    /// Entries with non-text keys are skipped.
    pub fn find(&self, key: &str) -> Result<Option<Decoder<'a>>, DecodeError> {
        let mut dec = Decoder::new(self.input);
        dec.set_position(self.entries);
        for _ in 0..self.len {
            let found = match dec.datatype().map_err(malformed)? {
                Type::String => dec.str().map_err(malformed)? == key,
                _ => {
                    dec.skip().map_err(malformed)?;
                    false
                }
            };
            if found {
                return Ok(Some(dec));
            }
            dec.skip().map_err(malformed)?;
        }
        Ok(None)
    }

    pub fn contains(&self, key: &str) -> Result<bool, DecodeError> {
        Ok(self.find(key)?.is_some())
    }
}

fn malformed(err: decode::Error) -> DecodeError {
    if err.is_end_of_input() {
        DecodeError::Truncated
    } else {
        DecodeError::Unsupported
    }
}

/// Checks that `buf` holds exactly one definite-length map and nothing else.
pub fn decode_map(buf: &[u8]) -> Result<Map<'_>, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Truncated);
    }
    let mut dec = Decoder::new(buf);
    match dec.datatype().map_err(|_| DecodeError::NotAMap)? {
        Type::Map => {}
        Type::MapIndef => return Err(DecodeError::Unsupported),
        _ => return Err(DecodeError::NotAMap),
    }
    let len = dec.map().map_err(malformed)?.ok_or(DecodeError::Unsupported)?;
    let entries = dec.position();
    for _ in 0..len {
        dec.skip().map_err(malformed)?;
        dec.skip().map_err(malformed)?;
    }
    if dec.position() != buf.len() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(Map {
        input: buf,
        entries,
        len,
    })
}

/// Looks up a required key.
pub fn decode_field<'a>(map: &Map<'a>, key: &'static str) -> Result<Decoder<'a>, DecodeError> {
    map.find(key)?.ok_or(DecodeError::MissingKey(key))
}

pub fn decode_int(map: &Map<'_>, key: &'static str) -> Result<i64, DecodeError> {
    decode_field(map, key)?
        .i64()
        .map_err(|_| DecodeError::WrongType(key))
}

/// Reads an integer that must fit in 16 bits, such as a message identifier.
pub fn decode_u16(map: &Map<'_>, key: &'static str) -> Result<u16, DecodeError> {
    u16::try_from(decode_int(map, key)?).map_err(|_| DecodeError::WrongType(key))
}

pub fn decode_bool(map: &Map<'_>, key: &'static str) -> Result<bool, DecodeError> {
    decode_field(map, key)?
        .bool()
        .map_err(|_| DecodeError::WrongType(key))
}

pub fn decode_text<'a>(map: &Map<'a>, key: &'static str) -> Result<&'a str, DecodeError> {
    decode_field(map, key)?
        .str()
        .map_err(|_| DecodeError::WrongType(key))
}

pub fn decode_bytes<'a>(map: &Map<'a>, key: &'static str) -> Result<&'a [u8], DecodeError> {
    decode_field(map, key)?
        .bytes()
        .map_err(|_| DecodeError::WrongType(key))
}

/// Reads the definite-length array under `key`, one item at a time.
fn decode_list<'a, T>(
    map: &Map<'a>,
    key: &'static str,
    mut item: impl FnMut(&mut Decoder<'a>) -> Result<T, decode::Error>,
) -> Result<Vec<T>, MqttBleError> {
    let mut dec = decode_field(map, key)?;
    let len = dec
        .array()
        .map_err(|_| DecodeError::WrongType(key))?
        .ok_or(DecodeError::WrongType(key))?;
    // `decode_map` already walked every item, so `len` is bounded by the input size.
    let len = usize::try_from(len).map_err(|_| DecodeError::WrongType(key))?;
    let mut items = try_vec(len)?;
    for _ in 0..len {
        items.push(item(&mut dec).map_err(|_| DecodeError::WrongType(key))?);
    }
    Ok(items)
}

pub fn decode_text_list<'a>(map: &Map<'a>, key: &'static str) -> Result<Vec<&'a str>, MqttBleError> {
    decode_list(map, key, |dec| dec.str())
}

pub fn decode_int_list(map: &Map<'_>, key: &'static str) -> Result<Vec<i64>, MqttBleError> {
    decode_list(map, key, |dec| dec.i64())
}

/// Reads the message-type code of a decoded BLE message.
///
/// Codes outside 1..=14 yield [`MSG_TYPE_INVALID`].
pub fn decode_message_type(map: &Map<'_>) -> Result<u8, DecodeError> {
    let code = decode_int(map, KEY_MSG_TYPE)?;
    Ok(u8::try_from(code)
        .ok()
        .and_then(PacketType::from_code)
        .map_or(MSG_TYPE_INVALID, PacketType::code))
}
