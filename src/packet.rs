//! # MQTT Packet Structures
//!
//! This module defines the typed, in-memory form of the MQTT 3.1.1 control packets the
//! transport carries. The same structures are produced by the wire-format parser on the
//! outbound path and by the compact decoder on the inbound path, so both encodings meet
//! in one place.

use alloc::vec::Vec;

use crate::error::ParameterError;

/// Represents the Quality of Service levels a BLE link can carry.
///
/// QoS 2 is never representable: every conversion from a raw level rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
}

impl TryFrom<u8> for QoS {
    type Error = ParameterError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            other => Err(ParameterError::UnsupportedQos(other)),
        }
    }
}

/// The fourteen MQTT 3.1.1 control packet types.
///
/// The discriminant is both the upper nibble of the wire fixed header and the
/// message-type code of the compact encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Maps a type code (1..=14) to a packet type.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Connect),
            2 => Some(Self::ConnAck),
            3 => Some(Self::Publish),
            4 => Some(Self::PubAck),
            5 => Some(Self::PubRec),
            6 => Some(Self::PubRel),
            7 => Some(Self::PubComp),
            8 => Some(Self::Subscribe),
            9 => Some(Self::SubAck),
            10 => Some(Self::Unsubscribe),
            11 => Some(Self::UnsubAck),
            12 => Some(Self::PingReq),
            13 => Some(Self::PingResp),
            14 => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Reads the packet type from the first byte of a fixed header.
    pub fn from_header(byte: u8) -> Option<Self> {
        Self::from_code(byte >> 4)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Packet types that belong to the QoS 2 flow, which BLE does not carry.
    pub fn is_qos2(self) -> bool {
        matches!(self, Self::PubRec | Self::PubRel | Self::PubComp)
    }

    /// Whether a client may send this packet type.
    pub fn is_client_originated(self) -> bool {
        matches!(
            self,
            Self::Connect
                | Self::Publish
                | Self::PubAck
                | Self::Subscribe
                | Self::Unsubscribe
                | Self::PingReq
                | Self::Disconnect
        )
    }

    /// Whether a server may send this packet type.
    pub fn is_server_originated(self) -> bool {
        matches!(
            self,
            Self::ConnAck
                | Self::Publish
                | Self::PubAck
                | Self::SubAck
                | Self::UnsubAck
                | Self::PingResp
        )
    }
}

/// A packet as it arrives from the channel, before its fields are decoded.
#[derive(Debug, Clone, Copy)]
pub struct RawPacket<'a> {
    pub packet_type: PacketType,
    pub remaining_data: &'a [u8],
    pub remaining_length: usize,
}

impl<'a> RawPacket<'a> {
    pub fn new(packet_type: PacketType, remaining_data: &'a [u8]) -> Self {
        Self {
            packet_type,
            remaining_data,
            remaining_length: remaining_data.len(),
        }
    }
}

/// An enumeration of all MQTT control packets the transport understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttPacket<'a> {
    Connect(Connect<'a>),
    ConnAck(ConnAck),
    Publish(Publish<'a>),
    PubAck(PubAck),
    Subscribe(Subscribe<'a>),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe<'a>),
    UnsubAck(UnsubAck),
    PingReq,
    PingResp,
    Disconnect,
}

impl MqttPacket<'_> {
    pub fn packet_type(&self) -> PacketType {
        match self {
            MqttPacket::Connect(_) => PacketType::Connect,
            MqttPacket::ConnAck(_) => PacketType::ConnAck,
            MqttPacket::Publish(_) => PacketType::Publish,
            MqttPacket::PubAck(_) => PacketType::PubAck,
            MqttPacket::Subscribe(_) => PacketType::Subscribe,
            MqttPacket::SubAck(_) => PacketType::SubAck,
            MqttPacket::Unsubscribe(_) => PacketType::Unsubscribe,
            MqttPacket::UnsubAck(_) => PacketType::UnsubAck,
            MqttPacket::PingReq => PacketType::PingReq,
            MqttPacket::PingResp => PacketType::PingResp,
            MqttPacket::Disconnect => PacketType::Disconnect,
        }
    }
}

// --- CONNECT Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect<'a> {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a [u8]>,
}

impl<'a> Connect<'a> {
    pub fn new(client_id: &'a str, keep_alive: u16, clean_session: bool) -> Self {
        Self {
            client_id,
            keep_alive,
            clean_session,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: &'a str, password: &'a [u8]) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

/// Return codes of a CONNACK (MQTT 3.1.1 §3.2.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReturnCode {
    /// The connection was accepted.
    Accepted,
    /// The broker does not support the requested MQTT protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A code outside the range defined by MQTT 3.1.1.
    Other(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

impl From<ConnectReturnCode> for u8 {
    fn from(code: ConnectReturnCode) -> u8 {
        match code {
            ConnectReturnCode::Accepted => 0,
            ConnectReturnCode::UnacceptableProtocolVersion => 1,
            ConnectReturnCode::IdentifierRejected => 2,
            ConnectReturnCode::ServerUnavailable => 3,
            ConnectReturnCode::BadUserNameOrPassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
            ConnectReturnCode::Other(val) => val,
        }
    }
}

// --- CONNACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl ConnAck {
    pub fn accepted() -> Self {
        Self {
            session_present: false,
            return_code: ConnectReturnCode::Accepted,
        }
    }

    /// The acknowledgment handed to the client when the companion device refuses.
    pub fn refused() -> Self {
        Self {
            session_present: false,
            return_code: ConnectReturnCode::NotAuthorized,
        }
    }
}

// --- PUBLISH Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    /// Present exactly when `qos` is `AtLeastOnce`.
    pub packet_id: Option<u16>,
    pub payload: &'a [u8],
}

impl<'a> Publish<'a> {
    pub fn new(topic: &'a str, payload: &'a [u8], qos: QoS, packet_id: Option<u16>) -> Self {
        Self {
            topic,
            qos,
            retain: false,
            dup: false,
            packet_id,
            payload,
        }
    }

    /// Checks the identifier invariant: none for QoS 0, nonzero for QoS 1.
    pub fn validate(&self) -> Result<(), ParameterError> {
        match (self.qos, self.packet_id) {
            (QoS::AtMostOnce, _) => Ok(()),
            (QoS::AtLeastOnce, Some(id)) if id != 0 => Ok(()),
            (QoS::AtLeastOnce, _) => Err(ParameterError::MissingPacketId),
        }
    }
}

// --- PUBACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAck {
    pub packet_id: u16,
}

// --- SUBSCRIBE Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription<'a> {
    pub topic_filter: &'a str,
    pub qos: QoS,
}

impl<'a> Subscription<'a> {
    pub fn new(topic_filter: &'a str, qos: QoS) -> Self {
        Self { topic_filter, qos }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe<'a> {
    pub packet_id: u16,
    pub subscriptions: Vec<Subscription<'a>>,
}

impl<'a> Subscribe<'a> {
    /// Creates a new Subscribe packet with a single topic.
    pub fn new(packet_id: u16, topic_filter: &'a str, qos: QoS) -> Self {
        let mut subscriptions = Vec::with_capacity(1);
        subscriptions.push(Subscription::new(topic_filter, qos));
        Self {
            packet_id,
            subscriptions,
        }
    }
}

// --- SUBACK Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_codes: Vec<u8>,
}

// --- UNSUBSCRIBE Packet ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe<'a> {
    pub packet_id: u16,
    pub topic_filters: Vec<&'a str>,
}

impl<'a> Unsubscribe<'a> {
    pub fn new(packet_id: u16, topic_filter: &'a str) -> Self {
        let mut topic_filters = Vec::with_capacity(1);
        topic_filters.push(topic_filter);
        Self {
            packet_id,
            topic_filters,
        }
    }
}

// --- UNSUBACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubAck {
    pub packet_id: u16,
}

// --- Packets without fields ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingReq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingResp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disconnect;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_two_is_rejected() {
        assert_eq!(QoS::try_from(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
        assert_eq!(QoS::try_from(2), Err(ParameterError::UnsupportedQos(2)));
    }

    #[test]
    fn packet_type_from_header_nibble() {
        assert_eq!(PacketType::from_header(0x10), Some(PacketType::Connect));
        assert_eq!(PacketType::from_header(0x3B), Some(PacketType::Publish));
        assert_eq!(PacketType::from_header(0x82), Some(PacketType::Subscribe));
        assert_eq!(PacketType::from_header(0xE0), Some(PacketType::Disconnect));
        assert_eq!(PacketType::from_header(0x00), None);
        assert_eq!(PacketType::from_header(0xF0), None);
    }

    #[test]
    fn direction_classification() {
        assert!(PacketType::Connect.is_client_originated());
        assert!(!PacketType::Connect.is_server_originated());
        assert!(PacketType::SubAck.is_server_originated());
        assert!(!PacketType::SubAck.is_client_originated());
        assert!(PacketType::Publish.is_client_originated() && PacketType::Publish.is_server_originated());
        assert!(PacketType::PubRel.is_qos2());
        assert!(!PacketType::PubRel.is_client_originated());
    }

    #[test]
    fn publish_identifier_invariant() {
        assert!(Publish::new("t", b"", QoS::AtMostOnce, None).validate().is_ok());
        assert!(Publish::new("t", b"", QoS::AtLeastOnce, Some(3)).validate().is_ok());
        assert_eq!(
            Publish::new("t", b"", QoS::AtLeastOnce, Some(0)).validate(),
            Err(ParameterError::MissingPacketId)
        );
        assert_eq!(
            Publish::new("t", b"", QoS::AtLeastOnce, None).validate(),
            Err(ParameterError::MissingPacketId)
        );
    }

    #[test]
    fn connect_return_code_round_trips_through_u8() {
        for code in 0u8..=6 {
            assert_eq!(u8::from(ConnectReturnCode::from(code)), code);
        }
    }
}
