//! # Error Types
//!
//! This module defines the error types produced by the BLE transport, from malformed
//! wire bytes handed over by the MQTT client to refusals reported by the companion
//! device.

use core::fmt;

use crate::codec::EncodeError;

/// The primary error enum of the transport.
///
/// Each variant corresponds to one failure class the caller may want to react to
/// differently: parameter and response errors are never retried, channel errors are
/// left to the MQTT client's own keep-alive and reconnect logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttBleError {
    /// The outbound packet is malformed or uses a feature BLE cannot carry.
    BadParameter(ParameterError),
    /// The compact-encoded packet received from the channel could not be decoded.
    BadResponse(DecodeError),
    /// The companion device refused the request. The enclosed value is the status it sent.
    ServerRefused(u8),
    /// A protocol-level violation, such as an acknowledgment for the wrong request.
    Protocol(ProtocolError),
    /// A buffer for the encoded packet could not be allocated.
    NoMemory,
    /// The channel accepted fewer bytes than the encoded packet holds.
    ChannelFailure { expected: usize, sent: usize },
    /// The data-transfer channel is not open.
    ChannelClosed,
    /// A reconstructed packet could not be placed in the receive queue.
    QueueFull,
    /// An operation timed out.
    Timeout,
}

impl fmt::Display for MqttBleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttBleError::BadParameter(e) => write!(f, "bad parameter: {e:?}"),
            MqttBleError::BadResponse(e) => write!(f, "bad response: {e:?}"),
            MqttBleError::ServerRefused(status) => write!(f, "server refused with status {status}"),
            MqttBleError::Protocol(e) => write!(f, "protocol error: {e:?}"),
            MqttBleError::NoMemory => f.write_str("out of memory"),
            MqttBleError::ChannelFailure { expected, sent } => {
                write!(f, "channel sent {sent} of {expected} bytes")
            }
            MqttBleError::ChannelClosed => f.write_str("channel is closed"),
            MqttBleError::QueueFull => f.write_str("receive queue is full"),
            MqttBleError::Timeout => f.write_str("timed out"),
        }
    }
}

impl From<ParameterError> for MqttBleError {
    fn from(err: ParameterError) -> Self {
        MqttBleError::BadParameter(err)
    }
}

impl From<DecodeError> for MqttBleError {
    fn from(err: DecodeError) -> Self {
        MqttBleError::BadResponse(err)
    }
}

impl From<EncodeError> for MqttBleError {
    fn from(err: EncodeError) -> Self {
        if err.is_write() {
            MqttBleError::BadParameter(ParameterError::BufferTooSmall)
        } else {
            MqttBleError::BadParameter(ParameterError::Encoding)
        }
    }
}

impl From<ProtocolError> for MqttBleError {
    fn from(err: ProtocolError) -> Self {
        MqttBleError::Protocol(err)
    }
}

impl embedded_io_async::Error for MqttBleError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        use embedded_io_async::ErrorKind;
        match self {
            MqttBleError::BadParameter(_) => ErrorKind::InvalidInput,
            MqttBleError::BadResponse(_) | MqttBleError::Protocol(_) => ErrorKind::InvalidData,
            MqttBleError::ServerRefused(_) => ErrorKind::ConnectionRefused,
            MqttBleError::NoMemory | MqttBleError::QueueFull => ErrorKind::Other,
            MqttBleError::ChannelFailure { .. } => ErrorKind::BrokenPipe,
            MqttBleError::ChannelClosed => ErrorKind::NotConnected,
            MqttBleError::Timeout => ErrorKind::TimedOut,
        }
    }
}

/// Reasons an outbound packet was rejected before anything reached the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParameterError {
    /// The wire bytes do not follow the MQTT 3.1.1 grammar.
    MalformedPacket,
    /// QoS 2 was requested; BLE carries QoS 0 and 1 only.
    UnsupportedQos(u8),
    /// The packet type is not allowed in this direction or not supported over BLE.
    UnsupportedPacketType(u8),
    /// The CONNECT protocol level is not 4 (MQTT 3.1.1).
    UnsupportedProtocolLevel(u8),
    /// The reserved bit of the CONNECT flags is set.
    ReservedFlagSet,
    /// A CONNECT carried an empty client identifier.
    MissingClientId,
    /// A CONNECT flag announced a field whose length decodes to zero.
    EmptyField,
    /// A SUBSCRIBE or UNSUBSCRIBE listed no topic filters.
    EmptySubscriptionList,
    /// A SUBSCRIBE or UNSUBSCRIBE listed more topic filters than configured.
    TooManySubscriptions(usize),
    /// A QoS 1 PUBLISH carried packet identifier 0.
    MissingPacketId,
    /// A PUBLISH announced a payload larger than the configured maximum.
    PublishTooLarge(usize),
    /// A PUBLISH topic is longer than the transport can hold.
    TopicTooLong(usize),
    /// A payload continuation did not match the length promised by the header.
    PayloadLengthMismatch { expected: usize, received: usize },
    /// A string field was not valid UTF-8.
    InvalidUtf8String,
    /// The buffer provided for serialization was too small.
    BufferTooSmall,
    /// The structured encoder rejected the packet.
    Encoding,
}

/// Reasons a compact-encoded packet could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The buffer ended in the middle of an item.
    Truncated,
    /// The top-level item is not a map.
    NotAMap,
    /// The item uses an encoding outside the supported subset.
    Unsupported,
    /// A required key is absent.
    MissingKey(&'static str),
    /// The value under a key has an unexpected type or range.
    WrongType(&'static str),
    /// Bytes remain after the top-level map.
    TrailingBytes,
}

/// Enumerates protocol violations the transport surfaces instead of halting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// The acknowledgment carries a different identifier than the outstanding request.
    AckMismatch { expected: u16, received: u16 },
    /// An acknowledgment arrived while no request of that kind was outstanding.
    UnexpectedAck(u16),
}
