//! # BLE Packet Serializer
//!
//! Converts typed packets to and from the compact map encoding, one [`EncodeBle`] or
//! [`DecodeBle`] implementation per packet kind the BLE link carries. QoS 2 kinds have
//! no implementation and are rejected wherever a raw type code is classified.
//!
//! Map layouts, keyed as in [`crate::codec`]:
//!
//! | kind        | entries                       |
//! |-------------|-------------------------------|
//! | CONNECT     | `w d a c`                     |
//! | CONNACK     | `w s`                         |
//! | PUBLISH     | `w u n k`, plus `i` for QoS 1 |
//! | PUBACK      | `w i`                         |
//! | SUBSCRIBE   | `w v o i`                     |
//! | SUBACK      | `w i s`                       |
//! | UNSUBSCRIBE | `w v i`                       |
//! | UNSUBACK    | `w i`                         |
//! | PINGREQ, PINGRESP, DISCONNECT | `w`         |

use alloc::vec::Vec;

use crate::codec::{
    self, ConnectionStatus, Encoder, Field, Map, KEY_BROKER_ENDPOINT, KEY_CLEAN_SESSION,
    KEY_CLIENT_ID, KEY_MESSAGE_ID, KEY_MSG_TYPE, KEY_PAYLOAD, KEY_QOS, KEY_QOS_LIST, KEY_STATUS,
    KEY_TOPIC, KEY_TOPIC_LIST, MSG_TYPE_INVALID,
};
use crate::error::{DecodeError, MqttBleError, ParameterError};
use crate::packet::{
    ConnAck, Connect, ConnectReturnCode, Disconnect, PacketType, PingReq, PingResp, PubAck,
    Publish, QoS, SubAck, Subscribe, Subscription, UnsubAck, Unsubscribe,
};
use crate::util::try_vec;
use crate::wire::SUBACK_FAILURE;

/// A packet kind the BLE link carries, tagged with the message type written under `w`.
pub trait BlePacket {
    const PACKET_TYPE: PacketType;
}

/// A packet that can be written in the compact encoding.
pub trait EncodeBle: BlePacket {
    /// Appends the packet's map to `enc`.
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError>;
}

/// A packet that can be read from a decoded compact map.
pub trait DecodeBle<'a>: BlePacket + Sized {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError>;
}

/// Runs the encoding without a buffer and returns the size it needs.
pub fn measure<P: EncodeBle + ?Sized>(packet: &P) -> Result<usize, MqttBleError> {
    let mut enc = codec::measuring();
    packet.encode_ble(&mut enc)?;
    Ok(codec::encoded_len(&enc))
}

/// Encodes `packet` into `buf` and returns the bytes written.
pub fn write<P: EncodeBle + ?Sized>(packet: &P, buf: &mut [u8]) -> Result<usize, MqttBleError> {
    let mut enc = codec::writing(buf);
    packet.encode_ble(&mut enc)?;
    Ok(codec::encoded_len(&enc))
}

/// Measures `packet`, allocates exactly that much and encodes into it.
pub fn serialize<P: EncodeBle + ?Sized>(packet: &P) -> Result<Vec<u8>, MqttBleError> {
    let size = measure(packet)?;
    let mut buf = try_vec(size)?;
    buf.resize(size, 0);
    let written = write(packet, &mut buf)?;
    buf.truncate(written);
    Ok(buf)
}

/// Decodes `buf` as a packet of type `P`.
pub fn deserialize<'a, P: DecodeBle<'a>>(buf: &'a [u8]) -> Result<P, MqttBleError> {
    let (packet_type, map) = decode_message(buf)?;
    if packet_type != P::PACKET_TYPE {
        return Err(DecodeError::WrongType(KEY_MSG_TYPE).into());
    }
    P::decode_ble(&map)
}

/// Decodes the top-level map and classifies it by its message type.
///
/// QoS 2 kinds are reported as unsupported parameters.
pub fn decode_message(buf: &[u8]) -> Result<(PacketType, Map<'_>), MqttBleError> {
    let map = codec::decode_map(buf)?;
    let code = codec::decode_message_type(&map)?;
    if code == MSG_TYPE_INVALID {
        return Err(DecodeError::WrongType(KEY_MSG_TYPE).into());
    }
    let packet_type = PacketType::from_code(code).ok_or(DecodeError::WrongType(KEY_MSG_TYPE))?;
    if packet_type.is_qos2() {
        return Err(ParameterError::UnsupportedPacketType(code).into());
    }
    Ok((packet_type, map))
}

/// Reads only the message type of an encoded packet.
pub fn packet_type(buf: &[u8]) -> Result<PacketType, MqttBleError> {
    decode_message(buf).map(|(packet_type, _)| packet_type)
}

fn decode_qos(val: i64, key: &'static str) -> Result<QoS, MqttBleError> {
    let level = u8::try_from(val).map_err(|_| DecodeError::WrongType(key))?;
    Ok(QoS::try_from(level)?)
}

fn decode_packet_id(map: &Map<'_>) -> Result<u16, MqttBleError> {
    match codec::decode_u16(map, KEY_MESSAGE_ID)? {
        0 => Err(DecodeError::WrongType(KEY_MESSAGE_ID).into()),
        id => Ok(id),
    }
}

fn decode_status(map: &Map<'_>) -> Result<u8, MqttBleError> {
    let status = codec::decode_int(map, KEY_STATUS)?;
    Ok(u8::try_from(status).map_err(|_| DecodeError::WrongType(KEY_STATUS))?)
}

// --- CONNECT ---

/// The fields of a CONNECT that travel over BLE.
///
/// Keep-alive and credentials stay with the device; the companion device opens its own
/// broker connection to `broker_endpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectRequest<'a> {
    pub client_id: &'a str,
    pub broker_endpoint: &'a str,
    pub clean_session: bool,
}

impl<'a> ConnectRequest<'a> {
    pub fn new(connect: &Connect<'a>, broker_endpoint: &'a str) -> Self {
        Self {
            client_id: connect.client_id,
            broker_endpoint,
            clean_session: connect.clean_session,
        }
    }
}

impl BlePacket for ConnectRequest<'_> {
    const PACKET_TYPE: PacketType = PacketType::Connect;
}

impl EncodeBle for ConnectRequest<'_> {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        if self.client_id.is_empty() {
            return Err(ParameterError::MissingClientId.into());
        }
        codec::encode_header(enc, 4, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_CLIENT_ID, Field::Text(self.client_id))?;
        codec::encode_field(enc, KEY_BROKER_ENDPOINT, Field::Text(self.broker_endpoint))?;
        codec::encode_field(enc, KEY_CLEAN_SESSION, Field::Bool(self.clean_session))?;
        Ok(())
    }
}

impl<'a> DecodeBle<'a> for ConnectRequest<'a> {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        Ok(Self {
            client_id: codec::decode_text(map, KEY_CLIENT_ID)?,
            broker_endpoint: codec::decode_text(map, KEY_BROKER_ENDPOINT)?,
            clean_session: codec::decode_bool(map, KEY_CLEAN_SESSION)?,
        })
    }
}

// --- CONNACK ---

impl BlePacket for ConnAck {
    const PACKET_TYPE: PacketType = PacketType::ConnAck;
}

impl EncodeBle for ConnAck {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        let status = if self.return_code == ConnectReturnCode::Accepted {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::ConnectionRefused
        };
        codec::encode_header(enc, 2, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_STATUS, Field::Int(status as i64))?;
        Ok(())
    }
}

/// Any status other than connecting or connected is a refusal.
impl<'a> DecodeBle<'a> for ConnAck {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        let status = decode_status(map)?;
        match ConnectionStatus::from_code(i64::from(status)) {
            Some(known) if known.is_accepted() => Ok(ConnAck::accepted()),
            _ => Err(MqttBleError::ServerRefused(status)),
        }
    }
}

// --- PUBLISH ---

impl BlePacket for Publish<'_> {
    const PACKET_TYPE: PacketType = PacketType::Publish;
}

impl EncodeBle for Publish<'_> {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        self.validate()?;
        let packet_id = match self.qos {
            QoS::AtMostOnce => None,
            QoS::AtLeastOnce => self.packet_id,
        };
        codec::encode_header(enc, if packet_id.is_some() { 5 } else { 4 }, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_TOPIC, Field::Text(self.topic))?;
        codec::encode_field(enc, KEY_QOS, Field::Int(self.qos as i64))?;
        codec::encode_field(enc, KEY_PAYLOAD, Field::Bytes(self.payload))?;
        if let Some(id) = packet_id {
            codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(id)))?;
        }
        Ok(())
    }
}

/// DUP and RETAIN are not carried and decode as cleared.
impl<'a> DecodeBle<'a> for Publish<'a> {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        let qos = decode_qos(codec::decode_int(map, KEY_QOS)?, KEY_QOS)?;
        let packet_id = match qos {
            QoS::AtMostOnce => None,
            QoS::AtLeastOnce => Some(decode_packet_id(map)?),
        };
        Ok(Publish {
            topic: codec::decode_text(map, KEY_TOPIC)?,
            qos,
            retain: false,
            dup: false,
            packet_id,
            payload: codec::decode_bytes(map, KEY_PAYLOAD)?,
        })
    }
}

// --- PUBACK ---

impl BlePacket for PubAck {
    const PACKET_TYPE: PacketType = PacketType::PubAck;
}

impl EncodeBle for PubAck {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        if self.packet_id == 0 {
            return Err(ParameterError::MissingPacketId.into());
        }
        codec::encode_header(enc, 2, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(self.packet_id)))?;
        Ok(())
    }
}

impl<'a> DecodeBle<'a> for PubAck {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        Ok(PubAck {
            packet_id: decode_packet_id(map)?,
        })
    }
}

// --- SUBSCRIBE ---

impl BlePacket for Subscribe<'_> {
    const PACKET_TYPE: PacketType = PacketType::Subscribe;
}

impl EncodeBle for Subscribe<'_> {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        if self.subscriptions.is_empty() {
            return Err(ParameterError::EmptySubscriptionList.into());
        }
        if self.packet_id == 0 {
            return Err(ParameterError::MissingPacketId.into());
        }
        codec::encode_header(enc, 4, Self::PACKET_TYPE)?;

        let count = self.subscriptions.len() as u64;
        enc.str(KEY_TOPIC_LIST)?.array(count)?;
        for subscription in &self.subscriptions {
            enc.str(subscription.topic_filter)?;
        }

        enc.str(KEY_QOS_LIST)?.array(count)?;
        for subscription in &self.subscriptions {
            enc.i64(subscription.qos as i64)?;
        }

        codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(self.packet_id)))?;
        Ok(())
    }
}

impl<'a> DecodeBle<'a> for Subscribe<'a> {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        let topics = codec::decode_text_list(map, KEY_TOPIC_LIST)?;
        let levels = codec::decode_int_list(map, KEY_QOS_LIST)?;
        if topics.is_empty() || levels.len() != topics.len() {
            return Err(DecodeError::WrongType(KEY_QOS_LIST).into());
        }
        let mut subscriptions = try_vec(topics.len())?;
        for (topic_filter, level) in topics.into_iter().zip(levels) {
            let qos = decode_qos(level, KEY_QOS_LIST)?;
            subscriptions.push(Subscription { topic_filter, qos });
        }
        Ok(Subscribe {
            packet_id: decode_packet_id(map)?,
            subscriptions,
        })
    }
}

// --- SUBACK ---

impl BlePacket for SubAck {
    const PACKET_TYPE: PacketType = PacketType::SubAck;
}

/// Writes one aggregate status: the first refusal if any, else the first granted QoS.
impl EncodeBle for SubAck {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        let status = self
            .return_codes
            .iter()
            .copied()
            .find(|code| *code > QoS::AtLeastOnce as u8)
            .or_else(|| self.return_codes.first().copied())
            .ok_or(ParameterError::EmptySubscriptionList)?;
        codec::encode_header(enc, 3, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(self.packet_id)))?;
        codec::encode_field(enc, KEY_STATUS, Field::Int(i64::from(status)))?;
        Ok(())
    }
}

/// Statuses other than a granted QoS 0 or 1 are refusals.
impl<'a> DecodeBle<'a> for SubAck {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        let packet_id = decode_packet_id(map)?;
        let status = decode_status(map)?;
        if status > QoS::AtLeastOnce as u8 {
            return Err(MqttBleError::ServerRefused(status));
        }
        let mut return_codes = try_vec(1)?;
        return_codes.push(status);
        Ok(SubAck {
            packet_id,
            return_codes,
        })
    }
}

impl SubAck {
    /// The status written on the wire for a refused subscription.
    pub const REFUSED: u8 = SUBACK_FAILURE;
}

// --- UNSUBSCRIBE ---

impl BlePacket for Unsubscribe<'_> {
    const PACKET_TYPE: PacketType = PacketType::Unsubscribe;
}

impl EncodeBle for Unsubscribe<'_> {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        if self.topic_filters.is_empty() {
            return Err(ParameterError::EmptySubscriptionList.into());
        }
        if self.packet_id == 0 {
            return Err(ParameterError::MissingPacketId.into());
        }
        codec::encode_header(enc, 3, Self::PACKET_TYPE)?;
        enc.str(KEY_TOPIC_LIST)?
            .array(self.topic_filters.len() as u64)?;
        for filter in &self.topic_filters {
            enc.str(filter)?;
        }
        codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(self.packet_id)))?;
        Ok(())
    }
}

impl<'a> DecodeBle<'a> for Unsubscribe<'a> {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        let topic_filters = codec::decode_text_list(map, KEY_TOPIC_LIST)?;
        if topic_filters.is_empty() {
            return Err(DecodeError::WrongType(KEY_TOPIC_LIST).into());
        }
        Ok(Unsubscribe {
            packet_id: decode_packet_id(map)?,
            topic_filters,
        })
    }
}

// --- UNSUBACK ---

impl BlePacket for UnsubAck {
    const PACKET_TYPE: PacketType = PacketType::UnsubAck;
}

impl EncodeBle for UnsubAck {
    fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
        codec::encode_header(enc, 2, Self::PACKET_TYPE)?;
        codec::encode_field(enc, KEY_MESSAGE_ID, Field::Int(i64::from(self.packet_id)))?;
        Ok(())
    }
}

impl<'a> DecodeBle<'a> for UnsubAck {
    fn decode_ble(map: &Map<'a>) -> Result<Self, MqttBleError> {
        Ok(UnsubAck {
            packet_id: decode_packet_id(map)?,
        })
    }
}

// --- PINGREQ / PINGRESP / DISCONNECT ---

macro_rules! impl_empty_packet {
    ($packet:ident, $packet_type:expr) => {
        impl BlePacket for $packet {
            const PACKET_TYPE: PacketType = $packet_type;
        }

        impl EncodeBle for $packet {
            fn encode_ble(&self, enc: &mut Encoder<'_>) -> Result<(), MqttBleError> {
                codec::encode_header(enc, 1, Self::PACKET_TYPE)?;
                Ok(())
            }
        }

        impl<'a> DecodeBle<'a> for $packet {
            fn decode_ble(_map: &Map<'a>) -> Result<Self, MqttBleError> {
                Ok($packet)
            }
        }
    };
}

impl_empty_packet!(PingReq, PacketType::PingReq);
impl_empty_packet!(PingResp, PacketType::PingResp);
impl_empty_packet!(Disconnect, PacketType::Disconnect);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn connect_scenario() {
        let connect = Connect::new("dev1", 10, true);
        let request = ConnectRequest::new(&connect, "broker.example.com");
        let bytes = serialize(&request).unwrap();
        assert_eq!(bytes.len(), measure(&request).unwrap());

        let map = codec::decode_map(&bytes).unwrap();
        assert_eq!(codec::decode_int(&map, KEY_MSG_TYPE), Ok(1));
        assert_eq!(codec::decode_text(&map, KEY_CLIENT_ID), Ok("dev1"));
        assert_eq!(codec::decode_text(&map, KEY_BROKER_ENDPOINT), Ok("broker.example.com"));
        assert_eq!(codec::decode_bool(&map, KEY_CLEAN_SESSION), Ok(true));

        assert_eq!(deserialize::<ConnectRequest>(&bytes), Ok(request));
    }

    #[test]
    fn publish_qos0_omits_message_id() {
        let publish = Publish::new("a/b", b"hi", QoS::AtMostOnce, None);
        let bytes = serialize(&publish).unwrap();
        let map = codec::decode_map(&bytes).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.contains(KEY_MESSAGE_ID), Ok(false));

        let decoded: Publish = deserialize(&bytes).unwrap();
        assert_eq!(decoded.qos, QoS::AtMostOnce);
        assert_eq!(decoded.topic, "a/b");
        assert_eq!(decoded.payload, b"hi");
        assert_eq!(decoded.packet_id, None);
    }

    #[test]
    fn publish_qos1_carries_message_id() {
        let publish = Publish::new("a/b", b"payload", QoS::AtLeastOnce, Some(5));
        let bytes = serialize(&publish).unwrap();
        let map = codec::decode_map(&bytes).unwrap();
        assert_eq!(codec::decode_u16(&map, KEY_MESSAGE_ID), Ok(5));
        assert_eq!(deserialize::<Publish>(&bytes), Ok(publish));
    }

    #[test]
    fn publish_qos1_without_id_is_rejected() {
        let publish = Publish::new("a/b", b"x", QoS::AtLeastOnce, None);
        assert_eq!(
            measure(&publish),
            Err(MqttBleError::BadParameter(ParameterError::MissingPacketId))
        );
    }

    #[test]
    fn write_into_short_buffer_fails() {
        let publish = Publish::new("a/b", b"hi", QoS::AtMostOnce, None);
        let size = measure(&publish).unwrap();
        let mut buf = vec![0u8; size - 1];
        assert_eq!(
            write(&publish, &mut buf),
            Err(MqttBleError::BadParameter(ParameterError::BufferTooSmall))
        );
    }

    #[test]
    fn subscribe_round_trip() {
        let subscribe = Subscribe {
            packet_id: 3,
            subscriptions: vec![
                Subscription::new("t1", QoS::AtLeastOnce),
                Subscription::new("t2", QoS::AtMostOnce),
            ],
        };
        let bytes = serialize(&subscribe).unwrap();
        assert_eq!(deserialize::<Subscribe>(&bytes), Ok(subscribe));
    }

    #[test]
    fn unsubscribe_round_trip() {
        let unsubscribe = Unsubscribe {
            packet_id: 9,
            topic_filters: vec!["t1", "t2"],
        };
        let bytes = serialize(&unsubscribe).unwrap();
        assert_eq!(deserialize::<Unsubscribe>(&bytes), Ok(unsubscribe));
    }

    #[test]
    fn acks_round_trip() {
        let bytes = serialize(&PubAck { packet_id: 11 }).unwrap();
        assert_eq!(deserialize::<PubAck>(&bytes), Ok(PubAck { packet_id: 11 }));

        let bytes = serialize(&UnsubAck { packet_id: 13 }).unwrap();
        assert_eq!(deserialize::<UnsubAck>(&bytes), Ok(UnsubAck { packet_id: 13 }));

        let bytes = serialize(&ConnAck::accepted()).unwrap();
        assert_eq!(deserialize::<ConnAck>(&bytes), Ok(ConnAck::accepted()));

        let suback = SubAck {
            packet_id: 3,
            return_codes: vec![1],
        };
        let bytes = serialize(&suback).unwrap();
        assert_eq!(deserialize::<SubAck>(&bytes), Ok(suback));

        for bytes in [serialize(&PingReq), serialize(&PingResp), serialize(&Disconnect)] {
            let bytes = bytes.unwrap();
            assert_eq!(codec::decode_map(&bytes).unwrap().len(), 1);
        }
        assert_eq!(deserialize::<PingResp>(&serialize(&PingResp).unwrap()), Ok(PingResp));
    }

    #[test]
    fn refusals_become_server_refused() {
        let bytes = serialize(&ConnAck::refused()).unwrap();
        assert_eq!(
            deserialize::<ConnAck>(&bytes),
            Err(MqttBleError::ServerRefused(ConnectionStatus::ConnectionRefused as u8))
        );

        let suback = SubAck {
            packet_id: 3,
            return_codes: vec![SubAck::REFUSED],
        };
        let bytes = serialize(&suback).unwrap();
        assert_eq!(deserialize::<SubAck>(&bytes), Err(MqttBleError::ServerRefused(0x80)));
    }

    #[test]
    fn qos2_kinds_are_unsupported() {
        let mut buf = [0u8; 8];
        let mut enc = codec::writing(&mut buf);
        codec::encode_header(&mut enc, 1, PacketType::PubRec).unwrap();
        let len = codec::encoded_len(&enc);
        assert_eq!(
            packet_type(&buf[..len]),
            Err(MqttBleError::BadParameter(ParameterError::UnsupportedPacketType(5)))
        );
    }

    #[test]
    fn decode_rejects_corrupted_first_byte() {
        let mut bytes = serialize(&PubAck { packet_id: 1 }).unwrap();
        bytes[0] = 0xFF;
        assert_eq!(
            deserialize::<PubAck>(&bytes),
            Err(MqttBleError::BadResponse(DecodeError::NotAMap))
        );
        assert_eq!(packet_type(&bytes), Err(MqttBleError::BadResponse(DecodeError::NotAMap)));
    }

    #[test]
    fn each_kind_tags_its_own_message_type() {
        assert_eq!(<Publish as BlePacket>::PACKET_TYPE, PacketType::Publish);
        assert_eq!(<SubAck as BlePacket>::PACKET_TYPE, PacketType::SubAck);
        assert_eq!(<Disconnect as BlePacket>::PACKET_TYPE, PacketType::Disconnect);

        let bytes = serialize(&UnsubAck { packet_id: 2 }).unwrap();
        assert_eq!(packet_type(&bytes), Ok(<UnsubAck as BlePacket>::PACKET_TYPE));
        let bytes = serialize(&PingReq).unwrap();
        assert_eq!(packet_type(&bytes), Ok(PacketType::PingReq));
    }

    #[test]
    fn decode_checks_message_type() {
        let bytes = serialize(&PubAck { packet_id: 1 }).unwrap();
        assert_eq!(
            deserialize::<UnsubAck>(&bytes),
            Err(MqttBleError::BadResponse(DecodeError::WrongType(KEY_MSG_TYPE)))
        );
    }
}
