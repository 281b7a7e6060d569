mod common;

use common::{BROKER, MockChannel};
use embassy_futures::block_on;
use embassy_time::Duration;
use mqtt_ble_transport::codec;
use mqtt_ble_transport::config::MAX_TOPIC_LEN;
use mqtt_ble_transport::serialize::{self, ConnectRequest};
use mqtt_ble_transport::wire;
use mqtt_ble_transport::{
    BleTransport, ConnAck, Connect, DecodeError, MqttBleError, MqttTransport, PacketType,
    ParameterError, PingResp, ProtocolError, PubAck, Publish, QoS, SubAck, Subscribe,
    TransportOptions, TransportState, UnsubAck, Unsubscribe,
};

const SHORT: Duration = Duration::from_millis(10);

fn options() -> TransportOptions<'static> {
    TransportOptions::new(BROKER)
        .with_queue_timeout(SHORT)
        .with_recv_timeout(SHORT)
}

/// Drains everything currently queued for the MQTT client.
fn drain<C: mqtt_ble_transport::DataChannel, const N: usize>(
    transport: &mut BleTransport<'_, C, N>,
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = block_on(transport.recv(&mut buf));
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn connect_carries_client_id_and_broker_endpoint() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let bytes = wire::to_vec(&Connect::new("dev1", 60, true)).unwrap();
    assert_eq!(block_on(transport.send(&bytes)), Ok(bytes.len()));

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][..3], &[0xA4, 0x61, b'w']);
    let request: ConnectRequest = serialize::deserialize(&sent[0]).unwrap();
    assert_eq!(request.client_id, "dev1");
    assert_eq!(request.broker_endpoint, BROKER);
    assert!(request.clean_session);
}

#[test]
fn publish_split_across_two_sends() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    // Fixed header, topic "a/b" and packet id 1; the 5 payload bytes follow separately.
    let header = [0x32, 0x0C, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x01];
    assert_eq!(block_on(transport.send(&header)), Ok(header.len()));
    assert!(transport.is_awaiting_payload());
    assert!(channel.sent().is_empty());

    assert_eq!(block_on(transport.send(b"hello")), Ok(5));
    assert!(!transport.is_awaiting_payload());

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    let publish: Publish = serialize::deserialize(&sent[0]).unwrap();
    assert_eq!(publish.topic, "a/b");
    assert_eq!(publish.qos, QoS::AtLeastOnce);
    assert_eq!(publish.packet_id, Some(1));
    assert_eq!(publish.payload, b"hello");
}

#[test]
fn publish_payload_may_arrive_in_pieces() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let header = [0x30, 0x09, 0x00, 0x03, b'a', b'/', b'b'];
    block_on(transport.send(&header)).unwrap();
    block_on(transport.send(b"ab")).unwrap();
    assert!(transport.is_awaiting_payload());
    block_on(transport.send(b"cd")).unwrap();

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    let publish: Publish = serialize::deserialize(&sent[0]).unwrap();
    assert_eq!(publish.payload, b"abcd");
}

#[test]
fn oversized_continuation_is_rejected_and_state_reset() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let header = [0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b'];
    block_on(transport.send(&header)).unwrap();
    assert_eq!(
        block_on(transport.send(b"toolong")),
        Err(MqttBleError::BadParameter(ParameterError::PayloadLengthMismatch {
            expected: 2,
            received: 7,
        }))
    );
    assert!(!transport.is_awaiting_payload());
    assert!(channel.sent().is_empty());
}

#[test]
fn publish_over_size_limit_is_rejected_before_buffering() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options().with_max_publish_size(4));

    // Announces a 5-byte payload.
    let header = [0x30, 0x0A, 0x00, 0x03, b'a', b'/', b'b'];
    assert_eq!(
        block_on(transport.send(&header)),
        Err(MqttBleError::BadParameter(ParameterError::PublishTooLarge(5)))
    );
    assert!(!transport.is_awaiting_payload());

    // Largest remaining length a fixed header can announce.
    let mut transport = BleTransport::new(&channel, &state, options());
    let header = [0x30, 0xFF, 0xFF, 0xFF, 0x7F, 0x00, 0x03, b'a', b'/', b'b'];
    assert_eq!(
        block_on(transport.send(&header)),
        Err(MqttBleError::BadParameter(ParameterError::PublishTooLarge(268_435_450)))
    );
    assert!(!transport.is_awaiting_payload());
    assert!(channel.sent().is_empty());
}

#[test]
fn publish_topic_length_is_bounded() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let too_long = "t".repeat(MAX_TOPIC_LEN + 1);
    let bytes = wire::to_vec(&Publish::new(&too_long, b"x", QoS::AtMostOnce, None)).unwrap();
    assert_eq!(
        block_on(transport.send(&bytes)),
        Err(MqttBleError::BadParameter(ParameterError::TopicTooLong(MAX_TOPIC_LEN + 1)))
    );
    assert!(channel.sent().is_empty());

    // A topic at the limit survives a split PUBLISH.
    let topic = "t".repeat(MAX_TOPIC_LEN);
    let bytes = wire::to_vec(&Publish::new(&topic, b"xy", QoS::AtMostOnce, None)).unwrap();
    let (header, payload) = bytes.split_at(bytes.len() - 2);
    block_on(transport.send(header)).unwrap();
    assert!(transport.is_awaiting_payload());
    block_on(transport.send(payload)).unwrap();

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    let publish: Publish = serialize::deserialize(&sent[0]).unwrap();
    assert_eq!(publish.topic, topic);
    assert_eq!(publish.payload, b"xy");
}

#[test]
fn qos0_publish_omits_packet_id() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let bytes = wire::to_vec(&Publish::new("a/b", b"hi", QoS::AtMostOnce, None)).unwrap();
    block_on(transport.send(&bytes)).unwrap();

    let sent = channel.sent();
    let map = codec::decode_map(&sent[0]).unwrap();
    assert_eq!(map.len(), 4);
    assert!(!map.contains("i").unwrap());
    let publish: Publish = serialize::deserialize(&sent[0]).unwrap();
    assert_eq!(publish.packet_id, None);
    assert_eq!(publish.payload, b"hi");
}

#[test]
fn qos2_publish_never_reaches_the_channel() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let bytes = [0x34, 0x09, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x01, b'h', b'i'];
    assert_eq!(
        block_on(transport.send(&bytes)),
        Err(MqttBleError::BadParameter(ParameterError::UnsupportedQos(2)))
    );
    assert!(channel.sent().is_empty());
    assert!(!transport.is_awaiting_payload());
}

#[test]
fn qos2_packet_kinds_are_rejected() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    // PUBREC with packet id 1.
    let result = block_on(transport.send(&[0x50, 0x02, 0x00, 0x01]));
    assert!(matches!(
        result,
        Err(MqttBleError::BadParameter(ParameterError::UnsupportedPacketType(_)))
    ));
    assert!(channel.sent().is_empty());
}

#[test]
fn closed_channel_reports_channel_closed() {
    let channel = MockChannel::default();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let bytes = [0xC0, 0x00];
    assert_eq!(block_on(transport.send(&bytes)), Err(MqttBleError::ChannelClosed));
    assert!(channel.sent().is_empty());
}

#[test]
fn short_send_reports_channel_failure() {
    let channel = MockChannel::opened();
    channel.limit_sends(1);
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let result = block_on(transport.send(&[0xC0, 0x00]));
    assert!(matches!(
        result,
        Err(MqttBleError::ChannelFailure { sent: 1, .. })
    ));
}

#[test]
fn failed_subscribe_send_withdraws_outstanding_request() {
    let channel = MockChannel::opened();
    channel.limit_sends(1);
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let bytes = wire::to_vec(&Subscribe::new(5, "t", QoS::AtMostOnce)).unwrap();
    assert!(block_on(transport.send(&bytes)).is_err());
    assert_eq!(state.outstanding_subscribe(), None);
}

#[test]
fn too_many_subscriptions_are_rejected() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport =
        BleTransport::new(&channel, &state, options().with_max_subscriptions(1));

    let mut subscribe = Subscribe::new(5, "t1", QoS::AtMostOnce);
    subscribe
        .subscriptions
        .push(mqtt_ble_transport::Subscription::new("t2", QoS::AtLeastOnce));
    let bytes = wire::to_vec(&subscribe).unwrap();
    assert_eq!(
        block_on(transport.send(&bytes)),
        Err(MqttBleError::BadParameter(ParameterError::TooManySubscriptions(2)))
    );
    assert!(channel.sent().is_empty());
}

#[test]
fn accepted_connack_is_queued_as_wire_bytes() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    channel.deliver(&serialize::serialize(&ConnAck::accepted()).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Ok(PacketType::ConnAck));
    assert_eq!(channel.pending_rx(), 0);
    assert_eq!(drain(&mut transport), [0x20, 0x02, 0x00, 0x00]);
}

#[test]
fn refused_connack_is_still_queued() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    channel.deliver(&serialize::serialize(&ConnAck::refused()).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Err(MqttBleError::ServerRefused(4)));
    assert_eq!(drain(&mut transport), [0x20, 0x02, 0x00, 0x05]);
}

#[test]
fn corrupted_packet_is_flushed_and_dropped() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    let mut encoded = serialize::serialize(&PubAck { packet_id: 3 }).unwrap();
    encoded[0] = 0x00;
    channel.deliver(&encoded);
    assert_eq!(
        block_on(inbound.accept_data()),
        Err(MqttBleError::BadResponse(DecodeError::NotAMap))
    );
    assert_eq!(channel.pending_rx(), 0);
    assert!(channel.sent().is_empty());
    assert!(drain(&mut transport).is_empty());
}

#[test]
fn inbound_publish_is_rebuilt() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    let publish = Publish::new("a/b", b"hi", QoS::AtMostOnce, None);
    channel.deliver(&serialize::serialize(&publish).unwrap());
    assert!(inbound.has_data());
    assert_eq!(block_on(inbound.accept_data()), Ok(PacketType::Publish));
    assert!(!inbound.has_data());
    assert_eq!(
        drain(&mut transport),
        [0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'h', b'i']
    );
}

#[test]
fn suback_must_match_latest_subscribe() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    let bytes = wire::to_vec(&Subscribe::new(5, "t", QoS::AtLeastOnce)).unwrap();
    block_on(transport.send(&bytes)).unwrap();
    assert_eq!(state.outstanding_subscribe().map(|req| req.packet_id), Some(5));

    let wrong = SubAck {
        packet_id: 7,
        return_codes: vec![1],
    };
    channel.deliver(&serialize::serialize(&wrong).unwrap());
    assert_eq!(
        block_on(inbound.accept_data()),
        Err(MqttBleError::Protocol(ProtocolError::AckMismatch {
            expected: 5,
            received: 7,
        }))
    );
    assert!(drain(&mut transport).is_empty());

    let right = SubAck {
        packet_id: 5,
        return_codes: vec![1],
    };
    channel.deliver(&serialize::serialize(&right).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Ok(PacketType::SubAck));
    assert_eq!(state.outstanding_subscribe(), None);
    assert_eq!(drain(&mut transport), [0x90, 0x03, 0x00, 0x05, 0x01]);
}

#[test]
fn refused_suback_repeats_failure_for_each_topic() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    let mut subscribe = Subscribe::new(9, "t1", QoS::AtMostOnce);
    subscribe
        .subscriptions
        .push(mqtt_ble_transport::Subscription::new("t2", QoS::AtMostOnce));
    block_on(transport.send(&wire::to_vec(&subscribe).unwrap())).unwrap();

    let refused = SubAck {
        packet_id: 9,
        return_codes: vec![SubAck::REFUSED],
    };
    channel.deliver(&serialize::serialize(&refused).unwrap());
    assert_eq!(
        block_on(inbound.accept_data()),
        Err(MqttBleError::ServerRefused(SubAck::REFUSED))
    );
    assert_eq!(drain(&mut transport), [0x90, 0x04, 0x00, 0x09, 0x80, 0x80]);
}

#[test]
fn unexpected_unsuback_is_dropped() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    channel.deliver(&serialize::serialize(&UnsubAck { packet_id: 3 }).unwrap());
    assert_eq!(
        block_on(inbound.accept_data()),
        Err(MqttBleError::Protocol(ProtocolError::UnexpectedAck(3)))
    );

    let bytes = wire::to_vec(&Unsubscribe::new(3, "t")).unwrap();
    block_on(transport.send(&bytes)).unwrap();
    channel.deliver(&serialize::serialize(&UnsubAck { packet_id: 3 }).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Ok(PacketType::UnsubAck));
    assert_eq!(drain(&mut transport), [0xB0, 0x02, 0x00, 0x03]);
}

#[test]
fn pingresp_and_queue_overflow() {
    let channel = MockChannel::opened();
    let state: TransportState<4> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    channel.deliver(&serialize::serialize(&PingResp).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Ok(PacketType::PingResp));

    // The queue holds 2 of 4 bytes; a 4-byte PUBACK does not fit and is dropped whole.
    channel.deliver(&serialize::serialize(&PubAck { packet_id: 3 }).unwrap());
    assert_eq!(block_on(inbound.accept_data()), Err(MqttBleError::QueueFull));
    assert_eq!(channel.pending_rx(), 0);
    assert_eq!(drain(&mut transport), [0xD0, 0x00]);
}

#[test]
fn client_originated_packets_are_not_accepted_from_the_channel() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    let request = ConnectRequest {
        client_id: "dev1",
        broker_endpoint: BROKER,
        clean_session: true,
    };
    channel.deliver(&serialize::serialize(&request).unwrap());
    assert!(matches!(
        block_on(inbound.accept_data()),
        Err(MqttBleError::BadParameter(ParameterError::UnsupportedPacketType(_)))
    ));
    assert!(drain(&mut transport).is_empty());
}

#[test]
fn reset_drops_pending_publish_and_queue() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());
    let inbound = transport.inbound();

    block_on(transport.send(&[0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b'])).unwrap();
    channel.deliver(&serialize::serialize(&ConnAck::accepted()).unwrap());
    block_on(inbound.accept_data()).unwrap();

    transport.reset();
    assert!(!transport.is_awaiting_payload());
    assert!(state.queue().is_empty());
}

#[test]
fn mqtt_transport_trait_wraps_recv() {
    let channel = MockChannel::opened();
    let state: TransportState<64> = TransportState::new();
    let mut transport = BleTransport::new(&channel, &state, options());

    let mut buf = [0u8; 8];
    assert_eq!(block_on(MqttTransport::recv(&mut transport, &mut buf)), Ok(0));
    assert_eq!(
        block_on(MqttTransport::send(&mut transport, &[0xE0, 0x00])),
        Ok(2)
    );
    assert_eq!(channel.sent().len(), 1);
}
