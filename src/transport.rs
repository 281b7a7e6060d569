//! # MQTT Transport over BLE
//!
//! This module defines the `MqttTransport` trait an MQTT client drives, and its BLE
//! implementation. The transport is split in two halves that share one
//! [`TransportState`]:
//!
//! - [`BleTransport`] is the send side plus stream reads. The MQTT client owns it.
//! - [`Inbound`] turns packets arriving on the channel back into MQTT wire bytes. The
//!   task that handles channel events owns it.
//!
//! With the Rust 2024 Edition, the trait uses native `async fn`.

use alloc::vec::Vec;
use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};

use crate::channel::DataChannel;
use crate::codec::{self, KEY_MESSAGE_ID};
use crate::config::{MAX_TOPIC_LEN, TransportOptions};
use crate::error::{MqttBleError, ParameterError, ProtocolError};
use crate::packet::{
    ConnAck, Disconnect, MqttPacket, PacketType, PingReq, PingResp, PubAck, Publish, QoS,
    SubAck, UnsubAck,
};
use crate::queue::ByteQueue;
use crate::serialize::{self, ConnectRequest, DecodeBle, EncodeBle};
use crate::util::try_vec;
use crate::wire::{self, ParsedPublish};

/// A trait representing a transport for MQTT packets.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    /// The error type returned by the transport.
    type Error: core::fmt::Debug;

    /// Sends wire-format bytes. Returns how many bytes of `buf` were consumed.
    async fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Receives data from the transport into a buffer.
    ///
    /// Returns the number of bytes read; 0 means nothing arrived in time.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Generates packet identifiers for outbound requests.
///
/// Starts at 1 and steps by 2, so identifiers stay odd and never reach 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIdSequence {
    next: u16,
}

impl PacketIdSequence {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(2);
        id
    }
}

impl Default for PacketIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// An outbound SUBSCRIBE or UNSUBSCRIBE waiting for its acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutstandingRequest {
    pub packet_id: u16,
    /// Number of topic filters in the request.
    pub topic_count: usize,
}

/// How the acknowledgment of one request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AckOutcome {
    packet_id: u16,
    result: Result<(), MqttBleError>,
}

/// Tracks the most recent request of each acknowledged kind.
struct AckSlot {
    pending: BlockingMutex<CriticalSectionRawMutex, Cell<Option<OutstandingRequest>>>,
    outcome: Signal<CriticalSectionRawMutex, AckOutcome>,
}

impl AckSlot {
    const fn new() -> Self {
        Self {
            pending: BlockingMutex::new(Cell::new(None)),
            outcome: Signal::new(),
        }
    }

    fn expect(&self, request: OutstandingRequest) {
        self.outcome.reset();
        self.pending.lock(|cell| cell.set(Some(request)));
    }

    /// Clears the slot if it still holds `packet_id`.
    fn withdraw(&self, packet_id: u16) {
        self.pending.lock(|cell| {
            if cell.get().is_some_and(|req| req.packet_id == packet_id) {
                cell.set(None);
            }
        });
    }

    /// Matches an acknowledgment against the outstanding request.
    ///
    /// A match clears the slot. A match or a mismatch is reported to the task waiting
    /// in [`AckSlot::settle`]; `refusal` is the status of a refused request.
    fn complete(
        &self,
        received: u16,
        refusal: Option<u8>,
    ) -> Result<OutstandingRequest, ProtocolError> {
        let result = self.pending.lock(|cell| match cell.get() {
            Some(req) if req.packet_id == received => {
                cell.set(None);
                Ok(req)
            }
            Some(req) => Err(ProtocolError::AckMismatch {
                expected: req.packet_id,
                received,
            }),
            None => Err(ProtocolError::UnexpectedAck(received)),
        });
        match result {
            Ok(req) => self.outcome.signal(AckOutcome {
                packet_id: req.packet_id,
                result: refusal.map_or(Ok(()), |status| Err(MqttBleError::ServerRefused(status))),
            }),
            Err(err @ ProtocolError::AckMismatch { expected, .. }) => {
                self.outcome.signal(AckOutcome {
                    packet_id: expected,
                    result: Err(err.into()),
                })
            }
            Err(ProtocolError::UnexpectedAck(_)) => {}
        }
        result
    }

    /// Waits for the acknowledgment of `packet_id` and returns how it settled.
    ///
    /// A refused, mismatched or missing acknowledgment withdraws the request.
    async fn settle(&self, packet_id: u16, timeout: Duration) -> Result<(), MqttBleError> {
        let wait = async {
            loop {
                let outcome = self.outcome.wait().await;
                if outcome.packet_id == packet_id {
                    return outcome.result;
                }
            }
        };
        let result = with_timeout(timeout, wait)
            .await
            .unwrap_or(Err(MqttBleError::Timeout));
        if result.is_err() {
            self.withdraw(packet_id);
        }
        result
    }

    fn get(&self) -> Option<OutstandingRequest> {
        self.pending.lock(Cell::get)
    }

    fn clear(&self) {
        self.outcome.reset();
        self.pending.lock(|cell| cell.set(None));
    }
}

/// State shared by the send and receive halves of one transport.
///
/// `N` is the capacity of the receive byte queue. Construct it in a `static` or keep
/// it alive for as long as the transport.
pub struct TransportState<const N: usize> {
    queue: ByteQueue<N>,
    subscribe: AckSlot,
    unsubscribe: AckSlot,
}

impl<const N: usize> TransportState<N> {
    pub const fn new() -> Self {
        Self {
            queue: ByteQueue::new(),
            subscribe: AckSlot::new(),
            unsubscribe: AckSlot::new(),
        }
    }

    pub fn queue(&self) -> &ByteQueue<N> {
        &self.queue
    }

    /// The SUBSCRIBE still waiting for its SUBACK, if any.
    pub fn outstanding_subscribe(&self) -> Option<OutstandingRequest> {
        self.subscribe.get()
    }

    /// The UNSUBSCRIBE still waiting for its UNSUBACK, if any.
    pub fn outstanding_unsubscribe(&self) -> Option<OutstandingRequest> {
        self.unsubscribe.get()
    }

    fn clear(&self) {
        self.queue.clear();
        self.subscribe.clear();
        self.unsubscribe.clear();
    }
}

impl<const N: usize> Default for TransportState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A PUBLISH whose header has been sent to the transport but whose payload has not.
#[derive(Debug)]
struct PendingPublish {
    topic: heapless::String<MAX_TOPIC_LEN>,
    qos: QoS,
    retain: bool,
    dup: bool,
    packet_id: Option<u16>,
    payload: Vec<u8>,
    payload_len: usize,
}

impl PendingPublish {
    fn new(parsed: &ParsedPublish<'_>) -> Result<Self, MqttBleError> {
        let mut topic = heapless::String::new();
        topic
            .push_str(parsed.publish.topic)
            .map_err(|_| ParameterError::TopicTooLong(parsed.publish.topic.len()))?;

        let mut payload = try_vec(parsed.payload_len)?;
        payload.extend_from_slice(parsed.publish.payload);

        Ok(Self {
            topic,
            qos: parsed.publish.qos,
            retain: parsed.publish.retain,
            dup: parsed.publish.dup,
            packet_id: parsed.publish.packet_id,
            payload,
            payload_len: parsed.payload_len,
        })
    }

    fn missing(&self) -> usize {
        self.payload_len - self.payload.len()
    }

    fn as_publish(&self) -> Publish<'_> {
        Publish {
            topic: &self.topic,
            qos: self.qos,
            retain: self.retain,
            dup: self.dup,
            packet_id: self.packet_id,
            payload: &self.payload,
        }
    }
}

/// The outbound side of the two-part PUBLISH protocol.
#[derive(Debug, Default)]
enum OutboundState {
    #[default]
    Idle,
    AwaitingPayload(PendingPublish),
}

/// The send half of the transport, and the reader of the receive queue.
///
/// Not safe for concurrent sends: the MQTT client that owns it must serialize calls.
pub struct BleTransport<'a, C: DataChannel, const N: usize> {
    channel: &'a C,
    state: &'a TransportState<N>,
    options: TransportOptions<'a>,
    outbound: OutboundState,
    packet_ids: PacketIdSequence,
}

impl<'a, C: DataChannel, const N: usize> BleTransport<'a, C, N> {
    pub fn new(channel: &'a C, state: &'a TransportState<N>, options: TransportOptions<'a>) -> Self {
        Self {
            channel,
            state,
            options,
            outbound: OutboundState::Idle,
            packet_ids: PacketIdSequence::new(),
        }
    }

    /// The receive half, for the task that handles channel events.
    pub fn inbound(&self) -> Inbound<'a, C, N> {
        Inbound {
            channel: self.channel,
            state: self.state,
            queue_timeout: self.options.queue_timeout,
        }
    }

    pub fn options(&self) -> &TransportOptions<'a> {
        &self.options
    }

    /// Next identifier for an outbound SUBSCRIBE, UNSUBSCRIBE or QoS 1 PUBLISH.
    pub fn next_packet_id(&mut self) -> u16 {
        self.packet_ids.next_id()
    }

    /// Waits until the SUBACK for `packet_id` has been accepted from the channel.
    ///
    /// The SUBACK itself stays in the receive queue for the MQTT client. A refused
    /// subscription returns [`MqttBleError::ServerRefused`] and an acknowledgment for
    /// another identifier returns [`MqttBleError::Protocol`].
    pub async fn wait_for_suback(&self, packet_id: u16, timeout: Duration) -> Result<(), MqttBleError> {
        self.state.subscribe.settle(packet_id, timeout).await
    }

    /// Waits until the UNSUBACK for `packet_id` has been accepted from the channel.
    pub async fn wait_for_unsuback(&self, packet_id: u16, timeout: Duration) -> Result<(), MqttBleError> {
        self.state.unsubscribe.settle(packet_id, timeout).await
    }

    /// Whether a PUBLISH header was sent and its payload is still expected.
    pub fn is_awaiting_payload(&self) -> bool {
        matches!(self.outbound, OutboundState::AwaitingPayload(_))
    }

    /// Drops any half-sent PUBLISH, queued bytes and outstanding acknowledgments.
    pub fn reset(&mut self) {
        self.outbound = OutboundState::Idle;
        self.state.clear();
    }

    /// Parses one send call of wire bytes and transmits its compact encoding.
    ///
    /// Returns `buf.len()` when the bytes were consumed. Nothing reaches the channel
    /// when parsing or encoding fails.
    pub async fn send(&mut self, buf: &[u8]) -> Result<usize, MqttBleError> {
        let result = if self.is_awaiting_payload() {
            self.continue_publish(buf).await
        } else {
            self.send_packet(buf).await
        };
        if let Err(err) = &result {
            error!("Failed to send packet: {:?}", err);
        }
        result
    }

    /// Reads up to `buf.len()` rebuilt wire bytes.
    ///
    /// Waits up to the configured receive timeout and returns 0 when nothing arrived.
    pub async fn recv(&mut self, buf: &mut [u8]) -> usize {
        self.state.queue.pop(buf, self.options.recv_timeout).await
    }

    async fn send_packet(&mut self, buf: &[u8]) -> Result<usize, MqttBleError> {
        let first = *buf.first().ok_or(ParameterError::MalformedPacket)?;
        let packet_type =
            PacketType::from_header(first).ok_or(ParameterError::UnsupportedPacketType(first >> 4))?;
        if !packet_type.is_client_originated() {
            return Err(ParameterError::UnsupportedPacketType(packet_type.code()).into());
        }

        match packet_type {
            PacketType::Connect => {
                debug!("Processing outgoing CONNECT.");
                let connect = wire::parse_connect(buf)?;
                if connect.username.is_some() || connect.password.is_some() {
                    warn!("Username and password are not forwarded over BLE.");
                }
                let request = ConnectRequest::new(&connect, self.options.broker_endpoint);
                self.transmit(&request).await?;
            }
            PacketType::Publish => {
                debug!("Processing outgoing PUBLISH.");
                let parsed = wire::parse_publish(buf)?;
                self.check_publish_limits(&parsed)?;
                if !parsed.is_complete() {
                    debug!("PUBLISH payload pending, {} bytes missing.", parsed.missing());
                    self.outbound = OutboundState::AwaitingPayload(PendingPublish::new(&parsed)?);
                    return Ok(buf.len());
                }
                self.transmit(&parsed.publish).await?;
            }
            PacketType::PubAck => {
                debug!("Processing outgoing PUBACK.");
                let puback = wire::parse_puback(buf)?;
                self.transmit(&puback).await?;
            }
            PacketType::Subscribe => {
                debug!("Processing outgoing SUBSCRIBE.");
                let subscribe = wire::parse_subscribe(buf)?;
                self.check_subscription_count(subscribe.subscriptions.len())?;
                let request = OutstandingRequest {
                    packet_id: subscribe.packet_id,
                    topic_count: subscribe.subscriptions.len(),
                };
                self.state.subscribe.expect(request);
                if let Err(err) = self.transmit(&subscribe).await {
                    self.state.subscribe.withdraw(request.packet_id);
                    return Err(err);
                }
            }
            PacketType::Unsubscribe => {
                debug!("Processing outgoing UNSUBSCRIBE.");
                let unsubscribe = wire::parse_unsubscribe(buf)?;
                self.check_subscription_count(unsubscribe.topic_filters.len())?;
                let request = OutstandingRequest {
                    packet_id: unsubscribe.packet_id,
                    topic_count: unsubscribe.topic_filters.len(),
                };
                self.state.unsubscribe.expect(request);
                if let Err(err) = self.transmit(&unsubscribe).await {
                    self.state.unsubscribe.withdraw(request.packet_id);
                    return Err(err);
                }
            }
            PacketType::PingReq => {
                debug!("Processing outgoing PINGREQ.");
                wire::parse_empty(buf, PacketType::PingReq)?;
                self.transmit(&PingReq).await?;
            }
            PacketType::Disconnect => {
                debug!("Processing outgoing DISCONNECT.");
                wire::parse_empty(buf, PacketType::Disconnect)?;
                self.transmit(&Disconnect).await?;
            }
            other => {
                return Err(ParameterError::UnsupportedPacketType(other.code()).into());
            }
        }
        Ok(buf.len())
    }

    /// Appends a payload continuation to the pending PUBLISH, transmitting once whole.
    async fn continue_publish(&mut self, buf: &[u8]) -> Result<usize, MqttBleError> {
        let OutboundState::AwaitingPayload(mut pending) = core::mem::take(&mut self.outbound) else {
            return Err(ParameterError::MalformedPacket.into());
        };
        if buf.len() > pending.missing() {
            return Err(ParameterError::PayloadLengthMismatch {
                expected: pending.missing(),
                received: buf.len(),
            }
            .into());
        }
        pending.payload.extend_from_slice(buf);
        if pending.missing() > 0 {
            self.outbound = OutboundState::AwaitingPayload(pending);
            return Ok(buf.len());
        }
        debug!("Processing outgoing PUBLISH payload.");
        self.transmit(&pending.as_publish()).await?;
        Ok(buf.len())
    }

    fn check_publish_limits(&self, parsed: &ParsedPublish<'_>) -> Result<(), MqttBleError> {
        if parsed.payload_len > self.options.max_publish_size {
            return Err(ParameterError::PublishTooLarge(parsed.payload_len).into());
        }
        if parsed.publish.topic.len() > MAX_TOPIC_LEN {
            return Err(ParameterError::TopicTooLong(parsed.publish.topic.len()).into());
        }
        Ok(())
    }

    fn check_subscription_count(&self, count: usize) -> Result<(), MqttBleError> {
        if count > self.options.max_subscriptions {
            return Err(ParameterError::TooManySubscriptions(count).into());
        }
        Ok(())
    }

    async fn transmit<P: EncodeBle + ?Sized>(&self, packet: &P) -> Result<(), MqttBleError> {
        if !self.channel.is_open() {
            return Err(MqttBleError::ChannelClosed);
        }
        let encoded = serialize::serialize(packet)?;
        let sent = self.channel.send(&encoded).await;
        if sent != encoded.len() {
            return Err(MqttBleError::ChannelFailure {
                expected: encoded.len(),
                sent,
            });
        }
        trace!("Sent {} encoded bytes.", sent);
        Ok(())
    }
}

impl<C: DataChannel, const N: usize> MqttTransport for BleTransport<'_, C, N> {
    type Error = MqttBleError;

    async fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        BleTransport::send(self, buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(BleTransport::recv(self, buf).await)
    }
}

impl<C: DataChannel, const N: usize> embedded_io_async::ErrorType for BleTransport<'_, C, N> {
    type Error = MqttBleError;
}

impl<C: DataChannel, const N: usize> embedded_io_async::Write for BleTransport<'_, C, N> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        BleTransport::send(self, buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Stream reads block until at least one byte is available.
impl<C: DataChannel, const N: usize> embedded_io_async::Read for BleTransport<'_, C, N> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.state.queue.read(buf).await)
    }
}

/// A packet rebuilt in wire format, ready for the receive queue.
struct Rebuilt {
    packet_type: PacketType,
    wire: Vec<u8>,
    /// Status of a refused CONNACK or SUBACK.
    refusal: Option<u8>,
}

impl Rebuilt {
    fn accepted(packet_type: PacketType, wire: Vec<u8>) -> Self {
        Self {
            packet_type,
            wire,
            refusal: None,
        }
    }
}

/// The receive half of the transport.
///
/// Cheap to copy; hand one to the task that reacts to [`crate::ChannelEvent::DataReceived`].
pub struct Inbound<'a, C: DataChannel, const N: usize> {
    channel: &'a C,
    state: &'a TransportState<N>,
    queue_timeout: Duration,
}

impl<C: DataChannel, const N: usize> Clone for Inbound<'_, C, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: DataChannel, const N: usize> Copy for Inbound<'_, C, N> {}

impl<'a, C: DataChannel, const N: usize> Inbound<'a, C, N> {
    /// Whether the channel holds received data.
    pub fn has_data(&self) -> bool {
        self.channel.with_receive_buffer(|data| !data.is_empty())
    }

    /// Moves the packet waiting on the channel into the receive queue.
    ///
    /// The packet is decoded, rebuilt in MQTT wire format and enqueued as one write.
    /// The channel's receive buffer is flushed whether or not this succeeds. A refused
    /// CONNACK or SUBACK is still enqueued so the MQTT client sees the refusal, and
    /// the call reports [`MqttBleError::ServerRefused`].
    pub async fn accept_data(&self) -> Result<PacketType, MqttBleError> {
        let (peeked, rebuilt) = self
            .channel
            .with_receive_buffer(|data| (data.len(), self.rebuild(data)));
        self.channel.flush(peeked);

        let rebuilt = rebuilt.inspect_err(|err| {
            error!("Dropping received packet: {:?}", err);
        })?;

        if let Err(err) = self
            .state
            .queue
            .push_packet(&rebuilt.wire, self.queue_timeout)
            .await
        {
            warn!("Receive queue full, dropped {} bytes.", rebuilt.wire.len());
            return Err(err);
        }
        trace!("Queued {} wire bytes.", rebuilt.wire.len());

        match rebuilt.refusal {
            Some(status) => {
                warn!("Server refused request with status {}.", status);
                Err(MqttBleError::ServerRefused(status))
            }
            None => Ok(rebuilt.packet_type),
        }
    }

    fn rebuild(&self, data: &[u8]) -> Result<Rebuilt, MqttBleError> {
        let (packet_type, map) = serialize::decode_message(data)?;
        if !packet_type.is_server_originated() {
            return Err(ParameterError::UnsupportedPacketType(packet_type.code()).into());
        }

        match packet_type {
            PacketType::ConnAck => {
                debug!("Processing incoming CONNACK.");
                match ConnAck::decode_ble(&map) {
                    Ok(ack) => Ok(Rebuilt::accepted(packet_type, wire::to_vec(&ack)?)),
                    Err(MqttBleError::ServerRefused(status)) => Ok(Rebuilt {
                        packet_type,
                        wire: wire::to_vec(&ConnAck::refused())?,
                        refusal: Some(status),
                    }),
                    Err(err) => Err(err),
                }
            }
            PacketType::Publish => {
                debug!("Processing incoming PUBLISH.");
                let publish = Publish::decode_ble(&map)?;
                Ok(Rebuilt::accepted(packet_type, wire::to_vec(&publish)?))
            }
            PacketType::PubAck => {
                debug!("Processing incoming PUBACK.");
                let puback = PubAck::decode_ble(&map)?;
                Ok(Rebuilt::accepted(packet_type, wire::to_vec(&puback)?))
            }
            PacketType::SubAck => {
                debug!("Processing incoming SUBACK.");
                let (packet_id, status, refusal) = match SubAck::decode_ble(&map) {
                    Ok(ack) => {
                        let granted = ack.return_codes.first().copied().unwrap_or(SubAck::REFUSED);
                        (ack.packet_id, granted, None)
                    }
                    Err(MqttBleError::ServerRefused(status)) => {
                        let packet_id = codec::decode_u16(&map, KEY_MESSAGE_ID)?;
                        (packet_id, SubAck::REFUSED, Some(status))
                    }
                    Err(err) => return Err(err),
                };
                let request = self.state.subscribe.complete(packet_id, refusal)?;
                let mut return_codes = try_vec(request.topic_count)?;
                return_codes.resize(request.topic_count, status);
                let ack = SubAck {
                    packet_id,
                    return_codes,
                };
                Ok(Rebuilt {
                    packet_type,
                    wire: wire::to_vec(&ack)?,
                    refusal,
                })
            }
            PacketType::UnsubAck => {
                debug!("Processing incoming UNSUBACK.");
                let ack = UnsubAck::decode_ble(&map)?;
                self.state.unsubscribe.complete(ack.packet_id, None)?;
                Ok(Rebuilt::accepted(packet_type, wire::to_vec(&ack)?))
            }
            PacketType::PingResp => {
                debug!("Processing incoming PINGRESP.");
                PingResp::decode_ble(&map)?;
                Ok(Rebuilt::accepted(packet_type, wire::to_vec(&MqttPacket::PingResp)?))
            }
            other => Err(ParameterError::UnsupportedPacketType(other.code()).into()),
        }
    }
}
