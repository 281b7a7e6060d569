//! # MQTT Transport over BLE
//!
//! `mqtt-ble-transport` lets an unmodified MQTT 3.1.1 client reach a broker through a
//! BLE companion device, such as a phone running a vendor SDK. The client writes
//! ordinary MQTT wire bytes; the transport re-encodes each packet into a compact,
//! CBOR-based key/value message and sends it over a BLE data channel. Messages coming
//! back are decoded, rebuilt in MQTT wire format and queued as a byte stream for the
//! client to read.
//!
//! ## Core Features
//!
//! - **`no_std` with `alloc`:** Runs on bare-metal microcontrollers with a heap.
//!   Allocation failures surface as [`MqttBleError::NoMemory`].
//! - **Fully Async:** Built on the Embassy ecosystem. Timeouts use `embassy-time` and the
//!   shared state uses `embassy-sync` primitives.
//! - **Client Agnostic:** [`BleTransport`] implements the [`MqttTransport`] trait as
//!   well as `embedded_io_async::{Read, Write}`.
//! - **QoS 0 & 1:** QoS 2 packets are rejected before anything reaches the channel.
//!
//! ## Architecture
//!
//! The transport is split in two halves sharing a [`TransportState`]:
//!
//! ```ignore
//! static STATE: TransportState<200> = TransportState::new();
//! static EVENTS: ChannelEvents = ChannelEvents::new();
//!
//! let channel = session::open_channel(&service, &EVENTS, options.handshake_timeout).await?;
//! let mut transport = BleTransport::new(channel, &STATE, options);
//!
//! // Task that reacts to channel events.
//! session::run_inbound(transport.inbound(), &EVENTS).await;
//!
//! // Task that runs the MQTT client.
//! transport.send(&connect_bytes).await?;
//! let n = transport.recv(&mut buf).await;
//! ```
//!
//! A PUBLISH may arrive in two `send` calls: the fixed header, topic and packet
//! identifier first, then the payload. The transport holds the first part until the
//! payload completes the packet.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod fmt;

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod packet;
pub mod queue;
pub mod serialize;
pub mod session;
pub mod transport;
pub mod util;
pub mod wire;

// Re-export key types for easier access at the crate root.
pub use channel::{ChannelEvent, DataChannel, DataTransferService, ServiceType};
pub use config::TransportOptions;
pub use error::{DecodeError, MqttBleError, ParameterError, ProtocolError};
pub use packet::{
    ConnAck, Connect, ConnectReturnCode, Disconnect, MqttPacket, PacketType, PingReq,
    PingResp, PubAck, Publish, QoS, SubAck, Subscribe, Subscription, UnsubAck, Unsubscribe,
};
pub use queue::ByteQueue;
pub use serialize::{BlePacket, ConnectRequest, DecodeBle, EncodeBle};
pub use session::ChannelEvents;
pub use transport::{BleTransport, Inbound, MqttTransport, PacketIdSequence, TransportState};
pub use wire::{DecodePacket, EncodePacket};
