//! # Channel Session
//!
//! Glue between a BLE stack and the transport: opening the MQTT data channel with a
//! bounded handshake, routing channel events, and pumping received packets into the
//! transport's receive queue.

use alloc::vec::Vec;
use core::pin::pin;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use futures::future::{Either, select};

use crate::channel::{ChannelEvent, DataChannel, DataTransferService, ServiceType};
use crate::error::MqttBleError;
use crate::packet::{Subscribe, Subscription, Unsubscribe};
use crate::transport::{BleTransport, Inbound};
use crate::util::try_vec;
use crate::wire;

/// Channel events, raised by the BLE stack and awaited by the session tasks.
pub struct ChannelEvents {
    opened: Signal<CriticalSectionRawMutex, ()>,
    data: Signal<CriticalSectionRawMutex, ()>,
    closed: Signal<CriticalSectionRawMutex, ()>,
}

impl ChannelEvents {
    pub const fn new() -> Self {
        Self {
            opened: Signal::new(),
            data: Signal::new(),
            closed: Signal::new(),
        }
    }

    /// Records an event. Call this from the channel's event callback.
    pub fn notify(&self, event: ChannelEvent) {
        trace!("Channel event: {:?}", event);
        match event {
            ChannelEvent::Opened => self.opened.signal(()),
            ChannelEvent::DataReceived => self.data.signal(()),
            ChannelEvent::DataSent => {}
            ChannelEvent::Closed => self.closed.signal(()),
        }
    }

    /// Forgets events from a previous session.
    pub fn reset(&self) {
        self.opened.reset();
        self.data.reset();
        self.closed.reset();
    }
}

impl Default for ChannelEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens the MQTT data channel and waits for the companion device to accept it.
///
/// The channel is closed again when it does not open within `timeout`.
pub async fn open_channel<'s, S: DataTransferService>(
    service: &'s S,
    events: &ChannelEvents,
    timeout: Duration,
) -> Result<&'s S::Channel, MqttBleError> {
    events.reset();
    let channel = service.open(ServiceType::Mqtt).ok_or_else(|| {
        error!("MQTT data channel is not available.");
        MqttBleError::ChannelClosed
    })?;

    match select(pin!(events.opened.wait()), pin!(Timer::after(timeout))).await {
        Either::Left(((), _)) => {
            info!("MQTT data channel opened.");
            Ok(channel)
        }
        Either::Right(((), _)) => {
            error!("Timed out waiting for the MQTT data channel to open.");
            channel.close();
            Err(MqttBleError::Timeout)
        }
    }
}

/// Moves received packets into the transport until the channel closes.
pub async fn run_inbound<C: DataChannel, const N: usize>(
    inbound: Inbound<'_, C, N>,
    events: &ChannelEvents,
) {
    loop {
        match select(pin!(events.data.wait()), pin!(events.closed.wait())).await {
            Either::Left(((), _)) => {
                while inbound.has_data() {
                    // Ack outcomes reach their waiters through the transport state.
                    if let Err(err) = inbound.accept_data().await {
                        warn!("Inbound packet not delivered: {:?}", err);
                    }
                }
            }
            Either::Right(((), _)) => {
                info!("MQTT data channel closed.");
                return;
            }
        }
    }
}

/// Sends one SUBSCRIBE per topic filter, each after the previous one was acknowledged.
///
/// Companion SDKs acknowledge one topic per request, so a multi-topic subscription is
/// split up front. Needs [`run_inbound`] running on another task. Returns the packet
/// identifiers in the order of `subscriptions`; the SUBACKs stay in the receive queue.
///
/// Stops at the first topic the companion device refuses, with
/// [`MqttBleError::ServerRefused`], or whose SUBACK carries another identifier, with
/// [`MqttBleError::Protocol`].
pub async fn subscribe_each<C: DataChannel, const N: usize>(
    transport: &mut BleTransport<'_, C, N>,
    subscriptions: &[Subscription<'_>],
    ack_timeout: Duration,
) -> Result<Vec<u16>, MqttBleError> {
    let mut ids = try_vec(subscriptions.len())?;
    for subscription in subscriptions {
        let packet_id = transport.next_packet_id();
        let subscribe = Subscribe::new(packet_id, subscription.topic_filter, subscription.qos);
        transport.send(&wire::to_vec(&subscribe)?).await?;
        transport.wait_for_suback(packet_id, ack_timeout).await?;
        ids.push(packet_id);
    }
    Ok(ids)
}

/// Sends one UNSUBSCRIBE per topic filter. See [`subscribe_each`].
pub async fn unsubscribe_each<C: DataChannel, const N: usize>(
    transport: &mut BleTransport<'_, C, N>,
    topic_filters: &[&str],
    ack_timeout: Duration,
) -> Result<Vec<u16>, MqttBleError> {
    let mut ids = try_vec(topic_filters.len())?;
    for topic_filter in topic_filters {
        let packet_id = transport.next_packet_id();
        let unsubscribe = Unsubscribe::new(packet_id, topic_filter);
        transport.send(&wire::to_vec(&unsubscribe)?).await?;
        transport.wait_for_unsuback(packet_id, ack_timeout).await?;
        ids.push(packet_id);
    }
    Ok(ids)
}
