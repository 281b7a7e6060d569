//! # BLE Data Channel
//!
//! The transport does not talk to a BLE stack directly. It needs a data-transfer
//! channel to the companion device that can send one encoded packet, expose the
//! packet last received without consuming it, and discard it afterwards. The BLE
//! glue of an application implements [`DataChannel`] on top of its GATT service.

/// Data-transfer services a companion device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceType {
    /// The service that carries MQTT traffic.
    Mqtt,
    /// A vendor-specific service, identified by its number.
    Other(u8),
}

/// Events a channel reports to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelEvent {
    /// The companion device opened the channel.
    Opened,
    /// A packet is waiting in the receive buffer.
    DataReceived,
    /// A previous send completed.
    DataSent,
    /// The channel was closed by either side.
    Closed,
}

/// A packet-oriented BLE data channel.
///
/// Methods take `&self`: the send path and the receive path of a transport run on
/// different tasks and share one channel, so implementations synchronize internally.
#[allow(async_fn_in_trait)]
pub trait DataChannel {
    /// Sends one encoded packet.
    ///
    /// Returns the number of bytes the channel accepted. Anything short of
    /// `data.len()` is a failed send.
    async fn send(&self, data: &[u8]) -> usize;

    /// Calls `f` with the contents of the receive buffer without consuming them.
    fn with_receive_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R;

    /// Copies up to `buf.len()` bytes out of the receive buffer, consuming them.
    fn receive(&self, buf: &mut [u8]) -> usize;

    /// Discards up to `len` bytes of the receive buffer. Returns the bytes discarded.
    fn flush(&self, len: usize) -> usize;

    fn is_open(&self) -> bool;

    fn close(&self);

    /// Drops buffered data and returns the channel to its just-opened state.
    fn reset(&self);
}

/// Opens data channels on the companion device.
pub trait DataTransferService {
    type Channel: DataChannel;

    /// Starts opening the channel of `service`.
    ///
    /// The channel is usable once it reports [`ChannelEvent::Opened`]. Returns `None`
    /// when the service is not available.
    fn open(&self, service: ServiceType) -> Option<&Self::Channel>;
}
