//! Transport configuration.

use embassy_time::Duration;

/// Default capacity of the receive byte queue, in bytes.
pub const DEFAULT_RX_BUFFER_SIZE: usize = 200;

/// Default upper bound on topic filters in one SUBSCRIBE or UNSUBSCRIBE.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 10;

/// Default upper bound on the payload of one outbound PUBLISH, in bytes.
pub const DEFAULT_MAX_PUBLISH_SIZE: usize = 4096;

/// Longest topic name an outbound PUBLISH may carry.
pub const MAX_TOPIC_LEN: usize = 256;

/// How long an inbound packet may wait for room in the receive queue.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// How long a read waits for the first byte before returning 0.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// How long to wait for the companion device to open the data channel.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Options shared by the send and receive halves of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions<'a> {
    /// Broker the companion device connects to on the device's behalf.
    pub broker_endpoint: &'a str,
    pub queue_timeout: Duration,
    pub recv_timeout: Duration,
    pub max_subscriptions: usize,
    /// Payloads announced larger than this are rejected before any buffering.
    pub max_publish_size: usize,
    pub handshake_timeout: Duration,
}

impl<'a> TransportOptions<'a> {
    pub const fn new(broker_endpoint: &'a str) -> Self {
        Self {
            broker_endpoint,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_publish_size: DEFAULT_MAX_PUBLISH_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub const fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub const fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub const fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    pub const fn with_max_publish_size(mut self, max: usize) -> Self {
        self.max_publish_size = max;
        self
    }

    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
