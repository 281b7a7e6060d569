//! # Receive Byte Queue
//!
//! BLE delivers whole packets, while an MQTT client reads its transport as a byte
//! stream. The queue bridges the two: every rebuilt packet goes in as one atomic write,
//! and reads drain whatever is available.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};

use crate::error::MqttBleError;

/// A bounded byte queue with all-or-nothing writes.
///
/// Safe to share between the task that accepts BLE data and the task that runs the
/// MQTT client.
pub struct ByteQueue<const N: usize> {
    pipe: Pipe<CriticalSectionRawMutex, N>,
    writer: Mutex<CriticalSectionRawMutex, ()>,
    space: Signal<CriticalSectionRawMutex, ()>,
}

impl<const N: usize> ByteQueue<N> {
    pub const fn new() -> Self {
        Self {
            pipe: Pipe::new(),
            writer: Mutex::new(()),
            space: Signal::new(),
        }
    }

    /// Writes `bytes` as a whole or not at all.
    ///
    /// Waits up to `timeout` for enough free space. A packet larger than the queue
    /// fails at once.
    pub async fn push_packet(&self, bytes: &[u8], timeout: Duration) -> Result<(), MqttBleError> {
        if bytes.len() > N {
            return Err(MqttBleError::QueueFull);
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let write = async {
            let _guard = self.writer.lock().await;
            loop {
                if self.pipe.free_capacity() >= bytes.len() {
                    // A write stops at the ring's wrap point; the rest fits after it.
                    let mut rest = bytes;
                    while let Ok(n) = self.pipe.try_write(rest) {
                        rest = &rest[n..];
                        if rest.is_empty() {
                            break;
                        }
                    }
                    return;
                }
                self.space.wait().await;
            }
        };
        with_timeout(timeout, write)
            .await
            .map_err(|_| MqttBleError::QueueFull)
    }

    /// Reads up to `buf.len()` bytes, waiting up to `timeout` for the first one.
    ///
    /// Returns 0 when nothing arrived in time.
    pub async fn pop(&self, buf: &mut [u8], timeout: Duration) -> usize {
        if buf.is_empty() {
            return 0;
        }
        match with_timeout(timeout, self.pipe.read(buf)).await {
            Ok(n) => {
                self.space.signal(());
                n
            }
            Err(_) => 0,
        }
    }

    /// Reads up to `buf.len()` bytes, waiting as long as it takes for the first one.
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let n = self.pipe.read(buf).await;
        self.space.signal(());
        n
    }

    /// Reads whatever is available without waiting.
    pub fn try_pop(&self, buf: &mut [u8]) -> usize {
        match self.pipe.try_read(buf) {
            Ok(n) => {
                self.space.signal(());
                n
            }
            Err(_) => 0,
        }
    }

    /// Bytes waiting to be read.
    pub fn len(&self) -> usize {
        self.pipe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipe.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Discards all queued bytes.
    pub fn clear(&self) {
        self.pipe.clear();
        self.space.signal(());
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
