//! A scripted BLE data channel for driving the transport in tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use mqtt_ble_transport::{DataChannel, DataTransferService, ServiceType};

pub const BROKER: &str = "broker.example.com";

#[derive(Default)]
pub struct MockChannel {
    open: Cell<bool>,
    sent: RefCell<Vec<Vec<u8>>>,
    rx: RefCell<Vec<u8>>,
    accept_limit: Cell<Option<usize>>,
}

impl MockChannel {
    pub fn opened() -> Self {
        let channel = Self::default();
        channel.open.set(true);
        channel
    }

    pub fn set_open(&self, open: bool) {
        self.open.set(open);
    }

    /// Makes every following send accept at most `limit` bytes.
    pub fn limit_sends(&self, limit: usize) {
        self.accept_limit.set(Some(limit));
    }

    /// Places one encoded packet in the receive buffer.
    pub fn deliver(&self, data: &[u8]) {
        self.rx.borrow_mut().extend_from_slice(data);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    pub fn pending_rx(&self) -> usize {
        self.rx.borrow().len()
    }
}

impl DataChannel for MockChannel {
    async fn send(&self, data: &[u8]) -> usize {
        let accepted = match self.accept_limit.get() {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        };
        self.sent.borrow_mut().push(data[..accepted].to_vec());
        accepted
    }

    fn with_receive_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.rx.borrow())
    }

    fn receive(&self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx.borrow_mut();
        let n = buf.len().min(rx.len());
        buf[..n].copy_from_slice(&rx[..n]);
        rx.drain(..n);
        n
    }

    fn flush(&self, len: usize) -> usize {
        let mut rx = self.rx.borrow_mut();
        let n = len.min(rx.len());
        rx.drain(..n);
        n
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn close(&self) {
        self.open.set(false);
    }

    fn reset(&self) {
        self.rx.borrow_mut().clear();
        self.sent.borrow_mut().clear();
    }
}

/// A companion device that only offers the MQTT service.
#[derive(Default)]
pub struct MockService {
    pub channel: MockChannel,
}

impl DataTransferService for MockService {
    type Channel = MockChannel;

    fn open(&self, service: ServiceType) -> Option<&MockChannel> {
        match service {
            ServiceType::Mqtt => {
                self.channel.set_open(true);
                Some(&self.channel)
            }
            ServiceType::Other(_) => None,
        }
    }
}
