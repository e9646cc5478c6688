//! Test utilities for exercising the relay without radio hardware
//!
//! The [`MockTransport`] is a scriptable [`LinkTransport`]: tests configure
//! failure behavior up front (refuse connects, hide the required channels,
//! fail specific writes) and inspect the frames the relay produced through
//! a shared [`WriteLog`].
//!
//! These utilities are compiled into the library so integration tests and
//! downstream crates can drive the relay deterministically.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::PeripheralAddress;
use crate::error::{RelayError, Result};
use crate::link::{ChannelHandle, Discovered, LinkTransport};
use crate::relay::PowerSource;

/// Status channel handle minted by the mock
pub const MOCK_STATUS_CHANNEL: ChannelHandle = ChannelHandle::new(1);

/// Message channel handle minted by the mock
pub const MOCK_MESSAGE_CHANNEL: ChannelHandle = ChannelHandle::new(2);

/// One frame the relay wrote through the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Channel the frame was written to
    pub channel: ChannelHandle,
    /// Raw frame bytes
    pub frame: Vec<u8>,
}

/// Shared, cloneable view of the frames written through a [`MockTransport`]
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    records: Arc<Mutex<Vec<WriteRecord>>>,
}

impl WriteLog {
    /// All writes so far, in order
    pub fn all(&self) -> Vec<WriteRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Writes that went to the status channel
    pub fn status_frames(&self) -> Vec<Vec<u8>> {
        self.frames_on(MOCK_STATUS_CHANNEL)
    }

    /// Writes that went to the message channel
    pub fn message_frames(&self) -> Vec<Vec<u8>> {
        self.frames_on(MOCK_MESSAGE_CHANNEL)
    }

    /// Number of writes so far
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether nothing was written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all recorded writes
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    fn frames_on(&self, channel: ChannelHandle) -> Vec<Vec<u8>> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.channel == channel)
            .map(|r| r.frame.clone())
            .collect()
    }

    fn push(&self, record: WriteRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Scriptable in-memory transport simulating the display peripheral
pub struct MockTransport {
    connected: bool,
    fail_connect: bool,
    /// Connect indices (0-based) that fail while others succeed
    failing_connects: HashSet<usize>,
    hang_connect: bool,
    hang_discover: bool,
    missing_channels: bool,
    payload_limit: usize,
    fail_negotiation: bool,
    /// Global write indices (0-based) that fail with a write error
    failing_writes: HashSet<usize>,
    write_counter: usize,
    connect_counter: usize,
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    negotiations: Arc<AtomicUsize>,
    log: WriteLog,
    name: Option<String>,
}

impl MockTransport {
    /// A well-behaved peripheral with the default payload limit
    pub fn new() -> Self {
        Self {
            connected: false,
            fail_connect: false,
            failing_connects: HashSet::new(),
            hang_connect: false,
            hang_discover: false,
            missing_channels: false,
            payload_limit: crate::config::DEFAULT_PAYLOAD_LIMIT,
            fail_negotiation: false,
            failing_writes: HashSet::new(),
            write_counter: 0,
            connect_counter: 0,
            connects: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            negotiations: Arc::new(AtomicUsize::new(0)),
            log: WriteLog::default(),
            name: Some("Vespa Display".to_string()),
        }
    }

    /// Refuse every link-layer connect
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Refuse the connect with the given 0-based index
    pub fn fail_connect_at(mut self, index: usize) -> Self {
        self.failing_connects.insert(index);
        self
    }

    /// Make every connect hang forever (exercises the caller's deadline)
    pub fn hang_connect(mut self) -> Self {
        self.hang_connect = true;
        self
    }

    /// Make every discovery hang forever (exercises the caller's deadline)
    pub fn hang_discover(mut self) -> Self {
        self.hang_discover = true;
        self
    }

    /// Expose the service without the required channels
    pub fn missing_channels(mut self) -> Self {
        self.missing_channels = true;
        self
    }

    /// Negotiate a specific payload limit
    pub fn with_payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = limit;
        self
    }

    /// Make payload-limit renegotiation fail (writes still succeed)
    pub fn fail_negotiation(mut self) -> Self {
        self.fail_negotiation = true;
        self
    }

    /// Fail the write with the given 0-based global index
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.failing_writes.insert(index);
        self
    }

    /// Report no peripheral name
    pub fn anonymous(mut self) -> Self {
        self.name = None;
        self
    }

    /// Cloneable view of the written frames
    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }

    /// How many payload-limit negotiations were requested
    pub fn negotiation_count(&self) -> Arc<AtomicUsize> {
        self.negotiations.clone()
    }

    /// How many link-layer connects were attempted
    pub fn connect_count(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }

    /// How many link-layer disconnects were issued
    pub fn disconnect_count(&self) -> Arc<AtomicUsize> {
        self.disconnects.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkTransport for MockTransport {
    async fn connect(&mut self, address: &PeripheralAddress) -> Result<()> {
        let index = self.connect_counter;
        self.connect_counter += 1;
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.hang_connect {
            std::future::pending::<()>().await;
        }
        if self.fail_connect || self.failing_connects.contains(&index) {
            return Err(RelayError::ConnectFailed {
                address: address.to_string(),
                reason: "mock refused connect".into(),
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn discover(&mut self, requested_limit: usize) -> Result<Discovered> {
        if self.hang_discover {
            std::future::pending::<()>().await;
        }
        if !self.connected {
            return Err(RelayError::LinkLost("discover while disconnected".into()));
        }
        if self.missing_channels {
            return Err(RelayError::UnsupportedPeripheral {
                missing: "status/message characteristics".into(),
            });
        }
        Ok(Discovered {
            status_channel: MOCK_STATUS_CHANNEL,
            message_channel: MOCK_MESSAGE_CHANNEL,
            payload_limit: requested_limit.min(self.payload_limit),
        })
    }

    async fn request_payload_limit(&mut self, limit: usize) -> Result<usize> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        if self.fail_negotiation {
            return Err(RelayError::WriteError("mtu request rejected".into()));
        }
        Ok(limit.min(self.payload_limit))
    }

    async fn write(&mut self, channel: ChannelHandle, frame: &[u8]) -> Result<()> {
        let index = self.write_counter;
        self.write_counter += 1;

        if !self.connected {
            return Err(RelayError::LinkLost("write while disconnected".into()));
        }
        if self.failing_writes.contains(&index) {
            return Err(RelayError::WriteError(format!(
                "mock failed write #{}",
                index
            )));
        }
        self.log.push(WriteRecord {
            channel,
            frame: frame.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn peripheral_name(&self) -> Option<String> {
        self.name.clone()
    }
}

/// Fixed power-level source for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedPower(pub u8);

impl PowerSource for FixedPower {
    fn power_level(&self) -> u8 {
        self.0
    }
}
