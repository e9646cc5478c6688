//! Bluetooth Low Energy transport for the display peripheral
//!
//! This module provides BLE connectivity to the handlebar display.
//!
//! # Requirements
//!
//! Enable the `ble` feature in Cargo.toml to use this transport.
//!
//! On Linux, you'll also need:
//! ```bash
//! apt install libdbus-1-dev
//! ```

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{
    PeripheralAddress, DISPLAY_SERVICE_UUID, MESSAGE_CHANNEL_UUID, STATUS_CHANNEL_UUID,
};
use crate::error::{RelayError, Result};
use crate::link::{ChannelHandle, Discovered, LinkTransport};

const STATUS_TOKEN: u64 = 1;
const MESSAGE_TOKEN: u64 = 2;

/// How often the scan results are polled while locating the peripheral
const SCAN_POLL: Duration = Duration::from_millis(250);

/// BLE transport backed by the platform Bluetooth stack
///
/// Connects to the peripheral by its stored address, verifies the display
/// service and resolves its two characteristics into channel handles. The
/// overall connect/discover deadline is enforced by the caller.
pub struct BleTransport {
    adapter: Option<Adapter>,
    peripheral: Option<Peripheral>,
    status_char: Option<Characteristic>,
    message_char: Option<Characteristic>,
    name: Option<String>,
}

impl BleTransport {
    /// Create a transport; the adapter is acquired lazily on first connect
    pub fn new() -> Self {
        Self {
            adapter: None,
            peripheral: None,
            status_char: None,
            message_char: None,
            name: None,
        }
    }

    async fn adapter(&mut self) -> Result<Adapter> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }
        let manager = Manager::new().await.map_err(ble_unavailable)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(ble_unavailable)?
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::InvalidConfig("no Bluetooth adapter found".into()))?;
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    /// Scan until the peripheral with `target` shows up
    async fn locate(&mut self, target: BDAddr) -> Result<Peripheral> {
        let adapter = self.adapter().await?;
        adapter
            .start_scan(ScanFilter {
                services: vec![DISPLAY_SERVICE_UUID],
            })
            .await
            .map_err(ble_unavailable)?;

        // The caller bounds this loop with the link timeout
        let found = 'scan: loop {
            for peripheral in adapter.peripherals().await.map_err(ble_unavailable)? {
                if peripheral.address() == target {
                    break 'scan peripheral;
                }
            }
            tokio::time::sleep(SCAN_POLL).await;
        };
        let _ = adapter.stop_scan().await;
        Ok(found)
    }

    fn peripheral(&self) -> Result<&Peripheral> {
        self.peripheral
            .as_ref()
            .ok_or_else(|| RelayError::LinkLost("no active BLE connection".into()))
    }

    fn characteristic(&self, channel: ChannelHandle) -> Result<&Characteristic> {
        let slot = match channel.token() {
            STATUS_TOKEN => &self.status_char,
            MESSAGE_TOKEN => &self.message_char,
            _ => &None,
        };
        slot.as_ref()
            .ok_or_else(|| RelayError::LinkLost("stale channel handle".into()))
    }
}

impl Default for BleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkTransport for BleTransport {
    async fn connect(&mut self, address: &PeripheralAddress) -> Result<()> {
        let target = BDAddr::from(address.octets());
        let peripheral = self.locate(target).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| RelayError::ConnectFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        self.name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        info!(
            "BLE link up to {}",
            self.name.as_deref().unwrap_or("unnamed peripheral")
        );
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn discover(&mut self, requested_limit: usize) -> Result<Discovered> {
        let peripheral = self.peripheral()?.clone();
        peripheral
            .discover_services()
            .await
            .map_err(|e| RelayError::LinkLost(e.to_string()))?;

        let mut status_char = None;
        let mut message_char = None;
        for characteristic in peripheral.characteristics() {
            if characteristic.service_uuid != DISPLAY_SERVICE_UUID {
                continue;
            }
            if characteristic.uuid == STATUS_CHANNEL_UUID {
                status_char = Some(characteristic);
            } else if characteristic.uuid == MESSAGE_CHANNEL_UUID {
                message_char = Some(characteristic);
            }
        }

        match (status_char, message_char) {
            (Some(status), Some(message)) => {
                debug!("Display service verified, channels resolved");
                self.status_char = Some(status);
                self.message_char = Some(message);
                Ok(Discovered {
                    status_channel: ChannelHandle::new(STATUS_TOKEN),
                    message_channel: ChannelHandle::new(MESSAGE_TOKEN),
                    payload_limit: requested_limit,
                })
            }
            (status, message) => {
                let missing = match (status.is_some(), message.is_some()) {
                    (false, false) => "display service characteristics",
                    (false, true) => "status characteristic",
                    (true, false) => "message characteristic",
                    (true, true) => unreachable!(),
                };
                Err(RelayError::UnsupportedPeripheral {
                    missing: missing.to_string(),
                })
            }
        }
    }

    async fn request_payload_limit(&mut self, limit: usize) -> Result<usize> {
        // The platform stack negotiates the link MTU on its own; the
        // requested size is recorded as the effective bound.
        self.peripheral()?;
        Ok(limit)
    }

    async fn write(&mut self, channel: ChannelHandle, frame: &[u8]) -> Result<()> {
        let characteristic = self.characteristic(channel)?.clone();
        self.peripheral()?
            .write(&characteristic, frame, WriteType::WithoutResponse)
            .await
            .map_err(|e| RelayError::WriteError(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.status_char = None;
        self.message_char = None;
        self.name = None;
        if let Some(peripheral) = self.peripheral.take() {
            peripheral
                .disconnect()
                .await
                .map_err(|e| RelayError::LinkLost(e.to_string()))?;
        }
        Ok(())
    }

    fn peripheral_name(&self) -> Option<String> {
        self.name.clone()
    }
}

fn ble_unavailable(e: btleplug::Error) -> RelayError {
    RelayError::ConnectFailed {
        address: "adapter".to_string(),
        reason: e.to_string(),
    }
}
