//! Seams to the systems a change request depends on: device inventory,
//! rulepack storage and command transport.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::model::{CanonicalConfig, Vendor};
use crate::parser::parser_for;

pub use crate::lint::RulepackSource;

/// Last known state of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: String,
    pub vendor: Vendor,
    pub last_known_config_text: String,
    pub last_known_normalized: Option<CanonicalConfig>,
}

impl DeviceRecord {
    /// Build a record from raw text, normalizing it with the vendor parser.
    pub fn from_text(id: impl Into<String>, vendor: Vendor, text: impl Into<String>) -> Self {
        let text = text.into();
        let normalized = parser_for(vendor).parse(&text).normalized;
        Self {
            id: id.into(),
            vendor,
            last_known_config_text: text,
            last_known_normalized: Some(normalized),
        }
    }
}

pub trait DeviceInventory: Send + Sync {
    fn resolve_device(&self, id: &str) -> Option<DeviceRecord>;
}

/// In-memory inventory keyed by device id.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    devices: BTreeMap<String, DeviceRecord>,
}

impl StaticInventory {
    pub fn new(devices: impl IntoIterator<Item = DeviceRecord>) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    pub fn insert(&mut self, device: DeviceRecord) {
        self.devices.insert(device.id.clone(), device);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceInventory for StaticInventory {
    fn resolve_device(&self, id: &str) -> Option<DeviceRecord> {
        self.devices.get(id).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutput {
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Delivers command batches to devices. Implementations must be safe to call
/// from several threads at once for different devices.
pub trait CommandTransport: Send + Sync {
    fn apply_commands(&self, device_id: &str, commands: &[String]) -> Result<ApplyOutput, TransportError>;
}

/// Records every batch instead of contacting devices. Devices listed in the
/// fail set report failure for their apply batch.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    failing: BTreeSet<String>,
    sent: Mutex<Vec<(String, Vec<String>)>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            failing: devices.into_iter().map(Into::into).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Batches delivered so far, in call order.
    pub fn sent(&self) -> Vec<(String, Vec<String>)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandTransport for DryRunTransport {
    fn apply_commands(&self, device_id: &str, commands: &[String]) -> Result<ApplyOutput, TransportError> {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = sent.iter().filter(|(id, _)| id == device_id).count();
        sent.push((device_id.to_string(), commands.to_vec()));
        // Only the first batch for a device (its apply) fails; rollbacks succeed.
        if attempt == 0 && self.failing.contains(device_id) {
            return Ok(ApplyOutput {
                success: false,
                output: format!("dry-run: simulated failure on {device_id}"),
            });
        }
        Ok(ApplyOutput {
            success: true,
            output: format!("dry-run: {} command(s) accepted", commands.len()),
        })
    }
}
