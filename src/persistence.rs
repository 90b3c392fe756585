//! Persisted state files (§6 "Persisted state files"): `devices.json`,
//! `device_details.json`, and `grabber_state.json` are written atomically
//! (write to a temp file in the same directory, then rename) so a reader
//! never observes a half-written file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, DeviceProperties};

fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("persisted")
    ));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomically(path, &contents)
}

/// One row of `devices.json`: the sorted, display-facing device list (§6).
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListEntry {
    pub device_id: DeviceId,
    pub vendor_id: Option<u32>,
    pub product_id: Option<u32>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub is_keyboard: Option<bool>,
    pub is_pointing_device: Option<bool>,
    pub is_built_in_keyboard: Option<bool>,
}

impl From<&DeviceProperties> for DeviceListEntry {
    fn from(p: &DeviceProperties) -> Self {
        Self {
            device_id: p.device_id,
            vendor_id: p.vendor_id,
            product_id: p.product_id,
            manufacturer: p.manufacturer.clone(),
            product: p.product.clone(),
            is_keyboard: p.is_keyboard,
            is_pointing_device: p.is_pointing_device,
            is_built_in_keyboard: p.is_built_in_keyboard,
        }
    }
}

/// Grabber state snapshot persisted so restarts can recall which devices
/// were grabbed/disabled without waiting for a fresh `values_arrived` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrabberStateSnapshot {
    pub grabbed_device_ids: Vec<DeviceId>,
    pub disabled_device_ids: Vec<DeviceId>,
}

/// Writes the three persisted state files into `directory`, creating it if
/// necessary.
pub struct StateWriter {
    directory: PathBuf,
}

impl StateWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn write_devices(&self, devices: &[DeviceProperties]) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let mut entries: Vec<DeviceListEntry> = devices.iter().map(DeviceListEntry::from).collect();
        entries.sort_by(|a, b| a.product.cmp(&b.product).then(a.device_id.cmp(&b.device_id)));
        write_json(&self.directory.join("devices.json"), &entries)
    }

    pub fn write_device_details(&self, details: &HashMap<DeviceId, DeviceProperties>) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        write_json(&self.directory.join("device_details.json"), details)
    }

    pub fn write_grabber_state(&self, state: &GrabberStateSnapshot) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        write_json(&self.directory.join("grabber_state.json"), state)
    }
}
