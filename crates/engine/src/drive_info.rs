//! Best-effort device metadata lookup

use crate::models::DriveInfo;
use std::collections::HashMap;

/// Resolves (hostname, serial) to device metadata
///
/// Callers treat errors the same as a missing entry: metadata is optional
/// decoration, never a reason to fail a query.
pub trait DriveInfoLookup: Send + Sync {
    fn drive_info(&self, hostname: &str, serial: &str) -> anyhow::Result<Option<DriveInfo>>;
}

/// Lookup that never knows anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDriveInfo;

impl DriveInfoLookup for NoDriveInfo {
    fn drive_info(&self, _hostname: &str, _serial: &str) -> anyhow::Result<Option<DriveInfo>> {
        Ok(None)
    }
}

/// Fixed in-memory table of drive metadata
#[derive(Debug, Default, Clone)]
pub struct StaticDriveInfo {
    entries: HashMap<(String, String), DriveInfo>,
}

impl StaticDriveInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hostname: &str, serial: &str, info: DriveInfo) -> Self {
        self.entries
            .insert((hostname.to_string(), serial.to_string()), info);
        self
    }
}

impl DriveInfoLookup for StaticDriveInfo {
    fn drive_info(&self, hostname: &str, serial: &str) -> anyhow::Result<Option<DriveInfo>> {
        Ok(self
            .entries
            .get(&(hostname.to_string(), serial.to_string()))
            .cloned())
    }
}
