//! Readers for the per-interface files below `/sys/class/net` and the virtual device
//! listing below `/sys/devices/virtual/net`.
//!
//! Every function takes the sysfs root explicitly so it can be pointed at a host
//! mount (e.g. `/rootfs/sys`) or a fixture tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::card::{DEFAULT_SPEED_MBPS, OperState};
use super::{Error, Result};

fn class_net_file(sys_root: &Path, name: &str, file: &str) -> PathBuf {
    sys_root.join("class/net").join(name).join(file)
}

fn read_to_string(path: PathBuf) -> Result<String> {
    std::fs::read_to_string(&path).map_err(|source| Error::Read { path, source })
}

/// Reads `/sys/class/net/<name>/operstate`.
pub fn read_operstate(sys_root: &Path, name: &str) -> Result<OperState> {
    read_to_string(class_net_file(sys_root, name, "operstate")).map(|raw| OperState::parse(&raw))
}

/// Reads `/sys/class/net/<name>/speed` in Mbps.
///
/// The kernel reports `-1` for links without a negotiated speed; that and `0`
/// degrade to [`DEFAULT_SPEED_MBPS`]. Reading the file of a down link fails with
/// `EINVAL`, which is returned as an error.
pub fn read_speed(sys_root: &Path, name: &str) -> Result<u64> {
    let path = class_net_file(sys_root, name, "speed");
    let raw = read_to_string(path.clone())?;
    let speed = raw.trim().parse::<i64>().map_err(|_| Error::InvalidValue {
        path,
        value: raw.trim().to_owned(),
    })?;
    Ok(u64::try_from(speed)
        .ok()
        .filter(|&s| s > 0)
        .unwrap_or(DEFAULT_SPEED_MBPS))
}

/// Reads `/sys/class/net/<name>/iflink`.
pub fn read_iflink(sys_root: &Path, name: &str) -> Result<u32> {
    let path = class_net_file(sys_root, name, "iflink");
    let raw = read_to_string(path.clone())?;
    raw.trim().parse().map_err(|_| Error::InvalidValue {
        path,
        value: raw.trim().to_owned(),
    })
}

/// Names of interfaces the kernel registered as virtual devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualDevices(HashSet<String>);

impl VirtualDevices {
    /// Lists `/sys/devices/virtual/net`.
    pub fn read(sys_root: &Path) -> Result<Self> {
        let path = sys_root.join("devices/virtual/net");
        let entries = std::fs::read_dir(&path).map_err(|source| Error::ReadDir {
            path: path.clone(),
            source,
        })?;

        let mut names = HashSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::ReadDir {
                path: path.clone(),
                source,
            })?;
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(Self(names))
    }

    pub fn is_physical(&self, name: &str) -> bool {
        !self.0.contains(name)
    }
}

impl<S: Into<String>> FromIterator<S> for VirtualDevices {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
