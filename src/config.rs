//! Runtime configuration read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

const ROOTFS_MOUNT_PATH: &str = "ROOTFS_MOUNT_PATH";
const INTERVAL_SECS: &str = "NETCARD_INTERVAL_SECS";
const API_ADDR: &str = "NETCARD_API_ADDR";
const CONTAINER_SCAN: &str = "NETCARD_CONTAINER_SCAN";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{key}`: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the host root is mounted when running inside a container.
    pub rootfs_mount: PathBuf,
    /// Time between two enumerations and flow samples.
    pub interval: Duration,
    /// Listen address of the HTTP API.
    pub api_addr: String,
    /// Whether to scan container namespaces for veth peer addresses.
    pub container_scan: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rootfs_mount: PathBuf::from("/rootfs"),
            interval: Duration::from_secs(1),
            api_addr: "0.0.0.0:3000".to_owned(),
            container_scan: true,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Unset variables keep
    /// their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(ROOTFS_MOUNT_PATH) {
            config.rootfs_mount = PathBuf::from(path);
        }
        if let Some(raw) = lookup(INTERVAL_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or(Error::InvalidValue {
                    key: INTERVAL_SECS,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds",
                })?;
            config.interval = Duration::from_secs(secs);
        }
        if let Some(addr) = lookup(API_ADDR) {
            config.api_addr = addr;
        }
        if let Some(raw) = lookup(CONTAINER_SCAN) {
            config.container_scan = parse_bool(&raw).ok_or(Error::InvalidValue {
                key: CONTAINER_SCAN,
                value: raw.clone(),
                reason: "expected one of true/false/1/0/yes/no",
            })?;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
