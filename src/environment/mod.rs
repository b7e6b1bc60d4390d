//! Environment detection module.
//!
//! Determines whether the monitor runs on the host or inside a container and where
//! the host's `/proc` and `/sys` are reachable.
mod checks;
mod detect;
mod error;

pub use detect::{RuntimeEnvironment, detect_runtime_environment, resolve_rootfs, shares_host_network};
pub use error::{Error, Result};
