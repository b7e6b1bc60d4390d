use std::path::PathBuf;

/// Errors raised while enumerating network cards.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list interface addresses: {0}")]
    AddressList(#[source] nix::Error),
    #[error("failed to resolve ifindex of interface `{name}`: {source}")]
    InterfaceIndex {
        name: String,
        #[source]
        source: nix::Error,
    },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value `{value}` in `{path}`")]
    InvalidValue { path: PathBuf, value: String },
    #[error("failed to list directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read symlink `{path}`: {source}")]
    ReadSymlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("netlink {op} failed: {source}")]
    Netlink {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("netlink request rejected with errno {errno}")]
    NetlinkRejected { errno: i32 },
    #[error("malformed netlink message: {0}")]
    NetlinkMalformed(&'static str),
    #[error("failed to decode netlink message: {0}")]
    NetlinkDecode(String),
    #[error("failed to open network namespace `{path}`: {source}")]
    NamespaceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to enter network namespace of pid {pid}: {source}")]
    NamespaceEnter {
        pid: u32,
        #[source]
        source: nix::Error,
    },
    #[error("failed to spawn namespace scan worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("namespace scan worker panicked")]
    WorkerPanicked,
    #[error("network card enumeration is not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal failure recorded while the enumeration kept going.
#[derive(Debug)]
pub struct Failure {
    pub operation: &'static str,
    pub error: Error,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.operation, self.error)
    }
}

/// A best-effort result: the value gathered so far plus every sub-failure met on the way.
#[derive(Debug, Default)]
pub struct Scan<T> {
    pub value: T,
    pub failures: Vec<Failure>,
}

impl<T> Scan<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, operation: &'static str, error: Error) {
        log::debug!("{operation} failed: {error}");
        self.failures.push(Failure { operation, error });
    }

    /// Unwraps `result`, recording its error and returning `None` on failure.
    pub fn absorb<U>(&mut self, operation: &'static str, result: Result<U>) -> Option<U> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.record(operation, error);
                None
            }
        }
    }
}
