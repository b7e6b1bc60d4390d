use super::{Error, Result};
use crate::fsutil;
use std::io::BufRead;
use std::path::Path;
use std::{env, fs};

/// Namespace kinds compared between this process and the init process of the rootfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Pid,
    Net,
}

impl Namespace {
    fn file_name(self) -> &'static str {
        match self {
            Namespace::Pid => "pid",
            Namespace::Net => "net",
        }
    }
}

/// Returns true if the given rootfs path contains a mounted `/proc`.
///
/// # Errors
///
/// Returns [`Error::ExistenceCheck`] if checking the existence of the `/proc` directory fails.
pub fn contains_proc_mount(rootfs: impl AsRef<Path>) -> Result<bool> {
    let path = rootfs.as_ref().join("proc");

    path.try_exists()
        .map_err(|source| Error::ExistenceCheck { path, source })
}

/// Returns true if the namespace of kind `ns` of this process differs from the one of
/// PID 1 under `rootfs`.
///
/// # Errors
///
/// Returns [`Error::ReadSymlink`] if either namespace link cannot be read.
pub fn is_namespace_isolated(rootfs: impl AsRef<Path>, ns: Namespace) -> Result<bool> {
    let read = |path: &Path| {
        fs::read_link(path).map_err(|source| Error::ReadSymlink {
            path: path.to_path_buf(),
            source,
        })
    };

    let self_ns = read(&Path::new("/proc/self/ns").join(ns.file_name()))?;
    let root_ns = read(&rootfs.as_ref().join("proc/1/ns").join(ns.file_name()))?;

    Ok(self_ns != root_ns)
}

/// Returns true if `/proc/self/cgroup` suggests a containerized environment.
///
/// # Errors
///
/// * [`Error::FileOpen`] if `/proc/self/cgroup` cannot be opened.
/// * [`Error::ReadLine`] if a line from the file cannot be read.
pub fn matches_container_cgroup() -> Result<bool> {
    let path = Path::new("/proc/self/cgroup");
    let buf = fsutil::open_file_reader(path)?;
    cgroup_indicates_container(buf, path)
}

/// Scans cgroup membership lines for runtime names or 64-character container ids.
pub(super) fn cgroup_indicates_container<R: BufRead>(mut buf: R, origin: &Path) -> Result<bool> {
    let mut line = String::with_capacity(256);

    while buf.read_line(&mut line).map_err(|source| Error::ReadLine {
        path: origin.to_path_buf(),
        source,
    })? != 0
    {
        if ["docker", "kubepods", "containerd", "libpod"]
            .iter()
            .any(|marker| line.contains(marker))
        {
            return Ok(true);
        }

        if line
            .trim_end()
            .split(['/', '-', '.'])
            .any(|part| part.len() >= 32 && is_non_empty_hex_string(part))
        {
            return Ok(true);
        }

        line.clear();
    }

    Ok(false)
}

/// Returns true if known container marker files or variables exist.
pub fn has_container_indicators() -> bool {
    fs::metadata("/.dockerenv").is_ok()
        || fs::metadata("/run/.containerenv").is_ok()
        || env::var("container").is_ok()
}

/// Returns true if the input string is not empty and contains only ASCII hex digits.
pub fn is_non_empty_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
