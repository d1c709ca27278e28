//! Free disk space checks for the recording gate.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tracing::{debug, warn};

use crate::Error;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

/// Result of a disk space check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskSpaceStatus {
    Ok { available_bytes: u64 },
    Low {
        available_bytes: u64,
        threshold_bytes: u64,
    },
    /// No disk found for the path.
    Unknown,
}

impl DiskSpaceStatus {
    /// Whether new captures may start. An unknown disk does not block.
    pub fn allows_recording(&self) -> bool {
        !matches!(self, Self::Low { .. })
    }

    pub fn available_bytes(&self) -> Option<u64> {
        match self {
            Self::Ok { available_bytes } | Self::Low { available_bytes, .. } => {
                Some(*available_bytes)
            }
            Self::Unknown => None,
        }
    }

    pub fn to_error(&self) -> Option<Error> {
        match self {
            Self::Low {
                available_bytes,
                threshold_bytes,
            } => Some(Error::DiskSpaceExhausted {
                available_gib: bytes_to_gib(*available_bytes),
                threshold_gib: bytes_to_gib(*threshold_bytes),
            }),
            _ => None,
        }
    }
}

/// Compares free space on the disk holding the save directory with a
/// threshold in GiB. A threshold of zero disables the gate.
#[derive(Debug, Clone)]
pub struct DiskMonitor {
    threshold_bytes: u64,
}

impl DiskMonitor {
    pub fn new(threshold_gib: f64) -> Self {
        Self {
            threshold_bytes: (threshold_gib.max(0.0) * GIB) as u64,
        }
    }

    pub fn threshold_gib(&self) -> f64 {
        bytes_to_gib(self.threshold_bytes)
    }

    pub fn check(&self, path: &Path) -> DiskSpaceStatus {
        if self.threshold_bytes == 0 {
            return DiskSpaceStatus::Ok { available_bytes: 0 };
        }

        let disks = Disks::new_with_refreshed_list();
        let mounts = disks
            .list()
            .iter()
            .map(|d| (d.mount_point().to_path_buf(), d.available_space()));
        let path = existing_ancestor(path);
        let status = status_for(available_for_path(mounts, &path), self.threshold_bytes);

        match status {
            DiskSpaceStatus::Ok { available_bytes } => {
                debug!(path = %path.display(), available_gib = bytes_to_gib(available_bytes), "disk space ok");
            }
            DiskSpaceStatus::Low { available_bytes, .. } => {
                warn!(
                    path = %path.display(),
                    available_gib = bytes_to_gib(available_bytes),
                    threshold_gib = self.threshold_gib(),
                    "free disk space below threshold"
                );
            }
            DiskSpaceStatus::Unknown => {
                warn!(path = %path.display(), "could not determine disk space");
            }
        }
        status
    }
}

/// The save directory may not exist yet; resolve through its closest
/// existing ancestor so symlinked mounts are matched correctly.
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find_map(|p| p.canonicalize().ok())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Available bytes on the disk with the longest mount point containing `path`.
fn available_for_path(
    mounts: impl IntoIterator<Item = (PathBuf, u64)>,
    path: &Path,
) -> Option<u64> {
    mounts
        .into_iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.as_os_str().len())
        .map(|(_, available)| available)
}

fn status_for(available: Option<u64>, threshold_bytes: u64) -> DiskSpaceStatus {
    match available {
        Some(available_bytes) if available_bytes < threshold_bytes => DiskSpaceStatus::Low {
            available_bytes,
            threshold_bytes,
        },
        Some(available_bytes) => DiskSpaceStatus::Ok { available_bytes },
        None => DiskSpaceStatus::Unknown,
    }
}
