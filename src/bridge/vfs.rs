//! Host-backed filesystem the engine sees as its root.
//!
//! A host directory (by default under the app data dir, so it survives
//! restarts) is mounted at a guest path such as `/root`. Staged inputs and
//! produced outputs are exchanged through it; the engine has no other I/O.

use crate::error::BridgeError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// File open mode, spelled the way the engine's `fopen` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// `w`: create or truncate
    Write,
    /// `w+`: create or truncate, readable
    #[default]
    WriteRead,
    /// `a`: create or append
    Append,
    /// `a+`: create or append, readable
    AppendRead,
}

impl WriteMode {
    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.create(true);
        match self {
            WriteMode::Write => options.write(true).truncate(true),
            WriteMode::WriteRead => options.read(true).write(true).truncate(true),
            WriteMode::Append => options.append(true),
            WriteMode::AppendRead => options.read(true).append(true),
        };
        options
    }
}

impl FromStr for WriteMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" => Ok(WriteMode::Write),
            "w+" => Ok(WriteMode::WriteRead),
            "a" => Ok(WriteMode::Append),
            "a+" => Ok(WriteMode::AppendRead),
            other => Err(BridgeError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct VirtualFilesystem {
    host_root: PathBuf,
    guest_root: String,
    mounted: AtomicBool,
}

impl VirtualFilesystem {
    pub fn new(host_root: impl Into<PathBuf>, guest_root: impl Into<String>) -> Self {
        let guest_root = guest_root.into();
        let trimmed = guest_root.trim_end_matches('/');
        Self {
            host_root: host_root.into(),
            guest_root: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
            mounted: AtomicBool::new(false),
        }
    }

    /// Create the backing directory and synchronize it.
    ///
    /// Idempotent. A failed sync is logged and the mount stays usable.
    pub fn mount(&self) -> Result<(), BridgeError> {
        if self.is_mounted() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.host_root)?;
        if let Err(e) = self.sync() {
            tracing::warn!(
                "Filesystem sync failed for {}: {}",
                self.host_root.display(),
                e
            );
        }
        self.mounted.store(true, Ordering::Release);
        tracing::info!(
            "Mounted {} at {}",
            self.host_root.display(),
            self.guest_root
        );
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Flush the backing directory to durable storage
    pub fn sync(&self) -> std::io::Result<()> {
        File::open(&self.host_root)?.sync_all()
    }

    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    pub fn guest_root(&self) -> &str {
        &self.guest_root
    }

    /// Map a guest path onto the host.
    ///
    /// Relative paths are taken from the guest root. Parent components and
    /// absolute paths elsewhere are rejected.
    pub fn resolve(&self, guest: &str) -> Result<PathBuf, BridgeError> {
        let outside = || BridgeError::PathOutsideRoot(guest.to_string());

        let relative = if guest.starts_with('/') {
            let rest = if self.guest_root == "/" {
                Some(guest)
            } else {
                guest.strip_prefix(self.guest_root.as_str())
            };
            match rest {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => return Err(outside()),
            }
        } else {
            guest
        };

        let mut host = self.host_root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => host.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return Err(outside()),
            }
        }
        Ok(host)
    }

    fn ensure_mounted(&self) -> Result<(), BridgeError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(BridgeError::NotMounted)
        }
    }

    pub fn write_file(&self, guest: &str, bytes: &[u8], mode: WriteMode) -> Result<(), BridgeError> {
        self.ensure_mounted()?;
        let path = self.resolve(guest)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = mode.options().open(&path)?;
        file.write_all(bytes)?;
        tracing::debug!("Staged {} bytes at {}", bytes.len(), guest);
        Ok(())
    }

    pub fn read_file(&self, guest: &str) -> Result<Vec<u8>, BridgeError> {
        self.ensure_mounted()?;
        Ok(std::fs::read(self.resolve(guest)?)?)
    }

    pub fn exists(&self, guest: &str) -> bool {
        self.resolve(guest).map(|p| p.exists()).unwrap_or(false)
    }
}
