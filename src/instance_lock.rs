//! One bridge per MQTT client id.
//!
//! Two processes sharing a client id would keep kicking each other off the
//! broker. The lock is a Unix socket named after the client id; the OS drops
//! it when the process dies, so a crash never leaves a stale lock behind.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another bridge is already running with client id {0}")]
    AlreadyRunning(String),

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for as long as the bridge runs; the socket file is removed on drop.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for `client_id` in the runtime directory.
    pub fn acquire(client_id: &str) -> Result<Self, InstanceLockError> {
        Self::acquire_at(&runtime_dir(), client_id)
    }

    fn acquire_at(dir: &Path, client_id: &str) -> Result<Self, InstanceLockError> {
        let path = socket_path(dir, client_id);

        // A socket file nobody answers on is left over from a SIGKILL
        if path.exists() {
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(client_id.to_string()));
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(client_id.to_string()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `XDG_RUNTIME_DIR`, falling back to /tmp.
fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Socket file for `client_id`; anything outside `[A-Za-z0-9_-]` becomes `_`.
fn socket_path(dir: &Path, client_id: &str) -> PathBuf {
    let name: String = client_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("unify-matter-bridge-{name}.sock"))
}
