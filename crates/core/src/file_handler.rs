//! The process-wide mapping from absolute filesystem path to an open
//! append-mode file descriptor shared by every session writing to it.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Identifies the session attached to a [`FileHandlerRegistry`] entry.
/// Assigned once per accepted connection, unique for the lifetime of the
/// server process.
pub type ClientId = u64;

struct FileHandler {
    /// Absent once a write has failed; subsequent writes become no-ops until
    /// the session layer disconnects the client that triggered the failure.
    file: Option<File>,
    clients: HashSet<ClientId>,
}

/// Owns every open [`FileHandler`], keyed by absolute path.
///
/// There is no process-wide singleton: each `Server` owns its own registry,
/// so tests can spin up independent instances without interference.
#[derive(Default)]
pub struct FileHandlerRegistry {
    handlers: HashMap<PathBuf, FileHandler>,
}

impl FileHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct paths currently open. Exposed for the
    /// at-most-one-descriptor-per-path invariant in tests.
    pub fn open_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.handlers.contains_key(path)
    }

    /// Returns the existing handler for `path` or opens one in
    /// append+create mode. Open failures propagate unchanged; the registry
    /// never caches a failed open.
    pub fn open(&mut self, path: &Path) -> io::Result<()> {
        if self.handlers.contains_key(path) {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        self.handlers.insert(
            path.to_path_buf(),
            FileHandler {
                file: Some(file),
                clients: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Attaches `id` to the handler for `path`. Idempotent. `open` must have
    /// succeeded for `path` first.
    pub fn new_client(&mut self, path: &Path, id: ClientId) {
        if let Some(handler) = self.handlers.get_mut(path) {
            let inserted = handler.clients.insert(id);
            if inserted {
                info!(client = id, path = %path.display(), clients = handler.clients.len(), "client attached");
            }
        }
    }

    /// Appends `bytes` to the file for `path` and flushes. A zero-length
    /// write is a no-op. If the handler's descriptor was already disabled by
    /// a prior failure, or `path` is unknown, this is silently a no-op: the
    /// session layer is responsible for deciding whether to disconnect.
    pub fn write(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let Some(handler) = self.handlers.get_mut(path) else {
            return Ok(());
        };
        let Some(file) = handler.file.as_mut() else {
            return Ok(());
        };
        match file.write_all(bytes).and_then(|()| file.flush()) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "write failed, disabling file handle");
                handler.file = None;
                Err(err)
            }
        }
    }

    /// Detaches `id` from the handler for `path`. When the last client
    /// detaches, the file is closed and the handler is removed before the
    /// next event-loop iteration could observe it.
    pub fn client_done(&mut self, path: &Path, id: ClientId) {
        let Some(handler) = self.handlers.get_mut(path) else {
            return;
        };
        if !handler.clients.remove(&id) {
            return;
        }
        info!(client = id, path = %path.display(), remaining = handler.clients.len(), "client detached");
        if handler.clients.is_empty() {
            self.handlers.remove(path);
            info!(path = %path.display(), "closed");
        }
    }
}
