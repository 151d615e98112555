//! Bundled reliability backends.

use std::fs;
use std::path::{Path, PathBuf};

use cased_core::Payload;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::BackendError;
use crate::reliability::ReliabilityBackend;

/// In-memory backend, for tests and embedded replay loops.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    events: Mutex<Vec<Payload>>,
}

impl InMemoryBackend {
    /// Name the backend is registered under.
    pub const NAME: &'static str = "memory";

    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored event without removing it.
    #[must_use]
    pub fn events(&self) -> Vec<Payload> {
        self.events.lock().clone()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ReliabilityBackend for InMemoryBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn store(&self, event: &Payload) -> Result<(), BackendError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn drain(&self) -> Result<Vec<Payload>, BackendError> {
        Ok(std::mem::take(&mut *self.events.lock()))
    }
}

/// Configuration for the file spool backend.
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Spool directory (default: `<cache dir>/cased/spool`).
    pub dir: PathBuf,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            dir: default_spool_dir(),
        }
    }
}

impl FileBackendConfig {
    /// Creates a configuration spooling into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Default spool directory.
fn default_spool_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cased")
        .join("spool")
}

/// Durable backend writing one JSON file per deferred event.
///
/// Files are written under a temporary name and renamed into place, so a
/// concurrent drain never sees a partial event. File names start with a
/// time-ordered UUID, which makes directory order the storage order.
#[derive(Debug)]
pub struct FileBackend {
    config: FileBackendConfig,
}

impl FileBackend {
    /// Name the backend is registered under.
    pub const NAME: &'static str = "file";

    const EXTENSION: &'static str = "json";

    /// Creates the backend, creating the spool directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool directory cannot be created.
    pub fn new(config: FileBackendConfig) -> Result<Self, BackendError> {
        fs::create_dir_all(&config.dir).map_err(|e| BackendError::Io {
            path: config.dir.clone(),
            source: e,
        })?;
        Ok(Self { config })
    }

    /// Spool directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Number of events waiting in the spool.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool directory cannot be read.
    pub fn pending(&self) -> Result<usize, BackendError> {
        Ok(self.spooled_files()?.len())
    }

    /// Reads every spooled event without removing it, oldest first.
    ///
    /// Unreadable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool directory cannot be read.
    pub fn peek(&self) -> Result<Vec<Payload>, BackendError> {
        Ok(self
            .spooled_files()?
            .iter()
            .filter_map(|path| fs::read(path).ok())
            .filter_map(|data| serde_json::from_slice(&data).ok())
            .collect())
    }

    /// Replays spooled events oldest first, removing each file only after
    /// `deliver` accepts its event.
    ///
    /// Events that `deliver` rejects stay in the spool for the next replay,
    /// as do unreadable files. Returns the number of events delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool directory cannot be read.
    pub fn drain_with<F>(&self, mut deliver: F) -> Result<usize, BackendError>
    where
        F: FnMut(&Payload) -> bool,
    {
        let mut delivered = 0;

        for path in self.spooled_files()? {
            let Some(event) = Self::read_event(&path) else {
                continue;
            };
            if !deliver(&event) {
                debug!(path = %path.display(), "Event not delivered, keeping it spooled");
                continue;
            }
            delivered += 1;
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove delivered event");
            }
        }

        debug!(delivered, dir = %self.config.dir.display(), "Replayed spool");
        Ok(delivered)
    }

    /// Reads one spooled event, or `None` if it is gone or unreadable.
    fn read_event(path: &Path) -> Option<Payload> {
        let data = match fs::read(path) {
            Ok(data) => data,
            // Another drain got there first.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable spooled event");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable spooled event");
                None
            }
        }
    }

    fn spooled_files(&self) -> Result<Vec<PathBuf>, BackendError> {
        let entries = fs::read_dir(&self.config.dir).map_err(|e| BackendError::Io {
            path: self.config.dir.clone(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == Self::EXTENSION))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl ReliabilityBackend for FileBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn store(&self, event: &Payload) -> Result<(), BackendError> {
        let id = Uuid::now_v7().simple().to_string();
        let path = self.config.dir.join(format!("{id}.{}", Self::EXTENSION));
        let tmp_path = self.config.dir.join(format!("{id}.tmp"));

        let data = serde_json::to_vec(event)?;
        fs::write(&tmp_path, data).map_err(|e| BackendError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| BackendError::Io {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = %path.display(), "Spooled event");
        Ok(())
    }

    /// Reads every event before removing any file. An event whose file
    /// cannot be removed is left out and stays spooled.
    fn drain(&self) -> Result<Vec<Payload>, BackendError> {
        let read: Vec<(PathBuf, Payload)> = self
            .spooled_files()?
            .into_iter()
            .filter_map(|path| Self::read_event(&path).map(|event| (path, event)))
            .collect();

        let mut events = Vec::with_capacity(read.len());
        for (path, event) in read {
            match fs::remove_file(&path) {
                Ok(()) => events.push(event),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Leaving spooled event in place");
                }
            }
        }

        debug!(count = events.len(), dir = %self.config.dir.display(), "Drained spool");
        Ok(events)
    }
}
