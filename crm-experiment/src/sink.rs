use crate::log::ResponseLog;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write response log to {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create log directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination for the response log. Each call receives the full log.
pub trait LogSink {
    fn persist(&mut self, log: &ResponseLog) -> Result<(), PersistError>;
}

impl<K: LogSink + ?Sized> LogSink for Box<K> {
    fn persist(&mut self, log: &ResponseLog) -> Result<(), PersistError> {
        (**self).persist(log)
    }
}

/// Rewrites one CSV file with the whole log after every commit.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
    created_dir: bool,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            created_dir: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(&self.path, bytes)
    }
}

impl LogSink for CsvFileSink {
    fn persist(&mut self, log: &ResponseLog) -> Result<(), PersistError> {
        let bytes = log.serialize();
        match self.write(&bytes) {
            Ok(()) => {}
            // The data directory is created at most once, then the write retried.
            Err(e) if e.kind() == io::ErrorKind::NotFound && !self.created_dir => {
                self.created_dir = true;
                if let Some(dir) = self.path.parent() {
                    warn!(dir = %dir.display(), "log directory missing, creating it");
                    std::fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
                        path: dir.to_path_buf(),
                        source,
                    })?;
                }
                self.write(&bytes).map_err(|source| PersistError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        debug!(path = %self.path.display(), rows = log.len(), "response log written");
        Ok(())
    }
}
