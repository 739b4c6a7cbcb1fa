//! Durable storage of the canonical state between runs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::types::CanonicalState;
use crate::utils::{write_json_atomic, AtomicError};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence: read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("persistence: decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("persistence: write: {0}")]
    Atomic(#[from] AtomicError),
}

/// JSON file holding the region table, last poll time and feed cursor
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored state. A missing or empty file yields the default state.
    pub fn load(&self) -> StoreResult<CanonicalState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            info!(path = %self.path.display(), "persistence: no stored state, using defaults");
            return Ok(CanonicalState::default());
        }

        let mut state: CanonicalState =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        state.ensure_regions();

        info!(
            path = %self.path.display(),
            cursor = ?state.last_cursor,
            "persistence: loaded state"
        );
        Ok(state)
    }

    /// Replace the stored state
    pub fn save(&self, state: &CanonicalState) -> StoreResult<()> {
        write_json_atomic(&self.path, state)?;
        Ok(())
    }
}
