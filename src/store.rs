//! Persistent storage for the state document.
//!
//! The document lives in a single JSON file. Reads and writes are
//! wholesale; writes go through a temporary file renamed into place so a
//! crash mid-write never leaves a truncated document behind.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::state::StateDocument;

/// Errors raised while loading or saving the state document.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Raised when the document does not exist yet.
    #[error("state document not found at {path}; seed it before running")]
    Missing {
        /// Path that was looked up.
        path: Utf8PathBuf,
    },
    /// Raised when a path has no usable file name component.
    #[error("state document path {path} is missing a file name")]
    InvalidPath {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the document cannot be parsed or rendered as JSON.
    #[error("invalid state document at {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Parser error message.
        message: String,
    },
}

/// Loads and saves the state document at a fixed path.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: Utf8PathBuf,
}

impl StateStore {
    /// Creates a store for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path the store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads and parses the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Missing`] when the file does not exist,
    /// [`StateStoreError::Parse`] when its contents are not a valid
    /// document, and [`StateStoreError::Io`] for other access failures.
    pub fn load(&self) -> Result<StateDocument, StateStoreError> {
        let (parent, file_name) = self.split_path()?;
        let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StateStoreError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(err) => {
                return Err(StateStoreError::Io {
                    path: parent.to_path_buf(),
                    message: err.to_string(),
                });
            }
        };

        let contents = match dir.read_to_string(file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StateStoreError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(err) => {
                return Err(StateStoreError::Io {
                    path: self.path.clone(),
                    message: err.to_string(),
                });
            }
        };

        serde_json::from_str(&contents).map_err(|err| StateStoreError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Renders and writes the whole document atomically.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the target.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Io`] when writing or renaming fails and
    /// [`StateStoreError::Parse`] when the document cannot be rendered.
    pub fn save(&self, document: &StateDocument) -> Result<(), StateStoreError> {
        let (parent, file_name) = self.split_path()?;
        Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
            StateStoreError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
            StateStoreError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }
        })?;

        let rendered =
            serde_json::to_string_pretty(document).map_err(|err| StateStoreError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            })?;

        let temp_name = format!("{file_name}.tmp");
        dir.write(&temp_name, rendered)
            .map_err(|err| StateStoreError::Io {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
        dir.rename(&temp_name, &dir, file_name)
            .map_err(|err| StateStoreError::Io {
                path: self.path.clone(),
                message: err.to_string(),
            })
    }

    fn split_path(&self) -> Result<(&Utf8Path, &str), StateStoreError> {
        let parent = self.path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| StateStoreError::InvalidPath {
                path: self.path.clone(),
            })?;
        Ok((parent, file_name))
    }
}
