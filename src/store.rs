//! Persisted key-value state in the user's home directory.
//!
//! The document is a single JSON object with no enforced schema.  There is
//! no locking: two processes saving concurrently race and the last save
//! wins.  Writes are not atomic.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RunnerError};
use crate::types::Deployment;

/// File name of the state document inside the home directory.
pub const STATE_FILE_NAME: &str = ".mongo-runner";

/// Key under which the most recent successful launch is kept.
pub const LAST_LAUNCH_KEY: &str = "last_launch";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub version: String,
    #[serde(flatten)]
    pub deployment: Deployment,
}

/// Untyped key-value mapping with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    entries: BTreeMap<String, Value>,
}

impl ConfigDocument {
    /// Deserializes the value under `key`.  A value of the wrong shape reads
    /// as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|source| RunnerError::ConfigValue { key: key.clone(), source })?;
        self.entries.insert(key, value);
        Ok(())
    }
}

/// Location of the persisted document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$HOME/.mongo-runner`.
    pub fn in_home() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(RunnerError::NoHomeDir)?;
        Ok(Self::new(Path::new(&home).join(STATE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document, or an empty one if the file does not exist.
    pub fn load(&self) -> Result<ConfigDocument> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, starting empty", self.path.display());
                return Ok(ConfigDocument::default());
            }
            Err(source) => {
                return Err(RunnerError::ConfigIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| RunnerError::ConfigFormat {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrites the file with `doc`.
    pub fn save(&self, doc: &ConfigDocument) -> Result<()> {
        let body = serde_json::to_string_pretty(doc).map_err(|source| {
            RunnerError::ConfigFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, body).map_err(|source| RunnerError::ConfigIo {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {} config keys to {}", doc.entries.len(), self.path.display());
        Ok(())
    }

    /// Loads the document, hands it to `f` for mutation, then saves it.
    ///
    /// The save happens exactly once on every exit path: after `f` returns
    /// `Ok`, after it returns `Err` (whose error is still returned), and
    /// while unwinding if `f` panics.
    pub fn with_config<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ConfigDocument) -> std::result::Result<T, E>,
        E: From<RunnerError>,
    {
        self.transact(f, |doc| self.save(doc))
    }

    fn transact<T, E, F, S>(&self, f: F, save: S) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ConfigDocument) -> std::result::Result<T, E>,
        E: From<RunnerError>,
        S: Fn(&ConfigDocument) -> Result<()>,
    {
        let mut txn = Transaction {
            save: &save,
            doc: Some(self.load()?),
        };
        let outcome = f(txn.doc.get_or_insert_with(ConfigDocument::default));
        let saved = txn.commit();
        match (outcome, saved) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(save_err)) => Err(save_err.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                error!("Failed to save config after error: {}", save_err);
                Err(e)
            }
        }
    }
}

/// Loaded document that is written back when committed or dropped.
struct Transaction<'a> {
    save: &'a dyn Fn(&ConfigDocument) -> Result<()>,
    doc: Option<ConfigDocument>,
}

impl Transaction<'_> {
    fn commit(mut self) -> Result<()> {
        match self.doc.take() {
            Some(doc) => (self.save)(&doc),
            None => Ok(()),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        // Only reached with a document still held when `f` unwound.
        if let Some(doc) = self.doc.take() {
            if let Err(e) = (self.save)(&doc) {
                error!("Failed to save config while unwinding: {}", e);
            }
        }
    }
}
