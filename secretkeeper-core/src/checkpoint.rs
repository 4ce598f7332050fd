// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Checkpoint store for state carried across a live update.
//!
//! Only auxiliary counters go through here. Secret content is never
//! checkpointed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// Key/value store for small integers, overwrite on publish.
pub trait CheckpointStore {
    fn publish_u32(&self, key: &str, value: u32) -> Result<(), CheckpointError>;

    fn retrieve_u32(&self, key: &str) -> Result<Option<u32>, CheckpointError>;

    fn delete_u32(&self, key: &str) -> Result<(), CheckpointError>;
}

/// In-process store, used for tests and for restarts without a state file.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    values: DashMap<String, u32>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn publish_u32(&self, key: &str, value: u32) -> Result<(), CheckpointError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn retrieve_u32(&self, key: &str) -> Result<Option<u32>, CheckpointError> {
        Ok(self.values.get(key).map(|v| *v.value()))
    }

    fn delete_u32(&self, key: &str) -> Result<(), CheckpointError> {
        self.values.remove(key);
        Ok(())
    }
}

/// On-disk layout of a checkpoint file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    values: BTreeMap<String, u32>,
    checksum: u32,
}

impl CheckpointFile {
    fn checksum_of(values: &BTreeMap<String, u32>) -> u32 {
        // BTreeMap serializes in key order, so the bytes are stable.
        let bytes = serde_json::to_vec(values).unwrap_or_default();
        crc32fast::hash(&bytes)
    }
}

/// JSON file store with a crc32 over the values.
///
/// A missing file is an empty store. A file whose checksum does not match
/// is rejected rather than trusted.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, u32>, CheckpointError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let file: CheckpointFile =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let actual = CheckpointFile::checksum_of(&file.values);
        if actual != file.checksum {
            return Err(CheckpointError::ChecksumMismatch {
                expected: file.checksum,
                actual,
            });
        }

        Ok(file.values)
    }

    fn store(&self, values: BTreeMap<String, u32>) -> Result<(), CheckpointError> {
        let write_err = |source| CheckpointError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let checksum = CheckpointFile::checksum_of(&values);
        let file = CheckpointFile { values, checksum };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| CheckpointError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn publish_u32(&self, key: &str, value: u32) -> Result<(), CheckpointError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        self.store(values)?;

        tracing::debug!(path = %self.path.display(), key, value, "Checkpoint published");
        Ok(())
    }

    fn retrieve_u32(&self, key: &str) -> Result<Option<u32>, CheckpointError> {
        Ok(self.load()?.get(key).copied())
    }

    fn delete_u32(&self, key: &str) -> Result<(), CheckpointError> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.store(values)?;
        }
        Ok(())
    }
}
