//! Directory-of-files container record store.
//!
//! # Responsibility
//! - Map `(owner, group)` to `<root>/<group>/<owner>.dat`.
//! - Fall back to a case-insensitive file-name match on case-sensitive
//!   file systems.
//!
//! # Invariants
//! - A missing group directory or file is "no record", never an error.
//! - Owner and group names never escape `root`; names with path separators
//!   resolve to "no record".

use super::{BackingStore, StoreError, StoreResult};
use crate::model::group::GroupId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "dat";

/// Backing store reading one file per container.
#[derive(Debug, Clone)]
pub struct FileBackingStore {
    root: PathBuf,
}

impl FileBackingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the record file for a key, if one exists.
    pub fn record_path(&self, owner_name: &str, group: &GroupId) -> StoreResult<Option<PathBuf>> {
        if !is_plain_component(owner_name) || !is_plain_component(group.as_str()) {
            return Ok(None);
        }
        let group_dir = self.root.join(group.as_str());
        let file_name = format!("{owner_name}.{RECORD_EXTENSION}");

        let exact = group_dir.join(&file_name);
        if exact.is_file() {
            return Ok(Some(exact));
        }
        find_case_insensitive(&group_dir, &file_name)
    }
}

impl BackingStore for FileBackingStore {
    fn fetch(&self, owner_name: &str, group: &GroupId) -> StoreResult<Option<Vec<u8>>> {
        let Some(path) = self.record_path(owner_name, group)? else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            // Removed between lookup and read.
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

fn find_case_insensitive(dir: &Path, file_name: &str) -> StoreResult<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(file_name))
        {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
