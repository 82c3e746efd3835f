//! The local set of files offered to peers.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use duet_protocol::{FileId, SharedFileEntry};

/// A file we offer, held in memory for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SharedFile {
    pub entry: SharedFileEntry,
    pub data: Bytes,
}

impl SharedFile {
    /// Wrap in-memory contents under a fresh random id.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            entry: SharedFileEntry {
                id: FileId::random(),
                name: name.into(),
                size: data.len() as u64,
            },
            data,
        }
    }

    /// Read a file from disk, named after its final path component.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read file: {}", path.display()))?;
        let name = path
            .file_name()
            .context("path has no filename")?
            .to_string_lossy()
            .to_string();
        Ok(Self::new(name, data))
    }

    pub fn id(&self) -> &FileId {
        &self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn size(&self) -> u64 {
        self.entry.size
    }
}

/// Ordered collection of shared files; order is the manifest order.
#[derive(Debug, Default, Clone)]
pub struct SharedFiles {
    files: Vec<SharedFile>,
}

impl SharedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set.
    pub fn replace(&mut self, files: Vec<SharedFile>) {
        self.files = files;
    }

    /// Append a file. A file with the same id replaces the old one in place.
    pub fn add(&mut self, file: SharedFile) {
        match self.files.iter_mut().find(|f| f.id() == file.id()) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    pub fn remove(&mut self, id: &FileId) -> Option<SharedFile> {
        let pos = self.files.iter().position(|f| f.id() == id)?;
        Some(self.files.remove(pos))
    }

    pub fn get(&self, id: &FileId) -> Option<&SharedFile> {
        self.files.iter().find(|f| f.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Entries as broadcast in `FilesUpdate`.
    pub fn manifest(&self) -> Vec<SharedFileEntry> {
        self.files.iter().map(|f| f.entry.clone()).collect()
    }
}
