//! [`CodeReader`] — the abstract file-I/O collaborator (spec §1: "file I/O
//! treated as an abstract `CodeReader`"). Concrete implementations (reading
//! from disk, from an IDE buffer, from a VFS) live outside this workspace.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors reading source files through a [`CodeReader`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodeReaderError {
    /// The requested path could not be read.
    #[error("could not read {path}: {message}")]
    ReadFailed {
        /// The path that failed to read.
        path: String,
        /// Underlying message.
        message: String,
    },
}

/// Reads source file contents for a set of paths. An abstract collaborator;
/// this workspace never touches a real filesystem.
#[async_trait]
pub trait CodeReader: Send + Sync {
    /// Read the contents of each path. Implementations should return
    /// partial results rather than failing the whole batch when a single
    /// path errors, where practical — callers treat a missing entry the
    /// same as an empty file.
    async fn read_files(&self, paths: &[String]) -> Result<BTreeMap<String, String>, CodeReaderError>;
}

/// An in-memory [`CodeReader`] — the only implementation this workspace
/// ships, used for tests and as a default when no real backend is wired.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCodeReader {
    files: BTreeMap<String, String>,
}

impl InMemoryCodeReader {
    /// Build a reader from an explicit path -> contents map.
    pub fn new(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl CodeReader for InMemoryCodeReader {
    async fn read_files(&self, paths: &[String]) -> Result<BTreeMap<String, String>, CodeReaderError> {
        let mut out = BTreeMap::new();
        for path in paths {
            let contents = self.files.get(path).cloned().unwrap_or_default();
            out.insert(path.clone(), contents);
        }
        Ok(out)
    }
}
