//! Current-index pointer file

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::store::write_atomic;

/// One decimal line naming the writer's current ring index
#[derive(Debug, Clone)]
pub struct IndexPointer {
    path: PathBuf,
}

impl IndexPointer {
    /// Pointer for `{directory}/{prefix}.index`
    pub fn new(directory: &Path, prefix: &str) -> Self {
        Self {
            path: directory.join(format!("{}.index", prefix)),
        }
    }

    /// Stored index, or `None` if the file is missing or unreadable
    pub fn load(&self) -> Result<Option<u32>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match text.trim().parse() {
            Ok(index) => Ok(Some(index)),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), "unreadable index pointer, ignoring");
                Ok(None)
            }
        }
    }

    pub fn save(&self, index: u32) -> Result<()> {
        write_atomic(&self.path, format!("{}\n", index).as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
