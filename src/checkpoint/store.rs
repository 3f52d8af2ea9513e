//! Checkpoint persistence

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{Checkpoint, CheckpointFormat};

/// How a checkpoint reaches the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStyle {
    /// Rewrite the already-open file at offset 0. A crash mid-write may
    /// leave a torn file, which loads as absent.
    Overwrite,

    /// Write a temp file, fsync it, rename it over the target
    AtomicRename,
}

/// Sole writer of one checkpoint file
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    format: CheckpointFormat,
    style: PersistStyle,

    /// Kept open between saves in overwrite style
    file: Option<File>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, format: CheckpointFormat, style: PersistStyle) -> Self {
        Self {
            path: path.into(),
            format,
            style,
            file: None,
        }
    }

    /// Primary checkpoint of a durability log: `{prefix}.checkpoint`
    pub fn primary(directory: &Path, prefix: &str) -> Self {
        Self::new(
            directory.join(format!("{}.checkpoint", prefix)),
            CheckpointFormat::Primary,
            PersistStyle::Overwrite,
        )
    }

    /// Cursor checkpoint of a consumer: `{prefix}.cp`
    pub fn cursor(directory: &Path, prefix: &str) -> Self {
        Self::new(
            directory.join(format!("{}.cp", prefix)),
            CheckpointFormat::Cursor,
            PersistStyle::AtomicRename,
        )
    }

    /// Load the checkpoint
    ///
    /// A missing file is `None`. So is a file that does not parse: the
    /// caller re-derives its position by scanning the ring.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!(path = %self.path.display(), "checkpoint is not valid text, ignoring");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match self.format.parse(&text) {
            Ok(checkpoint) => {
                tracing::debug!(
                    path = %self.path.display(),
                    index = checkpoint.current_index,
                    offset = checkpoint.current_offset,
                    "loaded checkpoint"
                );
                Ok(Some(checkpoint))
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable checkpoint, ignoring");
                Ok(None)
            }
        }
    }

    /// Persist the full record
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        let text = self.format.render(checkpoint);
        match self.style {
            PersistStyle::Overwrite => self.overwrite(text.as_bytes()),
            PersistStyle::AtomicRename => write_atomic(&self.path, text.as_bytes()),
        }
    }

    fn overwrite(&mut self, bytes: &[u8]) -> Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.path)?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(bytes)?;
            file.set_len(bytes.len() as u64)?;
        }
        Ok(())
    }

    /// Flush an overwrite-style checkpoint to stable storage
    pub fn sync(&self) -> Result<()> {
        if let Some(file) = self.file.as_ref() {
            file.sync_data()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CheckpointFormat {
        self.format
    }

    pub fn style(&self) -> PersistStyle {
        self.style
    }
}

/// Replace `path` with `bytes` so readers see either the old or new content
///
/// tmp → write → fsync → rename → fsync(parent)
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        sync_dir(parent);
    }
    Ok(())
}

/// Flush a directory entry change. Returns false if the fsync failed.
///
/// Directory fsync is not supported everywhere, so a failure is logged and
/// the rename stands.
fn sync_dir(dir: &Path) -> bool {
    match File::open(dir).and_then(|handle| handle.sync_all()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "directory fsync failed after rename");
            false
        }
    }
}
