//! Rotating File
//!
//! One logical log stream backed by a fixed ring of numbered files.
//!
//! ## Responsibilities
//! - Deterministic naming: `{directory}/{prefix}.{index:03}`
//! - Track the current index and wrap at `max_index`
//! - Switch to the next file without ever losing a valid handle
//! - Raw positioned reads and single-call vectored appends
//!
//! Nothing in here knows about record framing.

use std::fs::{File, OpenOptions};
use std::io::{self, IoSlice, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::LogConfig;
use crate::error::{LogError, Result};

/// How the ring files are opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Consumers: never create or modify files
    ReadOnly,

    /// The single writer: creates missing files and truncates a file it
    /// rotates into, since that file holds data from the previous lap
    Write,
}

/// A bounded ring of numbered files with one open handle
#[derive(Debug)]
pub struct RotatingFile {
    directory: PathBuf,
    prefix: String,
    index: u32,
    max_index: u32,
    max_size_bytes: u64,
    mode: OpenMode,
    file: Option<File>,

    #[cfg(test)]
    write_fault: Option<WriteFault>,
}

/// Injected failure for the next append
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteFault {
    /// Write only this many bytes and report success
    Short(usize),

    /// Write this many bytes, then fail
    Fail(usize),
}

impl RotatingFile {
    /// Create a ring positioned at index 0. No file is opened yet.
    pub fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        max_index: u32,
        max_size_bytes: u64,
        mode: OpenMode,
    ) -> Result<Self> {
        if max_index == 0 {
            return Err(LogError::Config("ring capacity must be at least 1".to_string()));
        }

        Ok(Self {
            directory: directory.into(),
            prefix: prefix.into(),
            index: 0,
            max_index,
            max_size_bytes,
            mode,
            file: None,
            #[cfg(test)]
            write_fault: None,
        })
    }

    /// Create a ring from a validated config
    pub fn from_config(config: &LogConfig, mode: OpenMode) -> Result<Self> {
        config.validate()?;
        Self::new(
            &config.directory,
            &config.prefix,
            config.max_index,
            config.max_size_bytes,
            mode,
        )
    }

    // =========================================================================
    // Naming
    // =========================================================================

    /// Path of the data file for `index`
    pub fn file_name_at(&self, index: u32) -> PathBuf {
        Self::file_name_in(&self.directory, &self.prefix, index)
    }

    /// Path of the data file for `index` inside `directory`
    pub fn file_name_in(directory: &Path, prefix: &str, index: u32) -> PathBuf {
        directory.join(format!("{}.{:03}", prefix, index))
    }

    pub fn exists_at(&self, index: u32) -> bool {
        self.file_name_at(index).is_file()
    }

    /// Index that follows `index` in the ring
    pub fn next_index(&self, index: u32) -> u32 {
        (index + 1) % self.max_index
    }

    // =========================================================================
    // Open / Switch
    // =========================================================================

    /// Open the file for the current index
    ///
    /// In write mode a missing file is created; an existing one is kept so
    /// appends continue where the previous process stopped.
    pub fn open(&mut self) -> Result<()> {
        let file = self.open_file(self.index, false)?;
        self.file = Some(file);
        Ok(())
    }

    /// Reposition the ring at `index` and open that file
    ///
    /// The previous handle stays in place if the open fails.
    pub fn open_at(&mut self, index: u32) -> Result<()> {
        if index >= self.max_index {
            return Err(LogError::Config(format!(
                "index {} outside ring of {} files",
                index, self.max_index
            )));
        }

        let file = self.open_file(index, false)?;
        self.file = Some(file);
        self.index = index;
        Ok(())
    }

    /// Advance to `(index + 1) mod max_index`
    ///
    /// The new file is opened before the old handle is dropped. On failure
    /// the index and handle are left exactly as they were.
    pub fn switch_to_next(&mut self) -> Result<u32> {
        let next = self.next_index(self.index);
        let truncate = self.mode == OpenMode::Write;

        let file = self.open_file(next, truncate)?;

        let previous = self.index;
        self.file = Some(file);
        self.index = next;

        tracing::debug!(from = previous, to = next, prefix = %self.prefix, "switched ring file");
        Ok(next)
    }

    /// Drop the open handle, if any
    pub fn close(&mut self) {
        self.file = None;
    }

    fn open_file(&self, index: u32, truncate: bool) -> Result<File> {
        let path = self.file_name_at(index);
        let mut options = OpenOptions::new();
        match self.mode {
            OpenMode::ReadOnly => {
                options.read(true);
            }
            OpenMode::Write => {
                options.read(true).write(true).create(true).truncate(truncate);
            }
        }
        Ok(options.open(path)?)
    }

    // =========================================================================
    // Size
    // =========================================================================

    /// Current size of the open file
    pub fn len(&self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    /// True when the open file has reached the size bound
    pub fn needs_rotation(&self) -> Result<bool> {
        Ok(self.len()? >= self.max_size_bytes)
    }

    // =========================================================================
    // Raw I/O
    // =========================================================================

    /// Read into `buf` starting at `offset`
    ///
    /// Keeps reading until `buf` is full or the file ends. Returns the number
    /// of bytes read; zero means `offset` is at or past the end.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        read_full_at(self.file()?, offset, buf)
    }

    /// Write all slices at the end of the file with one vectored call
    ///
    /// Returns the number of bytes the kernel accepted, which may be less than
    /// the total. The caller decides what a short write means.
    pub fn append_vectored(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(LogError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "ring opened read-only",
            )));
        }

        #[cfg(test)]
        let fault = self.write_fault.take();

        let mut file = self.file()?;
        file.seek(SeekFrom::End(0))?;

        #[cfg(test)]
        if let Some(fault) = fault {
            return inject_fault(file, bufs, fault);
        }

        Ok(file.write_vectored(bufs)?)
    }

    /// Make the next append write short or fail
    #[cfg(test)]
    pub(crate) fn inject_write_fault(&mut self, fault: WriteFault) {
        self.write_fault = Some(fault);
    }

    /// Cut the open file back to `len` bytes
    pub fn truncate(&self, len: u64) -> Result<()> {
        self.file()?.set_len(len)?;
        Ok(())
    }

    /// Flush file data to stable storage
    pub fn sync(&self) -> Result<()> {
        self.file()?.sync_data()?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(LogError::NotOpen)
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
fn inject_fault(mut file: &File, bufs: &[IoSlice<'_>], fault: WriteFault) -> Result<usize> {
    let bytes: Vec<u8> = bufs.iter().flat_map(|b| b.iter().copied()).collect();
    match fault {
        WriteFault::Short(limit) => {
            let n = limit.min(bytes.len());
            file.write_all(&bytes[..n])?;
            Ok(n)
        }
        WriteFault::Fail(limit) => {
            file.write_all(&bytes[..limit.min(bytes.len())])?;
            Err(LogError::Io(io::Error::new(io::ErrorKind::Other, "injected write fault")))
        }
    }
}

/// Positioned read that retries until `buf` is full or EOF
pub(crate) fn read_full_at(mut file: &File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LogError::Io(e)),
        }
    }
    Ok(filled)
}
