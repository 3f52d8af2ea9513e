//! Checkpoint text formats

use crate::error::{LogError, Result};

use super::Checkpoint;

/// Text layout of a checkpoint file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// Four `\r\n` lines: index, current timestamp, current offset, remote
    /// timestamp. Only the confirmed position is stored.
    Primary,

    /// Two `\n` lines: `{idx} {offset}` then `{next_idx} {next_offset}`
    Cursor,
}

impl CheckpointFormat {
    pub fn render(self, checkpoint: &Checkpoint) -> String {
        match self {
            CheckpointFormat::Primary => format!(
                "idx:{:03}\r\ncurr ts:{:016}\r\ncurr offset:{:016}\r\nremote ts:{:016}\r\n",
                checkpoint.current_index,
                checkpoint.current_timestamp,
                checkpoint.current_offset,
                checkpoint.remote_timestamp,
            ),
            CheckpointFormat::Cursor => format!(
                "{} {}\n{} {}\n",
                checkpoint.current_index,
                checkpoint.current_offset,
                checkpoint.next_index,
                checkpoint.next_offset,
            ),
        }
    }

    pub fn parse(self, text: &str) -> Result<Checkpoint> {
        match self {
            CheckpointFormat::Primary => parse_primary(text),
            CheckpointFormat::Cursor => parse_cursor(text),
        }
    }
}

/// Lenient: lines may end in `\n` alone, and a missing remote timestamp
/// reads as zero. The first three fields are required.
fn parse_primary(text: &str) -> Result<Checkpoint> {
    let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));

    let index = field(lines.next(), "idx")?;
    let timestamp = field(lines.next(), "curr ts")?;
    let offset = field(lines.next(), "curr offset")?;
    let remote = match lines.next() {
        Some(line) if !line.is_empty() => field(Some(line), "remote ts")?,
        _ => 0,
    };

    let index = u32::try_from(index)
        .map_err(|_| LogError::Checkpoint(format!("index {} out of range", index)))?;

    let mut checkpoint = Checkpoint {
        current_index: index,
        current_offset: offset,
        current_timestamp: timestamp,
        remote_timestamp: remote,
        ..Checkpoint::default()
    };
    checkpoint.stage(checkpoint.cursor());
    Ok(checkpoint)
}

fn field(line: Option<&str>, key: &str) -> Result<u64> {
    let line = line.ok_or_else(|| LogError::Checkpoint(format!("missing `{}` line", key)))?;
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| LogError::Checkpoint(format!("malformed line `{}`", line)))?;

    if name.trim() != key {
        return Err(LogError::Checkpoint(format!("expected `{}`, found `{}`", key, name)));
    }

    value
        .trim()
        .parse()
        .map_err(|e| LogError::Checkpoint(format!("bad `{}` value `{}`: {}", key, value, e)))
}

fn parse_cursor(text: &str) -> Result<Checkpoint> {
    let mut lines = text.lines();
    let (index, offset) = pair(lines.next())?;
    let (next_index, next_offset) = pair(lines.next())?;

    Ok(Checkpoint {
        current_index: index,
        current_offset: offset,
        next_index,
        next_offset,
        ..Checkpoint::default()
    })
}

fn pair(line: Option<&str>) -> Result<(u32, u64)> {
    let line = line.ok_or_else(|| LogError::Checkpoint("missing position line".to_string()))?;
    let mut parts = line.split_whitespace();

    let index = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LogError::Checkpoint(format!("bad index in `{}`", line)))?;
    let offset = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LogError::Checkpoint(format!("bad offset in `{}`", line)))?;

    Ok((index, offset))
}
