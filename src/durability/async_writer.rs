//! Asynchronous appends
//!
//! A bounded queue drained by one writer thread that owns the
//! [`DurableLog`]. Producers on any thread submit payloads and wait on a
//! per-append reply channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{LogError, Result};

use super::DurableLog;

/// Counters maintained by the writer thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendStats {
    pub appended: u64,
    pub failed: u64,
    pub bytes: u64,
    pub last_timestamp: u64,
}

enum Job {
    Append {
        payload: Vec<u8>,
        session_id: Option<u64>,
        reply: Sender<Result<u64>>,
    },
    Sync {
        reply: Sender<Result<()>>,
    },
}

/// Reply handle for one submitted append
pub struct PendingAppend {
    reply: Receiver<Result<u64>>,
}

impl PendingAppend {
    /// Block until the writer thread has appended the record
    pub fn wait(self) -> Result<u64> {
        self.reply.recv().map_err(|_| LogError::Closed)?
    }
}

/// Queue + single writer thread in front of a [`DurableLog`]
pub struct AsyncAppender {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<DurableLog>>,
    stats: Arc<Mutex<AppendStats>>,
}

impl AsyncAppender {
    /// Move `log` onto a writer thread with room for `queue_depth` jobs
    pub fn spawn(log: DurableLog, queue_depth: usize) -> Result<Self> {
        let (sender, receiver) = channel::bounded::<Job>(queue_depth.max(1));
        let stats = Arc::new(Mutex::new(AppendStats::default()));
        let worker_stats = Arc::clone(&stats);

        let worker = thread::Builder::new()
            .name("ringlog-writer".to_string())
            .spawn(move || run_writer(log, receiver, worker_stats))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            stats,
        })
    }

    /// Queue a payload; blocks only while the queue is full
    pub fn submit(&self, payload: Vec<u8>, session_id: Option<u64>) -> Result<PendingAppend> {
        let (reply, receiver) = channel::bounded(1);
        self.send(Job::Append {
            payload,
            session_id,
            reply,
        })?;
        Ok(PendingAppend { reply: receiver })
    }

    /// Queue a payload and wait for its timestamp
    pub fn append(&self, payload: Vec<u8>, session_id: Option<u64>) -> Result<u64> {
        self.submit(payload, session_id)?.wait()
    }

    /// Wait until everything queued so far is on stable storage
    pub fn sync(&self) -> Result<()> {
        let (reply, receiver) = channel::bounded(1);
        self.send(Job::Sync { reply })?;
        receiver.recv().map_err(|_| LogError::Closed)?
    }

    pub fn stats(&self) -> AppendStats {
        *self.stats.lock()
    }

    /// Drain the queue, stop the writer thread and hand the log back
    pub fn shutdown(mut self) -> Result<DurableLog> {
        self.stop().ok_or(LogError::Closed)
    }

    fn send(&self, job: Job) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(LogError::Closed)?;
        sender.send(job).map_err(|_| LogError::Closed)
    }

    fn stop(&mut self) -> Option<DurableLog> {
        // Closing the channel ends the writer loop once the queue is empty
        self.sender.take();
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(log) => Some(log),
            Err(_) => {
                tracing::error!("log writer thread panicked");
                None
            }
        }
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_writer(mut log: DurableLog, jobs: Receiver<Job>, stats: Arc<Mutex<AppendStats>>) -> DurableLog {
    tracing::debug!("log writer thread started");

    for job in jobs.iter() {
        match job {
            Job::Append {
                payload,
                session_id,
                reply,
            } => {
                let result = log.append(&payload, session_id);
                {
                    let mut stats = stats.lock();
                    match &result {
                        Ok(timestamp) => {
                            stats.appended += 1;
                            stats.bytes += payload.len() as u64;
                            stats.last_timestamp = *timestamp;
                        }
                        Err(e) => {
                            stats.failed += 1;
                            tracing::error!(error = %e, "queued append failed");
                        }
                    }
                }
                // The producer may have stopped waiting
                let _ = reply.send(result);
            }
            Job::Sync { reply } => {
                let _ = reply.send(log.sync());
            }
        }
    }

    if let Err(e) = log.sync() {
        tracing::error!(error = %e, "final sync of durability log failed");
    }
    tracing::debug!("log writer thread stopped");
    log
}
