//! Audit log writer
//!
//! Append-only file sink. `record` only enqueues; a dedicated thread owns the
//! file and does the encoding and writing, so a slow disk never stalls a
//! session.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Sender};

use super::{AuditFormat, AuditRecord, AuditSink, RecordEncoder};
use crate::error::{RconError, Result};

/// File-backed audit sink
pub struct AuditLog {
    /// Closed on drop to stop the writer
    sender: Option<Sender<AuditRecord>>,

    /// Writer thread, joined on drop
    worker: Option<JoinHandle<()>>,

    path: PathBuf,
    format: AuditFormat,
}

impl AuditLog {
    /// Open (or create) the log at `path` and start the writer thread
    pub fn open(path: impl Into<PathBuf>, format: AuditFormat) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let encoder = format.encoder();
        let (sender, receiver) = unbounded::<AuditRecord>();

        let worker_path = path.clone();
        let worker = thread::Builder::new()
            .name("rconlink-audit".to_string())
            .spawn(move || {
                for record in receiver {
                    if let Err(e) = append(&file, encoder.as_ref(), &record) {
                        tracing::warn!("Failed to write audit log {}: {}", worker_path.display(), e);
                    }
                }
            })?;

        tracing::debug!("Audit log opened at {} ({:?})", path.display(), format);

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            path,
            format,
        })
    }

    /// Read back every intact record from a log file
    ///
    /// A missing file is an empty log. Corrupt entries are skipped.
    pub fn load(path: impl AsRef<Path>, format: AuditFormat) -> Result<Vec<AuditRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(path)?;
        Ok(format.encoder().decode_all(&bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> AuditFormat {
        self.format
    }
}

fn append(mut file: &File, encoder: &dyn RecordEncoder, record: &AuditRecord) -> Result<()> {
    let bytes = encoder.encode(record)?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}

impl AuditSink for AuditLog {
    fn record(&self, record: AuditRecord) -> Result<()> {
        match &self.sender {
            Some(sender) => sender
                .send(record)
                .map_err(|_| RconError::Audit("audit writer has stopped".to_string())),
            None => Err(RconError::Audit("audit log is closed".to_string())),
        }
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        // Dropping the sender ends the writer loop once the queue is drained
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Audit writer thread panicked");
            }
        }
    }
}
