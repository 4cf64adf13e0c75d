//! JSONL file writer for review events.
//!
//! Each [`ReviewEvent`] becomes one JSON line: `timestamp`, the server `run`
//! (process id), a per-run `seq`, the `event` name, then the payload fields.
//! A payload that is not an object lands under `detail`.

use scorehive_application::ports::review_logger::{ReviewEvent, ReviewLogger};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// JSONL review logger that writes one JSON object per line.
///
/// Appends to an existing file so one log can span several server runs.
/// Flushes after every line and on `Drop`.
pub struct JsonlReviewLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    run: u32,
    seq: AtomicU64,
}

impl JsonlReviewLogger {
    /// Open (or create) the log at the given path.
    ///
    /// Creates parent directories if needed. Returns `None` if the file
    /// cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create review log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open review log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            run: std::process::id(),
            seq: AtomicU64::new(0),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One line of the review log.
///
/// `run` and `seq` tell apart the events of server runs that share a file.
#[derive(Serialize)]
struct ReviewRecord<'a> {
    timestamp: String,
    run: u32,
    seq: u64,
    event: &'a str,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl<'a> ReviewRecord<'a> {
    fn new(run: u32, seq: u64, event: &'a ReviewEvent) -> Self {
        let fields = match &event.payload {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => Map::from_iter([("detail".to_string(), other.clone())]),
        };
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            run,
            seq,
            event: event.event_type,
            fields,
        }
    }
}

impl ReviewLogger for JsonlReviewLogger {
    fn log(&self, event: ReviewEvent) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let line = match serde_json::to_string(&ReviewRecord::new(self.run, seq, &event)) {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping {} review event: {}", event.event_type, e);
                return;
            }
        };

        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|()| writer.flush()) {
            warn!("Could not write review log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlReviewLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
        debug!(
            "Closed review log {} after {} events",
            self.path.display(),
            self.seq.load(Ordering::Relaxed)
        );
    }
}
