//! Recorded landmark traces
//!
//! A trace is JSON lines, one frame per line:
//! `{"t_ms": 1033, "landmarks": [[x, y], ...]}` or `{"t_ms": 1066, "landmarks": null}`
//! when the detector found no face. Blank lines and `#` comments are skipped;
//! lines that are not UTF-8 or not valid JSON are skipped with a warning.

use anyhow::Result;
use dms::{DmsError, LandmarkDetector, LandmarkSet, Point};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Capture time relative to the start of the recording (milliseconds)
    pub t_ms: u64,
    /// Raw detector output, `None` when no face was found
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 2]>>,
}

/// Parse one trace line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<TraceRecord>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Detector that replays the landmarks stored in each record
#[derive(Debug, Default)]
pub struct TraceDetector;

impl LandmarkDetector for TraceDetector {
    type Frame = TraceRecord;

    fn detect(&mut self, frame: &TraceRecord) -> Result<Option<LandmarkSet>, DmsError> {
        frame
            .landmarks
            .as_ref()
            .map(|points| {
                LandmarkSet::new(points.iter().map(|&[x, y]| Point::new(x, y)).collect())
            })
            .transpose()
    }
}

/// Read a trace on its own task and hand frames over one at a time.
///
/// The one-slot channel keeps the reader at most one frame ahead of the
/// engine. The task resolves to the number of frames sent.
pub fn spawn_reader<R>(reader: R) -> (mpsc::Receiver<TraceRecord>, JoinHandle<Result<usize>>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let handle = tokio::spawn(async move {
        let mut segments = reader.split(b'\n');
        let mut line_no = 0usize;
        let mut sent = 0usize;

        while let Some(bytes) = segments.next_segment().await? {
            line_no += 1;
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Skipping trace line {} (not UTF-8): {}", line_no, e);
                    continue;
                }
            };
            match parse_line(&line) {
                Ok(Some(record)) => {
                    if tx.send(record).await.is_err() {
                        debug!("Frame consumer stopped at line {}", line_no);
                        break;
                    }
                    sent += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping malformed trace line {}: {}", line_no, e),
            }
        }
        Ok(sent)
    });

    (rx, handle)
}
