//! Newline-delimited JSON landmark stream.
//!
//! Each non-blank line is one `FrameInput`, e.g.
//! `{"timestamp": 12.5, "landmarks": [{"x": 0.5, "y": 0.3, "visibility": 0.99}, ...]}`.
//! A record with `"landmarks": null` means no body was detected.

use crate::error::AppError;
use crate::landmark::{FrameInput, LandmarkSource};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl JsonLinesSource<BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameInput>, AppError> {
        loop {
            self.buffer.clear();
            let read = self.reader.read_line(&mut self.buffer)?;
            if read == 0 {
                debug!(lines = self.line, "Landmark stream ended");
                return Ok(None);
            }
            self.line += 1;

            let record = self.buffer.trim();
            if record.is_empty() {
                continue;
            }

            let frame: FrameInput =
                serde_json::from_str(record).map_err(|err| AppError::MalformedRecord {
                    line: self.line,
                    reason: err.to_string(),
                })?;
            return Ok(Some(frame));
        }
    }
}
