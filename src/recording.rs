// src/recording.rs
//
// Landmark recordings: the batch-mode stand-in for a live pose detector.
// A recording is JSON Lines, one frame per line:
//
//   {"timestamp_ms": 33.3, "width": 640, "height": 480,
//    "poses": [[{"x": 0.5, "y": 0.2, "visibility": 0.98}, ...], ...]}

use crate::landmarks::LandmarkSet;
use crate::pipeline::recorder::SessionSummary;
use crate::pipeline::session::PoseAnalyzer;
use crate::types::{Config, FrameDimensions};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub poses: Vec<LandmarkSet>,
}

impl RecordedFrame {
    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }
}

pub struct RecordingProcessor {
    config: Config,
}

impl RecordingProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn find_recording_files(&self) -> Result<Vec<PathBuf>> {
        let mut recordings = Vec::new();

        for entry in WalkDir::new(&self.config.recording.input_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_jsonl = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
            if entry.file_type().is_file() && is_jsonl {
                recordings.push(path.to_path_buf());
            }
        }

        info!("Found {} recording file(s)", recordings.len());
        Ok(recordings)
    }

    /// Run one full session over a recording and return its summary.
    ///
    /// The session clock starts at the first frame's timestamp.
    pub fn analyze_recording(
        &self,
        path: &Path,
        analyzer: &mut PoseAnalyzer,
    ) -> Result<SessionSummary> {
        let mut reader = RecordingReader::open(path)?;
        let mut started = false;

        while let Some(frame) = reader.read_frame()? {
            if !started {
                analyzer.start_session(frame.timestamp_ms);
                started = true;
            }
            analyzer.process_frame(&frame.poses, frame.dimensions(), frame.timestamp_ms);
        }

        if !started {
            warn!("Recording {} contains no frames", path.display());
            analyzer.start_session(0.0);
        }

        debug!("{} frame(s) read from {}", reader.frames_read(), path.display());
        Ok(analyzer.stop_session())
    }
}

pub struct RecordingReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    frames_read: u64,
}

impl RecordingReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("Recording file not found: {}", path.display());
        }

        info!("Opening recording: {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
            frames_read: 0,
        })
    }

    /// Next frame, or `None` at end of file. Blank lines are skipped.
    pub fn read_frame(&mut self) -> Result<Option<RecordedFrame>> {
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let line = line.with_context(|| format!("Failed to read {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }

            let frame: RecordedFrame = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Invalid frame at {}:{}",
                    self.path.display(),
                    self.line_number
                )
            })?;
            self.frames_read += 1;
            return Ok(Some(frame));
        }
        Ok(None)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}
