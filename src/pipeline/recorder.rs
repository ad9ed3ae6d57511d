// src/pipeline/recorder.rs
//
// Append-only history of analysed frames and the session summary derived
// from it.

use crate::feedback::FeedbackItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One analysed frame. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    /// Seconds since session start
    pub timestamp: f64,
    pub joint_angles: BTreeMap<String, f64>,
    pub accuracy: f64,
    pub feedback: Vec<FeedbackItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "No analysis data available")]
    NoData,
    #[serde(rename = "Analysis completed")]
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoData => "No analysis data available",
            Self::Completed => "Analysis completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub status: SessionStatus,
    /// Mean accuracy over all records
    pub accuracy: f64,
    pub feedback: Vec<FeedbackItem>,
    /// Mean angle per joint over the records that contain it
    pub joint_angles: BTreeMap<String, f64>,
    pub frame_count: u64,
    /// Timestamp of the last record, in seconds
    pub duration: f64,
}

impl SessionSummary {
    pub fn empty() -> Self {
        Self {
            status: SessionStatus::NoData,
            accuracy: 0.0,
            feedback: Vec::new(),
            joint_angles: BTreeMap::new(),
            frame_count: 0,
            duration: 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRecorder {
    records: Vec<FrameRecord>,
    frame_count: u64,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        timestamp: f64,
        joint_angles: BTreeMap<String, f64>,
        accuracy: f64,
        feedback: Vec<FeedbackItem>,
    ) -> &FrameRecord {
        self.frame_count += 1;
        self.records.push(FrameRecord {
            frame: self.frame_count,
            timestamp,
            joint_angles,
            accuracy,
            feedback,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn summary(&self, feedback: Vec<FeedbackItem>) -> SessionSummary {
        let Some(last) = self.records.last() else {
            return SessionSummary::empty();
        };

        let accuracy =
            self.records.iter().map(|r| r.accuracy).sum::<f64>() / self.records.len() as f64;

        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            for (joint, value) in &record.joint_angles {
                let entry = sums.entry(joint.as_str()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        let joint_angles = sums
            .into_iter()
            .map(|(joint, (sum, count))| (joint.to_string(), sum / count as f64))
            .collect();

        SessionSummary {
            status: SessionStatus::Completed,
            accuracy,
            feedback,
            joint_angles,
            frame_count: self.frame_count,
            duration: last.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_empty_summary() {
        let recorder = SessionRecorder::new();
        let summary = recorder.summary(Vec::new());
        assert_eq!(summary.status, SessionStatus::NoData);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.frame_count, 0);
        assert_eq!(summary.duration, 0.0);
        assert!(summary.joint_angles.is_empty());
        assert!(summary.feedback.is_empty());
    }

    #[test]
    fn test_summary_mean_accuracy() {
        let mut recorder = SessionRecorder::new();
        recorder.record(0.0, BTreeMap::new(), 80.0, Vec::new());
        recorder.record(0.5, BTreeMap::new(), 90.0, Vec::new());
        recorder.record(1.0, BTreeMap::new(), 100.0, Vec::new());

        let summary = recorder.summary(Vec::new());
        assert_eq!(summary.status, SessionStatus::Completed);
        assert!((summary.accuracy - 90.0).abs() < 1e-9);
        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.duration, 1.0);
    }

    #[test]
    fn test_summary_ragged_joint_means() {
        let mut recorder = SessionRecorder::new();
        recorder.record(0.0, angles(&[("left_knee", 100.0)]), 50.0, Vec::new());
        recorder.record(
            0.1,
            angles(&[("left_knee", 120.0), ("left_elbow", 90.0)]),
            50.0,
            Vec::new(),
        );

        let summary = recorder.summary(Vec::new());
        assert!((summary.joint_angles["left_knee"] - 110.0).abs() < 1e-9);
        assert!((summary.joint_angles["left_elbow"] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_frames_numbered_from_one() {
        let mut recorder = SessionRecorder::new();
        assert_eq!(recorder.record(0.0, BTreeMap::new(), 0.0, Vec::new()).frame, 1);
        assert_eq!(recorder.record(0.1, BTreeMap::new(), 0.0, Vec::new()).frame, 2);
    }

    #[test]
    fn test_status_serializes_as_text() {
        let json = serde_json::to_string(&SessionSummary::empty()).unwrap();
        assert!(json.contains("\"status\":\"No analysis data available\""));
    }
}
