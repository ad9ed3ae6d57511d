// src/pipeline/session.rs
//
// Session orchestration.
//
// An AnalysisSession owns every piece of per-session state: identities,
// per-person metrics, the feedback feed and the frame history. Nothing is
// shared between sessions; `PoseAnalyzer::start_session` replaces the
// whole object.
//
// Per frame:
//   LandmarkSets → IdentityTracker → DepthEstimator + MetricsEngine (per id)
//                → feedback rules (primary person) → SessionRecorder

use crate::analysis::depth_estimator::DepthEstimator;
use crate::analysis::identity_tracker::IdentityTracker;
use crate::analysis::metrics_engine::{MetricsEngine, Observation, PersonMetrics};
use crate::export::{self, ExportFormat};
use crate::feedback::{self, FeedbackAggregator, FeedbackContext, FeedbackItem};
use crate::landmarks::{BoundingBox, LandmarkSet};
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::recorder::{FrameRecord, SessionRecorder, SessionSummary};
use crate::types::{Config, FrameDimensions};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// TYPES
// ============================================================================

/// Per-person data for drawing overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFrameMetrics {
    pub person_id: u32,
    pub bbox: BoundingBox,
    pub metrics: PersonMetrics,
}

/// Result of one `process_frame` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// One entry per input LandmarkSet, in input order
    pub persons: Vec<PersonFrameMetrics>,
    /// Joint angles of the primary (first) person
    pub joint_angles: BTreeMap<String, f64>,
    /// Accuracy of the primary person, 0 without a detection
    pub accuracy: f64,
}

impl FrameAnalysis {
    pub fn primary(&self) -> Option<&PersonFrameMetrics> {
        self.persons.first()
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct AnalysisSession {
    depth_scale: f64,
    snapshot_size: usize,
    tracker: IdentityTracker,
    depth: DepthEstimator,
    engine: MetricsEngine,
    feedback: FeedbackAggregator,
    recorder: SessionRecorder,
    metrics: PipelineMetrics,
    start_ms: f64,
    last_seconds: f64,
    processed_frames: u64,
    active: bool,
}

impl AnalysisSession {
    pub fn new(config: &Config, start_ms: f64, metrics: PipelineMetrics) -> Self {
        Self {
            depth_scale: config.depth.depth_scale,
            snapshot_size: config.feedback.snapshot_size,
            tracker: IdentityTracker::new(config.tracker.clone()),
            depth: DepthEstimator::new(config.depth.clone()),
            engine: MetricsEngine::new(config.metrics.clone()),
            feedback: FeedbackAggregator::new(config.feedback.clone()),
            recorder: SessionRecorder::new(),
            metrics,
            start_ms,
            last_seconds: 0.0,
            processed_frames: 0,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    fn seconds_since_start(&self, timestamp_ms: f64) -> f64 {
        (timestamp_ms - self.start_ms) / 1000.0
    }

    pub fn process_frame(
        &mut self,
        poses: &[LandmarkSet],
        dims: FrameDimensions,
        timestamp_ms: f64,
    ) -> FrameAnalysis {
        if !self.active {
            debug!("Session stopped, frame at {:.0}ms ignored", timestamp_ms);
            return FrameAnalysis::default();
        }

        let started = Instant::now();
        let now = self.seconds_since_start(timestamp_ms);
        self.last_seconds = now;
        self.processed_frames += 1;
        self.metrics.inc(&self.metrics.total_frames);

        // ── Identity ─────────────────────────────────────────────
        let boxes: Vec<BoundingBox> = poses.iter().map(|p| p.bounding_box(dims)).collect();
        let assignment = self.tracker.update(&boxes, self.processed_frames);
        self.metrics
            .add(&self.metrics.persons_created, assignment.created.len() as u64);
        for person_id in &assignment.evicted {
            self.engine.remove(*person_id);
            self.metrics.inc(&self.metrics.persons_evicted);
        }

        if poses.is_empty() {
            self.finish_timing(started);
            return FrameAnalysis::default();
        }
        self.metrics.inc(&self.metrics.frames_with_pose);

        // ── Metrics per person ───────────────────────────────────
        let mut persons = Vec::with_capacity(poses.len());
        for ((pose, bbox), person_id) in poses.iter().zip(&boxes).zip(&assignment.ids) {
            let pose_3d = self.depth.estimate(pose, dims);
            let metrics = self.engine.observe(
                Observation {
                    person_id: *person_id,
                    landmarks: pose,
                    bbox: *bbox,
                    pose_3d,
                    frame_index: self.processed_frames,
                },
                dims,
            );
            persons.push(PersonFrameMetrics {
                person_id: *person_id,
                bbox: *bbox,
                metrics: metrics.clone(),
            });
        }

        // ── Feedback for the primary person ──────────────────────
        let primary = &persons[0];
        let joint_angles = primary.metrics.joint_angles.clone();
        let accuracy = primary.metrics.accuracy;

        let messages = feedback::evaluate(&FeedbackContext {
            person_id: primary.person_id,
            joint_angles: &joint_angles,
            landmarks: &poses[0],
            metrics: &primary.metrics,
            depth_scale: self.depth_scale,
        });
        let added = self.feedback.update(messages.as_slice(), now);
        self.metrics.add(&self.metrics.feedback_issued, added as u64);

        // ── History ──────────────────────────────────────────────
        let snapshot = self.feedback.last_n(now, self.snapshot_size);
        let record = self
            .recorder
            .record(now, joint_angles.clone(), accuracy, snapshot);
        debug!(
            "Frame {} @ {:.2}s: {} person(s), {} tracked, primary P{}, accuracy {:.1}%",
            record.frame,
            now,
            persons.len(),
            self.tracker.len(),
            primary.person_id,
            accuracy
        );

        self.finish_timing(started);

        FrameAnalysis {
            persons,
            joint_angles,
            accuracy,
        }
    }

    fn finish_timing(&self, started: Instant) {
        self.metrics.set_timing(
            &self.metrics.frame_time_us,
            started.elapsed().as_micros() as u64,
        );
    }

    pub fn current_feedback(&self, timestamp_ms: f64) -> Vec<FeedbackItem> {
        self.feedback.active(self.seconds_since_start(timestamp_ms))
    }

    pub fn summary(&self) -> SessionSummary {
        self.recorder.summary(self.feedback.active(self.last_seconds))
    }

    pub fn records(&self) -> &[FrameRecord] {
        self.recorder.records()
    }

    pub fn person_count(&self) -> usize {
        self.engine.len()
    }

    pub fn person_metrics(&self, person_id: u32) -> Option<&PersonMetrics> {
        self.engine.get(person_id).map(|track| &track.metrics)
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Entry point for embedding the analysis in a capture loop or service.
pub struct PoseAnalyzer {
    pub config: Config,
    session: Option<AnalysisSession>,
    metrics: PipelineMetrics,
}

impl PoseAnalyzer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: None,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Begin a fresh session. Any previous session state is discarded.
    pub fn start_session(&mut self, timestamp_ms: f64) {
        self.session = Some(AnalysisSession::new(
            &self.config,
            timestamp_ms,
            self.metrics.clone(),
        ));
        info!("▶️  Analysis session started");
    }

    /// Freeze the session. Later frames are ignored; summary and export
    /// remain available.
    pub fn stop_session(&mut self) -> SessionSummary {
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
        let summary = self.summary();
        info!(
            "⏹️  Analysis session stopped: {} frames, {:.1}% mean accuracy",
            summary.frame_count, summary.accuracy
        );
        summary
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    pub fn process_frame(
        &mut self,
        poses: &[LandmarkSet],
        dims: FrameDimensions,
        timestamp_ms: f64,
    ) -> FrameAnalysis {
        match self.session.as_mut() {
            Some(session) => session.process_frame(poses, dims, timestamp_ms),
            None => FrameAnalysis::default(),
        }
    }

    pub fn current_feedback(&self, timestamp_ms: f64) -> Vec<FeedbackItem> {
        self.session
            .as_ref()
            .map(|s| s.current_feedback(timestamp_ms))
            .unwrap_or_default()
    }

    pub fn summary(&self) -> SessionSummary {
        self.session
            .as_ref()
            .map(|s| s.summary())
            .unwrap_or_else(SessionSummary::empty)
    }

    pub fn records(&self) -> &[FrameRecord] {
        self.session.as_ref().map(|s| s.records()).unwrap_or(&[])
    }

    pub fn session(&self) -> Option<&AnalysisSession> {
        self.session.as_ref()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn export<W: Write>(&self, format: ExportFormat, writer: W) -> Result<()> {
        export::write_records(self.records(), format, writer)
    }

    pub fn export_to_dir<P: AsRef<Path>>(&self, dir: P, format: ExportFormat) -> Result<PathBuf> {
        export::export_to_dir(self.records(), dir, format)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, LandmarkIndex};
    use crate::pipeline::recorder::SessionStatus;
    use crate::types::TrackerConfig;

    const DIMS: FrameDimensions = FrameDimensions {
        width: 1000,
        height: 1000,
    };

    /// Upright person with both knees bent to `knee_angle` degrees
    fn standing(offset_x: f64, knee_angle: f64) -> LandmarkSet {
        use LandmarkIndex::*;
        let mut lm = vec![Landmark::new(0.5 + offset_x, 0.1, 0.9); LandmarkIndex::COUNT];
        let mut put = |idx: LandmarkIndex, x: f64, y: f64| {
            lm[idx as usize] = Landmark::new(x + offset_x, y, 0.9);
        };

        put(Nose, 0.5, 0.1);
        put(LeftShoulder, 0.45, 0.25);
        put(RightShoulder, 0.55, 0.25);
        put(LeftElbow, 0.44, 0.4);
        put(RightElbow, 0.56, 0.4);
        put(LeftWrist, 0.44, 0.55);
        put(RightWrist, 0.56, 0.55);
        put(LeftHip, 0.46, 0.55);
        put(RightHip, 0.54, 0.55);
        put(LeftKnee, 0.46, 0.75);
        put(RightKnee, 0.54, 0.75);

        let (sin, cos) = (180.0 - knee_angle).to_radians().sin_cos();
        put(LeftAnkle, 0.46 - 0.2 * sin, 0.75 + 0.2 * cos);
        put(RightAnkle, 0.54 + 0.2 * sin, 0.75 + 0.2 * cos);

        LandmarkSet::new(lm)
    }

    fn analyzer() -> PoseAnalyzer {
        let mut analyzer = PoseAnalyzer::new(Config::default());
        analyzer.start_session(0.0);
        analyzer
    }

    #[test]
    fn test_extended_knees_feedback() {
        let mut analyzer = analyzer();
        let result = analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);

        assert!((result.joint_angles["left_knee"] - 170.0).abs() < 1e-6);
        assert!((result.joint_angles["right_knee"] - 170.0).abs() < 1e-6);

        let messages: Vec<String> = analyzer
            .current_feedback(0.0)
            .into_iter()
            .map(|f| f.message)
            .collect();
        assert!(messages.contains(&"Left knee is well extended. Good form!".to_string()));
        assert!(messages.contains(&"Right knee is well extended. Good form!".to_string()));
        assert!(messages.contains(&"Good shoulder alignment. Keep it up!".to_string()));
        assert!(messages.contains(&"Excellent hip alignment. Well done!".to_string()));
        assert!(!messages.iter().any(|m| m.contains("deeply bent")));
    }

    #[test]
    fn test_extended_knees_feedback_with_rotated_shoulders() {
        let mut analyzer = analyzer();
        // Lower shoulder visibility pushes it back: depth gap 0.4
        let mut pose = standing(0.0, 170.0);
        pose.landmarks[LandmarkIndex::LeftShoulder as usize].visibility = 0.5;
        analyzer.process_frame(&[pose], DIMS, 0.0);

        let messages: Vec<String> = analyzer
            .current_feedback(0.0)
            .into_iter()
            .map(|f| f.message)
            .collect();
        assert_eq!(messages.len(), 10);
        assert_eq!(analyzer.metrics().summary().feedback_issued, 13);
        assert!(messages.contains(&"Left knee is well extended. Good form!".to_string()));
        assert!(messages.contains(&"Right knee is well extended. Good form!".to_string()));
    }

    #[test]
    fn test_balance_and_fatigue_over_two_frames() {
        let mut analyzer = analyzer();
        // Ankle center placed exactly on the hip center
        let mut pose = standing(0.0, 170.0);
        pose.landmarks[LandmarkIndex::LeftAnkle as usize] =
            pose.landmarks[LandmarkIndex::LeftHip as usize];
        pose.landmarks[LandmarkIndex::RightAnkle as usize] =
            pose.landmarks[LandmarkIndex::RightHip as usize];

        let first = analyzer.process_frame(&[pose.clone()], DIMS, 0.0);
        let first = &first.persons[0].metrics;
        assert_eq!(first.balance, Some(1.0));
        assert!(first.movement_speed.is_none());
        assert!(first.fatigue.is_none());

        let second = analyzer.process_frame(&[pose], DIMS, 33.0);
        let second = &second.persons[0].metrics;
        assert_eq!(second.balance, Some(1.0));
        assert!(second.fatigue.is_some());
    }

    #[test]
    fn test_frame_without_pose() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);
        let before = analyzer.current_feedback(100.0);

        let result = analyzer.process_frame(&[], DIMS, 100.0);
        assert_eq!(result.accuracy, 0.0);
        assert!(result.joint_angles.is_empty());
        assert!(result.persons.is_empty());
        assert_eq!(analyzer.records().len(), 1);
        assert_eq!(analyzer.current_feedback(100.0), before);
    }

    #[test]
    fn test_record_timestamps_relative_to_start() {
        let mut analyzer = PoseAnalyzer::new(Config::default());
        analyzer.start_session(10_000.0);
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 10_000.0);
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 12_500.0);

        let records = analyzer.records();
        assert_eq!(records[0].frame, 1);
        assert_eq!(records[0].timestamp, 0.0);
        assert_eq!(records[1].frame, 2);
        assert!((records[1].timestamp - 2.5).abs() < 1e-9);
        assert!(records[1].feedback.len() <= 5);

        let summary = analyzer.summary();
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(summary.frame_count, 2);
        assert!((summary.duration - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_two_people_keep_their_ids() {
        let mut analyzer = analyzer();
        let left = standing(-0.3, 170.0);
        let right = standing(0.3, 80.0);

        let first = analyzer.process_frame(&[left.clone(), right.clone()], DIMS, 0.0);
        let ids: Vec<u32> = first.persons.iter().map(|p| p.person_id).collect();
        assert_eq!(ids, vec![1, 2]);

        let second = analyzer.process_frame(&[right, left], DIMS, 33.0);
        let ids: Vec<u32> = second.persons.iter().map(|p| p.person_id).collect();
        assert_eq!(ids, vec![2, 1]);

        // The recorded angles belong to the first detection of each frame
        assert!((second.joint_angles["left_knee"] - 80.0).abs() < 1e-6);
        let messages: Vec<String> = analyzer
            .current_feedback(33.0)
            .into_iter()
            .map(|f| f.message)
            .collect();
        assert!(messages.contains(&"Left knee is deeply bent. Watch your form.".to_string()));
    }

    #[test]
    fn test_stop_session_freezes_state() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);
        let summary = analyzer.stop_session();
        assert_eq!(summary.frame_count, 1);
        assert!(!analyzer.is_active());

        let ignored = analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 33.0);
        assert!(ignored.persons.is_empty());
        assert_eq!(analyzer.summary().frame_count, 1);
        assert_eq!(analyzer.records().len(), 1);
    }

    #[test]
    fn test_start_session_discards_previous_state() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);
        analyzer.process_frame(&[standing(0.4, 170.0)], DIMS, 33.0);

        analyzer.start_session(1_000.0);
        assert_eq!(analyzer.summary().status, SessionStatus::NoData);
        assert!(analyzer.current_feedback(1_000.0).is_empty());

        let result = analyzer.process_frame(&[standing(0.4, 170.0)], DIMS, 1_000.0);
        assert_eq!(result.persons[0].person_id, 1);
        assert!(result.persons[0].metrics.movement_speed.is_none());
    }

    #[test]
    fn test_frames_before_start_are_ignored() {
        let mut analyzer = PoseAnalyzer::new(Config::default());
        let result = analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);
        assert_eq!(result, FrameAnalysis::default());
        assert_eq!(analyzer.summary(), SessionSummary::empty());
    }

    #[test]
    fn test_eviction_drops_person_metrics() {
        let config = Config {
            tracker: TrackerConfig {
                max_unseen_frames: Some(1),
                ..TrackerConfig::default()
            },
            ..Config::default()
        };
        let mut analyzer = PoseAnalyzer::new(config);
        analyzer.start_session(0.0);

        analyzer.process_frame(&[standing(-0.3, 170.0)], DIMS, 0.0);
        analyzer.process_frame(&[], DIMS, 33.0);
        analyzer.process_frame(&[], DIMS, 66.0);

        let session = analyzer.session().unwrap();
        assert!(session.person_metrics(1).is_none());
        assert_eq!(session.person_count(), 0);

        let metrics = analyzer.metrics().summary();
        assert_eq!(metrics.total_frames, 3);
        assert_eq!(metrics.frames_with_pose, 1);
        assert_eq!(metrics.persons_created, 1);
        assert_eq!(metrics.persons_evicted, 1);
    }

    #[test]
    fn test_export_through_analyzer() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&[standing(0.0, 170.0)], DIMS, 0.0);

        let mut buf = Vec::new();
        analyzer.export(ExportFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("frame,timestamp,accuracy,angle_left_elbow"));
    }
}
