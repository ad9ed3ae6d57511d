// src/pipeline/metrics.rs
//
// Processing counters for the analysis pipeline. Logged at the end of
// each recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_pose: Arc<AtomicU64>,
    pub persons_created: Arc<AtomicU64>,
    pub persons_evicted: Arc<AtomicU64>,
    pub feedback_issued: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_pose: Arc::new(AtomicU64::new(0)),
            persons_created: Arc::new(AtomicU64::new(0)),
            persons_evicted: Arc::new(AtomicU64::new(0)),
            feedback_issued: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            frames_with_pose: self.frames_with_pose.load(Ordering::Relaxed),
            fps: self.fps(),
            persons_created: self.persons_created.load(Ordering::Relaxed),
            persons_evicted: self.persons_evicted.load(Ordering::Relaxed),
            feedback_issued: self.feedback_issued.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub frames_with_pose: u64,
    pub fps: f64,
    pub persons_created: u64,
    pub persons_evicted: u64,
    pub feedback_issued: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
