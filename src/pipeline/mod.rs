// src/pipeline/mod.rs

pub mod metrics;
pub mod recorder;
pub mod session;

pub use metrics::{MetricsSummary, PipelineMetrics};
pub use recorder::{FrameRecord, SessionRecorder, SessionStatus, SessionSummary};
pub use session::{AnalysisSession, FrameAnalysis, PersonFrameMetrics, PoseAnalyzer};
