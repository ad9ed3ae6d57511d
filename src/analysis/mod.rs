// src/analysis/mod.rs
//
// Per-person analysis modules.
//
// Signal flow:
//   LandmarkSet → bounding box → identity_tracker ─┐
//   LandmarkSet → depth_estimator ─────────────────┼→ metrics_engine → PersonMetrics
//   joint angles → rep_counter ────────────────────┘
//
// Orchestrated by pipeline::session::AnalysisSession.

pub mod depth_estimator;
pub mod identity_tracker;
pub mod metrics_engine;
pub mod rep_counter;

pub use depth_estimator::{CameraIntrinsics, DepthEstimator, Point3D};
pub use identity_tracker::{Identity, IdentityAssignment, IdentityTracker};
pub use metrics_engine::{MetricsEngine, Observation, PersonMetrics, PersonTrack};
pub use rep_counter::{RepPhase, RepState, RepetitionCounter};
