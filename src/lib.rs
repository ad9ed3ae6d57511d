// src/lib.rs

pub mod analysis;
pub mod angles;
pub mod config;
pub mod export;
pub mod feedback;
pub mod landmarks;
pub mod pipeline;
pub mod recording;
pub mod types;

pub use export::ExportFormat;
pub use landmarks::{BoundingBox, Landmark, LandmarkIndex, LandmarkSet};
pub use pipeline::{PoseAnalyzer, SessionSummary};
pub use types::{Config, FrameDimensions};
