use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub depth: DepthConfig,
    pub metrics: MetricsConfig,
    pub feedback: FeedbackConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU for a detection to keep an existing identity
    pub iou_threshold: f64,
    /// Evict identities unseen for more than this many processed frames.
    /// `None` retains every identity for the whole session.
    pub max_unseen_frames: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            max_unseen_frames: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    pub depth_scale: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self { depth_scale: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Landmarks above this visibility count towards accuracy
    pub visibility_threshold: f64,
    /// Scale applied to the hip/ankle center distance in the balance score
    pub balance_sensitivity: f64,
    pub exercise: ExerciseType,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            balance_sensitivity: 5.0,
            exercise: ExerciseType::General,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub expiry_seconds: f64,
    pub max_items: usize,
    /// Active items copied into each frame record
    pub snapshot_size: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: 5.0,
            max_items: 10,
            snapshot_size: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub export_format: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
            output_dir: "output".to_string(),
            export_format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Exercise being performed; selects the joint and thresholds used for
/// repetition counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Pushup,
    ShoulderPress,
    BicepCurl,
    Lunge,
    #[default]
    General,
}

/// Source frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
