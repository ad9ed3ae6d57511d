// src/feedback.rs
//
// Posture feedback.
//
// Rules are an ordered table of (predicate, message) pairs evaluated once
// per frame against a single person. Messages that fire are merged into a
// short-lived feed: items expire after `expiry_seconds`, a message already
// in the feed is not repeated, and the feed is capped to the most recent
// `max_items`.

use crate::analysis::metrics_engine::PersonMetrics;
use crate::landmarks::{LandmarkIndex, LandmarkSet};
use crate::types::FeedbackConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub message: String,
    /// Seconds, on the same clock as the `now` passed to the aggregator
    pub timestamp: f64,
}

/// Inputs the rules may look at for one person in one frame
pub struct FeedbackContext<'a> {
    pub person_id: u32,
    pub joint_angles: &'a BTreeMap<String, f64>,
    pub landmarks: &'a LandmarkSet,
    pub metrics: &'a PersonMetrics,
    pub depth_scale: f64,
}

impl FeedbackContext<'_> {
    fn angle(&self, joint: &str) -> Option<f64> {
        self.joint_angles.get(joint).copied()
    }

    fn angle_diff(&self, left: &str, right: &str) -> Option<f64> {
        Some((self.angle(left)? - self.angle(right)?).abs())
    }

    fn x(&self, index: LandmarkIndex) -> Option<f64> {
        self.landmarks.get(index).map(|lm| lm.x)
    }

    fn mid_x(&self, a: LandmarkIndex, b: LandmarkIndex) -> Option<f64> {
        self.landmarks.midpoint(a, b).map(|(x, _)| x)
    }

    /// Horizontal offset between left shoulder and left hip
    fn back_offset(&self) -> Option<f64> {
        self.landmarks.get(LandmarkIndex::LeftAnkle)?;
        Some((self.x(LandmarkIndex::LeftShoulder)? - self.x(LandmarkIndex::LeftHip)?).abs())
    }

    /// Horizontal offset between nose and shoulder midpoint
    fn neck_offset(&self) -> Option<f64> {
        let mid = self.mid_x(LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder)?;
        Some((self.x(LandmarkIndex::Nose)? - mid).abs())
    }

    /// Horizontal offset between ankle midpoint and hip midpoint
    fn stance_offset(&self) -> Option<f64> {
        let ankles = self.mid_x(LandmarkIndex::LeftAnkle, LandmarkIndex::RightAnkle)?;
        let hips = self.mid_x(LandmarkIndex::LeftHip, LandmarkIndex::RightHip)?;
        Some((ankles - hips).abs())
    }

    /// Pseudo-depth gap between the shoulders
    fn shoulder_depth_gap(&self) -> Option<f64> {
        let left = self.metrics.pose_3d.get(LandmarkIndex::LeftShoulder.as_str())?;
        let right = self.metrics.pose_3d.get(LandmarkIndex::RightShoulder.as_str())?;
        Some((left.z - right.z).abs())
    }

    fn core(&self) -> Option<f64> {
        self.metrics.muscle_activation.get("core").copied()
    }
}

pub struct FeedbackRule {
    pub predicate: fn(&FeedbackContext<'_>) -> bool,
    pub message: &'static str,
}

// ============================================================================
// RULE TABLE
// ============================================================================

fn between(value: Option<f64>, low: f64, high: f64) -> bool {
    value.is_some_and(|v| v > low && v < high)
}

pub static RULES: &[FeedbackRule] = &[
    // Left/right level
    FeedbackRule {
        predicate: |c| c.angle_diff("left_shoulder", "right_shoulder").is_some_and(|d| d > 15.0),
        message: "Shoulders are not level. Try to balance your posture.",
    },
    FeedbackRule {
        predicate: |c| c.angle_diff("left_shoulder", "right_shoulder").is_some_and(|d| d < 5.0),
        message: "Good shoulder alignment. Keep it up!",
    },
    FeedbackRule {
        predicate: |c| c.angle_diff("left_hip", "right_hip").is_some_and(|d| d > 15.0),
        message: "Hips are not level. Check your stance.",
    },
    FeedbackRule {
        predicate: |c| c.angle_diff("left_hip", "right_hip").is_some_and(|d| d < 5.0),
        message: "Excellent hip alignment. Well done!",
    },
    // Knees
    FeedbackRule {
        predicate: |c| between(c.angle("left_knee"), 30.0, 90.0),
        message: "Left knee is deeply bent. Watch your form.",
    },
    FeedbackRule {
        predicate: |c| c.angle("left_knee").is_some_and(|a| (90.0..150.0).contains(&a)),
        message: "Left knee is slightly bent. Adjust based on your exercise.",
    },
    FeedbackRule {
        predicate: |c| c.angle("left_knee").is_some_and(|a| a >= 150.0),
        message: "Left knee is well extended. Good form!",
    },
    FeedbackRule {
        predicate: |c| between(c.angle("right_knee"), 30.0, 90.0),
        message: "Right knee is deeply bent. Watch your form.",
    },
    FeedbackRule {
        predicate: |c| c.angle("right_knee").is_some_and(|a| (90.0..150.0).contains(&a)),
        message: "Right knee is slightly bent. Adjust based on your exercise.",
    },
    FeedbackRule {
        predicate: |c| c.angle("right_knee").is_some_and(|a| a >= 150.0),
        message: "Right knee is well extended. Good form!",
    },
    // Elbows
    FeedbackRule {
        predicate: |c| c.angle("left_elbow").is_some_and(|a| a < 90.0),
        message: "Left elbow is tightly bent. Ensure this is intended for your exercise.",
    },
    FeedbackRule {
        predicate: |c| c.angle("left_elbow").is_some_and(|a| a > 160.0),
        message: "Left arm is well extended. Good control!",
    },
    FeedbackRule {
        predicate: |c| c.angle("right_elbow").is_some_and(|a| a < 90.0),
        message: "Right elbow is tightly bent. Ensure this is intended for your exercise.",
    },
    FeedbackRule {
        predicate: |c| c.angle("right_elbow").is_some_and(|a| a > 160.0),
        message: "Right arm is well extended. Good control!",
    },
    // Alignment from raw landmark positions
    FeedbackRule {
        predicate: |c| c.back_offset().is_some_and(|d| d > 0.1),
        message: "Back is not straight. Try to maintain a neutral spine position.",
    },
    FeedbackRule {
        predicate: |c| c.back_offset().is_some_and(|d| d < 0.05),
        message: "Excellent back alignment. Maintaining good posture!",
    },
    FeedbackRule {
        predicate: |c| c.neck_offset().is_some_and(|d| d > 0.1),
        message: "Head is not aligned with your shoulders. Check your neck position.",
    },
    FeedbackRule {
        predicate: |c| c.neck_offset().is_some_and(|d| d < 0.05),
        message: "Good head and neck alignment. Keep it up!",
    },
    FeedbackRule {
        predicate: |c| c.stance_offset().is_some_and(|d| d > 0.15),
        message: "Your weight seems unbalanced. Try to center your weight.",
    },
    FeedbackRule {
        predicate: |c| c.stance_offset().is_some_and(|d| d < 0.05),
        message: "Good balance. Weight is well distributed.",
    },
    // Derived metrics
    FeedbackRule {
        predicate: |c| c.metrics.symmetry > 0.0 && c.metrics.symmetry < 0.8,
        message: "Your posture is asymmetrical. Try to balance your left and right sides.",
    },
    FeedbackRule {
        predicate: |c| c.metrics.symmetry > 0.95,
        message: "Excellent body symmetry!",
    },
    FeedbackRule {
        predicate: |c| c.metrics.balance.is_some_and(|b| b < 0.5),
        message: "Balance is unstable. Keep your hips centered over your ankles.",
    },
    FeedbackRule {
        predicate: |c| c.metrics.balance.is_some_and(|b| b > 0.9),
        message: "Great balance and stability!",
    },
    FeedbackRule {
        predicate: |c| c.metrics.fatigue.is_some_and(|f| f > 0.7),
        message: "Signs of fatigue detected. Consider taking a short rest.",
    },
    FeedbackRule {
        predicate: |c| c.metrics.movement_speed.is_some_and(|s| s > 0.05),
        message: "Movement is fast. Slow down for better control.",
    },
    FeedbackRule {
        predicate: |c| c.shoulder_depth_gap().is_some_and(|g| g > 0.3 * c.depth_scale),
        message: "Body is rotated away from the camera. Face the camera squarely.",
    },
    FeedbackRule {
        predicate: |c| c.core().is_some_and(|a| a > 0.8),
        message: "Core is highly engaged. Maintain controlled breathing.",
    },
    FeedbackRule {
        predicate: |c| c.core().is_some_and(|a| a < 0.2),
        message: "Engage your core muscles for better stability.",
    },
];

/// Messages of every rule that fires, in table order
pub fn evaluate(ctx: &FeedbackContext<'_>) -> Vec<&'static str> {
    RULES
        .iter()
        .filter(|rule| (rule.predicate)(ctx))
        .map(|rule| rule.message)
        .collect()
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct FeedbackAggregator {
    pub config: FeedbackConfig,
    items: Vec<FeedbackItem>,
}

impl FeedbackAggregator {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
        }
    }

    fn is_fresh(&self, item: &FeedbackItem, now: f64) -> bool {
        now - item.timestamp < self.config.expiry_seconds
    }

    /// Merge one frame's messages into the feed. Returns how many were added.
    pub fn update<S: AsRef<str>>(&mut self, messages: &[S], now: f64) -> usize {
        let expiry = self.config.expiry_seconds;
        self.items.retain(|item| now - item.timestamp < expiry);

        let mut added = 0;
        for message in messages {
            let message = message.as_ref();
            if self.items.iter().any(|item| item.message == message) {
                continue;
            }
            self.items.push(FeedbackItem {
                message: message.to_string(),
                timestamp: now,
            });
            added += 1;
        }

        if self.items.len() > self.config.max_items {
            self.truncate_to_newest();
        }

        if added > 0 {
            debug!("{} feedback item(s) added, {} active", added, self.items.len());
        }
        added
    }

    /// Keep the `max_items` newest items. Within one timestamp the earliest
    /// inserted win, so a busy frame keeps its first-listed rules.
    fn truncate_to_newest(&mut self) {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        // Stable: equal timestamps stay in insertion order
        order.sort_by(|&a, &b| {
            self.items[b]
                .timestamp
                .partial_cmp(&self.items[a].timestamp)
                .unwrap_or(Ordering::Equal)
        });
        let keep: BTreeSet<usize> = order.into_iter().take(self.config.max_items).collect();

        let mut index = 0;
        self.items.retain(|_| {
            let kept = keep.contains(&index);
            index += 1;
            kept
        });
    }

    /// Items younger than the expiry window at `now`
    pub fn active(&self, now: f64) -> Vec<FeedbackItem> {
        self.items
            .iter()
            .filter(|item| self.is_fresh(item, now))
            .cloned()
            .collect()
    }

    /// The `n` most recent active items, oldest first
    pub fn last_n(&self, now: f64, n: usize) -> Vec<FeedbackItem> {
        let active = self.active(now);
        let skip = active.len().saturating_sub(n);
        active.into_iter().skip(skip).collect()
    }

}

// ============================================================================
// TESTS
// ============================================================================
