// src/analysis/rep_counter.rs
//
// Repetition counting from a single key joint angle.
//
// Each exercise names a key joint and two angle thresholds. The smoothed
// angle moves the phase between UP and DOWN; a completed DOWN → UP
// transition is one repetition.

use crate::types::ExerciseType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Samples in the moving average applied to the key joint angle
pub const SMOOTHING_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepPhase {
    Up,
    Down,
    Unknown,
}

/// Which way the key angle moves when entering the DOWN phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleDirection {
    /// Joint closes on the way down (squat, push-up)
    Decreasing,
    /// Joint opens on the way down (shoulder press, curl)
    Increasing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseProfile {
    /// Joint angle key without the side prefix, e.g. "knee"
    pub key_joint: &'static str,
    pub up_threshold: f64,
    pub down_threshold: f64,
    pub direction: AngleDirection,
}

impl ExerciseProfile {
    pub fn for_exercise(exercise: ExerciseType) -> Self {
        use AngleDirection::*;
        let (key_joint, up_threshold, down_threshold, direction) = match exercise {
            ExerciseType::Squat => ("knee", 150.0, 110.0, Decreasing),
            ExerciseType::Pushup => ("elbow", 160.0, 90.0, Decreasing),
            // Thresholds are inverted here (up < down), so these two count
            // on a rising angle rather than a falling one
            ExerciseType::ShoulderPress => ("shoulder", 60.0, 120.0, Increasing),
            ExerciseType::BicepCurl => ("elbow", 60.0, 160.0, Increasing),
            ExerciseType::Lunge => ("knee", 150.0, 100.0, Decreasing),
            ExerciseType::General => ("knee", 150.0, 110.0, Decreasing),
        };
        Self {
            key_joint,
            up_threshold,
            down_threshold,
            direction,
        }
    }

    fn phase_for(&self, angle: f64) -> Option<RepPhase> {
        match self.direction {
            AngleDirection::Decreasing => {
                if angle < self.down_threshold {
                    Some(RepPhase::Down)
                } else if angle > self.up_threshold {
                    Some(RepPhase::Up)
                } else {
                    None
                }
            }
            AngleDirection::Increasing => {
                if angle > self.down_threshold {
                    Some(RepPhase::Down)
                } else if angle < self.up_threshold {
                    Some(RepPhase::Up)
                } else {
                    None
                }
            }
        }
    }

    /// Progress toward the bottom of the movement, 0 at the UP threshold
    fn depth_progress(&self, angle: f64) -> f64 {
        let range = (self.up_threshold - self.down_threshold).abs();
        if range == 0.0 {
            return 0.0;
        }
        match self.direction {
            AngleDirection::Decreasing => (self.up_threshold - angle) / range,
            AngleDirection::Increasing => (angle - self.up_threshold) / range,
        }
    }
}

/// Snapshot of a counter after an update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepState {
    pub count: u32,
    pub phase: RepPhase,
    pub confidence: f64,
    /// Smoothed key joint angle in degrees
    pub key_joint_angle: f64,
}

pub struct RepetitionCounter {
    profile: ExerciseProfile,
    history: VecDeque<f64>,
    count: u32,
    phase: RepPhase,
    confidence: f64,
    smoothed_angle: f64,
}

impl RepetitionCounter {
    pub fn new(exercise: ExerciseType) -> Self {
        Self {
            profile: ExerciseProfile::for_exercise(exercise),
            history: VecDeque::with_capacity(SMOOTHING_WINDOW + 1),
            count: 0,
            phase: RepPhase::Unknown,
            confidence: 0.0,
            smoothed_angle: 180.0,
        }
    }

    /// Feed one frame's joint angles. The left key joint is preferred,
    /// the right one is used when the left is missing.
    pub fn update(&mut self, joint_angles: &BTreeMap<String, f64>) -> RepState {
        let left = format!("left_{}", self.profile.key_joint);
        let right = format!("right_{}", self.profile.key_joint);
        let Some(angle) = joint_angles
            .get(&left)
            .or_else(|| joint_angles.get(&right))
            .copied()
        else {
            return RepState {
                confidence: 0.0,
                ..self.state()
            };
        };

        self.history.push_back(angle);
        if self.history.len() > SMOOTHING_WINDOW {
            self.history.pop_front();
        }
        self.smoothed_angle = self.history.iter().sum::<f64>() / self.history.len() as f64;

        let new_phase = self
            .profile
            .phase_for(self.smoothed_angle)
            .unwrap_or(self.phase);

        if self.phase == RepPhase::Down && new_phase == RepPhase::Up {
            self.count += 1;
            self.confidence = 0.9;
            debug!(
                "Repetition {} completed ({} at {:.1}°)",
                self.count, self.profile.key_joint, self.smoothed_angle
            );
        } else if new_phase == RepPhase::Down {
            self.confidence = self
                .profile
                .depth_progress(self.smoothed_angle)
                .clamp(0.4, 0.8);
        } else {
            self.confidence = 0.5;
        }

        self.phase = new_phase;
        self.state()
    }

    pub fn state(&self) -> RepState {
        RepState {
            count: self.count,
            phase: self.phase,
            confidence: self.confidence,
            key_joint_angle: self.smoothed_angle,
        }
    }
}
