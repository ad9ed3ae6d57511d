// src/analysis/metrics_engine.rs
//
// Per-person biomechanical metrics.
//
// The free functions are pure and work on a single LandmarkSet. The
// MetricsEngine keeps one PersonTrack per identity so that temporal
// metrics (movement speed, fatigue, repetitions) can be computed against
// the identity's previous observation.

use crate::analysis::depth_estimator::Point3D;
use crate::analysis::rep_counter::{RepState, RepetitionCounter};
use crate::angles::angle;
use crate::landmarks::{BoundingBox, LandmarkIndex, LandmarkSet};
use crate::types::{FrameDimensions, MetricsConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// JOINT TABLE
// ============================================================================

/// A joint angle measured at `points[1]` between `points[0]` and `points[2]`
#[derive(Debug, Clone, Copy)]
pub struct JointDefinition {
    pub name: &'static str,
    pub points: [LandmarkIndex; 3],
}

pub const JOINTS: [JointDefinition; 8] = {
    use LandmarkIndex::*;
    [
        JointDefinition {
            name: "left_elbow",
            points: [LeftShoulder, LeftElbow, LeftWrist],
        },
        JointDefinition {
            name: "right_elbow",
            points: [RightShoulder, RightElbow, RightWrist],
        },
        JointDefinition {
            name: "left_shoulder",
            points: [LeftElbow, LeftShoulder, LeftHip],
        },
        JointDefinition {
            name: "right_shoulder",
            points: [RightElbow, RightShoulder, RightHip],
        },
        JointDefinition {
            name: "left_hip",
            points: [LeftShoulder, LeftHip, LeftKnee],
        },
        JointDefinition {
            name: "right_hip",
            points: [RightShoulder, RightHip, RightKnee],
        },
        JointDefinition {
            name: "left_knee",
            points: [LeftHip, LeftKnee, LeftAnkle],
        },
        JointDefinition {
            name: "right_knee",
            points: [RightHip, RightKnee, RightAnkle],
        },
    ]
};

/// Left/right landmark pairs compared by the symmetry score
pub const SYMMETRY_PAIRS: [(LandmarkIndex, LandmarkIndex); 6] = [
    (LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder),
    (LandmarkIndex::LeftHip, LandmarkIndex::RightHip),
    (LandmarkIndex::LeftKnee, LandmarkIndex::RightKnee),
    (LandmarkIndex::LeftAnkle, LandmarkIndex::RightAnkle),
    (LandmarkIndex::LeftElbow, LandmarkIndex::RightElbow),
    (LandmarkIndex::LeftWrist, LandmarkIndex::RightWrist),
];

// ============================================================================
// PURE METRICS
// ============================================================================

/// Angles of every joint whose three landmarks are present, in pixel space
pub fn joint_angles(landmarks: &LandmarkSet, dims: FrameDimensions) -> BTreeMap<String, f64> {
    let mut angles = BTreeMap::new();
    for joint in &JOINTS {
        let [a, b, c] = joint.points;
        if let (Some(a), Some(b), Some(c)) = (landmarks.get(a), landmarks.get(b), landmarks.get(c))
        {
            angles.insert(
                joint.name.to_string(),
                angle(a.to_pixel(dims), b.to_pixel(dims), c.to_pixel(dims)),
            );
        }
    }
    angles
}

/// Percentage of landmarks whose visibility exceeds `threshold`
pub fn accuracy(landmarks: &LandmarkSet, threshold: f64) -> f64 {
    if landmarks.is_empty() {
        return 0.0;
    }
    let visible = landmarks
        .landmarks
        .iter()
        .filter(|lm| lm.is_visible(threshold))
        .count();
    visible as f64 / landmarks.len() as f64 * 100.0
}

/// Mean mirrored agreement of the left/right pairs present; 0 without pairs
pub fn symmetry(landmarks: &LandmarkSet) -> f64 {
    let scores: Vec<f64> = SYMMETRY_PAIRS
        .iter()
        .filter_map(|(l, r)| {
            let (left, right) = (landmarks.get(*l)?, landmarks.get(*r)?);
            let diff = (left.x - (1.0 - right.x)).abs() + (left.y - right.y).abs();
            Some(1.0 - diff / 2.0)
        })
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// `max(0, 1 - sensitivity * |hip_center - ankle_center|)`, absent without hips or ankles
pub fn balance(landmarks: &LandmarkSet, sensitivity: f64) -> Option<f64> {
    let hip = landmarks.midpoint(LandmarkIndex::LeftHip, LandmarkIndex::RightHip)?;
    let ankle = landmarks.midpoint(LandmarkIndex::LeftAnkle, LandmarkIndex::RightAnkle)?;
    let distance = ((hip.0 - ankle.0).powi(2) + (hip.1 - ankle.1).powi(2)).sqrt();
    Some((1.0 - sensitivity * distance).max(0.0))
}

/// Muscle activation proxies. `core` is the deviation of torso flexion
/// from a neutral 90°, measured in pixel space so it agrees with the
/// reported `left_hip` angle.
pub fn muscle_activation(
    landmarks: &LandmarkSet,
    dims: FrameDimensions,
) -> BTreeMap<String, f64> {
    let mut activation = BTreeMap::new();
    let torso = (
        landmarks.get(LandmarkIndex::LeftShoulder),
        landmarks.get(LandmarkIndex::LeftHip),
        landmarks.get(LandmarkIndex::LeftKnee),
    );
    if let (Some(shoulder), Some(hip), Some(knee)) = torso {
        let torso_angle = angle(
            shoulder.to_pixel(dims),
            hip.to_pixel(dims),
            knee.to_pixel(dims),
        );
        activation.insert(
            "core".to_string(),
            ((90.0 - torso_angle).abs() / 45.0).min(1.0),
        );
    }
    activation
}

/// Mean normalized displacement over the landmarks both sets contain
pub fn movement_speed(previous: &LandmarkSet, current: &LandmarkSet) -> Option<f64> {
    let common = previous.len().min(current.len());
    if common == 0 {
        return None;
    }
    let total: f64 = previous
        .landmarks
        .iter()
        .zip(current.landmarks.iter())
        .map(|(p, c)| p.distance(c))
        .sum();
    Some(total / common as f64)
}

/// Slow movement and high activation both push fatigue up
pub fn fatigue(speed: f64, activation: &BTreeMap<String, f64>) -> f64 {
    let speed_factor = 1.0 - (speed * 10.0).min(1.0);
    let activation_factor = if activation.is_empty() {
        0.0
    } else {
        activation.values().sum::<f64>() / activation.len() as f64
    };
    (speed_factor + activation_factor) / 2.0
}

// ============================================================================
// PER-PERSON STATE
// ============================================================================

/// Latest derived metrics of one person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMetrics {
    pub person_id: u32,
    pub joint_angles: BTreeMap<String, f64>,
    pub accuracy: f64,
    pub symmetry: f64,
    pub balance: Option<f64>,
    pub muscle_activation: BTreeMap<String, f64>,
    pub movement_speed: Option<f64>,
    pub fatigue: Option<f64>,
    pub pose_3d: BTreeMap<String, Point3D>,
    pub repetitions: RepState,
}

pub struct PersonTrack {
    pub person_id: u32,
    pub last_bbox: BoundingBox,
    pub last_landmarks: LandmarkSet,
    pub last_seen_frame: u64,
    pub metrics: PersonMetrics,
    rep_counter: RepetitionCounter,
}

/// Everything the engine needs about one person in one frame
pub struct Observation<'a> {
    pub person_id: u32,
    pub landmarks: &'a LandmarkSet,
    pub bbox: BoundingBox,
    pub pose_3d: BTreeMap<String, Point3D>,
    pub frame_index: u64,
}

pub struct MetricsEngine {
    pub config: MetricsConfig,
    tracks: BTreeMap<u32, PersonTrack>,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
        }
    }

    /// Recompute and store the metrics of one person for the current frame.
    pub fn observe(&mut self, obs: Observation<'_>, dims: FrameDimensions) -> &PersonMetrics {
        let angles = joint_angles(obs.landmarks, dims);
        let activation = muscle_activation(obs.landmarks, dims);

        let speed = self
            .tracks
            .get(&obs.person_id)
            .and_then(|track| movement_speed(&track.last_landmarks, obs.landmarks));
        let fatigue_score = speed.map(|s| fatigue(s, &activation));

        let exercise = self.config.exercise;
        let track = self.tracks.entry(obs.person_id).or_insert_with(|| {
            debug!("Metrics state created for person P{}", obs.person_id);
            PersonTrack {
                person_id: obs.person_id,
                last_bbox: obs.bbox,
                last_landmarks: LandmarkSet::default(),
                last_seen_frame: obs.frame_index,
                metrics: PersonMetrics {
                    person_id: obs.person_id,
                    joint_angles: BTreeMap::new(),
                    accuracy: 0.0,
                    symmetry: 0.0,
                    balance: None,
                    muscle_activation: BTreeMap::new(),
                    movement_speed: None,
                    fatigue: None,
                    pose_3d: BTreeMap::new(),
                    repetitions: RepetitionCounter::new(exercise).state(),
                },
                rep_counter: RepetitionCounter::new(exercise),
            }
        });

        let repetitions = track.rep_counter.update(&angles);

        track.metrics = PersonMetrics {
            person_id: obs.person_id,
            accuracy: accuracy(obs.landmarks, self.config.visibility_threshold),
            symmetry: symmetry(obs.landmarks),
            balance: balance(obs.landmarks, self.config.balance_sensitivity),
            joint_angles: angles,
            muscle_activation: activation,
            movement_speed: speed,
            fatigue: fatigue_score,
            pose_3d: obs.pose_3d,
            repetitions,
        };
        track.last_bbox = obs.bbox;
        track.last_landmarks = obs.landmarks.clone();
        track.last_seen_frame = obs.frame_index;

        &track.metrics
    }

    pub fn get(&self, person_id: u32) -> Option<&PersonTrack> {
        self.tracks.get(&person_id)
    }

    pub fn remove(&mut self, person_id: u32) -> Option<PersonTrack> {
        self.tracks.remove(&person_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::landmarks::Landmark;
    use proptest::prelude::*;

    /// Left side at x = 0.4, right side pushed `offset` past its mirror
    fn mirrored(offset: f64) -> LandmarkSet {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.9); LandmarkIndex::COUNT];
        for (i, (l, r)) in SYMMETRY_PAIRS.iter().enumerate() {
            let y = 0.2 + i as f64 * 0.1;
            landmarks[*l as usize] = Landmark::new(0.4, y, 0.9);
            landmarks[*r as usize] = Landmark::new(0.6 + offset, y, 0.9);
        }
        LandmarkSet::new(landmarks)
    }

    proptest! {
        #[test]
        fn prop_symmetry_decreases_with_distance(
            near in 0.0f64..0.3,
            step in 0.001f64..0.3
        ) {
            let closer = symmetry(&mirrored(near));
            let farther = symmetry(&mirrored(near + step));
            prop_assert!(farther < closer, "{} !< {}", farther, closer);
        }

        #[test]
        fn prop_symmetry_in_unit_range(offset in 0.0f64..0.4) {
            let score = symmetry(&mirrored(offset));
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
