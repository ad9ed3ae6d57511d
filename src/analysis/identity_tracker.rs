// src/analysis/identity_tracker.rs
//
// IoU-based identity assignment for people in a pose stream.
//
// Every detected body gets a person id that stays stable while its
// bounding box keeps overlapping the box it had in the previous
// observation. Ids start at 1, increase monotonically and are never
// reused within a session.
//
// Matching is a global greedy assignment: the full track x detection IoU
// matrix is built, pairs below the threshold are discarded and the rest
// are claimed in descending IoU order, each track and each detection at
// most once.

use crate::landmarks::BoundingBox;
use crate::types::TrackerConfig;
use std::collections::BTreeMap;
use tracing::{debug, info};

// ============================================================================
// TYPES
// ============================================================================

/// Last known state of one identity
#[derive(Debug, Clone)]
pub struct Identity {
    pub person_id: u32,
    pub last_bbox: BoundingBox,
    pub last_seen_frame: u64,
}

/// Result of assigning one frame's detections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityAssignment {
    /// One person id per input box, in input order
    pub ids: Vec<u32>,
    /// Identities first seen in this update
    pub created: Vec<u32>,
    /// Identities dropped by the retention policy during this update
    pub evicted: Vec<u32>,
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct IdentityTracker {
    pub config: TrackerConfig,
    identities: BTreeMap<u32, Identity>,
    next_id: u32,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            identities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Resolve a person id for every bounding box observed in `frame_index`.
    pub fn update(&mut self, boxes: &[BoundingBox], frame_index: u64) -> IdentityAssignment {
        let tracked: Vec<(u32, BoundingBox)> = self
            .identities
            .values()
            .map(|identity| (identity.person_id, identity.last_bbox))
            .collect();

        let mut matched_tracks: Vec<bool> = vec![false; tracked.len()];
        let mut assigned: Vec<Option<u32>> = vec![None; boxes.len()];

        let mut iou_pairs: Vec<(usize, usize, f64)> = Vec::new();
        for (ti, (_, track_box)) in tracked.iter().enumerate() {
            for (di, det_box) in boxes.iter().enumerate() {
                let score = track_box.iou(det_box);
                if score >= self.config.iou_threshold {
                    iou_pairs.push((ti, di, score));
                }
            }
        }
        // Stable sort: equal scores keep track-then-detection order
        iou_pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        for (ti, di, score) in &iou_pairs {
            if matched_tracks[*ti] || assigned[*di].is_some() {
                continue;
            }
            matched_tracks[*ti] = true;
            let person_id = tracked[*ti].0;
            assigned[*di] = Some(person_id);
            debug!("Person {} matched (IoU {:.2})", person_id, score);
        }

        let mut ids = Vec::with_capacity(boxes.len());
        let mut created = Vec::new();
        for (di, det_box) in boxes.iter().enumerate() {
            let person_id = match assigned[di] {
                Some(id) => id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    info!(
                        "🆕 New person P{} at bbox=[{:.0},{:.0},{:.0}x{:.0}]",
                        id, det_box.x, det_box.y, det_box.width, det_box.height
                    );
                    created.push(id);
                    id
                }
            };

            self.identities.insert(
                person_id,
                Identity {
                    person_id,
                    last_bbox: *det_box,
                    last_seen_frame: frame_index,
                },
            );
            ids.push(person_id);
        }

        let evicted = self.evict_stale(frame_index);

        IdentityAssignment {
            ids,
            created,
            evicted,
        }
    }

    fn evict_stale(&mut self, frame_index: u64) -> Vec<u32> {
        let Some(max_unseen) = self.config.max_unseen_frames else {
            return Vec::new();
        };

        let stale: Vec<u32> = self
            .identities
            .values()
            .filter(|identity| frame_index.saturating_sub(identity.last_seen_frame) > max_unseen)
            .map(|identity| identity.person_id)
            .collect();

        for person_id in &stale {
            self.identities.remove(person_id);
            info!(
                "🗑️  Person P{} evicted (unseen for more than {} frames)",
                person_id, max_unseen
            );
        }

        stale
    }

    pub fn get(&self, person_id: u32) -> Option<&Identity> {
        self.identities.get(&person_id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
