// src/analysis/depth_estimator.rs
//
// Pseudo-3D lift of a 2-D landmark set.
//
// Depth is not measured. Low detector visibility is taken as a sign the
// point is turned away from the camera, so z grows as visibility drops.
// x/y become normalized camera rays through a pinhole model whose
// intrinsics are inferred from the first frame size seen.

use crate::landmarks::LandmarkSet;
use crate::types::{DepthConfig, FrameDimensions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Pinhole intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Square pixels, focal length equal to the frame width, principal
    /// point at the frame center
    pub fn from_dimensions(dims: FrameDimensions) -> Self {
        let width = dims.width as f64;
        let height = dims.height as f64;
        Self {
            fx: width,
            fy: width,
            cx: width / 2.0,
            cy: height / 2.0,
        }
    }
}

pub struct DepthEstimator {
    config: DepthConfig,
    intrinsics: Option<CameraIntrinsics>,
}

impl DepthEstimator {
    pub fn new(config: DepthConfig) -> Self {
        Self {
            config,
            intrinsics: None,
        }
    }

    pub fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics
    }

    /// Lift every landmark to `(ray_x, ray_y, z)`, keyed by landmark name.
    pub fn estimate(
        &mut self,
        landmarks: &LandmarkSet,
        dims: FrameDimensions,
    ) -> BTreeMap<String, Point3D> {
        let intrinsics = *self.intrinsics.get_or_insert_with(|| {
            let k = CameraIntrinsics::from_dimensions(dims);
            debug!(
                "Camera intrinsics inferred: fx={:.1} fy={:.1} cx={:.1} cy={:.1}",
                k.fx, k.fy, k.cx, k.cy
            );
            k
        });

        let mut points = BTreeMap::new();
        for (index, lm) in landmarks.iter() {
            let (u, v) = lm.to_pixel(dims);
            let fx = if intrinsics.fx != 0.0 { intrinsics.fx } else { 1.0 };
            let fy = if intrinsics.fy != 0.0 { intrinsics.fy } else { 1.0 };
            points.insert(
                index.as_str().to_string(),
                Point3D {
                    x: (u - intrinsics.cx) / fx,
                    y: (v - intrinsics.cy) / fy,
                    z: self.config.depth_scale * (1.0 - lm.visibility),
                },
            );
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    #[test]
    fn test_intrinsics_from_dimensions() {
        let k = CameraIntrinsics::from_dimensions(FrameDimensions::new(640, 480));
        assert_eq!(k.fx, 640.0);
        assert_eq!(k.fy, 640.0);
        assert_eq!(k.cx, 320.0);
        assert_eq!(k.cy, 240.0);
    }

    #[test]
    fn test_center_point_projects_to_origin() {
        let mut estimator = DepthEstimator::new(DepthConfig::default());
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0)]);
        let points = estimator.estimate(&set, FrameDimensions::new(640, 480));

        let nose = points["nose"];
        assert!(nose.x.abs() < 1e-12);
        assert!(nose.y.abs() < 1e-12);
        assert!(nose.z.abs() < 1e-12);
    }

    #[test]
    fn test_depth_grows_as_visibility_drops() {
        let config = DepthConfig { depth_scale: 2.0 };
        let mut estimator = DepthEstimator::new(config);
        let set = LandmarkSet::new(vec![
            Landmark::new(0.5, 0.5, 0.9),
            Landmark::new(0.5, 0.5, 0.25),
        ]);
        let points = estimator.estimate(&set, FrameDimensions::new(100, 100));
        assert!((points["nose"].z - 0.2).abs() < 1e-9);
        assert!((points["left_eye_inner"].z - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_ray_coordinates() {
        let mut estimator = DepthEstimator::new(DepthConfig::default());
        let set = LandmarkSet::new(vec![Landmark::new(1.0, 0.0, 1.0)]);
        let points = estimator.estimate(&set, FrameDimensions::new(640, 480));
        // u = 640, v = 0
        assert!((points["nose"].x - 0.5).abs() < 1e-12);
        assert!((points["nose"].y + 240.0 / 640.0).abs() < 1e-12);
    }

    #[test]
    fn test_intrinsics_fixed_after_first_frame() {
        let mut estimator = DepthEstimator::new(DepthConfig::default());
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0)]);
        estimator.estimate(&set, FrameDimensions::new(640, 480));
        estimator.estimate(&set, FrameDimensions::new(1920, 1080));
        assert_eq!(estimator.intrinsics().map(|k| k.fx), Some(640.0));
    }
}
