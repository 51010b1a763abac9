use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cam-from-world pose of one registered image.
///
/// `rvec` is an axis-angle rotation, `tvec` a translation, both in the
/// mapper's world units. `image_id` is assigned by the mapper, 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub image_id: u32,
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

impl CameraPose {
    pub fn new(image_id: u32, rvec: [f64; 3], tvec: [f64; 3]) -> CameraPose {
        CameraPose {
            image_id,
            rvec,
            tvec,
        }
    }

    /// Camera center in world coordinates: `-Rᵀ·t`.
    pub fn projection_center(&self) -> na::Vector3<f64> {
        let r = na::Rotation3::new(na::Vector3::from(self.rvec));
        -(r.transpose() * na::Vector3::from(self.tvec))
    }
}

/// Ordered camera trajectory.
///
/// Image ids must cover `1..=N` exactly once; anything else means the
/// reconstruction lost frames and per-index processing would misalign.
#[derive(Debug, Clone)]
pub struct Trajectory {
    poses: Vec<CameraPose>,
}

impl Trajectory {
    pub fn new(mut poses: Vec<CameraPose>) -> Result<Trajectory> {
        poses.sort_by_key(|p| p.image_id);
        for (i, pose) in poses.iter().enumerate() {
            let expected = i as u32 + 1;
            if pose.image_id != expected {
                return Err(Error::Trajectory(format!(
                    "image ids must cover 1..={} exactly once, found {} at position {}",
                    poses.len(),
                    pose.image_id,
                    i
                )));
            }
        }
        Ok(Trajectory { poses })
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[CameraPose] {
        &self.poses
    }

    /// Camera centers in image-id order.
    pub fn centers(&self) -> Vec<na::Vector3<f64>> {
        self.poses.iter().map(|p| p.projection_center()).collect()
    }
}
