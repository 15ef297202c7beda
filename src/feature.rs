//! Motion feature derivation between retained frames.

use nalgebra::Vector3;

use crate::landmark::{Landmarks, TORSO_LANDMARKS};

/// Frame rate assumed for all sources, in frames per second.
///
/// This is a fixed constant, never detected at runtime; the physical units of
/// all derived velocities depend on it being exact.
pub const FRAME_RATE: f32 = 30.0;

/// Conversion factor from normalized source coordinate units to centimeters.
pub const UNITS_TO_CM: f32 = 100.0;

/// Mean position of a flattened landmark vector's points.
///
/// A pure function of one flattened feature vector; the input length must be
/// a multiple of 3.
pub fn center_of_mass(flat: &[f32]) -> [f32; 3] {
    debug_assert!(flat.len() % 3 == 0 && !flat.is_empty());
    let mut sum = Vector3::zeros();
    for point in flat.chunks_exact(3) {
        sum += Vector3::new(point[0], point[1], point[2]);
    }
    (sum / (flat.len() / 3) as f32).into()
}

/// Mean of the 4 shoulder/hip joint positions, a stable body-center proxy.
pub fn torso_centroid(landmarks: &Landmarks) -> [f32; 3] {
    let mut sum = Vector3::zeros();
    for idx in TORSO_LANDMARKS {
        sum += Vector3::from(landmarks.position(idx));
    }
    (sum / TORSO_LANDMARKS.len() as f32).into()
}

/// Speed of a centroid that moved `from` → `to` over one retained-frame step,
/// in cm/s.
pub fn velocity(from: [f32; 3], to: [f32; 3]) -> f32 {
    (Vector3::from(to) - Vector3::from(from)).norm() * FRAME_RATE * UNITS_TO_CM
}

/// Pairwise motion features between two consecutive retained frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFeature {
    /// Torso centroid speed in cm/s.
    pub torso_velocity: f32,
    /// Center-of-mass speed in cm/s.
    pub com_velocity: f32,
}

impl MotionFeature {
    /// Derives the motion between `prev` and `next`, where `prev_flat` and
    /// `next_flat` are the respective flattened feature vectors.
    pub fn between(
        prev: &Landmarks,
        prev_flat: &[f32],
        next: &Landmarks,
        next_flat: &[f32],
    ) -> Self {
        Self {
            torso_velocity: velocity(torso_centroid(prev), torso_centroid(next)),
            com_velocity: velocity(center_of_mass(prev_flat), center_of_mass(next_flat)),
        }
    }

    #[inline]
    pub fn as_array(&self) -> [f32; 2] {
        [self.torso_velocity, self.com_velocity]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::landmark::{Landmark, LandmarkIdx, NUM_POSE_LANDMARKS};

    use super::*;

    fn uniform_pose(v: f32) -> Landmarks {
        let mut lms = Landmarks::new(NUM_POSE_LANDMARKS);
        for i in 0..NUM_POSE_LANDMARKS {
            lms.set(i, Landmark::new([v, v, v]));
        }
        lms
    }

    #[test]
    fn center_of_mass_is_mean_of_points() {
        let flat = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
        assert_eq!(center_of_mass(&flat), [0.5, 1.0, 1.5]);
    }

    #[test]
    fn torso_centroid_uses_shoulders_and_hips_only() {
        let mut lms = uniform_pose(0.0);
        for idx in [
            LandmarkIdx::LeftShoulder,
            LandmarkIdx::RightShoulder,
            LandmarkIdx::LeftHip,
            LandmarkIdx::RightHip,
        ] {
            lms.set(idx as usize, Landmark::new([2.0, 4.0, 6.0]));
        }
        // Moving any other joint must not affect the centroid.
        lms.set(LandmarkIdx::Nose as usize, Landmark::new([100.0, 100.0, 100.0]));
        assert_eq!(torso_centroid(&lms), [2.0, 4.0, 6.0]);
    }

    #[test]
    fn identical_frames_have_zero_velocity() {
        let a = uniform_pose(0.3);
        let b = a.clone();
        let motion = MotionFeature::between(&a, &a.flattened(), &b, &b.flattened());
        assert_eq!(motion.torso_velocity, 0.0);
        assert_eq!(motion.com_velocity, 0.0);
    }

    #[test]
    fn velocity_applies_frame_rate_and_unit_conversion() {
        // A 0.1-unit displacement per retained frame at 30 fps is 300 cm/s.
        let v = velocity([0.0, 0.0, 0.0], [0.1, 0.0, 0.0]);
        assert_relative_eq!(v, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn uniform_translation_moves_both_centroids_equally() {
        let a = uniform_pose(0.0);
        let b = uniform_pose(0.2);
        let motion = MotionFeature::between(&a, &a.flattened(), &b, &b.flattened());
        assert_relative_eq!(motion.torso_velocity, motion.com_velocity, epsilon = 1e-3);
    }
}
