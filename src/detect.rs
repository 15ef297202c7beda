//! Person detection and identity assignment.
//!
//! Detection is optional in this harness: buffers can be built from whole
//! frames, or gated on a person detector that crops the frame before pose
//! extraction. A frame with zero detections never reuses state from an
//! earlier frame; it simply yields nothing.

use anyhow::Result;
use image::imageops;
use image::RgbImage;
use nalgebra::Vector2;

/// Margin added around a detected person before pose extraction, in pixels.
const CROP_MARGIN: u32 = 30;

/// Maximum rect-center distance at which two detections count as the same
/// person.
const SAME_PERSON_DISTANCE: f32 = 60.0;

/// An axis-aligned person bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl PersonBox {
    pub fn center(&self) -> [f32; 2] {
        [
            self.left as f32 + self.width as f32 / 2.0,
            self.top as f32 + self.height as f32 / 2.0,
        ]
    }
}

/// Detects people in a frame.
///
/// An empty result is a normal outcome (nobody in view), not an error.
pub trait PersonDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<PersonBox>>;
}

/// The detection with the highest confidence, if any.
pub fn most_confident(people: &[PersonBox]) -> Option<PersonBox> {
    people
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .copied()
}

/// Crops `image` to `person` plus [`CROP_MARGIN`], clamped to the image
/// bounds.
pub fn crop_person(image: &RgbImage, person: &PersonBox) -> RgbImage {
    let left = person.left.saturating_sub(CROP_MARGIN);
    let top = person.top.saturating_sub(CROP_MARGIN);
    let right = (person.left + person.width + CROP_MARGIN).min(image.width());
    let bottom = (person.top + person.height + CROP_MARGIN).min(image.height());
    imageops::crop_imm(image, left, top, right - left, bottom - top).to_image()
}

/// Assigns stable ids to detections across frames by nearest rect center.
///
/// Identity assignment requires a detection: a frame with zero detections
/// produces no assignment and leaves the tracker untouched.
pub struct PersonTracker {
    centers: Vec<[f32; 2]>,
}

impl PersonTracker {
    pub fn new() -> Self {
        Self {
            centers: Vec::new(),
        }
    }

    /// Returns the id of the tracked person nearest to `person`, updating
    /// that person's known center, or allocates a fresh id if no tracked
    /// center is within range.
    pub fn assign(&mut self, person: &PersonBox) -> usize {
        let center = person.center();
        for (id, known) in self.centers.iter_mut().enumerate() {
            let dist = (Vector2::from(center) - Vector2::from(*known)).norm();
            if dist < SAME_PERSON_DISTANCE {
                *known = center;
                return id;
            }
        }
        self.centers.push(center);
        self.centers.len() - 1
    }

    /// Number of distinct people seen so far.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

impl Default for PersonTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(left: u32, top: u32) -> PersonBox {
        PersonBox {
            left,
            top,
            width: 100,
            height: 200,
            confidence: 0.9,
        }
    }

    #[test]
    fn crop_clamps_to_image_bounds() {
        let image = RgbImage::new(320, 240);
        let cropped = crop_person(&image, &person(0, 0));
        // Margin can't extend past the top-left corner.
        assert_eq!(cropped.dimensions(), (130, 230));

        let cropped = crop_person(&image, &person(280, 100));
        assert_eq!(cropped.dimensions(), (320 - 250, 240 - 70));
    }

    #[test]
    fn tracker_reuses_nearby_ids_and_allocates_distant_ones() {
        let mut tracker = PersonTracker::new();
        assert_eq!(tracker.assign(&person(100, 100)), 0);
        // Small movement: same person.
        assert_eq!(tracker.assign(&person(120, 110)), 0);
        // Across the frame: someone else.
        assert_eq!(tracker.assign(&person(500, 100)), 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn most_confident_picks_the_best_box() {
        let mut a = person(0, 0);
        a.confidence = 0.4;
        let mut b = person(50, 0);
        b.confidence = 0.8;
        assert_eq!(most_confident(&[a, b]), Some(b));
        assert_eq!(most_confident(&[]), None);
    }
}
