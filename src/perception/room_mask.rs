//! Room mask extraction from a labeled segmentation map

use super::segmentation::LabeledMap;
use crate::common::Pose2D;
use nalgebra::Point2;

/// Mask cell values, matching an 8-bit mono image
pub mod mask_values {
    pub const FOREGROUND: u8 = 255;
    pub const BACKGROUND: u8 = 0;
}

/// Binary grid with the same dimensions as the labeled map it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMask {
    pub width: usize,
    pub height: usize,
    data: Vec<u8>,
}

impl RoomMask {
    /// All-background mask
    pub fn empty(width: usize, height: usize) -> Self {
        RoomMask {
            width,
            height,
            data: vec![mask_values::BACKGROUND; width * height],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x] == mask_values::FOREGROUND
    }

    pub fn set(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = mask_values::FOREGROUND;
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == mask_values::FOREGROUND).count()
    }

    /// Zero-sized grid, which no planner can work with
    pub fn has_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// World coordinates of the center of cell (x, y)
    pub fn cell_center(&self, x: usize, y: usize, resolution: f64, origin: &Pose2D) -> Point2<f64> {
        Point2::new(
            origin.position.x + (x as f64 + 0.5) * resolution,
            origin.position.y + (y as f64 + 0.5) * resolution,
        )
    }
}

/// Extract the mask of `room` from `map`.
///
/// A cell is foreground exactly when its label equals `room + 1`. A room with
/// no matching cells yields an all-background mask.
pub fn extract_mask(map: &LabeledMap, room: usize) -> RoomMask {
    let mut mask = RoomMask::empty(map.width, map.height);
    let target = match u32::try_from(room).ok().and_then(|r| r.checked_add(1)) {
        Some(label) => label,
        None => return mask,
    };

    for (cell, &label) in mask.data.iter_mut().zip(map.labels()) {
        if label == target {
            *cell = mask_values::FOREGROUND;
        }
    }
    mask
}
