//! Labeled segmentation map produced by room segmentation
//!
//! Each cell holds a room label: 0 is background, room `n` is labeled `n + 1`.

use crate::common::Pose2D;
use crate::error::{MissionError, MissionResult};
use serde::{Deserialize, Serialize};

/// A row-major labeled occupancy grid with its map metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMap {
    pub width: usize,
    pub height: usize,
    /// Meters per cell
    pub resolution: f64,
    /// Pose of cell (0, 0) in the map frame
    pub origin: Pose2D,
    pub frame_id: String,
    labels: Vec<u32>,
}

impl LabeledMap {
    /// Create a map; fails when `labels` does not cover `width * height` cells
    pub fn new(width: usize, height: usize, labels: Vec<u32>) -> MissionResult<Self> {
        let map = LabeledMap {
            width,
            height,
            resolution: 0.05,
            origin: Pose2D::new(0.0, 0.0, 0.0),
            frame_id: "map".to_string(),
            labels,
        };
        map.check_size()?;
        Ok(map)
    }

    /// Map of `width x height` cells all carrying `label`
    pub fn filled(width: usize, height: usize, label: u32) -> Self {
        LabeledMap {
            width,
            height,
            resolution: 0.05,
            origin: Pose2D::new(0.0, 0.0, 0.0),
            frame_id: "map".to_string(),
            labels: vec![label; width * height],
        }
    }

    pub fn with_metadata(mut self, resolution: f64, origin: Pose2D, frame_id: impl Into<String>) -> Self {
        self.resolution = resolution;
        self.origin = origin;
        self.frame_id = frame_id.into();
        self
    }

    /// Verify the label buffer matches the declared dimensions.
    ///
    /// Maps deserialized from mission files bypass `new`, so loaders call this.
    pub fn check_size(&self) -> MissionResult<()> {
        if self.labels.len() != self.width * self.height {
            return Err(MissionError::MapSize {
                width: self.width,
                height: self.height,
                len: self.labels.len(),
            });
        }
        Ok(())
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Label at grid cell (x, y), `None` outside the map
    pub fn label_at(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels.get(y * self.width + x).copied()
    }

    pub fn set_label(&mut self, x: usize, y: usize, label: u32) {
        if x < self.width && y < self.height {
            self.labels[y * self.width + x] = label;
        }
    }
}
