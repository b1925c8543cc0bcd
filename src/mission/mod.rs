//! Mission data and the mission-state collaborator
pub mod report;
pub mod sequencer;
pub mod store;

use crate::common::FieldOfView;
use crate::error::{MissionError, MissionResult};
use crate::perception::LabeledMap;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use report::{DispatchRecord, MissionOutcome, MissionReport};
pub use sequencer::{MissionSequencer, SequencerState};
pub use store::{InMemoryMissionStore, MissionFile};

/// Index of a room in the room catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomRef(pub usize);

impl RoomRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stop along the route: the trolley parks here while its rooms are cleaned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: usize,
    /// Rooms in visiting order
    pub rooms: Vec<RoomRef>,
}

/// Checkpoints in visiting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionPlan {
    checkpoints: Vec<Checkpoint>,
}

impl MissionPlan {
    pub fn new(checkpoints: Vec<Checkpoint>) -> MissionResult<Self> {
        let plan = MissionPlan { checkpoints };
        plan.check()?;
        Ok(plan)
    }

    /// Plans deserialized from mission files bypass `new`, so loaders call this
    pub fn check(&self) -> MissionResult<()> {
        if self.checkpoints.is_empty() {
            return Err(MissionError::EmptyPlan);
        }
        Ok(())
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn room_count(&self) -> usize {
        self.checkpoints.iter().map(|c| c.rooms.len()).sum()
    }
}

/// Static facts about one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room: RoomRef,
    /// Room center in the map frame, meters
    pub center: Point2<f64>,
}

/// Robot geometry used for planning and coverage monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotProperties {
    pub radius: f64,
    pub coverage_radius: f64,
    pub field_of_view: FieldOfView,
}

/// Outcome of one room's cleaning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// Every cleaning step succeeded
    Complete,
    /// The coverage path was followed but an auxiliary step failed
    Partial,
    /// The coverage path was not followed successfully
    Failed,
}

impl CompletionStatus {
    /// Numeric code handed to mission storage
    pub fn status_code(&self) -> u8 {
        match self {
            CompletionStatus::Complete => 1,
            CompletionStatus::Partial => 2,
            CompletionStatus::Failed => 3,
        }
    }
}

/// Written once per room per mission pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCompletionRecord {
    pub room: RoomRef,
    pub status: CompletionStatus,
}

impl RoomCompletionRecord {
    pub fn success(&self) -> bool {
        self.status == CompletionStatus::Complete
    }
}

/// Access to mission data owned outside the core
pub trait MissionState {
    fn room_info(&self, room: RoomRef) -> MissionResult<RoomInfo>;

    fn robot_properties(&self) -> RobotProperties;

    fn segmentation_map(&self) -> &LabeledMap;

    fn checkout_completed_room(&mut self, record: RoomCompletionRecord);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plan_is_rejected() {
        assert!(matches!(MissionPlan::new(Vec::new()), Err(MissionError::EmptyPlan)));
    }

    #[test]
    fn room_count_spans_checkpoints() {
        let plan = MissionPlan::new(vec![
            Checkpoint {
                id: 0,
                rooms: vec![RoomRef(0), RoomRef(1)],
            },
            Checkpoint {
                id: 1,
                rooms: vec![RoomRef(4)],
            },
        ])
        .unwrap();
        assert_eq!(plan.room_count(), 3);
    }

    #[test]
    fn only_complete_counts_as_success() {
        let record = RoomCompletionRecord {
            room: RoomRef(2),
            status: CompletionStatus::Partial,
        };
        assert!(!record.success());
        assert_eq!(record.status.status_code(), 2);
    }
}
