//! What happened during a mission run

use super::sequencer::SequencerState;
use super::{RoomCompletionRecord, RoomRef};
use crate::behaviors::{BehaviorKind, OutcomeTag};

/// How the mission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    /// Every checkpoint was processed
    Completed,
    Aborted,
}

/// One dispatched behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRecord {
    pub checkpoint: Option<usize>,
    pub room: Option<RoomRef>,
    pub kind: BehaviorKind,
    pub outcome: OutcomeTag,
}

/// Ordered trace of a mission run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionReport {
    pub dispatched: Vec<DispatchRecord>,
    /// Units whose recovery ran, in order
    pub recoveries: Vec<BehaviorKind>,
    pub completions: Vec<RoomCompletionRecord>,
    pub final_state: SequencerState,
    pub outcome: MissionOutcome,
}

impl MissionReport {
    pub(crate) fn new() -> Self {
        MissionReport {
            dispatched: Vec::new(),
            recoveries: Vec::new(),
            completions: Vec::new(),
            final_state: SequencerState::Idle,
            outcome: MissionOutcome::Completed,
        }
    }

    /// Kinds dispatched for `room`, in order
    pub fn kinds_for_room(&self, room: RoomRef) -> Vec<BehaviorKind> {
        self.dispatched
            .iter()
            .filter(|record| record.room == Some(room))
            .map(|record| record.kind)
            .collect()
    }

    /// Kinds dispatched outside any room (tool change, trolley moves)
    pub fn mission_level_kinds(&self) -> Vec<BehaviorKind> {
        self.dispatched
            .iter()
            .filter(|record| record.room.is_none())
            .map(|record| record.kind)
            .collect()
    }

    pub fn count(&self, kind: BehaviorKind) -> usize {
        self.dispatched.iter().filter(|record| record.kind == kind).count()
    }

    pub fn completion_for(&self, room: RoomRef) -> Option<&RoomCompletionRecord> {
        self.completions.iter().find(|record| record.room == room)
    }
}
