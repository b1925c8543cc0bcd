//! In-memory mission state, optionally loaded from a TOML mission file

use super::{MissionPlan, MissionState, RobotProperties, RoomCompletionRecord, RoomInfo, RoomRef};
use crate::error::{MissionError, MissionResult};
use crate::perception::LabeledMap;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Everything needed to run one mission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionFile {
    pub plan: MissionPlan,
    pub rooms: Vec<RoomInfo>,
    pub robot: RobotProperties,
    pub map: LabeledMap,
}

impl MissionFile {
    pub fn load(path: &Path) -> MissionResult<Self> {
        let file: MissionFile = Figment::from(Toml::file(path)).extract()?;
        file.plan.check()?;
        file.map.check_size()?;
        Ok(file)
    }
}

/// Mission state kept in memory for the length of one run
#[derive(Debug, Clone)]
pub struct InMemoryMissionStore {
    rooms: HashMap<RoomRef, RoomInfo>,
    robot: RobotProperties,
    map: LabeledMap,
    completed: Vec<RoomCompletionRecord>,
}

impl InMemoryMissionStore {
    pub fn new(rooms: Vec<RoomInfo>, robot: RobotProperties, map: LabeledMap) -> Self {
        InMemoryMissionStore {
            rooms: rooms.into_iter().map(|info| (info.room, info)).collect(),
            robot,
            map,
            completed: Vec::new(),
        }
    }

    /// Split a mission file into its plan and the store serving the rest
    pub fn from_file(file: MissionFile) -> (MissionPlan, Self) {
        let store = InMemoryMissionStore::new(file.rooms, file.robot, file.map);
        (file.plan, store)
    }

    pub fn completed_rooms(&self) -> &[RoomCompletionRecord] {
        &self.completed
    }
}

impl MissionState for InMemoryMissionStore {
    fn room_info(&self, room: RoomRef) -> MissionResult<RoomInfo> {
        self.rooms
            .get(&room)
            .cloned()
            .ok_or(MissionError::UnknownRoom(room.index()))
    }

    fn robot_properties(&self) -> RobotProperties {
        self.robot.clone()
    }

    fn segmentation_map(&self) -> &LabeledMap {
        &self.map
    }

    fn checkout_completed_room(&mut self, record: RoomCompletionRecord) {
        if self.completed.iter().any(|r| r.room == record.room) {
            warn!(room = record.room.index(), "room already checked out in this pass");
            return;
        }
        self.completed.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FieldOfView;
    use crate::mission::CompletionStatus;
    use nalgebra::Point2;
    use std::io::Write;

    fn robot() -> RobotProperties {
        RobotProperties {
            radius: 0.325,
            coverage_radius: 0.25,
            field_of_view: FieldOfView::new([(0.04, 0.136), (0.04, -0.364), (0.54, -0.364), (0.54, 0.136)]),
        }
    }

    #[test]
    fn completion_is_write_once() {
        let mut store = InMemoryMissionStore::new(Vec::new(), robot(), LabeledMap::filled(2, 2, 1));
        let first = RoomCompletionRecord {
            room: RoomRef(0),
            status: CompletionStatus::Complete,
        };
        store.checkout_completed_room(first);
        store.checkout_completed_room(RoomCompletionRecord {
            status: CompletionStatus::Failed,
            ..first
        });
        assert_eq!(store.completed_rooms(), &[first]);
    }

    #[test]
    fn unknown_room_is_an_error() {
        let store = InMemoryMissionStore::new(
            vec![RoomInfo {
                room: RoomRef(0),
                center: Point2::new(1.0, 1.0),
            }],
            robot(),
            LabeledMap::filled(2, 2, 1),
        );
        assert!(store.room_info(RoomRef(0)).is_ok());
        assert!(matches!(store.room_info(RoomRef(3)), Err(MissionError::UnknownRoom(3))));
    }

    #[test]
    fn loads_mission_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[plan]
checkpoints = [{{ id = 0, rooms = [0, 1] }}]

[[rooms]]
room = 0
center = [0.5, 0.5]

[[rooms]]
room = 1
center = [1.5, 0.5]

[robot]
radius = 0.325
coverage_radius = 0.25
field_of_view = [[0.04, 0.136], [0.04, -0.364], [0.54, -0.364], [0.54, 0.136]]

[map]
width = 2
height = 1
resolution = 1.0
origin = {{ position = [0.0, 0.0], theta = 0.0 }}
frame_id = "map"
labels = [1, 2]
"#
        )
        .unwrap();

        let mission = MissionFile::load(file.path()).unwrap();
        let (plan, store) = InMemoryMissionStore::from_file(mission);
        assert_eq!(plan.room_count(), 2);
        assert_eq!(store.room_info(RoomRef(1)).unwrap().center, Point2::new(1.5, 0.5));
        assert_eq!(store.segmentation_map().label_at(1, 0), Some(2));
    }
}
