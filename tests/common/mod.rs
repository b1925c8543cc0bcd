#![allow(dead_code)]

use nalgebra::Point2;
use std::sync::Mutex;
use std::time::Duration;
use wet_cleaning_core::common::{FieldOfView, Pose2D};
use wet_cleaning_core::config::CleaningConfig;
use wet_cleaning_core::error::GatewayError;
use wet_cleaning_core::gateway::{EndpointId, ServiceGateway, ServiceRequest, ServiceResponse};
use wet_cleaning_core::mission::{Checkpoint, InMemoryMissionStore, MissionPlan, RobotProperties, RoomInfo, RoomRef};
use wet_cleaning_core::perception::{LabeledMap, RoomMask};

type Script = Box<dyn Fn(EndpointId, usize) -> Result<ServiceResponse, GatewayError> + Send + Sync>;

/// Gateway answering from a script and recording every call in order
pub struct ScriptedGateway {
    calls: Mutex<Vec<(EndpointId, ServiceRequest)>>,
    script: Script,
}

impl ScriptedGateway {
    /// `script` receives the endpoint and how many times it has been called, this call included
    pub fn new(
        script: impl Fn(EndpointId, usize) -> Result<ServiceResponse, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedGateway {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    /// Every endpoint answers the way a healthy robot would
    pub fn healthy() -> Self {
        Self::new(|endpoint, _| default_answer(endpoint))
    }

    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.calls.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn requests(&self, endpoint: EndpointId) -> Vec<ServiceRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn count(&self, endpoint: EndpointId) -> usize {
        self.endpoints().iter().filter(|&&e| e == endpoint).count()
    }
}

impl ServiceGateway for ScriptedGateway {
    fn call(
        &self,
        endpoint: EndpointId,
        request: ServiceRequest,
        _timeout: Duration,
    ) -> Result<ServiceResponse, GatewayError> {
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((endpoint, request));
            calls.iter().filter(|(e, _)| *e == endpoint).count()
        };
        (self.script)(endpoint, nth)
    }
}

pub fn coverage_path(poses: usize) -> Vec<Pose2D> {
    (0..poses).map(|i| Pose2D::new(0.25 + 0.5 * i as f64, 0.25, 0.0)).collect()
}

pub fn default_answer(endpoint: EndpointId) -> Result<ServiceResponse, GatewayError> {
    match endpoint {
        EndpointId::ExploreRoom => Ok(ServiceResponse::CoveragePath(Some(coverage_path(3)))),
        EndpointId::GetCoverageMap => Ok(ServiceResponse::CoverageMap(RoomMask::empty(4, 2))),
        EndpointId::StartCleaningDevice
        | EndpointId::StopCleaningDevice
        | EndpointId::StartCoverageMonitoring
        | EndpointId::StopCoverageMonitoring => Ok(ServiceResponse::Trigger {
            success: true,
            message: String::new(),
        }),
        _ => Ok(ServiceResponse::Done),
    }
}

pub fn field_of_view() -> FieldOfView {
    FieldOfView::new([(0.04, 0.136), (0.04, -0.364), (0.54, -0.364), (0.54, 0.136)])
}

/// Two rooms side by side on a 4x2 map at 0.5 m per cell
pub fn two_room_store() -> InMemoryMissionStore {
    let map = LabeledMap::new(4, 2, vec![1, 1, 2, 2, 1, 1, 2, 2])
        .unwrap()
        .with_metadata(0.5, Pose2D::new(0.0, 0.0, 0.0), "map");
    InMemoryMissionStore::new(
        vec![
            RoomInfo {
                room: RoomRef(0),
                center: Point2::new(0.5, 0.5),
            },
            RoomInfo {
                room: RoomRef(1),
                center: Point2::new(1.5, 0.5),
            },
        ],
        RobotProperties {
            radius: 0.325,
            coverage_radius: 0.25,
            field_of_view: field_of_view(),
        },
        map,
    )
}

pub fn plan(checkpoints: &[&[usize]]) -> MissionPlan {
    MissionPlan::new(
        checkpoints
            .iter()
            .enumerate()
            .map(|(id, rooms)| Checkpoint {
                id,
                rooms: rooms.iter().copied().map(RoomRef).collect(),
            })
            .collect(),
    )
    .unwrap()
}

pub fn test_config() -> CleaningConfig {
    let mut config = CleaningConfig::default();
    config.profile.pause_poll_interval = Duration::from_millis(2);
    config
}
