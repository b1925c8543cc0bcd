//! Remote service gateway.
//!
//! Every piece of robot work ends in a call to an external actor (motion
//! control, coverage planner, tool changer, coverage monitor). The gateway
//! hides the transport behind one blocking, timeout-bounded call. It never
//! retries; retry decisions belong to the calling behavior.

pub mod simulated;
pub mod transport;

use crate::common::{FieldOfView, PathTolerances, Pose2D};
use crate::error::GatewayError;
use crate::perception::RoomMask;
use nalgebra::{Point2, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub use transport::{AsyncServiceGateway, ServiceHandler};

/// Closed set of remote endpoints the core talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointId {
    MoveToPose,
    ExploreRoom,
    FollowPath,
    FollowWall,
    ChangeTool,
    MoveTrolley,
    StartCleaningDevice,
    StopCleaningDevice,
    StartCoverageMonitoring,
    StopCoverageMonitoring,
    PushCoverageConfig,
    GetCoverageMap,
}

impl EndpointId {
    pub const ALL: [EndpointId; 12] = [
        EndpointId::MoveToPose,
        EndpointId::ExploreRoom,
        EndpointId::FollowPath,
        EndpointId::FollowWall,
        EndpointId::ChangeTool,
        EndpointId::MoveTrolley,
        EndpointId::StartCleaningDevice,
        EndpointId::StopCleaningDevice,
        EndpointId::StartCoverageMonitoring,
        EndpointId::StopCoverageMonitoring,
        EndpointId::PushCoverageConfig,
        EndpointId::GetCoverageMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointId::MoveToPose => "move_to_pose",
            EndpointId::ExploreRoom => "explore_room",
            EndpointId::FollowPath => "follow_path",
            EndpointId::FollowWall => "follow_wall",
            EndpointId::ChangeTool => "change_tool",
            EndpointId::MoveTrolley => "move_trolley",
            EndpointId::StartCleaningDevice => "start_cleaning_device",
            EndpointId::StopCleaningDevice => "stop_cleaning_device",
            EndpointId::StartCoverageMonitoring => "start_coverage_monitoring",
            EndpointId::StopCoverageMonitoring => "stop_coverage_monitoring",
            EndpointId::PushCoverageConfig => "push_coverage_config",
            EndpointId::GetCoverageMap => "get_coverage_map",
        }
    }

    /// Service name used when the deployment does not override it
    pub fn default_service_name(&self) -> &'static str {
        match self {
            EndpointId::MoveToPose => "move_base",
            EndpointId::ExploreRoom => "/room_exploration/room_exploration_server",
            EndpointId::FollowPath => "/move_base_path",
            EndpointId::FollowWall => "/move_base_wall_follow",
            EndpointId::ChangeTool => "/tool_changing_server",
            EndpointId::MoveTrolley => "/trolley_movement_server",
            EndpointId::StartCleaningDevice => "/brush_cleaning_module_interface/start_brush_cleaner",
            EndpointId::StopCleaningDevice => "/brush_cleaning_module_interface/stop_brush_cleaner",
            EndpointId::StartCoverageMonitoring => {
                "/room_exploration/coverage_monitor_server/start_coverage_monitoring"
            }
            EndpointId::StopCoverageMonitoring => {
                "/room_exploration/coverage_monitor_server/stop_coverage_monitoring"
            }
            EndpointId::PushCoverageConfig => "/room_exploration/coverage_monitor_server/set_parameters",
            EndpointId::GetCoverageMap => "/room_exploration/coverage_monitor_server/get_coverage_image",
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint identifiers resolved to transport-level service names
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointMap {
    names: HashMap<EndpointId, String>,
}

impl EndpointMap {
    /// Builds the map from deployment overrides, falling back to default names
    pub fn resolve(overrides: &HashMap<EndpointId, String>) -> Self {
        let names = EndpointId::ALL
            .iter()
            .map(|id| {
                let name = overrides
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| id.default_service_name().to_string());
                (*id, name)
            })
            .collect();
        EndpointMap { names }
    }

    pub fn service_name(&self, endpoint: EndpointId) -> &str {
        self.names
            .get(&endpoint)
            .map(String::as_str)
            .unwrap_or_else(|| endpoint.default_service_name())
    }
}

impl Default for EndpointMap {
    fn default() -> Self {
        EndpointMap::resolve(&HashMap::new())
    }
}

/// Coverage monitor settings pushed before monitoring starts
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMonitorConfig {
    pub map_frame: String,
    pub robot_frame: String,
    pub coverage_radius: f64,
    pub offset: Vector3<f64>,
    pub recording_active: bool,
}

/// Request payloads, one shape per endpoint family
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    MoveToPose {
        position: Point2<f64>,
        orientation: UnitQuaternion<f64>,
        frame_id: String,
    },
    ExploreRoom {
        mask: RoomMask,
        resolution: f64,
        origin: Pose2D,
        robot_radius: f64,
        coverage_radius: f64,
        field_of_view: FieldOfView,
        starting_pose: Pose2D,
        planning_mode: u8,
    },
    FollowPath {
        poses: Vec<Pose2D>,
        area_mask: RoomMask,
        tolerances: PathTolerances,
    },
    FollowWall {
        poses: Vec<Pose2D>,
        area_mask: RoomMask,
        coverage_map: RoomMask,
        tolerances: PathTolerances,
    },
    GetCoverageMap {
        area_mask: RoomMask,
        resolution: f64,
        origin: Pose2D,
        field_of_view: FieldOfView,
        coverage_radius: f64,
    },
    ChangeTool {
        tool: String,
    },
    MoveTrolley {
        checkpoint: usize,
    },
    PushCoverageConfig(CoverageMonitorConfig),
    /// Parameterless on/off style request
    Trigger,
}

/// Response payloads
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    /// Action finished
    Done,
    Trigger {
        success: bool,
        message: String,
    },
    /// Planned coverage path, `None` when the planner found nothing
    CoveragePath(Option<Vec<Pose2D>>),
    CoverageMap(RoomMask),
}

impl ServiceResponse {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ServiceResponse::Done => "done",
            ServiceResponse::Trigger { .. } => "trigger",
            ServiceResponse::CoveragePath(_) => "coverage_path",
            ServiceResponse::CoverageMap(_) => "coverage_map",
        }
    }
}

/// Blocking request/response access to the external actors
pub trait ServiceGateway: Send + Sync {
    /// Issue one call and block until it responds or `timeout` elapses
    fn call(
        &self,
        endpoint: EndpointId,
        request: ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, GatewayError>;
}

impl<G: ServiceGateway + ?Sized> ServiceGateway for std::sync::Arc<G> {
    fn call(
        &self,
        endpoint: EndpointId,
        request: ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, GatewayError> {
        (**self).call(endpoint, request, timeout)
    }
}
