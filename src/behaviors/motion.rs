//! Motion behaviors: moving to a pose, following paths and walls, and moving the trolley

use super::{BehaviorResult, BehaviorUnit};
use crate::common::{FieldOfView, PathTolerances, Pose2D};
use crate::error::{GatewayError, InvalidConfig};
use crate::gateway::{EndpointId, ServiceRequest, ServiceResponse};
use crate::interrupt::InterruptLevel;
use crate::perception::RoomMask;
use tracing::info;

/// Drive to a goal pose
#[derive(Debug, Clone, PartialEq)]
pub struct MoveToPoseConfig {
    pub goal: Pose2D,
    pub frame_id: String,
}

impl MoveToPoseConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !self.goal.is_finite() {
            return Err(InvalidConfig::OutOfRange {
                field: "goal",
                value: f64::NAN,
            });
        }
        if self.frame_id.is_empty() {
            return Err(InvalidConfig::MissingField("frame_id"));
        }
        Ok(())
    }
}

/// Follow a planned coverage path inside a room
#[derive(Debug, Clone, PartialEq)]
pub struct FollowPathConfig {
    pub poses: Vec<Pose2D>,
    pub area_mask: RoomMask,
    pub tolerances: PathTolerances,
}

impl FollowPathConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        validate_path(&self.poses, &self.area_mask, &self.tolerances)
    }
}

/// Follow the walls of a room, skipping what the coverage monitor already saw
#[derive(Debug, Clone, PartialEq)]
pub struct FollowWallConfig {
    pub poses: Vec<Pose2D>,
    pub area_mask: RoomMask,
    pub tolerances: PathTolerances,
    pub resolution: f64,
    pub origin: Pose2D,
    pub field_of_view: FieldOfView,
    pub coverage_radius: f64,
}

impl FollowWallConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        validate_path(&self.poses, &self.area_mask, &self.tolerances)?;
        InvalidConfig::positive("resolution", self.resolution)?;
        InvalidConfig::positive("coverage_radius", self.coverage_radius)?;
        if !self.field_of_view.is_finite() {
            return Err(InvalidConfig::MissingField("field_of_view"));
        }
        Ok(())
    }
}

/// Move the supporting trolley to a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTrolleyConfig {
    pub checkpoint: usize,
}

fn validate_path(poses: &[Pose2D], mask: &RoomMask, tolerances: &PathTolerances) -> Result<(), InvalidConfig> {
    if poses.is_empty() {
        return Err(InvalidConfig::EmptyPath);
    }
    if mask.has_zero_area() {
        return Err(InvalidConfig::EmptyMask);
    }
    InvalidConfig::non_negative("path_tolerance", tolerances.path)?;
    InvalidConfig::non_negative("goal_position_tolerance", tolerances.goal_position)?;
    InvalidConfig::non_negative("goal_angle_tolerance", tolerances.goal_angle)?;
    Ok(())
}

impl BehaviorUnit<'_> {
    pub(super) fn move_to_pose(&mut self, config: &MoveToPoseConfig) -> BehaviorResult {
        info!(
            x = config.goal.position.x,
            y = config.goal.position.y,
            frame = %config.frame_id,
            "moving to pose"
        );
        self.action(
            EndpointId::MoveToPose,
            ServiceRequest::MoveToPose {
                position: config.goal.position,
                orientation: config.goal.orientation(),
                frame_id: config.frame_id.clone(),
            },
        )
    }

    pub(super) fn follow_path(&mut self, config: &FollowPathConfig) -> BehaviorResult {
        info!(poses = config.poses.len(), "following coverage path");
        self.action(
            EndpointId::FollowPath,
            ServiceRequest::FollowPath {
                poses: config.poses.clone(),
                area_mask: config.area_mask.clone(),
                tolerances: config.tolerances,
            },
        )
    }

    /// Fetches the coverage map first, then follows the walls with it
    pub(super) fn follow_wall(&mut self, config: &FollowWallConfig) -> BehaviorResult {
        let request = ServiceRequest::GetCoverageMap {
            area_mask: config.area_mask.clone(),
            resolution: config.resolution,
            origin: config.origin,
            field_of_view: config.field_of_view,
            coverage_radius: config.coverage_radius,
        };
        let coverage_map = match self.call(EndpointId::GetCoverageMap, request) {
            Ok(ServiceResponse::CoverageMap(map)) => map,
            Ok(other) => {
                return BehaviorResult::Failed(
                    GatewayError::MalformedResponse(
                        EndpointId::GetCoverageMap,
                        format!("expected coverage map, got {}", other.variant_name()),
                    )
                    .into(),
                )
            }
            Err(err) => return BehaviorResult::Failed(err.into()),
        };

        if self.check_interrupt() == InterruptLevel::AbortRequested {
            return BehaviorResult::Interrupted;
        }

        info!(poses = config.poses.len(), "following walls");
        self.action(
            EndpointId::FollowWall,
            ServiceRequest::FollowWall {
                poses: config.poses.clone(),
                area_mask: config.area_mask.clone(),
                coverage_map,
                tolerances: config.tolerances,
            },
        )
    }

    pub(super) fn move_trolley(&mut self, config: &MoveTrolleyConfig) -> BehaviorResult {
        info!(checkpoint = config.checkpoint, "moving trolley");
        self.action(
            EndpointId::MoveTrolley,
            ServiceRequest::MoveTrolley {
                checkpoint: config.checkpoint,
            },
        )
    }
}
