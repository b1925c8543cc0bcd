//! Room exploration: asks the coverage planner for a path through one room

use super::{BehaviorPayload, BehaviorResult, BehaviorUnit};
use crate::common::{FieldOfView, Pose2D};
use crate::error::{GatewayError, InvalidConfig};
use crate::gateway::{EndpointId, ServiceRequest, ServiceResponse};
use crate::perception::RoomMask;
use tracing::info;

/// Planner inputs for one room
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreRoomConfig {
    pub mask: RoomMask,
    pub resolution: f64,
    pub origin: Pose2D,
    pub robot_radius: f64,
    pub coverage_radius: f64,
    pub field_of_view: FieldOfView,
    pub starting_pose: Pose2D,
    pub planning_mode: u8,
}

impl ExploreRoomConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.mask.has_zero_area() {
            return Err(InvalidConfig::EmptyMask);
        }
        InvalidConfig::positive("resolution", self.resolution)?;
        InvalidConfig::non_negative("robot_radius", self.robot_radius)?;
        InvalidConfig::positive("coverage_radius", self.coverage_radius)?;
        if !self.field_of_view.is_finite() {
            return Err(InvalidConfig::MissingField("field_of_view"));
        }
        if !self.starting_pose.is_finite() {
            return Err(InvalidConfig::MissingField("starting_pose"));
        }
        Ok(())
    }
}

impl BehaviorUnit<'_> {
    pub(super) fn explore_room(&mut self, config: &ExploreRoomConfig) -> BehaviorResult {
        info!(
            cells = config.mask.foreground_count(),
            planning_mode = config.planning_mode,
            "requesting coverage path"
        );
        let request = ServiceRequest::ExploreRoom {
            mask: config.mask.clone(),
            resolution: config.resolution,
            origin: config.origin,
            robot_radius: config.robot_radius,
            coverage_radius: config.coverage_radius,
            field_of_view: config.field_of_view,
            starting_pose: config.starting_pose,
            planning_mode: config.planning_mode,
        };

        match self.call(EndpointId::ExploreRoom, request) {
            Ok(ServiceResponse::CoveragePath(Some(path))) if !path.is_empty() => {
                info!(poses = path.len(), "coverage path received");
                BehaviorResult::Success(BehaviorPayload::CoveragePath(path))
            }
            Ok(ServiceResponse::CoveragePath(_)) => BehaviorResult::NoResult,
            Ok(other) => BehaviorResult::Failed(
                GatewayError::MalformedResponse(
                    EndpointId::ExploreRoom,
                    format!("expected coverage path, got {}", other.variant_name()),
                )
                .into(),
            ),
            Err(err) => BehaviorResult::Failed(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::FakeGateway;
    use super::super::{BehaviorConfig, BehaviorContext, BehaviorKind};
    use super::*;
    use crate::config::TimeoutPolicy;
    use crate::interrupt::InterruptController;

    fn config() -> ExploreRoomConfig {
        ExploreRoomConfig {
            mask: RoomMask::empty(4, 4),
            resolution: 0.05,
            origin: Pose2D::new(0.0, 0.0, 0.0),
            robot_radius: 0.325,
            coverage_radius: 0.25,
            field_of_view: FieldOfView::new([(0.04, 0.136), (0.04, -0.364), (0.54, -0.364), (0.54, 0.136)]),
            starting_pose: Pose2D::new(1.0, 0.0, 0.0),
            planning_mode: 2,
        }
    }

    fn explore(response: ServiceResponse) -> BehaviorResult {
        let gateway = FakeGateway::new(move |_, _| Ok(response.clone()));
        let (interrupt, timeouts) = (InterruptController::new(), TimeoutPolicy::default());
        let ctx = BehaviorContext {
            gateway: &gateway,
            interrupt: &interrupt,
            timeouts: &timeouts,
        };
        let mut unit = BehaviorUnit::new(BehaviorKind::ExploreRoom, ctx);
        unit.configure(BehaviorConfig::ExploreRoom(config())).unwrap();
        unit.run()
    }

    #[test]
    fn negative_radius_is_invalid() {
        let mut config = config();
        config.robot_radius = -0.1;
        assert!(matches!(
            config.validate(),
            Err(InvalidConfig::OutOfRange {
                field: "robot_radius",
                ..
            })
        ));
    }

    #[test]
    fn zero_area_mask_is_invalid() {
        let mut config = config();
        config.mask = RoomMask::empty(0, 4);
        assert_eq!(config.validate(), Err(InvalidConfig::EmptyMask));
    }

    #[test]
    fn missing_or_empty_path_is_no_result() {
        assert_eq!(explore(ServiceResponse::CoveragePath(None)), BehaviorResult::NoResult);
        assert_eq!(explore(ServiceResponse::CoveragePath(Some(Vec::new()))), BehaviorResult::NoResult);
    }

    #[test]
    fn path_is_returned_as_payload() {
        let path = vec![Pose2D::new(0.0, 0.0, 0.0), Pose2D::new(1.0, 0.0, 0.0)];
        assert_eq!(
            explore(ServiceResponse::CoveragePath(Some(path.clone()))),
            BehaviorResult::Success(BehaviorPayload::CoveragePath(path))
        );
    }
}
