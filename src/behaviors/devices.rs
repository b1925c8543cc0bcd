//! Device behaviors: tool changing, the cleaning device and the coverage monitor.
//!
//! Starting a device engages a side effect that [`BehaviorUnit::recover`]
//! undoes. A start call that timed out counts as engaged, since the device
//! may have come on anyway.

use super::{BehaviorPayload, BehaviorResult, BehaviorUnit, FailureReason};
use crate::error::{GatewayError, InvalidConfig};
use crate::gateway::{CoverageMonitorConfig, EndpointId, ServiceRequest};
use tracing::info;

/// Select the tool mounted for the mission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeToolConfig {
    pub tool: String,
}

impl ChangeToolConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.tool.trim().is_empty() {
            return Err(InvalidConfig::MissingField("tool"));
        }
        Ok(())
    }
}

pub(super) fn validate_coverage_config(config: &CoverageMonitorConfig) -> Result<(), InvalidConfig> {
    if config.map_frame.is_empty() {
        return Err(InvalidConfig::MissingField("map_frame"));
    }
    if config.robot_frame.is_empty() {
        return Err(InvalidConfig::MissingField("robot_frame"));
    }
    InvalidConfig::positive("coverage_radius", config.coverage_radius)?;
    if let Some(value) = config.offset.iter().copied().find(|v| !v.is_finite()) {
        return Err(InvalidConfig::OutOfRange {
            field: "offset",
            value,
        });
    }
    Ok(())
}

fn may_have_taken_effect(reason: &FailureReason) -> bool {
    matches!(reason, FailureReason::Gateway(GatewayError::Timeout(..)))
}

impl BehaviorUnit<'_> {
    pub(super) fn change_tool(&mut self, config: &ChangeToolConfig) -> BehaviorResult {
        info!(tool = %config.tool, "changing tool");
        self.action(
            EndpointId::ChangeTool,
            ServiceRequest::ChangeTool {
                tool: config.tool.clone(),
            },
        )
    }

    /// Turn a device on; `stop` is what undoes it
    pub(super) fn switch_on(&mut self, start: EndpointId, stop: EndpointId) -> BehaviorResult {
        info!(endpoint = %start, "switching on");
        match self.trigger(start) {
            Ok(()) => {
                self.engaged = Some(stop);
                BehaviorResult::Success(BehaviorPayload::Done)
            }
            Err(reason) => {
                if may_have_taken_effect(&reason) {
                    self.engaged = Some(stop);
                }
                BehaviorResult::Failed(reason)
            }
        }
    }

    /// Turn a device off. Devices answer success when already off.
    pub(super) fn switch_off(&mut self, stop: EndpointId) -> BehaviorResult {
        info!(endpoint = %stop, "switching off");
        match self.trigger(stop) {
            Ok(()) => BehaviorResult::Success(BehaviorPayload::Done),
            Err(reason) => BehaviorResult::Failed(reason),
        }
    }

    pub(super) fn push_coverage_config(&mut self, config: &CoverageMonitorConfig) -> BehaviorResult {
        info!(
            coverage_radius = config.coverage_radius,
            offset_x = config.offset.x,
            offset_y = config.offset.y,
            recording = config.recording_active,
            "pushing coverage monitor configuration"
        );
        let result = self.action(
            EndpointId::PushCoverageConfig,
            ServiceRequest::PushCoverageConfig(config.clone()),
        );
        let engaged = match &result {
            BehaviorResult::Success(_) => true,
            BehaviorResult::Failed(reason) => may_have_taken_effect(reason),
            _ => false,
        };
        if engaged && config.recording_active {
            self.engaged = Some(EndpointId::StopCoverageMonitoring);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ok_trigger, FakeGateway};
    use super::super::{BehaviorConfig, BehaviorContext, BehaviorKind};
    use super::*;
    use crate::config::TimeoutPolicy;
    use crate::gateway::ServiceResponse;
    use crate::interrupt::InterruptController;
    use nalgebra::Vector3;
    use std::time::Duration;

    fn coverage_config() -> CoverageMonitorConfig {
        CoverageMonitorConfig {
            map_frame: "map".into(),
            robot_frame: "base_link".into(),
            coverage_radius: 0.25,
            offset: Vector3::new(0.29, -0.114, 0.0),
            recording_active: true,
        }
    }

    #[test]
    fn timed_out_start_is_undone_before_returning() {
        let gateway = FakeGateway::new(|endpoint, _| match endpoint {
            EndpointId::StartCleaningDevice => Err(GatewayError::Timeout(endpoint, Duration::from_secs(5))),
            _ => ok_trigger(),
        });
        let (interrupt, timeouts) = (InterruptController::new(), TimeoutPolicy::default());
        let ctx = BehaviorContext {
            gateway: &gateway,
            interrupt: &interrupt,
            timeouts: &timeouts,
        };
        let mut unit = BehaviorUnit::new(BehaviorKind::StartCleaningDevice, ctx);
        unit.configure(BehaviorConfig::StartCleaningDevice).unwrap();

        assert!(matches!(unit.run(), BehaviorResult::Failed(_)));
        assert!(unit.has_recovered());
        assert_eq!(
            gateway.calls(),
            vec![EndpointId::StartCleaningDevice, EndpointId::StopCleaningDevice]
        );
    }

    #[test]
    fn refused_start_needs_no_recovery() {
        let gateway = FakeGateway::new(|_, _| {
            Ok(ServiceResponse::Trigger {
                success: false,
                message: "brush jammed".into(),
            })
        });
        let (interrupt, timeouts) = (InterruptController::new(), TimeoutPolicy::default());
        let ctx = BehaviorContext {
            gateway: &gateway,
            interrupt: &interrupt,
            timeouts: &timeouts,
        };
        let mut unit = BehaviorUnit::new(BehaviorKind::StartCleaningDevice, ctx);
        unit.configure(BehaviorConfig::StartCleaningDevice).unwrap();

        assert_eq!(
            unit.run(),
            BehaviorResult::Failed(FailureReason::Refused("brush jammed".into()))
        );
        assert!(!unit.has_recovered());
        assert_eq!(gateway.calls(), vec![EndpointId::StartCleaningDevice]);
    }

    #[test]
    fn recording_config_engages_monitoring() {
        let gateway = FakeGateway::new(|endpoint, _| match endpoint {
            EndpointId::PushCoverageConfig => Ok(ServiceResponse::Done),
            _ => ok_trigger(),
        });
        let (interrupt, timeouts) = (InterruptController::new(), TimeoutPolicy::default());
        let ctx = BehaviorContext {
            gateway: &gateway,
            interrupt: &interrupt,
            timeouts: &timeouts,
        };
        let mut unit = BehaviorUnit::new(BehaviorKind::PushCoverageConfig, ctx);
        unit.configure(BehaviorConfig::PushCoverageConfig(coverage_config()))
            .unwrap();
        assert!(unit.run().is_success());

        unit.recover();
        assert_eq!(
            gateway.calls(),
            vec![EndpointId::PushCoverageConfig, EndpointId::StopCoverageMonitoring]
        );
    }

    #[test]
    fn coverage_config_requires_frames() {
        let mut config = coverage_config();
        config.robot_frame.clear();
        assert_eq!(
            validate_coverage_config(&config),
            Err(InvalidConfig::MissingField("robot_frame"))
        );
    }

    #[test]
    fn blank_tool_is_rejected() {
        let config = ChangeToolConfig { tool: "  ".into() };
        assert_eq!(config.validate(), Err(InvalidConfig::MissingField("tool")));
    }
}
