//! Behavior units: uniform, cancellable pieces of robot work.
//!
//! Every mission step (moving, exploring, following a path, switching a
//! device) is a [`BehaviorUnit`] configured with one [`BehaviorConfig`]
//! variant. A unit is configured once, run once, and can restore the
//! external actor it touched to a neutral state through [`BehaviorUnit::recover`].
//! Running never panics or returns `Err`; the outcome is a tagged
//! [`BehaviorResult`].

pub mod devices;
pub mod exploration;
pub mod motion;

use crate::common::Pose2D;
use crate::config::TimeoutPolicy;
use crate::error::{GatewayError, GatewayErrorKind, InvalidConfig};
use crate::gateway::{CoverageMonitorConfig, EndpointId, ServiceGateway, ServiceRequest, ServiceResponse};
use crate::interrupt::{InterruptController, InterruptLevel};
use std::fmt;
use tracing::{debug, info, warn};

pub use devices::ChangeToolConfig;
pub use exploration::ExploreRoomConfig;
pub use motion::{FollowPathConfig, FollowWallConfig, MoveToPoseConfig, MoveTrolleyConfig};

/// The closed set of behavior kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
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
}

impl BehaviorKind {
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorKind::MoveToPose => "move_to_pose",
            BehaviorKind::ExploreRoom => "explore_room",
            BehaviorKind::FollowPath => "follow_path",
            BehaviorKind::FollowWall => "follow_wall",
            BehaviorKind::ChangeTool => "change_tool",
            BehaviorKind::MoveTrolley => "move_trolley",
            BehaviorKind::StartCleaningDevice => "start_cleaning_device",
            BehaviorKind::StopCleaningDevice => "stop_cleaning_device",
            BehaviorKind::StartCoverageMonitoring => "start_coverage_monitoring",
            BehaviorKind::StopCoverageMonitoring => "stop_coverage_monitoring",
            BehaviorKind::PushCoverageConfig => "push_coverage_config",
        }
    }

    /// Stop behaviors bring an actor back to a safe state and run even after an abort
    pub fn is_cleanup(&self) -> bool {
        matches!(self, BehaviorKind::StopCleaningDevice | BehaviorKind::StopCoverageMonitoring)
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for one behavior, one variant per kind
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorConfig {
    MoveToPose(MoveToPoseConfig),
    ExploreRoom(ExploreRoomConfig),
    FollowPath(FollowPathConfig),
    FollowWall(FollowWallConfig),
    ChangeTool(ChangeToolConfig),
    MoveTrolley(MoveTrolleyConfig),
    StartCleaningDevice,
    StopCleaningDevice,
    StartCoverageMonitoring,
    StopCoverageMonitoring,
    PushCoverageConfig(CoverageMonitorConfig),
}

impl BehaviorConfig {
    pub fn kind(&self) -> BehaviorKind {
        match self {
            BehaviorConfig::MoveToPose(_) => BehaviorKind::MoveToPose,
            BehaviorConfig::ExploreRoom(_) => BehaviorKind::ExploreRoom,
            BehaviorConfig::FollowPath(_) => BehaviorKind::FollowPath,
            BehaviorConfig::FollowWall(_) => BehaviorKind::FollowWall,
            BehaviorConfig::ChangeTool(_) => BehaviorKind::ChangeTool,
            BehaviorConfig::MoveTrolley(_) => BehaviorKind::MoveTrolley,
            BehaviorConfig::StartCleaningDevice => BehaviorKind::StartCleaningDevice,
            BehaviorConfig::StopCleaningDevice => BehaviorKind::StopCleaningDevice,
            BehaviorConfig::StartCoverageMonitoring => BehaviorKind::StartCoverageMonitoring,
            BehaviorConfig::StopCoverageMonitoring => BehaviorKind::StopCoverageMonitoring,
            BehaviorConfig::PushCoverageConfig(_) => BehaviorKind::PushCoverageConfig,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidConfig> {
        match self {
            BehaviorConfig::MoveToPose(config) => config.validate(),
            BehaviorConfig::ExploreRoom(config) => config.validate(),
            BehaviorConfig::FollowPath(config) => config.validate(),
            BehaviorConfig::FollowWall(config) => config.validate(),
            BehaviorConfig::ChangeTool(config) => config.validate(),
            BehaviorConfig::MoveTrolley(_) => Ok(()),
            BehaviorConfig::PushCoverageConfig(config) => devices::validate_coverage_config(config),
            BehaviorConfig::StartCleaningDevice
            | BehaviorConfig::StopCleaningDevice
            | BehaviorConfig::StartCoverageMonitoring
            | BehaviorConfig::StopCoverageMonitoring => Ok(()),
        }
    }
}

/// What a successful behavior produced
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorPayload {
    Done,
    CoveragePath(Vec<Pose2D>),
}

/// Why a behavior failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    InvalidConfig(InvalidConfig),
    Gateway(GatewayError),
    /// The actor answered but reported it could not comply
    Refused(String),
}

impl FailureReason {
    /// Short error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::InvalidConfig(_) => "invalid_config",
            FailureReason::Gateway(err) => match err.kind() {
                GatewayErrorKind::Unavailable => "unavailable",
                GatewayErrorKind::Timeout => "timeout",
                GatewayErrorKind::Rejected => "rejected",
                GatewayErrorKind::MalformedResponse => "malformed_response",
            },
            FailureReason::Refused(_) => "refused",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
            FailureReason::Gateway(err) => write!(f, "{err}"),
            FailureReason::Refused(message) => write!(f, "refused: {message}"),
        }
    }
}

impl From<InvalidConfig> for FailureReason {
    fn from(err: InvalidConfig) -> Self {
        FailureReason::InvalidConfig(err)
    }
}

impl From<GatewayError> for FailureReason {
    fn from(err: GatewayError) -> Self {
        FailureReason::Gateway(err)
    }
}

/// Tagged outcome of running a behavior
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorResult {
    Success(BehaviorPayload),
    /// Ran, but produced nothing usable (e.g. no coverage path)
    NoResult,
    Failed(FailureReason),
    Interrupted,
}

/// Payload-free tag of a [`BehaviorResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTag {
    Success,
    NoResult,
    Failed,
    Interrupted,
}

impl BehaviorResult {
    pub fn tag(&self) -> OutcomeTag {
        match self {
            BehaviorResult::Success(_) => OutcomeTag::Success,
            BehaviorResult::NoResult => OutcomeTag::NoResult,
            BehaviorResult::Failed(_) => OutcomeTag::Failed,
            BehaviorResult::Interrupted => OutcomeTag::Interrupted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BehaviorResult::Success(_))
    }
}

/// Shared collaborators every unit runs against
#[derive(Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub gateway: &'a dyn ServiceGateway,
    pub interrupt: &'a InterruptController,
    pub timeouts: &'a TimeoutPolicy,
}

/// Stop calls are retried once on timeout: a device left running is unsafe.
/// Everything else surfaces the first failure.
fn timeout_retries(endpoint: EndpointId) -> u32 {
    match endpoint {
        EndpointId::StopCleaningDevice | EndpointId::StopCoverageMonitoring => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Unconfigured,
    Ready,
    Finished,
}

/// One piece of robot work
pub struct BehaviorUnit<'a> {
    kind: BehaviorKind,
    ctx: BehaviorContext<'a>,
    config: Option<BehaviorConfig>,
    state: UnitState,
    /// Endpoint undoing a side effect this unit started
    engaged: Option<EndpointId>,
    /// Work reached the external actor
    executed: bool,
    recovered: bool,
}

impl<'a> BehaviorUnit<'a> {
    pub fn new(kind: BehaviorKind, ctx: BehaviorContext<'a>) -> Self {
        BehaviorUnit {
            kind,
            ctx,
            config: None,
            state: UnitState::Unconfigured,
            engaged: None,
            executed: false,
            recovered: false,
        }
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    /// Accept parameters for this unit's kind. Fails once the unit has run.
    pub fn configure(&mut self, config: BehaviorConfig) -> Result<(), InvalidConfig> {
        if config.kind() != self.kind {
            return Err(InvalidConfig::KindMismatch {
                unit: self.kind,
                given: config.kind(),
            });
        }
        if self.state == UnitState::Finished {
            return Err(InvalidConfig::AlreadyRun);
        }
        config.validate()?;
        self.config = Some(config);
        self.state = UnitState::Ready;
        Ok(())
    }

    /// Execute the behavior against the gateway.
    ///
    /// If a side effect was started and the run did not succeed, the unit
    /// recovers before returning.
    pub fn run(&mut self) -> BehaviorResult {
        if self.state == UnitState::Finished {
            return BehaviorResult::Failed(InvalidConfig::AlreadyRun.into());
        }
        let Some(config) = self.config.take() else {
            return BehaviorResult::Failed(InvalidConfig::NotConfigured.into());
        };

        let aborted = self.check_interrupt() == InterruptLevel::AbortRequested;
        let result = if aborted && !self.kind.is_cleanup() {
            BehaviorResult::Interrupted
        } else {
            self.executed = true;
            self.execute(&config)
        };
        self.config = Some(config);
        self.state = UnitState::Finished;

        if !result.is_success() && self.engaged.is_some() {
            self.recover();
        }
        result
    }

    fn execute(&mut self, config: &BehaviorConfig) -> BehaviorResult {
        debug!(step = %self.kind, "running behavior");
        match config {
            BehaviorConfig::MoveToPose(config) => self.move_to_pose(config),
            BehaviorConfig::ExploreRoom(config) => self.explore_room(config),
            BehaviorConfig::FollowPath(config) => self.follow_path(config),
            BehaviorConfig::FollowWall(config) => self.follow_wall(config),
            BehaviorConfig::ChangeTool(config) => self.change_tool(config),
            BehaviorConfig::MoveTrolley(config) => self.move_trolley(config),
            BehaviorConfig::StartCleaningDevice => {
                self.switch_on(EndpointId::StartCleaningDevice, EndpointId::StopCleaningDevice)
            }
            BehaviorConfig::StopCleaningDevice => self.switch_off(EndpointId::StopCleaningDevice),
            BehaviorConfig::StartCoverageMonitoring => {
                self.switch_on(EndpointId::StartCoverageMonitoring, EndpointId::StopCoverageMonitoring)
            }
            BehaviorConfig::StopCoverageMonitoring => self.switch_off(EndpointId::StopCoverageMonitoring),
            BehaviorConfig::PushCoverageConfig(config) => self.push_coverage_config(config),
        }
    }

    /// Advisory read of the interrupt signal
    pub fn check_interrupt(&self) -> InterruptLevel {
        self.ctx.interrupt.signal()
    }

    /// Restore the external actor to a neutral state. Only the first call acts.
    pub fn recover(&mut self) {
        if self.recovered {
            return;
        }
        self.recovered = true;

        match self.engaged.take() {
            Some(undo) => {
                info!(step = %self.kind, endpoint = %undo, "recovering behavior");
                if let Err(reason) = self.trigger(undo) {
                    warn!(step = %self.kind, endpoint = %undo, error = reason.kind(), %reason, "recovery call failed");
                }
            }
            None => debug!(step = %self.kind, "nothing to recover"),
        }
    }

    pub fn has_recovered(&self) -> bool {
        self.recovered
    }

    /// False when the run was withdrawn before any request went out
    pub fn has_executed(&self) -> bool {
        self.executed
    }

    /// Blocking call with this unit's timeout and retry policy
    fn call(&self, endpoint: EndpointId, request: ServiceRequest) -> Result<ServiceResponse, GatewayError> {
        let timeout = self.ctx.timeouts.for_endpoint(endpoint);
        let mut retries = timeout_retries(endpoint);
        loop {
            match self.ctx.gateway.call(endpoint, request.clone(), timeout) {
                Err(GatewayError::Timeout(..)) if retries > 0 => {
                    retries -= 1;
                    warn!(step = %self.kind, %endpoint, "call timed out, retrying");
                }
                outcome => return outcome,
            }
        }
    }

    /// Call a trigger-style endpoint and require `success`
    fn trigger(&self, endpoint: EndpointId) -> Result<(), FailureReason> {
        match self.call(endpoint, ServiceRequest::Trigger)? {
            ServiceResponse::Trigger { success: true, .. } => Ok(()),
            ServiceResponse::Trigger { message, .. } => Err(FailureReason::Refused(message)),
            other => Err(GatewayError::MalformedResponse(
                endpoint,
                format!("expected trigger response, got {}", other.variant_name()),
            )
            .into()),
        }
    }

    /// Call an action endpoint that answers with `Done`
    fn action(&self, endpoint: EndpointId, request: ServiceRequest) -> BehaviorResult {
        match self.call(endpoint, request) {
            Ok(ServiceResponse::Done) => BehaviorResult::Success(BehaviorPayload::Done),
            Ok(other) => BehaviorResult::Failed(
                GatewayError::MalformedResponse(
                    endpoint,
                    format!("expected done, got {}", other.variant_name()),
                )
                .into(),
            ),
            Err(err) => BehaviorResult::Failed(err.into()),
        }
    }
}
