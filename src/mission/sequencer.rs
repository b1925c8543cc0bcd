//! Mission sequencer: drives checkpoints and rooms through behavior units.
//!
//! The sequencer is the only place that decides what runs next. Before every
//! dispatch it reads the interrupt signal: a pause suspends it until cleared,
//! an abort unwinds the mission. Stop behaviors armed for the current room
//! run regardless, so devices and the coverage monitor are never left on.

use super::report::{DispatchRecord, MissionOutcome, MissionReport};
use super::{
    CompletionStatus, MissionPlan, MissionState, RobotProperties, RoomCompletionRecord, RoomRef,
};
use crate::behaviors::{
    BehaviorConfig, BehaviorContext, BehaviorKind, BehaviorPayload, BehaviorResult, BehaviorUnit,
    ChangeToolConfig, ExploreRoomConfig, FollowPathConfig, FollowWallConfig, MoveToPoseConfig,
    MoveTrolleyConfig,
};
use crate::common::Pose2D;
use crate::config::CleaningConfig;
use crate::gateway::{CoverageMonitorConfig, ServiceGateway};
use crate::interrupt::{InterruptController, InterruptLevel};
use crate::perception::{extract_mask, RoomMask};
use nalgebra::Point2;
use std::thread;
use tracing::{debug, info, warn};

/// Where the sequencer is in the mission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    ToolPreparing,
    CheckpointLoop,
    RoomLoop,
    RoomCleaning,
    RoomComplete,
    MissionComplete,
    Terminal,
}

/// The mission is unwinding after an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Aborted;

/// Working set for the room being cleaned. Built fresh for every room.
struct ExecutionContext {
    checkpoint: Option<usize>,
    room: RoomRef,
    center: Point2<f64>,
    mask: RoomMask,
    resolution: f64,
    origin: Pose2D,
    map_frame: String,
    robot: RobotProperties,
    stop_monitoring: bool,
    stop_device: bool,
    failed_steps: Vec<BehaviorKind>,
    path_followed: bool,
}

impl ExecutionContext {
    fn status(&self) -> CompletionStatus {
        if self.failed_steps.is_empty() {
            CompletionStatus::Complete
        } else if self.path_followed {
            CompletionStatus::Partial
        } else {
            CompletionStatus::Failed
        }
    }
}

/// Runs one mission pass. Consumed by [`run`](Self::run) or
/// [`clean_single_room`](Self::clean_single_room), which return the report.
pub struct MissionSequencer<'a> {
    gateway: &'a dyn ServiceGateway,
    interrupt: &'a InterruptController,
    config: &'a CleaningConfig,
    state: SequencerState,
    /// Last dispatched unit of the current scope
    active: Option<BehaviorUnit<'a>>,
    report: MissionReport,
}

impl<'a> MissionSequencer<'a> {
    pub fn new(
        gateway: &'a dyn ServiceGateway,
        interrupt: &'a InterruptController,
        config: &'a CleaningConfig,
    ) -> Self {
        MissionSequencer {
            gateway,
            interrupt,
            config,
            state: SequencerState::Idle,
            active: None,
            report: MissionReport::new(),
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Prepare the tool, then visit every checkpoint and clean its rooms in order
    pub fn run(mut self, plan: &MissionPlan, mission: &mut dyn MissionState) -> MissionReport {
        info!(
            checkpoints = plan.checkpoints().len(),
            rooms = plan.room_count(),
            "starting mission"
        );
        let result = self.run_checkpoints(plan, mission);
        self.finish(result)
    }

    /// Clean one room without tool preparation or trolley moves
    pub fn clean_single_room(mut self, room: RoomRef, mission: &mut dyn MissionState) -> MissionReport {
        info!(room = room.index(), "starting single room cleaning");
        self.transition(SequencerState::RoomLoop);
        let result = self.clean_room(None, room, mission);
        self.finish(result)
    }

    fn run_checkpoints(&mut self, plan: &MissionPlan, mission: &mut dyn MissionState) -> Result<(), Aborted> {
        self.transition(SequencerState::ToolPreparing);
        let tool = ChangeToolConfig {
            tool: self.config.profile.tool.clone(),
        };
        self.dispatch(None, None, BehaviorConfig::ChangeTool(tool))?;

        for checkpoint in plan.checkpoints() {
            self.transition(SequencerState::CheckpointLoop);
            info!(checkpoint = checkpoint.id, rooms = checkpoint.rooms.len(), "entering checkpoint");
            let trolley = MoveTrolleyConfig {
                checkpoint: checkpoint.id,
            };
            self.dispatch(Some(checkpoint.id), None, BehaviorConfig::MoveTrolley(trolley))?;

            for &room in &checkpoint.rooms {
                self.transition(SequencerState::RoomLoop);
                self.clean_room(Some(checkpoint.id), room, mission)?;
            }
        }
        Ok(())
    }

    fn finish(mut self, result: Result<(), Aborted>) -> MissionReport {
        match result {
            Ok(()) => {
                self.transition(SequencerState::MissionComplete);
                self.report.outcome = MissionOutcome::Completed;
                info!(rooms = self.report.completions.len(), "mission complete");
            }
            Err(Aborted) => {
                self.recover_active();
                self.report.outcome = MissionOutcome::Aborted;
                warn!(rooms = self.report.completions.len(), "mission aborted");
            }
        }
        self.transition(SequencerState::Terminal);
        self.report.final_state = self.state;
        self.report
    }

    fn clean_room(
        &mut self,
        checkpoint: Option<usize>,
        room: RoomRef,
        mission: &mut dyn MissionState,
    ) -> Result<(), Aborted> {
        let Some(mut ctx) = self.prepare_room(checkpoint, room, &*mission) else {
            return Ok(());
        };
        self.transition(SequencerState::RoomCleaning);
        info!(
            checkpoint = ?checkpoint,
            room = room.index(),
            cells = ctx.mask.foreground_count(),
            "cleaning room"
        );

        let explore = self.exploration_config(&ctx);
        let path = match self.dispatch(checkpoint, Some(room), BehaviorConfig::ExploreRoom(explore))? {
            BehaviorResult::Success(BehaviorPayload::CoveragePath(path)) => path,
            _ => {
                info!(room = room.index(), "exploration gave no coverage path, skipping room");
                self.active = None;
                return Ok(());
            }
        };
        ctx.stop_monitoring = true;

        let outcome = self.run_cleaning_steps(&mut ctx, path, mission);
        if outcome.is_err() {
            self.recover_active();
        }
        self.run_cleanup(&mut ctx);
        self.active = None;

        if outcome.is_ok() {
            self.transition(SequencerState::RoomComplete);
        }
        outcome
    }

    fn prepare_room(
        &self,
        checkpoint: Option<usize>,
        room: RoomRef,
        mission: &dyn MissionState,
    ) -> Option<ExecutionContext> {
        let info = match mission.room_info(room) {
            Ok(info) => info,
            Err(err) => {
                warn!(room = room.index(), error = %err, "room information unavailable, skipping room");
                return None;
            }
        };
        let map = mission.segmentation_map();
        Some(ExecutionContext {
            checkpoint,
            room,
            center: info.center,
            mask: extract_mask(map, room.index()),
            resolution: map.resolution,
            origin: map.origin,
            map_frame: map.frame_id.clone(),
            robot: mission.robot_properties(),
            stop_monitoring: false,
            stop_device: false,
            failed_steps: Vec::new(),
            path_followed: false,
        })
    }

    fn exploration_config(&self, ctx: &ExecutionContext) -> ExploreRoomConfig {
        ExploreRoomConfig {
            mask: ctx.mask.clone(),
            resolution: ctx.resolution,
            origin: ctx.origin,
            robot_radius: ctx.robot.radius,
            coverage_radius: ctx.robot.coverage_radius,
            field_of_view: ctx.robot.field_of_view,
            starting_pose: Pose2D::at(ctx.center),
            planning_mode: self.config.profile.planning_mode,
        }
    }

    /// Steps after exploration, in dispatch order
    fn cleaning_steps(&self, ctx: &ExecutionContext, path: Vec<Pose2D>) -> Vec<BehaviorConfig> {
        let profile = &self.config.profile;
        let mut steps = vec![BehaviorConfig::MoveToPose(MoveToPoseConfig {
            goal: Pose2D::at(ctx.center),
            frame_id: self.config.frames.move_frame.clone(),
        })];
        if profile.enable_cleaning_device {
            steps.push(BehaviorConfig::StartCleaningDevice);
        }
        steps.push(BehaviorConfig::PushCoverageConfig(CoverageMonitorConfig {
            map_frame: ctx.map_frame.clone(),
            robot_frame: self.config.frames.robot_frame.clone(),
            coverage_radius: ctx.robot.coverage_radius,
            offset: ctx.robot.field_of_view.coverage_offset(),
            recording_active: true,
        }));
        steps.push(BehaviorConfig::StartCoverageMonitoring);

        let wall = profile.enable_wall_follow.then(|| FollowWallConfig {
            poses: path.clone(),
            area_mask: ctx.mask.clone(),
            tolerances: self.config.tolerances.wall_follow,
            resolution: ctx.resolution,
            origin: ctx.origin,
            field_of_view: ctx.robot.field_of_view,
            coverage_radius: ctx.robot.coverage_radius,
        });
        steps.push(BehaviorConfig::FollowPath(FollowPathConfig {
            poses: path,
            area_mask: ctx.mask.clone(),
            tolerances: self.config.tolerances.path_follow,
        }));
        if let Some(wall) = wall {
            steps.push(BehaviorConfig::FollowWall(wall));
        }
        steps
    }

    fn run_cleaning_steps(
        &mut self,
        ctx: &mut ExecutionContext,
        path: Vec<Pose2D>,
        mission: &mut dyn MissionState,
    ) -> Result<(), Aborted> {
        for step in self.cleaning_steps(ctx, path) {
            let kind = step.kind();
            let result = self.dispatch(ctx.checkpoint, Some(ctx.room), step)?;
            if kind == BehaviorKind::StartCleaningDevice {
                ctx.stop_device = true;
            }
            // dispatch already turned Interrupted into Aborted
            match result {
                BehaviorResult::Success(_) => {
                    if kind == BehaviorKind::FollowPath {
                        ctx.path_followed = true;
                    }
                }
                _ => {
                    ctx.failed_steps.push(kind);
                    if !self.config.profile.continue_after_step_failure {
                        warn!(room = ctx.room.index(), step = %kind, "abandoning remaining cleaning steps");
                        break;
                    }
                }
            }
        }

        self.gate()?;
        let record = RoomCompletionRecord {
            room: ctx.room,
            status: ctx.status(),
        };
        info!(
            room = ctx.room.index(),
            status = ?record.status,
            failed_steps = ctx.failed_steps.len(),
            "room finished"
        );
        mission.checkout_completed_room(record);
        self.report.completions.push(record);
        Ok(())
    }

    /// Stop what this room switched on. Honors pause, ignores abort.
    fn run_cleanup(&mut self, ctx: &mut ExecutionContext) {
        let mut steps = Vec::new();
        if std::mem::take(&mut ctx.stop_monitoring) {
            steps.push(BehaviorConfig::StopCoverageMonitoring);
        }
        if std::mem::take(&mut ctx.stop_device) {
            steps.push(BehaviorConfig::StopCleaningDevice);
        }
        for step in steps {
            self.await_clearance();
            self.execute(ctx.checkpoint, Some(ctx.room), step);
        }
    }

    /// Block while paused. Returns the first level that is not a pause.
    fn await_clearance(&self) -> InterruptLevel {
        let mut paused = false;
        loop {
            match self.interrupt.signal() {
                InterruptLevel::PauseRequested => {
                    if !paused {
                        info!(state = ?self.state, "mission paused");
                        paused = true;
                    }
                    self.interrupt.acknowledge_pause();
                    thread::sleep(self.config.profile.pause_poll_interval);
                }
                level => {
                    if paused {
                        info!(state = ?self.state, "mission resumed");
                    }
                    return level;
                }
            }
        }
    }

    fn gate(&self) -> Result<(), Aborted> {
        match self.await_clearance() {
            InterruptLevel::AbortRequested => Err(Aborted),
            _ => Ok(()),
        }
    }

    fn dispatch(
        &mut self,
        checkpoint: Option<usize>,
        room: Option<RoomRef>,
        config: BehaviorConfig,
    ) -> Result<BehaviorResult, Aborted> {
        self.gate()?;
        match self.execute(checkpoint, room, config) {
            BehaviorResult::Interrupted => Err(Aborted),
            result => Ok(result),
        }
    }

    /// Create, configure and run one unit, recording what happened
    fn execute(&mut self, checkpoint: Option<usize>, room: Option<RoomRef>, config: BehaviorConfig) -> BehaviorResult {
        let kind = config.kind();
        let mut unit = BehaviorUnit::new(kind, self.behavior_context());
        let result = match unit.configure(config) {
            Ok(()) => unit.run(),
            Err(err) => BehaviorResult::Failed(err.into()),
        };

        let room_index = room.map(|r| r.index());
        if !unit.has_executed() && result == BehaviorResult::Interrupted {
            // Abort landed between the gate and the unit: nothing reached the robot
            debug!(checkpoint, room = room_index, step = %kind, "step withdrawn before dispatch");
            return result;
        }
        match &result {
            BehaviorResult::Success(_) => debug!(checkpoint, room = room_index, step = %kind, "step succeeded"),
            BehaviorResult::NoResult => info!(checkpoint, room = room_index, step = %kind, "step produced no result"),
            BehaviorResult::Failed(reason) => warn!(
                checkpoint,
                room = room_index,
                step = %kind,
                error = reason.kind(),
                %reason,
                "step failed"
            ),
            BehaviorResult::Interrupted => warn!(checkpoint, room = room_index, step = %kind, "step interrupted"),
        }

        if unit.has_recovered() {
            self.report.recoveries.push(kind);
        }
        self.report.dispatched.push(DispatchRecord {
            checkpoint,
            room,
            kind,
            outcome: result.tag(),
        });
        self.active = Some(unit);
        result
    }

    /// Recover the last dispatched unit unless it already did
    fn recover_active(&mut self) {
        if let Some(unit) = self.active.as_mut() {
            if !unit.has_recovered() {
                unit.recover();
                self.report.recoveries.push(unit.kind());
            }
        }
    }

    fn behavior_context(&self) -> BehaviorContext<'a> {
        let config: &'a CleaningConfig = self.config;
        BehaviorContext {
            gateway: self.gateway,
            interrupt: self.interrupt,
            timeouts: &config.timeouts,
        }
    }

    fn transition(&mut self, next: SequencerState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "sequencer transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::test_support::{ok_trigger, FakeGateway};
    use crate::behaviors::OutcomeTag;
    use crate::common::FieldOfView;
    use crate::gateway::{EndpointId, ServiceResponse};
    use crate::mission::{Checkpoint, InMemoryMissionStore, RoomInfo};
    use crate::error::GatewayError;
    use crate::perception::LabeledMap;
    use tracing_test::traced_test;

    fn store() -> InMemoryMissionStore {
        let map = LabeledMap::new(4, 1, vec![1, 1, 2, 2]).unwrap();
        InMemoryMissionStore::new(
            vec![
                RoomInfo {
                    room: RoomRef(0),
                    center: Point2::new(0.05, 0.0),
                },
                RoomInfo {
                    room: RoomRef(1),
                    center: Point2::new(0.15, 0.0),
                },
            ],
            RobotProperties {
                radius: 0.325,
                coverage_radius: 0.25,
                field_of_view: FieldOfView::new([(0.04, 0.136), (0.04, -0.364), (0.54, -0.364), (0.54, 0.136)]),
            },
            map,
        )
    }

    fn answer(endpoint: EndpointId) -> Result<ServiceResponse, GatewayError> {
        match endpoint {
            EndpointId::ExploreRoom => Ok(ServiceResponse::CoveragePath(Some(vec![Pose2D::new(0.0, 0.0, 0.0)]))),
            EndpointId::StartCleaningDevice
            | EndpointId::StopCleaningDevice
            | EndpointId::StartCoverageMonitoring
            | EndpointId::StopCoverageMonitoring => ok_trigger(),
            _ => Ok(ServiceResponse::Done),
        }
    }

    #[test]
    fn missing_room_info_skips_room() {
        let gateway = FakeGateway::new(|endpoint, _| answer(endpoint));
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        let mut mission = store();

        let report = MissionSequencer::new(&gateway, &interrupt, &config).clean_single_room(RoomRef(7), &mut mission);
        assert!(report.dispatched.is_empty());
        assert!(report.completions.is_empty());
        assert_eq!(report.outcome, MissionOutcome::Completed);
        assert_eq!(report.final_state, SequencerState::Terminal);
    }

    #[test]
    fn single_room_skips_mission_level_steps() {
        let gateway = FakeGateway::new(|endpoint, _| answer(endpoint));
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        let mut mission = store();

        let report = MissionSequencer::new(&gateway, &interrupt, &config).clean_single_room(RoomRef(1), &mut mission);
        assert!(report.mission_level_kinds().is_empty());
        assert_eq!(report.completion_for(RoomRef(1)).map(|r| r.status), Some(CompletionStatus::Complete));
        assert!(report.dispatched.iter().all(|r| r.checkpoint.is_none()));
    }

    #[test]
    fn failed_tool_change_does_not_stop_mission() {
        let gateway = FakeGateway::new(|endpoint, _| match endpoint {
            EndpointId::ChangeTool => Ok(ServiceResponse::Trigger {
                success: false,
                message: String::new(),
            }),
            _ => answer(endpoint),
        });
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        let mut mission = store();
        let plan = MissionPlan::new(vec![Checkpoint {
            id: 0,
            rooms: vec![RoomRef(0)],
        }])
        .unwrap();

        let report = MissionSequencer::new(&gateway, &interrupt, &config).run(&plan, &mut mission);
        assert_eq!(report.dispatched[0].kind, BehaviorKind::ChangeTool);
        assert_eq!(report.dispatched[0].outcome, OutcomeTag::Failed);
        assert_eq!(report.completions.len(), 1);
    }

    #[test]
    fn abort_before_start_dispatches_nothing() {
        let gateway = FakeGateway::new(|endpoint, _| answer(endpoint));
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        interrupt.abort();
        let mut mission = store();
        let plan = MissionPlan::new(vec![Checkpoint {
            id: 0,
            rooms: vec![RoomRef(0)],
        }])
        .unwrap();

        let report = MissionSequencer::new(&gateway, &interrupt, &config).run(&plan, &mut mission);
        assert!(gateway.calls().is_empty());
        assert_eq!(report.outcome, MissionOutcome::Aborted);
        assert!(report.recoveries.is_empty());
    }

    #[test]
    fn step_withdrawn_by_abort_is_not_recorded() {
        let gateway = FakeGateway::new(|endpoint, _| answer(endpoint));
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        let mut sequencer = MissionSequencer::new(&gateway, &interrupt, &config);

        let started = sequencer.execute(None, Some(RoomRef(0)), BehaviorConfig::StartCoverageMonitoring);
        assert!(started.is_success());
        interrupt.abort();
        let moved = sequencer.execute(
            None,
            Some(RoomRef(0)),
            BehaviorConfig::MoveTrolley(MoveTrolleyConfig { checkpoint: 0 }),
        );

        assert_eq!(moved, BehaviorResult::Interrupted);
        assert_eq!(gateway.calls(), vec![EndpointId::StartCoverageMonitoring]);
        assert_eq!(sequencer.report.dispatched.len(), 1);
        assert_eq!(sequencer.report.dispatched[0].kind, BehaviorKind::StartCoverageMonitoring);

        sequencer.recover_active();
        assert_eq!(sequencer.report.recoveries, vec![BehaviorKind::StartCoverageMonitoring]);
        assert_eq!(
            gateway.calls(),
            vec![EndpointId::StartCoverageMonitoring, EndpointId::StopCoverageMonitoring]
        );
    }

    #[test]
    fn status_reflects_path_following() {
        let mut ctx = ExecutionContext {
            checkpoint: None,
            room: RoomRef(0),
            center: Point2::origin(),
            mask: RoomMask::empty(1, 1),
            resolution: 0.05,
            origin: Pose2D::new(0.0, 0.0, 0.0),
            map_frame: "map".into(),
            robot: store().robot_properties(),
            stop_monitoring: false,
            stop_device: false,
            failed_steps: Vec::new(),
            path_followed: false,
        };
        assert_eq!(ctx.status(), CompletionStatus::Complete);
        ctx.failed_steps.push(BehaviorKind::FollowWall);
        assert_eq!(ctx.status(), CompletionStatus::Failed);
        ctx.path_followed = true;
        assert_eq!(ctx.status(), CompletionStatus::Partial);
    }

    #[test]
    #[traced_test]
    fn failed_step_is_logged_with_room_and_kind() {
        let gateway = FakeGateway::new(|endpoint, _| match endpoint {
            EndpointId::FollowPath => Err(GatewayError::Rejected(endpoint, "path blocked".into())),
            _ => answer(endpoint),
        });
        let (interrupt, config) = (InterruptController::new(), CleaningConfig::default());
        let mut mission = store();

        let report = MissionSequencer::new(&gateway, &interrupt, &config).clean_single_room(RoomRef(0), &mut mission);
        assert_eq!(report.completion_for(RoomRef(0)).map(|r| r.status), Some(CompletionStatus::Failed));
        assert!(logs_contain("step failed"));
        assert!(logs_contain("step=follow_path"));
        assert!(logs_contain("path blocked"));
    }
}
