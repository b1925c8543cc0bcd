pub mod behaviors;
pub mod common;
pub mod config;
pub mod error;
pub mod gateway;
pub mod interrupt;
pub mod mission;
pub mod perception;

use crate::config::CleaningConfig;
use crate::error::MissionResult;
use crate::gateway::ServiceGateway;
use crate::interrupt::InterruptController;
use crate::mission::{MissionPlan, MissionReport, MissionSequencer, MissionState, RoomRef};
use std::sync::Arc;

/// Core functionality for the wet cleaning robot
pub struct WetCleaningCore {
    gateway: Arc<dyn ServiceGateway>,
    interrupt: InterruptController,
    config: CleaningConfig,
}

impl WetCleaningCore {
    /// Create a core over `gateway`. Fails when `config` is invalid.
    pub fn new(gateway: Arc<dyn ServiceGateway>, config: CleaningConfig) -> MissionResult<Self> {
        config.validate()?;
        Ok(WetCleaningCore {
            gateway,
            interrupt: InterruptController::new(),
            config,
        })
    }

    /// Handle for pausing, resuming or aborting whatever mission is running
    pub fn interrupt(&self) -> InterruptController {
        self.interrupt.clone()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Run a full mission. Blocks until it completes or aborts.
    pub fn run_mission(&self, plan: &MissionPlan, mission: &mut dyn MissionState) -> MissionReport {
        self.sequencer().run(plan, mission)
    }

    /// Clean a single room without preparing the tool or moving the trolley
    pub fn clean_room(&self, room: RoomRef, mission: &mut dyn MissionState) -> MissionReport {
        self.sequencer().clean_single_room(room, mission)
    }

    fn sequencer(&self) -> MissionSequencer<'_> {
        MissionSequencer::new(self.gateway.as_ref(), &self.interrupt, &self.config)
    }
}
