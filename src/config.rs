//! Deployment configuration using Figment
//!
//! Configuration is layered:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed with `WET_CLEANING_`, nested keys split on `__`
//!
//! ```text
//! WET_CLEANING_PROFILE__ENABLE_WALL_FOLLOW=true
//! WET_CLEANING_TIMEOUTS__MOTION=10m
//! WET_CLEANING_ENDPOINTS__FOLLOW_PATH=/my_path_server
//! ```

use crate::common::PathTolerances;
use crate::error::{MissionError, MissionResult};
use crate::gateway::{EndpointId, EndpointMap};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    pub frames: FrameConfig,
    /// Service name overrides per endpoint
    pub endpoints: HashMap<EndpointId, String>,
    pub timeouts: TimeoutPolicy,
    pub profile: DeploymentProfile,
    pub tolerances: ToleranceConfig,
}

/// Frame ids used in outgoing requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub robot_frame: String,
    /// Frame of move-to-pose goals
    pub move_frame: String,
}

/// Per-endpoint-family call timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    #[serde(with = "humantime_serde")]
    pub default: Duration,
    /// Move-to-pose, path and wall following, trolley movement
    #[serde(with = "humantime_serde")]
    pub motion: Duration,
    #[serde(with = "humantime_serde")]
    pub exploration: Duration,
    #[serde(with = "humantime_serde")]
    pub tool_change: Duration,
}

/// Switches distinguishing one deployment from another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProfile {
    pub enable_wall_follow: bool,
    pub enable_cleaning_device: bool,
    /// Keep cleaning a room after a failed step instead of skipping to cleanup
    pub continue_after_step_failure: bool,
    /// Tool selector passed to the tool changer
    pub tool: String,
    pub planning_mode: u8,
    #[serde(with = "humantime_serde")]
    pub pause_poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub path_follow: PathTolerances,
    pub wall_follow: PathTolerances,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            log_level: "info".to_string(),
            frames: FrameConfig::default(),
            endpoints: HashMap::new(),
            timeouts: TimeoutPolicy::default(),
            profile: DeploymentProfile::default(),
            tolerances: ToleranceConfig::default(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            robot_frame: "base_link".to_string(),
            move_frame: "map".to_string(),
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy {
            default: Duration::from_secs(5),
            motion: Duration::from_secs(600),
            exploration: Duration::from_secs(60),
            tool_change: Duration::from_secs(120),
        }
    }
}

impl Default for DeploymentProfile {
    fn default() -> Self {
        DeploymentProfile {
            enable_wall_follow: false,
            enable_cleaning_device: false,
            continue_after_step_failure: true,
            tool: "wet_floor_cleaning".to_string(),
            planning_mode: 2,
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        ToleranceConfig {
            path_follow: PathTolerances::PATH_FOLLOW,
            wall_follow: PathTolerances::WALL_FOLLOW,
        }
    }
}

impl TimeoutPolicy {
    pub fn for_endpoint(&self, endpoint: EndpointId) -> Duration {
        match endpoint {
            EndpointId::MoveToPose
            | EndpointId::FollowPath
            | EndpointId::FollowWall
            | EndpointId::MoveTrolley => self.motion,
            EndpointId::ExploreRoom | EndpointId::GetCoverageMap => self.exploration,
            EndpointId::ChangeTool => self.tool_change,
            _ => self.default,
        }
    }
}

impl CleaningConfig {
    /// Load defaults, then `path` if given, then `WET_CLEANING_*` environment overrides
    pub fn load(path: Option<&Path>) -> MissionResult<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: CleaningConfig = figment
            .merge(Env::prefixed("WET_CLEANING_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every call fail or every pause spin
    pub fn validate(&self) -> MissionResult<()> {
        let timeouts = [
            ("timeouts.default", self.timeouts.default),
            ("timeouts.motion", self.timeouts.motion),
            ("timeouts.exploration", self.timeouts.exploration),
            ("timeouts.tool_change", self.timeouts.tool_change),
            ("profile.pause_poll_interval", self.profile.pause_poll_interval),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(MissionError::Validation(format!("{name} must be positive")));
            }
        }

        for (name, tolerances) in [
            ("tolerances.path_follow", &self.tolerances.path_follow),
            ("tolerances.wall_follow", &self.tolerances.wall_follow),
        ] {
            let values = [tolerances.path, tolerances.goal_position, tolerances.goal_angle];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(MissionError::Validation(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }

        if let Some((endpoint, _)) = self.endpoints.iter().find(|(_, name)| name.trim().is_empty()) {
            return Err(MissionError::Validation(format!(
                "endpoint {endpoint} has an empty service name"
            )));
        }
        Ok(())
    }

    pub fn endpoint_map(&self) -> EndpointMap {
        EndpointMap::resolve(&self.endpoints)
    }
}
