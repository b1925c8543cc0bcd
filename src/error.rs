//! Error types for the cleaning mission core.
//!
//! Three families of errors exist:
//!
//! - [`GatewayError`]: environmental failures of a remote call. Behavior units
//!   map these to `BehaviorResult::Failed`; they never reach the sequencer as `Err`.
//! - [`InvalidConfig`]: a behavior was configured with missing or out-of-range
//!   parameters. Treated as a failed step, never a crash.
//! - [`MissionError`]: problems with mission data or configuration loading.
//!
//! Expected negative outcomes (no coverage path) and interrupts are not errors
//! and are modeled in `BehaviorResult` instead.

use crate::behaviors::BehaviorKind;
use crate::gateway::EndpointId;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results carrying a mission error.
pub type MissionResult<T> = std::result::Result<T, MissionError>;

/// Failure of a single remote call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("endpoint {0} is unavailable")]
    Unavailable(EndpointId),

    #[error("endpoint {0} did not respond within {1:?}")]
    Timeout(EndpointId, Duration),

    #[error("endpoint {0} rejected the request: {1}")]
    Rejected(EndpointId, String),

    #[error("endpoint {0} returned a malformed response: {1}")]
    MalformedResponse(EndpointId, String),
}

/// Discriminant of [`GatewayError`], used in log fields and retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Unavailable,
    Timeout,
    Rejected,
    MalformedResponse,
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::Unavailable(_) => GatewayErrorKind::Unavailable,
            GatewayError::Timeout(..) => GatewayErrorKind::Timeout,
            GatewayError::Rejected(..) => GatewayErrorKind::Rejected,
            GatewayError::MalformedResponse(..) => GatewayErrorKind::MalformedResponse,
        }
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayErrorKind::Unavailable => "unavailable",
            GatewayErrorKind::Timeout => "timeout",
            GatewayErrorKind::Rejected => "rejected",
            GatewayErrorKind::MalformedResponse => "malformed_response",
        };
        f.write_str(name)
    }
}

/// A behavior configuration that cannot be dispatched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidConfig {
    #[error("{unit} cannot be configured with {given} parameters")]
    KindMismatch {
        unit: BehaviorKind,
        given: BehaviorKind,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("path has no poses")]
    EmptyPath,

    #[error("mask has zero area")]
    EmptyMask,

    #[error("behavior was run before being configured")]
    NotConfigured,

    #[error("behavior has already run")]
    AlreadyRun,
}

impl InvalidConfig {
    /// Rejects negative, NaN and infinite values.
    pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), InvalidConfig> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(InvalidConfig::OutOfRange { field, value })
        }
    }

    /// Rejects zero, negative, NaN and infinite values.
    pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), InvalidConfig> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(InvalidConfig::OutOfRange { field, value })
        }
    }
}

/// Errors raised while loading or reading mission data.
#[derive(Error, Debug)]
pub enum MissionError {
    #[error("room {0} is not in the room catalogue")]
    UnknownRoom(usize),

    #[error("mission plan has no checkpoints")]
    EmptyPlan,

    #[error("labeled map is {width}x{height} but holds {len} labels")]
    MapSize {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("configuration validation error: {0}")]
    Validation(String),
}
