// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use std::time::Duration;
use thiserror::Error;

/// Represents all kind of errors which can occur while solving, dispatching or collecting.
#[derive(Error, Debug)]
pub enum ManipulatorException {
    /// OutOfReachError is returned if the target lies outside the annulus the first two links
    /// can span, i.e. an arc-cosine argument of the triangle decomposition left \[-1, 1\].
    #[error("Target distance {distance:.3} is outside of the reachable range [{min_reach:.3}, {max_reach:.3}]")]
    OutOfReachError {
        /// Straight-line distance from the base joint to the target.
        distance: f64,
        /// Smallest reachable distance, `|r1 - r2|`.
        min_reach: f64,
        /// Largest reachable distance, `r1 + r2`.
        max_reach: f64,
    },

    /// InvalidTargetError is returned for degenerate targets (zero distance or non-finite values).
    #[error("{message:?}")]
    InvalidTargetError { message: String },

    /// InvalidGeometryError is returned if link lengths are not positive finite numbers.
    #[error("{message:?}")]
    InvalidGeometryError { message: String },

    /// ActuatorUnavailableError is returned if an actuator did not acknowledge readiness in time.
    #[error("{actuator} actuator did not become ready within {timeout:?}")]
    ActuatorUnavailableError {
        /// Name of the actuator which was not ready.
        actuator: String,
        /// Total bounded wait which elapsed, summed over all readiness attempts.
        timeout: Duration,
    },

    /// GripperException is returned if a gripper goal finished without delivering a result.
    #[error("{message:?}")]
    GripperException { message: String },

    /// CaptureException is returned if the sensor did not deliver a frame or it could not be stored.
    #[error("{message:?}")]
    CaptureException { message: String },

    /// ConfigException is returned if a configuration cannot be read or is inconsistent.
    #[error("{message:?}")]
    ConfigException { message: String },

    /// CancelledError is returned if a run was cancelled through its cancel token.
    #[error("Run was cancelled before completion")]
    CancelledError,
}

/// creates a CaptureException from a string slice
pub(crate) fn create_capture_exception(message: &str) -> ManipulatorException {
    ManipulatorException::CaptureException {
        message: message.to_string(),
    }
}

/// creates a ConfigException from a string slice
pub(crate) fn create_config_exception(message: &str) -> ManipulatorException {
    ManipulatorException::ConfigException {
        message: message.to_string(),
    }
}

/// Result type which can have ManipulatorException as Error
pub type ManipulatorResult<T> = Result<T, ManipulatorException>;
