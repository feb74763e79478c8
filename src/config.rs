// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Configuration of an automatic collection run.
//!
//! The pose list is data, not code, so the same sequencer can be used for other arm setups. A
//! configuration is usually read from a JSON file:
//! ```json
//! {
//!   "geometry": { "r1": 130.0, "r2": 124.0, "r3": 126.0 },
//!   "poses": [ { "x": 150.0, "y": 45.0, "z": 130.0 } ],
//!   "repetitions": 2,
//!   "settle_before_capture": 6.0
//! }
//! ```
//! Missing fields take the values of [`CollectionConfig::default`]. Durations are in seconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exception::{create_config_exception, ManipulatorResult};
use crate::gripper::{Gripper, GripperActuator};
use crate::kinematics::LinkGeometry;
use crate::robot::sequencer::{check_capture_range, PoseStep, SequenceTimings};

/// Everything needed for one automatic collection run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    /// Link lengths of the arm.
    pub geometry: LinkGeometry,
    /// Targets visited in order during each pass.
    pub poses: Vec<PoseStep>,
    /// Number of full passes over `poses`.
    pub repetitions: u32,
    /// Index of the first capture.
    pub start_index: u32,
    /// Transition time of every trajectory command.
    #[serde(with = "seconds")]
    pub transition_time: Duration,
    /// Default wait between publishing a move and capturing.
    #[serde(with = "seconds")]
    pub settle_before_capture: Duration,
    /// Default wait after a capture.
    #[serde(with = "seconds")]
    pub settle_after_capture: Duration,
    /// Wait after the camera was opened before the first move.
    #[serde(with = "seconds")]
    pub warmup: Duration,
    /// Number of stale frames read and dropped before every capture.
    pub discard_frames: usize,
    /// Whether gripper commands block until the gripper reports a result.
    pub await_gripper: bool,
    /// Bounded wait for the gripper to report readiness.
    #[serde(with = "seconds")]
    pub gripper_ready_timeout: Duration,
    /// Additional readiness attempts after the first one timed out.
    pub gripper_ready_retries: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let timings = SequenceTimings::default();
        CollectionConfig {
            geometry: LinkGeometry::default(),
            poses: vec![
                PoseStep::new(150., 45., 130.),
                PoseStep::new(160., 50., 180.),
                PoseStep::new(205., 45., 130.),
                PoseStep::new(210., -55., 130.),
                PoseStep::new(155., -40., 130.),
            ],
            repetitions: 30,
            start_index: 1,
            transition_time: timings.transition_time,
            settle_before_capture: timings.settle_before_capture,
            settle_after_capture: timings.settle_after_capture,
            warmup: Duration::from_secs(2),
            discard_frames: 5,
            await_gripper: false,
            gripper_ready_timeout: Duration::from_secs(1),
            gripper_ready_retries: 0,
        }
    }
}

impl CollectionConfig {
    /// Parses a configuration from a JSON string and validates it.
    /// # Errors
    /// * [`ConfigException`](`crate::exception::ManipulatorException::ConfigException`) if the
    ///   string is not a valid configuration.
    pub fn from_json(json: &str) -> ManipulatorResult<Self> {
        let config: CollectionConfig = serde_json::from_str(json)
            .map_err(|e| create_config_exception(&format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    /// # Errors
    /// * [`ConfigException`](`crate::exception::ManipulatorException::ConfigException`) if the
    ///   file cannot be read or is not a valid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ManipulatorResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            create_config_exception(&format!("cannot read {}: {}", path.display(), e))
        })?;
        CollectionConfig::from_json(&json)
    }

    /// Pretty-printed JSON representation.
    pub fn to_json(&self) -> ManipulatorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| create_config_exception(&format!("cannot serialize: {}", e)))
    }

    /// Checks the link lengths, the pose list, the number of repetitions and that all capture
    /// indices of a run fit into a `u32`.
    pub fn validate(&self) -> ManipulatorResult<()> {
        self.geometry
            .validate()
            .map_err(|e| create_config_exception(&e.to_string()))?;
        if self.poses.is_empty() {
            return Err(create_config_exception("pose list is empty"));
        }
        if self.repetitions == 0 {
            return Err(create_config_exception("repetitions must be at least 1"));
        }
        check_capture_range(self.start_index, self.repetitions, self.poses.len())
    }

    /// Gripper driven by `actuator` with the configured readiness wait and completion handling.
    pub fn gripper<G: GripperActuator>(&self, actuator: G) -> Gripper<G> {
        Gripper::new(actuator)
            .with_ready_timeout(self.gripper_ready_timeout)
            .with_ready_retries(self.gripper_ready_retries)
            .with_await_completion(self.await_gripper)
    }

    pub fn timings(&self) -> SequenceTimings {
        SequenceTimings {
            transition_time: self.transition_time,
            settle_before_capture: self.settle_before_capture,
            settle_after_capture: self.settle_after_capture,
        }
    }
}

/// Serializes a [`Duration`] as floating point seconds.
pub(crate) mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0. || secs >= u64::MAX as f64 {
            return Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {}",
                secs
            )));
        }
        Ok(Duration::from_secs_f64(secs))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] Duration);
            let value: Option<Wrapper> = Option::deserialize(deserializer)?;
            Ok(value.map(|Wrapper(duration)| duration))
        }
    }
}
