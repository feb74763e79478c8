// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the PoseSequencer type which drives the arm through a list of poses and triggers a
//! capture at every pose.

use std::time::Duration;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::exception::{create_config_exception, ManipulatorException, ManipulatorResult};
use crate::robot::dispatcher::{TrajectoryDispatcher, DEFAULT_TRANSITION_TIME};
use crate::robot::JointActuator;
use crate::utils::{CancelToken, Delay};

/// One entry of a pose list: a Cartesian target and optional dwell times overriding the
/// sequencer's defaults.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct PoseStep {
    /// Target relative to the base joint. \[mm\]
    pub x: f64,
    /// Target relative to the base joint. \[mm\]
    pub y: f64,
    /// Target relative to the base joint. \[mm\]
    pub z: f64,
    /// Wait between publishing the move and capturing.
    #[serde(default, with = "crate::config::seconds::option")]
    pub settle_before_capture: Option<Duration>,
    /// Wait after the capture before moving on.
    #[serde(default, with = "crate::config::seconds::option")]
    pub settle_after_capture: Option<Duration>,
}

impl PoseStep {
    /// Creates a pose which uses the sequencer's default dwell times.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        PoseStep {
            x,
            y,
            z,
            settle_before_capture: None,
            settle_after_capture: None,
        }
    }

    /// Overrides the dwell times for this pose.
    pub fn with_settle(mut self, before_capture: Duration, after_capture: Duration) -> Self {
        self.settle_before_capture = Some(before_capture);
        self.settle_after_capture = Some(after_capture);
        self
    }

    pub fn target(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Default timing of a run.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SequenceTimings {
    /// Transition time of every trajectory command.
    pub transition_time: Duration,
    /// Wait between publishing the move and capturing.
    pub settle_before_capture: Duration,
    /// Wait after the capture before moving on.
    pub settle_after_capture: Duration,
}

impl Default for SequenceTimings {
    fn default() -> Self {
        SequenceTimings {
            transition_time: DEFAULT_TRANSITION_TIME,
            settle_before_capture: Duration::from_secs(6),
            settle_after_capture: Duration::from_secs(3),
        }
    }
}

/// Step of a run. Every run ends in `Idle`, also when it was aborted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    /// The trajectory command for the pose with the given position in the list is being issued.
    Moving { pose: usize },
    /// Waiting before or after a capture.
    Settling { pose: usize },
    /// The capture callback is running.
    Capturing { pose: usize, index: u32 },
}

/// A capture which did not succeed. The run continues after it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFailure {
    /// Capture index passed to the callback.
    pub index: u32,
    /// Position of the pose in the list.
    pub pose: usize,
    /// Description of the error.
    pub message: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    /// Number of trajectory commands which were published.
    pub poses_reached: usize,
    /// Number of times the capture callback was invoked.
    pub captures_attempted: usize,
    /// Captures which returned an error.
    pub failed_captures: Vec<CaptureFailure>,
    /// Index which the next capture would have used.
    pub next_index: u32,
}

impl RunReport {
    /// True if every capture of the run succeeded.
    pub fn is_success(&self) -> bool {
        self.failed_captures.is_empty()
    }
}

/// Checks that every capture index of a run fits into a `u32`, including the index following
/// the last capture.
/// # Errors
/// * [`ConfigException`](`crate::exception::ManipulatorException::ConfigException`) if the
///   last index would overflow.
pub(crate) fn check_capture_range(
    start_index: u32,
    repetitions: u32,
    poses: usize,
) -> ManipulatorResult<()> {
    let captures = u64::from(repetitions) * poses as u64;
    if u64::from(start_index) + captures > u64::from(u32::MAX) {
        return Err(create_config_exception(&format!(
            "{} captures starting at index {} exceed the largest capture index {}",
            captures,
            start_index,
            u32::MAX
        )));
    }
    Ok(())
}

/// Drives a [`TrajectoryDispatcher`] through a pose list.
///
/// A run is strictly sequential: move, settle, capture, settle, next pose. No two trajectory
/// commands are in flight at the same time. The capture index increases monotonically over the
/// whole run and is not reset between repetitions.
pub struct PoseSequencer<D: Delay> {
    delay: D,
    timings: SequenceTimings,
    repetitions: u32,
    start_index: u32,
    cancel: CancelToken,
    state: SequencerState,
    observer: Option<Box<dyn FnMut(SequencerState)>>,
}

impl<D: Delay> PoseSequencer<D> {
    /// Creates a sequencer which passes over the list once, starting at capture index 1.
    pub fn new(delay: D, timings: SequenceTimings) -> Self {
        PoseSequencer {
            delay,
            timings,
            repetitions: 1,
            start_index: 1,
            cancel: CancelToken::new(),
            state: SequencerState::Idle,
            observer: None,
        }
    }

    /// Number of full passes over the pose list.
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Index passed to the first capture.
    pub fn with_start_index(mut self, start_index: u32) -> Self {
        self.start_index = start_index;
        self
    }

    /// Uses `cancel` instead of the sequencer's own token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Calls `observer` with every state the sequencer enters, including the final `Idle`.
    pub fn with_observer<O: FnMut(SequencerState) + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Token which stops the run before its next move.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Moves to every pose of `poses`, `repetitions` times, and calls `on_capture` at each one.
    ///
    /// Capture errors are logged and collected in the [`RunReport`] but do not stop the run.
    /// # Errors
    /// * [`OutOfReachError`](`crate::exception::ManipulatorException::OutOfReachError`) and
    ///   [`InvalidTargetError`](`crate::exception::ManipulatorException::InvalidTargetError`) abort
    ///   the run at the first unreachable pose.
    /// * [`CancelledError`](`crate::exception::ManipulatorException::CancelledError`) if the
    ///   cancel token was set.
    /// * Errors of the actuator abort the run.
    /// * [`ConfigException`](`crate::exception::ManipulatorException::ConfigException`) before
    ///   the first move if the capture indices of the run do not fit into a `u32`.
    pub fn run_sequence<A, F>(
        &mut self,
        dispatcher: &mut TrajectoryDispatcher<A>,
        poses: &[PoseStep],
        on_capture: F,
    ) -> ManipulatorResult<RunReport>
    where
        A: JointActuator,
        F: FnMut(u32) -> ManipulatorResult<()>,
    {
        info!(
            poses = poses.len(),
            repetitions = self.repetitions,
            "starting pose sequence"
        );
        let result = self.run_passes(dispatcher, poses, on_capture);
        self.transition(SequencerState::Idle);
        match &result {
            Ok(report) => info!(
                poses_reached = report.poses_reached,
                failed_captures = report.failed_captures.len(),
                "pose sequence finished"
            ),
            Err(e) => error!("pose sequence aborted: {}", e),
        }
        result
    }

    fn run_passes<A, F>(
        &mut self,
        dispatcher: &mut TrajectoryDispatcher<A>,
        poses: &[PoseStep],
        mut on_capture: F,
    ) -> ManipulatorResult<RunReport>
    where
        A: JointActuator,
        F: FnMut(u32) -> ManipulatorResult<()>,
    {
        check_capture_range(self.start_index, self.repetitions, poses.len())?;
        let mut report = RunReport {
            next_index: self.start_index,
            ..RunReport::default()
        };
        for repetition in 0..self.repetitions {
            for (pose, step) in poses.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    warn!(repetition, pose, "pose sequence cancelled");
                    return Err(ManipulatorException::CancelledError);
                }
                self.transition(SequencerState::Moving { pose });
                dispatcher.move_to(&step.target(), self.timings.transition_time)?;
                report.poses_reached += 1;

                self.transition(SequencerState::Settling { pose });
                self.delay.sleep(
                    step.settle_before_capture
                        .unwrap_or(self.timings.settle_before_capture),
                );

                let index = report.next_index;
                self.transition(SequencerState::Capturing { pose, index });
                report.captures_attempted += 1;
                match on_capture(index) {
                    Ok(()) => info!(index, pose, "captured"),
                    Err(e) => {
                        warn!(index, pose, "capture failed: {}", e);
                        report.failed_captures.push(CaptureFailure {
                            index,
                            pose,
                            message: e.to_string(),
                        });
                    }
                }

                self.transition(SequencerState::Settling { pose });
                self.delay.sleep(
                    step.settle_after_capture
                        .unwrap_or(self.timings.settle_after_capture),
                );
                report.next_index = index
                    .checked_add(1)
                    .ok_or_else(|| create_config_exception("capture index overflow"))?;
            }
        }
        Ok(report)
    }

    fn transition(&mut self, state: SequencerState) {
        debug!(from = ?self.state, to = ?state, "sequencer transition");
        self.state = state;
        if let Some(observer) = self.observer.as_mut() {
            observer(state);
        }
    }
}
