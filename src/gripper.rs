// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//!  Contains the manipulator::Gripper type.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::exception::{ManipulatorException, ManipulatorResult};
use crate::gripper::gripper_state::GripperState;
use crate::gripper::types::{GripperCommand, GripperGoal, GripperResult};

#[cfg(test)]
use mockall::automock;

pub mod gripper_state;
pub mod types;

/// Bounded wait for the gripper controller to report readiness on the reference arm.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(1);

/// Gripper controller accepting position goals.
#[cfg_attr(test, automock)]
pub trait GripperActuator {
    /// Waits up to `timeout` for the controller to accept goals. Returns false if it did not.
    fn wait_for_ready(&mut self, timeout: Duration) -> bool;
    /// Sends `goal` without waiting for it to finish.
    ///
    /// The result is delivered through the returned receiver once the goal finished. Dropping the
    /// sender without a result means the goal was lost.
    fn send_goal(&mut self, goal: GripperGoal) -> Receiver<GripperResult>;
}

impl<G: GripperActuator + ?Sized> GripperActuator for Box<G> {
    fn wait_for_ready(&mut self, timeout: Duration) -> bool {
        (**self).wait_for_ready(timeout)
    }
    fn send_goal(&mut self, goal: GripperGoal) -> Receiver<GripperResult> {
        (**self).send_goal(goal)
    }
}

/// Acknowledged state together with the goal it was taken from.
#[derive(Debug, Default)]
struct TrackedState {
    state: GripperState,
    goal: u64,
}

/// Completion of a gripper goal which was already sent.
///
/// The handle may be dropped to leave the goal running unobserved. Waiting on it updates the
/// tracked [`GripperState`] of the [`Gripper`] which created it, unless the result of a goal
/// sent later was already applied.
#[derive(Debug)]
pub struct GripperHandle {
    command: GripperCommand,
    goal: u64,
    receiver: Receiver<GripperResult>,
    result: Option<GripperResult>,
    state: Arc<Mutex<TrackedState>>,
}

impl GripperHandle {
    pub fn command(&self) -> GripperCommand {
        self.command
    }

    /// Blocks until the goal finished.
    /// # Errors
    /// * [`GripperException`](`crate::exception::ManipulatorException::GripperException`) if the
    ///   goal was dropped without a result.
    pub fn wait(&mut self) -> ManipulatorResult<GripperResult> {
        if let Some(result) = self.result {
            return Ok(result);
        }
        let result = self
            .receiver
            .recv()
            .map_err(|_| self.lost_goal_exception())?;
        Ok(self.observe(result))
    }

    /// Blocks until the goal finished or `timeout` elapsed.
    /// # Errors
    /// * [`ActuatorUnavailableError`](`crate::exception::ManipulatorException::ActuatorUnavailableError`)
    ///   if no result arrived in time. The handle can be waited on again.
    /// * [`GripperException`](`crate::exception::ManipulatorException::GripperException`) if the
    ///   goal was dropped without a result.
    pub fn wait_timeout(&mut self, timeout: Duration) -> ManipulatorResult<GripperResult> {
        if let Some(result) = self.result {
            return Ok(result);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Ok(self.observe(result)),
            Err(RecvTimeoutError::Timeout) => Err(ManipulatorException::ActuatorUnavailableError {
                actuator: "gripper".to_string(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(self.lost_goal_exception()),
        }
    }

    fn observe(&mut self, result: GripperResult) -> GripperResult {
        self.result = Some(result);
        match self.state.lock() {
            Ok(mut tracked) => {
                if self.goal > tracked.goal && result.is_acknowledged() {
                    tracked.state = tracked.state.after(self.command, &result);
                    tracked.goal = self.goal;
                } else if self.goal < tracked.goal {
                    warn!(command = ?self.command, "result of an older gripper goal ignored");
                }
                info!(
                    command = ?self.command,
                    state = ?tracked.state,
                    ?result,
                    "gripper goal finished"
                );
            }
            Err(_) => warn!("gripper state lock poisoned, state not updated"),
        }
        result
    }

    fn lost_goal_exception(&self) -> ManipulatorException {
        ManipulatorException::GripperException {
            message: format!("{:?} goal finished without a result", self.command),
        }
    }
}

/// Sends open and close requests to the gripper.
pub struct Gripper<G: GripperActuator> {
    actuator: G,
    ready_timeout: Duration,
    ready_retries: u32,
    await_completion: bool,
    sent_goals: u64,
    state: Arc<Mutex<TrackedState>>,
}

impl<G: GripperActuator> Gripper<G> {
    /// Creates a gripper which checks readiness once for [`DEFAULT_READY_TIMEOUT`] and does not
    /// wait for goals to finish.
    pub fn new(actuator: G) -> Self {
        Gripper {
            actuator,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            ready_retries: 0,
            await_completion: false,
            sent_goals: 0,
            state: Arc::new(Mutex::new(TrackedState::default())),
        }
    }

    /// Bounded wait of every readiness attempt.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Number of additional readiness attempts after the first one timed out.
    pub fn with_ready_retries(mut self, retries: u32) -> Self {
        self.ready_retries = retries;
        self
    }

    /// If set, [`set_gripper`](`Self::set_gripper`) blocks until the goal finished.
    pub fn with_await_completion(mut self, await_completion: bool) -> Self {
        self.await_completion = await_completion;
        self
    }

    /// Opens or closes the gripper.
    ///
    /// The goal is only sent after the controller reported readiness. By default the call returns
    /// right after sending, so a following arm move may start before the gripper finished.
    /// # Errors
    /// * [`ActuatorUnavailableError`](`crate::exception::ManipulatorException::ActuatorUnavailableError`)
    ///   if the controller was not ready after all attempts. The reported timeout is the summed
    ///   wait of all attempts. No goal is sent in that case.
    /// * [`GripperException`](`crate::exception::ManipulatorException::GripperException`) if
    ///   waiting for completion was requested and the goal was lost.
    pub fn set_gripper(&mut self, command: GripperCommand) -> ManipulatorResult<GripperHandle> {
        let attempts = self.ready_retries.saturating_add(1);
        let ready = (0..attempts).any(|attempt| {
            if attempt > 0 {
                warn!(attempt, "gripper not ready, waiting again");
            }
            self.actuator.wait_for_ready(self.ready_timeout)
        });
        if !ready {
            error!(?command, "gripper controller not available");
            return Err(ManipulatorException::ActuatorUnavailableError {
                actuator: "gripper".to_string(),
                timeout: self
                    .ready_timeout
                    .checked_mul(attempts)
                    .unwrap_or(Duration::MAX),
            });
        }
        let goal = command.goal();
        let receiver = self.actuator.send_goal(goal);
        self.sent_goals += 1;
        info!(?command, ?goal, "sent gripper goal");
        let mut handle = GripperHandle {
            command,
            goal: self.sent_goals,
            receiver,
            result: None,
            state: self.state.clone(),
        };
        if self.await_completion {
            handle.wait()?;
        }
        Ok(handle)
    }

    /// State of the most recently sent goal whose acknowledged result was observed.
    ///
    /// Results are only observed through [`GripperHandle`]s, so goals whose handle was dropped
    /// never change it.
    pub fn state(&self) -> GripperState {
        match self.state.lock() {
            Ok(tracked) => tracked.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    pub fn actuator(&self) -> &G {
        &self.actuator
    }
}

#[cfg(test)]
mod tests {
    use crate::exception::ManipulatorException;
    use crate::gripper::gripper_state::GripperState;
    use crate::gripper::types::{GripperCommand, GripperResult, CLOSE_POSITION, OPEN_POSITION};
    use crate::gripper::{Gripper, MockGripperActuator};
    use mockall::predicate::*;
    use mockall::Sequence;
    use std::sync::mpsc::{channel, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn finished(position: f64) -> GripperResult {
        GripperResult {
            position,
            effort: 0.,
            stalled: false,
            reached_goal: true,
        }
    }

    #[test]
    fn unavailable_gripper_sends_nothing() {
        let mut actuator = MockGripperActuator::new();
        actuator
            .expect_wait_for_ready()
            .with(eq(Duration::from_secs(1)))
            .times(1)
            .return_const(false);
        actuator.expect_send_goal().times(0);
        let mut gripper = Gripper::new(actuator);
        match gripper.set_gripper(GripperCommand::Close) {
            Err(ManipulatorException::ActuatorUnavailableError { actuator, timeout }) => {
                assert_eq!(actuator, "gripper");
                assert_eq!(timeout, Duration::from_secs(1));
            }
            other => panic!("expected ActuatorUnavailableError, got {:?}", other),
        }
        assert_eq!(gripper.state(), GripperState::Unknown);
    }

    #[test]
    fn unavailable_error_reports_the_whole_wait() {
        let mut actuator = MockGripperActuator::new();
        actuator
            .expect_wait_for_ready()
            .with(eq(Duration::from_millis(500)))
            .times(3)
            .return_const(false);
        actuator.expect_send_goal().times(0);
        let mut gripper = Gripper::new(actuator)
            .with_ready_timeout(Duration::from_millis(500))
            .with_ready_retries(2);
        match gripper.set_gripper(GripperCommand::Open) {
            Err(ManipulatorException::ActuatorUnavailableError { timeout, .. }) => {
                assert_eq!(timeout, Duration::from_millis(1500));
            }
            other => panic!("expected ActuatorUnavailableError, got {:?}", other),
        }
    }

    #[test]
    fn older_result_does_not_overwrite_newer_state() {
        let senders: Arc<Mutex<Vec<Sender<GripperResult>>>> = Arc::new(Mutex::new(Vec::new()));
        let senders_actuator = senders.clone();
        let mut actuator = MockGripperActuator::new();
        actuator.expect_wait_for_ready().return_const(true);
        actuator.expect_send_goal().times(2).returning(move |_| {
            let (sender, receiver) = channel();
            senders_actuator.lock().unwrap().push(sender);
            receiver
        });
        let mut gripper = Gripper::new(actuator);
        let mut open = gripper.set_gripper(GripperCommand::Open).unwrap();
        let mut close = gripper.set_gripper(GripperCommand::Close).unwrap();
        {
            let senders = senders.lock().unwrap();
            senders[0].send(finished(OPEN_POSITION)).unwrap();
            senders[1].send(finished(CLOSE_POSITION)).unwrap();
        }
        close.wait().unwrap();
        assert_eq!(gripper.state(), GripperState::Closed);
        assert_eq!(open.wait().unwrap().position, OPEN_POSITION);
        assert_eq!(gripper.state(), GripperState::Closed);
    }

    #[test]
    fn unacknowledged_result_keeps_state() {
        let mut actuator = MockGripperActuator::new();
        actuator.expect_wait_for_ready().return_const(true);
        actuator.expect_send_goal().times(2).returning(|goal| {
            let (sender, receiver) = channel();
            sender
                .send(GripperResult {
                    position: goal.position,
                    effort: 0.,
                    stalled: false,
                    reached_goal: goal.position == OPEN_POSITION,
                })
                .unwrap();
            receiver
        });
        let mut gripper = Gripper::new(actuator).with_await_completion(true);
        gripper.set_gripper(GripperCommand::Open).unwrap();
        assert_eq!(gripper.state(), GripperState::Open);
        gripper.set_gripper(GripperCommand::Close).unwrap();
        assert_eq!(gripper.state(), GripperState::Open);
    }

    #[test]
    fn readiness_is_checked_a_bounded_number_of_times() {
        let mut actuator = MockGripperActuator::new();
        let mut sequence = Sequence::new();
        actuator
            .expect_wait_for_ready()
            .times(2)
            .in_sequence(&mut sequence)
            .return_const(false);
        actuator
            .expect_wait_for_ready()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(true);
        actuator.expect_send_goal().times(1).returning(|goal| {
            let (sender, receiver) = channel();
            sender.send(finished(goal.position)).unwrap();
            receiver
        });
        let mut gripper = Gripper::new(actuator).with_ready_retries(2);
        let mut handle = gripper.set_gripper(GripperCommand::Open).unwrap();
        assert_eq!(handle.wait().unwrap().position, OPEN_POSITION);
        assert_eq!(gripper.state(), GripperState::Open);
    }

    #[test]
    fn goal_is_fire_and_forget() {
        let senders: Arc<Mutex<Vec<Sender<GripperResult>>>> = Arc::new(Mutex::new(Vec::new()));
        let senders_actuator = senders.clone();
        let mut actuator = MockGripperActuator::new();
        actuator.expect_wait_for_ready().return_const(true);
        actuator
            .expect_send_goal()
            .withf(|goal| goal.position == CLOSE_POSITION && goal.max_effort < 0.)
            .times(1)
            .returning(move |_| {
                let (sender, receiver) = channel();
                senders_actuator.lock().unwrap().push(sender);
                receiver
            });
        let mut gripper = Gripper::new(actuator);
        let mut handle = gripper.set_gripper(GripperCommand::Close).unwrap();
        assert_eq!(handle.command(), GripperCommand::Close);
        assert_eq!(gripper.state(), GripperState::Unknown);
        assert!(matches!(
            handle.wait_timeout(Duration::from_millis(10)),
            Err(ManipulatorException::ActuatorUnavailableError { .. })
        ));

        senders.lock().unwrap()[0]
            .send(finished(CLOSE_POSITION))
            .unwrap();
        let result = handle.wait_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(result.position, CLOSE_POSITION);
        assert_eq!(gripper.state(), GripperState::Closed);
        assert_eq!(handle.wait().unwrap(), result);
    }

    #[test]
    fn await_completion_blocks_until_result() {
        let mut actuator = MockGripperActuator::new();
        actuator.expect_wait_for_ready().return_const(true);
        actuator.expect_send_goal().returning(|goal| {
            let (sender, receiver) = channel();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                sender.send(finished(goal.position)).unwrap();
            });
            receiver
        });
        let mut gripper = Gripper::new(actuator).with_await_completion(true);
        gripper.set_gripper(GripperCommand::Open).unwrap();
        assert_eq!(gripper.state(), GripperState::Open);
    }

    #[test]
    fn lost_goal_is_reported() {
        let mut actuator = MockGripperActuator::new();
        actuator.expect_wait_for_ready().return_const(true);
        actuator.expect_send_goal().returning(|_| {
            let (_sender, receiver) = channel();
            receiver
        });
        let mut gripper = Gripper::new(actuator);
        let mut handle = gripper.set_gripper(GripperCommand::Open).unwrap();
        assert!(matches!(
            handle.wait(),
            Err(ManipulatorException::GripperException { .. })
        ));
        assert_eq!(gripper.state(), GripperState::Unknown);
    }
}
