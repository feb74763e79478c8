// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the TrajectoryDispatcher type which turns Cartesian targets into trajectory commands.

use std::time::Duration;

use nalgebra::Point3;
use tracing::{error, info, warn};

use crate::exception::ManipulatorResult;
use crate::kinematics::{IkSolution, IkSolver};
use crate::robot::jog::JogCommand;
use crate::robot::trajectory::JointTrajectory;
use crate::robot::JointActuator;

/// Transition time of a trajectory command on the reference arm.
pub const DEFAULT_TRANSITION_TIME: Duration = Duration::from_secs(3);

/// Solves targets and publishes one single-point trajectory per target.
///
/// The dispatcher keeps the last published trajectory so jog steps can be applied on top of it.
/// It never integrates joint angles itself: every [`move_to`](`Self::move_to`) starts from a
/// fresh IK solution.
pub struct TrajectoryDispatcher<A: JointActuator> {
    actuator: A,
    solver: IkSolver,
    transition_time: Duration,
    held: Option<JointTrajectory>,
}

impl<A: JointActuator> TrajectoryDispatcher<A> {
    /// Creates a dispatcher publishing to `actuator`.
    pub fn new(actuator: A, solver: IkSolver) -> Self {
        TrajectoryDispatcher {
            actuator,
            solver,
            transition_time: DEFAULT_TRANSITION_TIME,
            held: None,
        }
    }

    /// Sets the transition time used for jog commands.
    pub fn with_transition_time(mut self, transition_time: Duration) -> Self {
        self.transition_time = transition_time;
        self
    }

    /// Moves joint 2 to `target`.
    ///
    /// Publishes a single trajectory command with the calibrated joint angles, zero target
    /// velocities and the given transition time. Does not wait for the motion to finish.
    /// # Errors
    /// * [`OutOfReachError`](`crate::exception::ManipulatorException::OutOfReachError`) and
    ///   [`InvalidTargetError`](`crate::exception::ManipulatorException::InvalidTargetError`) from
    ///   the solver. No command is published in that case.
    /// * Errors of the actuator.
    pub fn move_to(
        &mut self,
        target: &Point3<f64>,
        transition_time: Duration,
    ) -> ManipulatorResult<IkSolution> {
        let solution = self.solver.solve(target).map_err(|e| {
            error!(x = target.x, y = target.y, z = target.z, "cannot move: {}", e);
            e
        })?;
        let positions = self.solver.commanded_positions(&solution);
        let trajectory = JointTrajectory::single_point(positions, transition_time);
        self.actuator.send_joint_trajectory(&trajectory)?;
        info!(
            x = target.x,
            y = target.y,
            z = target.z,
            ?positions,
            "published joint trajectory"
        );
        self.held = Some(trajectory);
        Ok(solution)
    }

    /// Applies a jog step to the held trajectory and publishes it again.
    ///
    /// [`Reset`](`JogCommand::Reset`) publishes zero positions even if nothing is held yet.
    /// Returns the published positions, or `None` if the command did not change anything.
    /// The held trajectory is only replaced once the actuator accepted the new one.
    pub fn jog(&mut self, command: JogCommand, delta: f64) -> ManipulatorResult<Option<[f64; 4]>> {
        let mut trajectory = match (&self.held, command) {
            (Some(held), _) => held.clone(),
            (None, JogCommand::Reset) => {
                JointTrajectory::single_point([0.; 4], self.transition_time)
            }
            (None, _) => {
                warn!(?command, "no trajectory held, ignoring jog command");
                return Ok(None);
            }
        };
        let changed = match trajectory.positions_mut() {
            Some(positions) => command.apply(positions, delta),
            None => false,
        };
        if !changed {
            return Ok(None);
        }
        self.actuator.send_joint_trajectory(&trajectory)?;
        let positions = trajectory.positions().copied();
        info!(?command, ?positions, "published jog step");
        self.held = Some(trajectory);
        Ok(positions)
    }

    /// Last published trajectory.
    pub fn held_trajectory(&self) -> Option<&JointTrajectory> {
        self.held.as_ref()
    }

    pub fn solver(&self) -> &IkSolver {
        &self.solver
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}
