// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains everything needed for moving the arm: the trajectory command, the dispatcher which
//! turns Cartesian targets into commands, the pose sequencer and the jog command set.

pub mod dispatcher;
pub mod jog;
pub mod sequencer;
pub mod trajectory;

use crate::exception::ManipulatorResult;
use crate::robot::trajectory::JointTrajectory;

#[cfg(test)]
use mockall::automock;

/// Arm controller which accepts joint trajectory commands.
///
/// Publishing is fire-and-forget: an implementation returns as soon as the command is handed to
/// the transport and does not wait for the arm to reach it.
#[cfg_attr(test, automock)]
pub trait JointActuator {
    /// Publishes `trajectory` to the arm controller.
    /// # Errors
    /// * [`ActuatorUnavailableError`](`crate::exception::ManipulatorException::ActuatorUnavailableError`)
    ///   if the transport cannot accept the command.
    fn send_joint_trajectory(&mut self, trajectory: &JointTrajectory) -> ManipulatorResult<()>;
}

impl<A: JointActuator + ?Sized> JointActuator for Box<A> {
    fn send_joint_trajectory(&mut self, trajectory: &JointTrajectory) -> ManipulatorResult<()> {
        (**self).send_joint_trajectory(trajectory)
    }
}
