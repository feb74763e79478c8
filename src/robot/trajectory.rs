// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint trajectory command published to the arm controller.

use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// Names of the four arm joints in command order.
pub static JOINT_NAMES: [&str; 4] = ["joint1", "joint2", "joint3", "joint4"];

/// A single waypoint of a [`JointTrajectory`].
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct JointTrajectoryPoint {
    /// Desired joint angles in \[rad\].
    pub positions: [f64; 4],
    /// Desired joint velocities in \[rad/s\] when the waypoint is reached.
    pub velocities: [f64; 4],
    /// Time after which the waypoint should be reached.
    pub time_from_start: Duration,
}

impl JointTrajectoryPoint {
    /// Creates a waypoint which comes to rest at `positions` after `time_from_start`.
    pub fn at_rest(positions: [f64; 4], time_from_start: Duration) -> Self {
        JointTrajectoryPoint {
            positions,
            velocities: [0.; 4],
            time_from_start,
        }
    }
}

/// Trajectory command for the arm controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointTrajectory {
    /// Reference frame of the command. Empty for joint space.
    pub frame_id: String,
    /// Joint names matching the order of the positions of every point.
    pub joint_names: Vec<String>,
    /// Waypoints of the trajectory.
    pub points: Vec<JointTrajectoryPoint>,
}

impl JointTrajectory {
    /// Creates a trajectory with one waypoint which is reached after `transition_time`.
    pub fn single_point(positions: [f64; 4], transition_time: Duration) -> Self {
        JointTrajectory {
            frame_id: String::new(),
            joint_names: JOINT_NAMES.iter().map(|name| name.to_string()).collect(),
            points: vec![JointTrajectoryPoint::at_rest(positions, transition_time)],
        }
    }

    /// Positions of the first waypoint.
    pub fn positions(&self) -> Option<&[f64; 4]> {
        self.points.first().map(|point| &point.positions)
    }

    pub(crate) fn positions_mut(&mut self) -> Option<&mut [f64; 4]> {
        self.points.first_mut().map(|point| &mut point.positions)
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::trajectory::{JointTrajectory, JOINT_NAMES};
    use std::time::Duration;

    #[test]
    fn single_point_comes_to_rest() {
        let trajectory =
            JointTrajectory::single_point([0.1, 0.2, 0.3, 0.4], Duration::from_secs(3));
        assert_eq!(trajectory.frame_id, "");
        assert_eq!(trajectory.joint_names, JOINT_NAMES.to_vec());
        assert_eq!(trajectory.points.len(), 1);
        let point = trajectory.points[0];
        assert_eq!(point.positions, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(point.velocities, [0.; 4]);
        assert_eq!(point.time_from_start, Duration::from_secs(3));
    }

    #[test]
    fn serializes_for_transports() {
        let trajectory = JointTrajectory::single_point([0.; 4], Duration::from_millis(1500));
        let json = serde_json::to_value(&trajectory).unwrap();
        assert_eq!(json["joint_names"][3], "joint4");
        assert_eq!(json["points"][0]["time_from_start"]["secs"], 1);
        assert_eq!(json["points"][0]["time_from_start"]["nanos"], 500_000_000);
        let back: JointTrajectory = serde_json::from_value(json).unwrap();
        assert_eq!(back, trajectory);
    }
}
