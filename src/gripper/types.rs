// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the request and result types exchanged with the gripper controller.

use serde::Deserialize;
use serde::Serialize;

/// Finger position of an open gripper. \[m\]
pub const OPEN_POSITION: f64 = 0.025;
/// Finger position of a closed gripper. \[m\]
pub const CLOSE_POSITION: f64 = -0.015;
/// Effort limit which lets the controller use its own maximum.
pub const UNLIMITED_EFFORT: f64 = -1.0;

/// Open or close request for the gripper.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GripperCommand {
    Open,
    Close,
}

impl GripperCommand {
    /// Goal which is sent to the gripper controller for this command.
    pub fn goal(&self) -> GripperGoal {
        let position = match self {
            GripperCommand::Open => OPEN_POSITION,
            GripperCommand::Close => CLOSE_POSITION,
        };
        GripperGoal {
            position,
            max_effort: UNLIMITED_EFFORT,
        }
    }
}

/// Target of a gripper goal.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct GripperGoal {
    /// Target finger position. \[m\]
    pub position: f64,
    /// Effort limit. Negative values disable the limit.
    pub max_effort: f64,
}

/// Result reported by the gripper controller once a goal finished.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct GripperResult {
    /// Finger position when the goal finished. \[m\]
    pub position: f64,
    /// Effort applied when the goal finished.
    pub effort: f64,
    /// True if the fingers stopped before reaching the position, e.g. on an object.
    pub stalled: bool,
    /// True if the position was reached.
    pub reached_goal: bool,
}

impl GripperResult {
    /// Whether the controller acknowledged the goal as done.
    pub fn is_acknowledged(&self) -> bool {
        self.reached_goal || self.stalled
    }
}
