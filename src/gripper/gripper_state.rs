// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the GripperState type.

use crate::gripper::types::{GripperCommand, GripperResult};
use serde::Deserialize;
use serde::Serialize;

/// Last gripper state acknowledged by the gripper controller.
///
/// The state only changes when a goal result is observed which the controller acknowledged.
/// Sending a goal alone does not change it.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GripperState {
    /// No goal has been acknowledged yet.
    Unknown,
    Open,
    Closed,
}

impl Default for GripperState {
    fn default() -> Self {
        GripperState::Unknown
    }
}

impl GripperState {
    /// State after `result` was reported for a goal of `command`.
    pub fn after(self, command: GripperCommand, result: &GripperResult) -> GripperState {
        if !result.is_acknowledged() {
            return self;
        }
        match command {
            GripperCommand::Open => GripperState::Open,
            GripperCommand::Close => GripperState::Closed,
        }
    }
}
