// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Discrete jog commands for moving single joints by hand.
//!
//! Reading keys is left to the caller. This module only maps a key to a command and applies the
//! command to the positions of the currently held trajectory.

/// Increment applied by one jog step. \[rad\]
pub const JOINT_ANGLE_DELTA: f64 = 0.05;

/// Key bindings shown to an operator.
pub const USAGE: &str = "\
Joint Space Control:
- Joint1 : Increase (Y), Decrease (H)
- Joint2 : Increase (U), Decrease (J)
- Joint3 : Increase (I), Decrease (K)
- Joint4 : Increase (O), Decrease (L)

INIT : (1)
QUIT : (Q)
";

/// One jog step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JogCommand {
    /// Increase the joint with the given index (0..4).
    Increase(usize),
    /// Decrease the joint with the given index (0..4).
    Decrease(usize),
    /// Set all joints to zero.
    Reset,
    /// Stop jogging.
    Quit,
}

impl JogCommand {
    /// Maps a key to its command. Keys are case-insensitive.
    pub fn from_key(key: char) -> Option<JogCommand> {
        match key.to_ascii_lowercase() {
            'y' => Some(JogCommand::Increase(0)),
            'h' => Some(JogCommand::Decrease(0)),
            'u' => Some(JogCommand::Increase(1)),
            'j' => Some(JogCommand::Decrease(1)),
            'i' => Some(JogCommand::Increase(2)),
            'k' => Some(JogCommand::Decrease(2)),
            'o' => Some(JogCommand::Increase(3)),
            'l' => Some(JogCommand::Decrease(3)),
            '1' => Some(JogCommand::Reset),
            'q' => Some(JogCommand::Quit),
            _ => None,
        }
    }

    /// Applies the step to `positions`. Returns false if nothing changed.
    pub fn apply(&self, positions: &mut [f64; 4], delta: f64) -> bool {
        match *self {
            JogCommand::Increase(joint) if joint < positions.len() => {
                positions[joint] += delta;
                true
            }
            JogCommand::Decrease(joint) if joint < positions.len() => {
                positions[joint] -= delta;
                true
            }
            JogCommand::Reset => {
                *positions = [0.; 4];
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::jog::{JogCommand, JOINT_ANGLE_DELTA};

    #[test]
    fn key_bindings() {
        assert_eq!(JogCommand::from_key('y'), Some(JogCommand::Increase(0)));
        assert_eq!(JogCommand::from_key('J'), Some(JogCommand::Decrease(1)));
        assert_eq!(JogCommand::from_key('o'), Some(JogCommand::Increase(3)));
        assert_eq!(JogCommand::from_key('1'), Some(JogCommand::Reset));
        assert_eq!(JogCommand::from_key('q'), Some(JogCommand::Quit));
        assert_eq!(JogCommand::from_key('x'), None);
    }

    #[test]
    fn apply_steps() {
        let mut positions = [0.1, 0.2, 0.3, 0.4];
        assert!(JogCommand::Increase(2).apply(&mut positions, JOINT_ANGLE_DELTA));
        assert!((positions[2] - 0.35).abs() < 1e-12);
        assert!(JogCommand::Decrease(0).apply(&mut positions, JOINT_ANGLE_DELTA));
        assert!((positions[0] - 0.05).abs() < 1e-12);
        assert!(!JogCommand::Quit.apply(&mut positions, JOINT_ANGLE_DELTA));
        assert!(!JogCommand::Increase(4).apply(&mut positions, JOINT_ANGLE_DELTA));
        assert!(JogCommand::Reset.apply(&mut positions, JOINT_ANGLE_DELTA));
        assert_eq!(positions, [0.; 4]);
    }
}
