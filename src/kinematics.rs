// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Closed-form inverse kinematics for a 4-joint serial arm.
//!
//! The arm consists of a base rotation followed by three links in one vertical plane:
//! * `r1` - base joint to joint 1 (shoulder link)
//! * `r2` - joint 1 to joint 2 (elbow link)
//! * `r3` - joint 2 to the end-effector
//!
//! The target is placed at joint 2. The base joint, joint 1 and the target span a triangle with the
//! sides `r1`, `r2` and the straight-line distance `Rt`, which is solved with the law of cosines.
//! The fourth joint keeps the end-effector link pointing straight down, parallel to the base axis.
//!
//! All lengths are in millimeters, all angles in radians.
use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exception::{ManipulatorException, ManipulatorResult};

/// Arc-cosine arguments are accepted up to this distance outside of \[-1, 1\] to absorb rounding
/// for targets lying exactly on the workspace boundary.
const ACOS_TOLERANCE: f64 = 1e-9;

/// Horizontal offset of joint 1 from the shoulder axis of the reference arm. \[mm\]
pub const DEFAULT_SHOULDER_OFFSET: f64 = 24.;
/// Vertical rise of joint 1 above the shoulder axis of the reference arm. \[mm\]
pub const DEFAULT_SHOULDER_RISE: f64 = 128.;

/// Link lengths of the arm. Set once at startup.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct LinkGeometry {
    /// Base joint to joint 1. \[mm\]
    pub r1: f64,
    /// Joint 1 to joint 2. \[mm\]
    pub r2: f64,
    /// Joint 2 to the end-effector. \[mm\]
    pub r3: f64,
    /// Horizontal offset of the bent shoulder link, used to derive the shoulder calibration. \[mm\]
    #[serde(default = "default_shoulder_offset")]
    pub shoulder_offset: f64,
    /// Vertical rise of the bent shoulder link, used to derive the shoulder calibration. \[mm\]
    #[serde(default = "default_shoulder_rise")]
    pub shoulder_rise: f64,
}

fn default_shoulder_offset() -> f64 {
    DEFAULT_SHOULDER_OFFSET
}

fn default_shoulder_rise() -> f64 {
    DEFAULT_SHOULDER_RISE
}

impl Default for LinkGeometry {
    fn default() -> Self {
        LinkGeometry::new(130., 124., 126.)
    }
}

impl LinkGeometry {
    /// Creates a geometry with the shoulder bend of the reference arm.
    pub fn new(r1: f64, r2: f64, r3: f64) -> Self {
        LinkGeometry {
            r1,
            r2,
            r3,
            shoulder_offset: DEFAULT_SHOULDER_OFFSET,
            shoulder_rise: DEFAULT_SHOULDER_RISE,
        }
    }

    /// Replaces the shoulder bend from which the calibration offsets are derived.
    pub fn with_shoulder_bend(mut self, offset: f64, rise: f64) -> Self {
        self.shoulder_offset = offset;
        self.shoulder_rise = rise;
        self
    }

    /// Checks that all link lengths are positive finite numbers.
    /// # Errors
    /// * [`InvalidGeometryError`](`crate::exception::ManipulatorException::InvalidGeometryError`)
    pub fn validate(&self) -> ManipulatorResult<()> {
        for (name, value) in [("r1", self.r1), ("r2", self.r2), ("r3", self.r3)].iter() {
            if !value.is_finite() || *value <= 0. {
                return Err(ManipulatorException::InvalidGeometryError {
                    message: format!("link length {} must be positive, got {}", name, value),
                });
            }
        }
        if !self.shoulder_offset.is_finite() || !self.shoulder_rise.is_finite() {
            return Err(ManipulatorException::InvalidGeometryError {
                message: "shoulder bend must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Smallest distance from the base joint the first two links can reach.
    pub fn min_reach(&self) -> f64 {
        (self.r1 - self.r2).abs()
    }

    /// Largest distance from the base joint the first two links can reach.
    pub fn max_reach(&self) -> f64 {
        self.r1 + self.r2
    }
}

/// Fixed calibration added to the shoulder and elbow angles before they are commanded.
///
/// The physical shoulder link is bent, so the geometric angle of the straight line from the base
/// joint to joint 1 differs from the motor angle by a constant.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CalibrationOffsets {
    /// Added to the shoulder angle.
    pub th1: f64,
    /// Added to the elbow angle.
    pub th2: f64,
}

impl CalibrationOffsets {
    /// Derives the offsets from the shoulder bend of `geometry`.
    pub fn from_geometry(geometry: &LinkGeometry) -> Self {
        let th1 = -f64::atan2(geometry.shoulder_offset, geometry.shoulder_rise);
        CalibrationOffsets {
            th1,
            th2: -FRAC_PI_2 - th1,
        }
    }
}

/// Geometric joint angles of one solution, before calibration. \[rad\]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct JointAngles {
    /// Rotation of the base around the vertical axis (azimuth).
    pub base: f64,
    /// Angle between the vertical axis and the shoulder link.
    pub shoulder: f64,
    /// Angle between the shoulder link and the elbow link.
    pub elbow: f64,
    /// Angle between the elbow link and the end-effector link.
    pub wrist: f64,
}

impl JointAngles {
    /// Joint positions as they are sent to the arm, in the order joint1..joint4.
    pub fn commanded(&self, offsets: &CalibrationOffsets) -> [f64; 4] {
        [
            self.base,
            self.shoulder + offsets.th1,
            self.elbow + offsets.th2,
            self.wrist,
        ]
    }

    fn is_finite(&self) -> bool {
        self.base.is_finite()
            && self.shoulder.is_finite()
            && self.elbow.is_finite()
            && self.wrist.is_finite()
    }
}

/// Result of [`IkSolver::solve`] including the intermediate quantities of the decomposition.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IkSolution {
    /// Straight-line distance from the base joint to the target, `Rt`.
    pub reach: f64,
    /// Distance in the xy plane, `Rxy`.
    pub planar_reach: f64,
    /// Elevation of the target above the xy plane, `St`.
    pub elevation: f64,
    /// Triangle angle at the base joint, between `r1` and `Rt`.
    pub s1: f64,
    /// Triangle angle at the target, between `r2` and `Rt`.
    pub s2: f64,
    /// Geometric joint angles.
    pub joints: JointAngles,
    /// Joint positions J0..J3 reconstructed by forward kinematics. J2 is the target.
    pub chain: [Point3<f64>; 4],
}

impl IkSolution {
    /// Azimuth of the target, `Sxy`.
    pub fn azimuth(&self) -> f64 {
        self.joints.base
    }
    /// Position of joint 2, which coincides with the requested target.
    pub fn wrist_point(&self) -> Point3<f64> {
        self.chain[2]
    }
    /// Position of the end-effector tip.
    pub fn tool_point(&self) -> Point3<f64> {
        self.chain[3]
    }
}

/// Solves the triangle with the sides `r1`, `r2` and `rt` for the two angles adjacent to `rt`.
///
/// Returns `(s1, s2)` where `s1` is the angle between `r1` and `rt` and `s2` the angle between
/// `r2` and `rt`.
/// # Errors
/// * [`OutOfReachError`](`crate::exception::ManipulatorException::OutOfReachError`) if the sides do
///   not form a triangle.
pub fn solve_triangle(r1: f64, r2: f64, rt: f64) -> ManipulatorResult<(f64, f64)> {
    let out_of_reach = || ManipulatorException::OutOfReachError {
        distance: rt,
        min_reach: (r1 - r2).abs(),
        max_reach: r1 + r2,
    };
    let d1 = (rt.powi(2) - r2.powi(2) + r1.powi(2)) / (2. * rt);
    let d2 = (rt.powi(2) + r2.powi(2) - r1.powi(2)) / (2. * rt);
    let c1 = checked_cosine(d1 / r1).ok_or_else(out_of_reach)?;
    let c2 = checked_cosine(d2 / r2).ok_or_else(out_of_reach)?;
    Ok((c1.acos(), c2.acos()))
}

fn checked_cosine(value: f64) -> Option<f64> {
    if value.is_finite() && value.abs() <= 1. + ACOS_TOLERANCE {
        Some(value.clamp(-1., 1.))
    } else {
        None
    }
}

/// Chains the links from the base joint along the given angles.
///
/// Every link lies in the vertical plane rotated by `joints.base`. Its direction is measured from
/// the vertical axis by the sum of all preceding joint angles.
pub fn forward_chain(geometry: &LinkGeometry, joints: &JointAngles) -> [Point3<f64>; 4] {
    let link = |length: f64, polar: f64| -> Vector3<f64> {
        Vector3::new(
            length * polar.sin() * joints.base.cos(),
            length * polar.sin() * joints.base.sin(),
            length * polar.cos(),
        )
    };
    let j0 = Point3::origin();
    let j1 = j0 + link(geometry.r1, joints.shoulder);
    let j2 = j1 + link(geometry.r2, joints.shoulder + joints.elbow);
    let j3 = j2 + link(geometry.r3, joints.shoulder + joints.elbow + joints.wrist);
    [j0, j1, j2, j3]
}

/// Inverse kinematics solver for one arm.
///
/// The calibration offsets are derived once when the solver is created.
#[derive(Debug, Copy, Clone)]
pub struct IkSolver {
    geometry: LinkGeometry,
    offsets: CalibrationOffsets,
}

impl IkSolver {
    /// Creates a solver for the given link lengths.
    /// # Errors
    /// * [`InvalidGeometryError`](`crate::exception::ManipulatorException::InvalidGeometryError`)
    ///   if a link length is not a positive finite number.
    pub fn new(geometry: LinkGeometry) -> ManipulatorResult<Self> {
        geometry.validate()?;
        Ok(IkSolver {
            geometry,
            offsets: CalibrationOffsets::from_geometry(&geometry),
        })
    }

    pub fn geometry(&self) -> &LinkGeometry {
        &self.geometry
    }

    pub fn offsets(&self) -> &CalibrationOffsets {
        &self.offsets
    }

    /// Computes the joint angles which place joint 2 at `target` (relative to the base joint)
    /// with the end-effector link pointing straight down.
    /// # Errors
    /// * [`InvalidTargetError`](`crate::exception::ManipulatorException::InvalidTargetError`) if
    ///   the target is not finite or coincides with the base joint.
    /// * [`OutOfReachError`](`crate::exception::ManipulatorException::OutOfReachError`) if the
    ///   target lies outside `|r1 - r2| <= Rt <= r1 + r2`.
    pub fn solve(&self, target: &Point3<f64>) -> ManipulatorResult<IkSolution> {
        let (x, y, z) = (target.x, target.y, target.z);
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(ManipulatorException::InvalidTargetError {
                message: format!("target ({}, {}, {}) is not finite", x, y, z),
            });
        }
        let reach = (x.powi(2) + y.powi(2) + z.powi(2)).sqrt();
        if reach < f64::EPSILON {
            return Err(ManipulatorException::InvalidTargetError {
                message: "target coincides with the base joint".to_string(),
            });
        }
        let planar_reach = (x.powi(2) + y.powi(2)).sqrt();
        let elevation = (z / reach).asin();
        let azimuth = y.atan2(x);

        let (s1, s2) = solve_triangle(self.geometry.r1, self.geometry.r2, reach)?;

        let shoulder = FRAC_PI_2 - (s1 + elevation);
        let elbow = s1 + s2;
        let wrist = PI - (shoulder + elbow);
        let joints = JointAngles {
            base: azimuth,
            shoulder,
            elbow,
            wrist,
        };
        if !joints.is_finite() {
            return Err(ManipulatorException::InvalidTargetError {
                message: format!("no finite solution for ({}, {}, {})", x, y, z),
            });
        }
        debug!(
            reach,
            elevation, azimuth, s1, s2, shoulder, elbow, wrist, "solved inverse kinematics"
        );
        Ok(IkSolution {
            reach,
            planar_reach,
            elevation,
            s1,
            s2,
            joints,
            chain: forward_chain(&self.geometry, &joints),
        })
    }

    /// Calibrated joint positions for `solution`, in the order joint1..joint4.
    pub fn commanded_positions(&self, solution: &IkSolution) -> [f64; 4] {
        solution.joints.commanded(&self.offsets)
    }
}
