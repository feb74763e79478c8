// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # manipulator-rs
//! manipulator-rs drives a small four joint arm with a parallel gripper and a camera for
//! automatic data collection.
//!
//! **ALWAYS HAVE THE POWER SWITCH OF THE ARM AT HAND WHILE IT IS MOVING!**
//!
//! ## Design
//! The library is divided into these main modules:
//! * [kinematics](`crate::kinematics`) - closed form inverse kinematics of the arm.
//! * [robot](`crate::robot`) - trajectory commands, jogging and the pose sequencer.
//! * [gripper](`crate::gripper`) - contains everything which is only needed for controlling the gripper.
//! * [camera](`crate::camera`) - camera sessions and frame storage.
//! * [service](`crate::service`) - the automatic data collection service.
//!
//! The hardware is reached through the traits [`JointActuator`], [`GripperActuator`] and
//! [`CameraDevice`], so the whole stack can be run against simulated hardware.
//!
//! # Example:
//!```no_run
//! use manipulator::{IkSolver, JointActuator, JointTrajectory, LinkGeometry, ManipulatorResult,
//!     TrajectoryDispatcher};
//! use nalgebra::Point3;
//!
//! struct Printer;
//! impl JointActuator for Printer {
//!     fn send_joint_trajectory(&mut self, trajectory: &JointTrajectory) -> ManipulatorResult<()> {
//!         println!("{:?}", trajectory.positions());
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> ManipulatorResult<()> {
//!     let solver = IkSolver::new(LinkGeometry::default())?;
//!     let mut dispatcher = TrajectoryDispatcher::new(Printer, solver);
//!     let solution = dispatcher.move_to(&Point3::new(150., 45., 130.), Default::default())?;
//!     println!("azimuth {}", solution.azimuth());
//!     Ok(())
//! }
//! ```
//!
//! All fallible operations return a [`ManipulatorResult`] which carries a
//! [`ManipulatorException`] on failure. Unreachable targets are reported as
//! [`OutOfReachError`](`ManipulatorException::OutOfReachError`) before anything is sent to the arm.
//!
//! A complete collection run is configured with a [`CollectionConfig`] and served by an
//! [`AutoCollector`]:
//!```no_run
//! # use manipulator::{AutoCollector, CameraDevice, CollectionConfig, DataCollectRequest,
//! #     FrameSaver, JointActuator, ManipulatorResult, ThreadDelay};
//! # fn run<A: JointActuator, C: CameraDevice>(actuator: A, camera: C) -> ManipulatorResult<()> {
//! let config = CollectionConfig::from_file("collection.json")?;
//! let mut collector = AutoCollector::new(config, actuator, camera, FrameSaver::new("images"), ThreadDelay)?;
//! let response = collector.start_auto_collection(DataCollectRequest { start: true });
//! # Ok(())
//! # }
//! ```
//! Log output is emitted through [`tracing`], install a subscriber to see it.

pub mod camera;
pub mod config;
pub mod exception;
pub mod gripper;
pub mod kinematics;
pub mod robot;
pub mod service;
pub mod utils;

pub use camera::{CameraDevice, CameraSession, Frame, FrameSaver, FrameSink, FrameSource};
pub use config::CollectionConfig;
pub use exception::{ManipulatorException, ManipulatorResult};
pub use gripper::gripper_state::GripperState;
pub use gripper::types::{GripperCommand, GripperGoal, GripperResult};
pub use gripper::{Gripper, GripperActuator, GripperHandle};
pub use kinematics::{IkSolution, IkSolver, JointAngles, LinkGeometry};
pub use robot::dispatcher::TrajectoryDispatcher;
pub use robot::jog::JogCommand;
pub use robot::sequencer::{PoseSequencer, PoseStep, RunReport, SequenceTimings, SequencerState};
pub use robot::trajectory::{JointTrajectory, JointTrajectoryPoint};
pub use robot::JointActuator;
pub use service::{AutoCollector, DataCollectRequest, DataCollectResponse};
pub use utils::*;
