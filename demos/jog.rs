// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use clap::Parser;
use manipulator::robot::jog::{JOINT_ANGLE_DELTA, USAGE};
use manipulator::{
    CollectionConfig, GripperActuator, GripperCommand, GripperGoal, GripperResult, IkSolver,
    JogCommand, JointActuator, JointTrajectory, ManipulatorResult, TrajectoryDispatcher,
};
use std::io::BufRead;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// Jogs the joints of a simulated arm from the keyboard.
///
/// Type one key per line. Additionally to the joint keys, `g` opens and `f` closes the gripper.
#[derive(Parser, Debug)]
#[clap(author, version, name = "jog")]
struct CommandLineArguments {
    /// Angle of one jog step in radians
    #[clap(long, default_value_t = JOINT_ANGLE_DELTA)]
    pub delta: f64,
    /// Wait until the gripper reports a result before reading the next key
    #[clap(long)]
    pub await_gripper: bool,
}

struct PrintingActuator;

impl JointActuator for PrintingActuator {
    fn send_joint_trajectory(&mut self, trajectory: &JointTrajectory) -> ManipulatorResult<()> {
        println!("trajectory: {:?}", trajectory.positions());
        Ok(())
    }
}

struct SimulatedGripper;

impl GripperActuator for SimulatedGripper {
    fn wait_for_ready(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn send_goal(&mut self, goal: GripperGoal) -> Receiver<GripperResult> {
        let (sender, receiver) = channel();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            let _ = sender.send(GripperResult {
                position: goal.position,
                effort: 0.,
                stalled: false,
                reached_goal: true,
            });
        });
        receiver
    }
}

fn main() -> ManipulatorResult<()> {
    tracing_subscriber::fmt::init();
    let args: CommandLineArguments = CommandLineArguments::parse();
    let config = CollectionConfig {
        await_gripper: args.await_gripper,
        ..CollectionConfig::default()
    };
    let solver = IkSolver::new(config.geometry)?;
    let mut dispatcher = TrajectoryDispatcher::new(PrintingActuator, solver)
        .with_transition_time(config.transition_time);
    let mut gripper = config.gripper(SimulatedGripper);
    if let Some(first) = config.poses.first() {
        dispatcher.move_to(&first.target(), config.transition_time)?;
    }
    println!("{}", USAGE);
    println!("Gripper : Open (G), Close (F)");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let key = match line.trim().chars().next() {
            Some(key) => key,
            None => continue,
        };
        let command = match key.to_ascii_lowercase() {
            'g' => GripperCommand::Open,
            'f' => GripperCommand::Close,
            _ => {
                match JogCommand::from_key(key) {
                    Some(JogCommand::Quit) => break,
                    Some(command) => {
                        dispatcher.jog(command, args.delta)?;
                    }
                    None => println!("unknown key {:?}", key),
                }
                continue;
            }
        };
        gripper.set_gripper(command)?;
        if args.await_gripper {
            println!("gripper: {:?}", gripper.state());
        } else {
            println!("gripper: {:?} sent", command);
        }
    }
    Ok(())
}
