// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use clap::Parser;
use manipulator::{IkSolver, LinkGeometry, ManipulatorResult};
use nalgebra::Point3;

/// Solves the inverse kinematics for one target and prints the joint angles.
#[derive(Parser, Debug)]
#[clap(author, version, name = "solve_ik")]
struct CommandLineArguments {
    /// x coordinate of the target
    #[clap(allow_hyphen_values = true)]
    pub x: f64,
    /// y coordinate of the target
    #[clap(allow_hyphen_values = true)]
    pub y: f64,
    /// z coordinate of the target
    #[clap(allow_hyphen_values = true)]
    pub z: f64,
    /// Length of the link between joint 0 and joint 1
    #[clap(long, default_value_t = 130.)]
    pub r1: f64,
    /// Length of the link between joint 1 and joint 2
    #[clap(long, default_value_t = 124.)]
    pub r2: f64,
    /// Length of the link between joint 2 and the tool tip
    #[clap(long, default_value_t = 126.)]
    pub r3: f64,
}

fn main() -> ManipulatorResult<()> {
    tracing_subscriber::fmt::init();
    let args: CommandLineArguments = CommandLineArguments::parse();
    let solver = IkSolver::new(LinkGeometry::new(args.r1, args.r2, args.r3))?;
    let target = Point3::new(args.x, args.y, args.z);
    let solution = solver.solve(&target)?;
    println!(
        "Rt = {:.3}, Rxy = {:.3}, St = {:.4}, Sxy = {:.4}",
        solution.reach,
        solution.planar_reach,
        solution.elevation,
        solution.azimuth()
    );
    println!("s1 = {:.4}, s2 = {:.4}", solution.s1, solution.s2);
    println!("joint angles: {:?}", solution.joints);
    for (index, joint) in solution.chain.iter().enumerate() {
        println!("J{} = ({:.3}, {:.3}, {:.3})", index, joint.x, joint.y, joint.z);
    }
    println!(
        "commanded positions: {:?}",
        solver.commanded_positions(&solution)
    );
    Ok(())
}
