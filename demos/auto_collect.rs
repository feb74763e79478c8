// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use clap::Parser;
use manipulator::{
    AutoCollector, CameraDevice, CollectionConfig, DataCollectRequest, Frame, FrameSaver,
    FrameSource, JointActuator, JointTrajectory, ManipulatorResult, ThreadDelay,
};
use std::path::PathBuf;
use std::time::Duration;

/// Runs an automatic data collection against a simulated arm and camera.
///
/// Every trajectory command is printed as JSON and every capture is a small placeholder image.
#[derive(Parser, Debug)]
#[clap(author, version, name = "auto_collect")]
struct CommandLineArguments {
    /// JSON configuration of the run. The built-in reference setup is used if omitted
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Directory the captured images are written to
    #[clap(long, default_value = "images")]
    pub output: PathBuf,
    /// Overrides the number of repetitions of the configuration
    #[clap(long)]
    pub repetitions: Option<u32>,
    /// Skips all settle times so the run finishes immediately
    #[clap(long)]
    pub fast: bool,
    /// Prints the default configuration and exits
    #[clap(long)]
    pub print_default: bool,
}

struct PrintingActuator;

impl JointActuator for PrintingActuator {
    fn send_joint_trajectory(&mut self, trajectory: &JointTrajectory) -> ManipulatorResult<()> {
        match serde_json::to_string(trajectory) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("cannot encode trajectory: {}", e),
        }
        Ok(())
    }
}

struct SyntheticCamera;

struct SyntheticFrames {
    counter: u8,
}

impl CameraDevice for SyntheticCamera {
    type Source = SyntheticFrames;

    fn open(&mut self) -> ManipulatorResult<SyntheticFrames> {
        Ok(SyntheticFrames { counter: 0 })
    }
}

impl FrameSource for SyntheticFrames {
    fn read_frame(&mut self) -> ManipulatorResult<Frame> {
        self.counter = self.counter.wrapping_add(1);
        Ok(Frame {
            bytes: vec![0xff, 0xd8, self.counter, 0xff, 0xd9],
        })
    }

    fn release(&mut self) {
        println!("camera released");
    }
}

fn main() -> ManipulatorResult<()> {
    tracing_subscriber::fmt::init();
    let args: CommandLineArguments = CommandLineArguments::parse();
    if args.print_default {
        println!("{}", CollectionConfig::default().to_json()?);
        return Ok(());
    }
    let mut config = match &args.config {
        Some(path) => CollectionConfig::from_file(path)?,
        None => CollectionConfig::default(),
    };
    if let Some(repetitions) = args.repetitions {
        config.repetitions = repetitions;
    }
    if args.fast {
        config.warmup = Duration::from_secs(0);
        config.settle_before_capture = Duration::from_secs(0);
        config.settle_after_capture = Duration::from_secs(0);
        for pose in config.poses.iter_mut() {
            pose.settle_before_capture = None;
            pose.settle_after_capture = None;
        }
    }
    let mut collector = AutoCollector::new(
        config,
        PrintingActuator,
        SyntheticCamera,
        FrameSaver::new(&args.output),
        ThreadDelay,
    )?;
    let response = collector.start_auto_collection(DataCollectRequest { start: true });
    println!("success: {}", response.success);
    if !response.success {
        std::process::exit(-1);
    }
    Ok(())
}
