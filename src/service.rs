// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the AutoCollector type which serves automatic data collection requests.

use serde::Deserialize;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::camera::{CameraDevice, CameraSession, FrameSink};
use crate::config::CollectionConfig;
use crate::exception::ManipulatorResult;
use crate::kinematics::IkSolver;
use crate::robot::dispatcher::TrajectoryDispatcher;
use crate::robot::sequencer::{PoseSequencer, RunReport};
use crate::robot::JointActuator;
use crate::utils::{CancelToken, Delay};

/// Request of the data collection service.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataCollectRequest {
    /// Run the configured pose sequence.
    pub start: bool,
}

/// Response of the data collection service.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataCollectResponse {
    /// True if every pose was reached and every capture was stored.
    pub success: bool,
}

/// Runs the configured pose sequence and stores one frame per pose.
///
/// Every run opens the camera, waits for it to warm up, visits all poses and releases the camera
/// again, also if the run is aborted.
pub struct AutoCollector<A, C, K, D>
where
    A: JointActuator,
    C: CameraDevice,
    K: FrameSink,
    D: Delay,
{
    config: CollectionConfig,
    dispatcher: TrajectoryDispatcher<A>,
    camera: C,
    sink: K,
    delay: D,
    cancel: CancelToken,
}

impl<A, C, K, D> AutoCollector<A, C, K, D>
where
    A: JointActuator,
    C: CameraDevice,
    K: FrameSink,
    D: Delay,
{
    /// Creates a collector for `config`.
    /// # Errors
    /// * [`ConfigException`](`crate::exception::ManipulatorException::ConfigException`) if the
    ///   configuration is inconsistent.
    pub fn new(
        config: CollectionConfig,
        actuator: A,
        camera: C,
        sink: K,
        delay: D,
    ) -> ManipulatorResult<Self> {
        config.validate()?;
        let solver = IkSolver::new(config.geometry)?;
        let dispatcher = TrajectoryDispatcher::new(actuator, solver)
            .with_transition_time(config.transition_time);
        Ok(AutoCollector {
            config,
            dispatcher,
            camera,
            sink,
            delay,
            cancel: CancelToken::new(),
        })
    }

    /// Handles a service request.
    ///
    /// Runs the whole sequence synchronously if `start` is set. A request without `start` does
    /// not move the arm and is answered with `success = false`.
    pub fn start_auto_collection(&mut self, request: DataCollectRequest) -> DataCollectResponse {
        info!(start = request.start, "data collection requested");
        if !request.start {
            warn!("data collection request without start, nothing to do");
            return DataCollectResponse { success: false };
        }
        let success = match self.run() {
            Ok(report) => report.is_success(),
            Err(e) => {
                error!("data collection failed: {}", e);
                false
            }
        };
        DataCollectResponse { success }
    }

    /// Runs the configured sequence once.
    /// # Errors
    /// * Errors of opening the camera, of the IK solver and of the actuator. Capture failures are
    ///   reported in the [`RunReport`] instead.
    /// * [`CancelledError`](`crate::exception::ManipulatorException::CancelledError`) if the run was
    ///   cancelled.
    pub fn run(&mut self) -> ManipulatorResult<RunReport> {
        self.cancel.reset();
        let AutoCollector {
            config,
            dispatcher,
            camera,
            sink,
            delay,
            cancel,
        } = self;
        let mut session = CameraSession::open(camera, config.discard_frames)?;
        delay.sleep(config.warmup);
        let mut sequencer = PoseSequencer::new(&mut *delay, config.timings())
            .with_repetitions(config.repetitions)
            .with_start_index(config.start_index)
            .with_cancel_token(cancel.clone());
        let report = sequencer.run_sequence(dispatcher, &config.poses, |index| {
            let frame = session.capture()?;
            sink.store(index, &frame)
        });
        session.close();
        report
    }

    /// Replaces the cancel token, e.g. by one which is shared with a stop request handler.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token which stops a running collection before its next move.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &TrajectoryDispatcher<A> {
        &self.dispatcher
    }

    /// Dispatcher for manual moves and jogging between runs.
    pub fn dispatcher_mut(&mut self) -> &mut TrajectoryDispatcher<A> {
        &mut self.dispatcher
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use crate::camera::{CameraDevice, Frame, MockFrameSource};
    use crate::config::CollectionConfig;
    use crate::exception::{create_capture_exception, ManipulatorException, ManipulatorResult};
    use crate::robot::sequencer::PoseStep;
    use crate::robot::MockJointActuator;
    use crate::service::{AutoCollector, DataCollectRequest};
    use crate::utils::MockDelay;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct MockCamera {
        frames: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
        fail_every: usize,
    }

    impl CameraDevice for MockCamera {
        type Source = MockFrameSource;

        fn open(&mut self) -> ManipulatorResult<MockFrameSource> {
            let mut source = MockFrameSource::new();
            let frames = self.frames.clone();
            let fail_every = self.fail_every;
            source.expect_read_frame().returning(move || {
                let count = frames.fetch_add(1, Ordering::SeqCst) + 1;
                if fail_every > 0 && count % fail_every == 0 {
                    Err(create_capture_exception("no frame"))
                } else {
                    Ok(Frame { bytes: vec![1] })
                }
            });
            let releases = self.releases.clone();
            source.expect_release().times(1).returning(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            });
            Ok(source)
        }
    }

    fn camera(fail_every: usize) -> MockCamera {
        MockCamera {
            frames: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
            fail_every,
        }
    }

    fn config() -> CollectionConfig {
        CollectionConfig {
            repetitions: 2,
            discard_frames: 0,
            ..CollectionConfig::default()
        }
    }

    fn actuator(moves: usize) -> MockJointActuator {
        let mut actuator = MockJointActuator::new();
        actuator
            .expect_send_joint_trajectory()
            .times(moves)
            .returning(|_| Ok(()));
        actuator
    }

    fn delay() -> MockDelay {
        let mut delay = MockDelay::new();
        delay.expect_sleep().return_const(());
        delay
    }

    #[test]
    fn start_runs_the_configured_sequence() {
        let camera = camera(0);
        let releases = camera.releases.clone();
        let mut stored = Vec::new();
        let mut collector = AutoCollector::new(
            config(),
            actuator(10),
            camera,
            |index: u32, _frame: &Frame| -> ManipulatorResult<()> {
                stored.push(index);
                Ok(())
            },
            delay(),
        )
        .unwrap();
        let response = collector.start_auto_collection(DataCollectRequest { start: true });
        assert!(response.success);
        drop(collector);
        assert_eq!(stored, (1..=10).collect::<Vec<u32>>());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capture_failures_make_the_run_unsuccessful() {
        let mut stored = 0;
        let mut collector = AutoCollector::new(
            config(),
            actuator(10),
            camera(3),
            |_index: u32, _frame: &Frame| -> ManipulatorResult<()> {
                stored += 1;
                Ok(())
            },
            delay(),
        )
        .unwrap();
        let report = collector.run().unwrap();
        assert_eq!(report.captures_attempted, 10);
        assert_eq!(report.failed_captures.len(), 3);
        drop(collector);
        assert_eq!(stored, 7);
    }

    #[test]
    fn request_without_start_does_nothing() {
        let mut collector = AutoCollector::new(
            config(),
            actuator(0),
            camera(0),
            |_index: u32, _frame: &Frame| -> ManipulatorResult<()> { Ok(()) },
            MockDelay::new(),
        )
        .unwrap();
        let response = collector.start_auto_collection(DataCollectRequest { start: false });
        assert!(!response.success);
    }

    #[test]
    fn unreachable_pose_releases_camera_and_fails() {
        let camera = camera(0);
        let releases = camera.releases.clone();
        let config = CollectionConfig {
            poses: vec![PoseStep::new(150., 45., 130.), PoseStep::new(0., 0., 400.)],
            repetitions: 1,
            ..config()
        };
        let mut collector = AutoCollector::new(
            config,
            actuator(2),
            camera,
            |_index: u32, _frame: &Frame| -> ManipulatorResult<()> { Ok(()) },
            delay(),
        )
        .unwrap();
        assert!(matches!(
            collector.run(),
            Err(ManipulatorException::OutOfReachError { .. })
        ));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        let response = collector.start_auto_collection(DataCollectRequest { start: true });
        assert!(!response.success);
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn warmup_precedes_the_first_move() {
        let mut delay = MockDelay::new();
        let mut sequence = mockall::Sequence::new();
        delay
            .expect_sleep()
            .withf(|duration| *duration == Duration::from_secs(2))
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        delay
            .expect_sleep()
            .times(2)
            .in_sequence(&mut sequence)
            .return_const(());
        let config = CollectionConfig {
            poses: vec![PoseStep::new(150., 45., 130.)],
            repetitions: 1,
            ..config()
        };
        let mut collector = AutoCollector::new(
            config,
            actuator(1),
            camera(0),
            |_index: u32, _frame: &Frame| -> ManipulatorResult<()> { Ok(()) },
            delay,
        )
        .unwrap();
        assert!(collector.run().unwrap().is_success());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = CollectionConfig {
            poses: Vec::new(),
            ..config()
        };
        assert!(matches!(
            AutoCollector::new(
                config,
                actuator(0),
                camera(0),
                |_index: u32, _frame: &Frame| -> ManipulatorResult<()> { Ok(()) },
                MockDelay::new(),
            ),
            Err(ManipulatorException::ConfigException { .. })
        ));
    }
}
