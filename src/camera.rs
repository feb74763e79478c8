// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the camera boundary: frame sources, the scoped camera session and a frame sink which
//! stores captures as files.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::exception::{create_capture_exception, ManipulatorResult};

#[cfg(test)]
use mockall::automock;

/// Number of frames dropped before each capture on the reference camera. Drivers buffer a few
/// frames, which would otherwise show the arm before it settled.
pub const DEFAULT_DISCARD_FRAMES: usize = 5;

/// One captured image, already encoded by the camera driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub bytes: Vec<u8>,
}

/// An opened camera delivering frames.
#[cfg_attr(test, automock)]
pub trait FrameSource {
    /// Reads the next frame.
    /// # Errors
    /// * [`CaptureException`](`crate::exception::ManipulatorException::CaptureException`) if the
    ///   camera did not deliver a frame.
    fn read_frame(&mut self) -> ManipulatorResult<Frame>;
    /// Releases the underlying device.
    fn release(&mut self);
}

/// A camera device which can be opened for exclusive use.
pub trait CameraDevice {
    type Source: FrameSource;
    /// Opens the device.
    /// # Errors
    /// * [`CaptureException`](`crate::exception::ManipulatorException::CaptureException`) if the
    ///   device cannot be opened.
    fn open(&mut self) -> ManipulatorResult<Self::Source>;
}

/// Exclusive use of an opened camera for the duration of a run.
///
/// The source is released exactly once, when the session is closed or dropped, so it is also
/// released if the run is aborted.
pub struct CameraSession<S: FrameSource> {
    source: S,
    discard_frames: usize,
    released: bool,
}

impl<S: FrameSource> CameraSession<S> {
    pub fn new(source: S, discard_frames: usize) -> Self {
        info!(discard_frames, "camera session opened");
        CameraSession {
            source,
            discard_frames,
            released: false,
        }
    }

    /// Opens `device` and wraps the source in a session.
    pub fn open<C: CameraDevice<Source = S>>(
        device: &mut C,
        discard_frames: usize,
    ) -> ManipulatorResult<Self> {
        Ok(CameraSession::new(device.open()?, discard_frames))
    }

    /// Drops the stale frames and returns the next one.
    /// # Errors
    /// * [`CaptureException`](`crate::exception::ManipulatorException::CaptureException`) if the
    ///   kept frame could not be read. Failures of dropped frames are ignored.
    pub fn capture(&mut self) -> ManipulatorResult<Frame> {
        for _ in 0..self.discard_frames {
            if let Err(e) = self.source.read_frame() {
                debug!("dropped frame unavailable: {}", e);
            }
        }
        self.source.read_frame()
    }

    /// Releases the camera.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
            info!("camera session released");
        }
    }
}

impl<S: FrameSource> Drop for CameraSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Receives every captured frame together with its capture index.
pub trait FrameSink {
    /// Stores `frame`.
    fn store(&mut self, index: u32, frame: &Frame) -> ManipulatorResult<()>;
}

impl<F: FnMut(u32, &Frame) -> ManipulatorResult<()>> FrameSink for F {
    fn store(&mut self, index: u32, frame: &Frame) -> ManipulatorResult<()> {
        self(index, frame)
    }
}

/// Writes frames to `<directory>/box_<index>.jpg`.
#[derive(Debug, Clone)]
pub struct FrameSaver {
    directory: PathBuf,
    prefix: String,
    extension: String,
}

impl FrameSaver {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        FrameSaver {
            directory: directory.as_ref().to_path_buf(),
            prefix: "box".to_string(),
            extension: "jpg".to_string(),
        }
    }

    /// Changes the file name to `<prefix>_<index>.<extension>`.
    pub fn with_file_name(mut self, prefix: &str, extension: &str) -> Self {
        self.prefix = prefix.to_string();
        self.extension = extension.to_string();
        self
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        self.directory
            .join(format!("{}_{}.{}", self.prefix, index, self.extension))
    }

    /// Writes `frame`, creating the directory if needed.
    pub fn save(&self, index: u32, frame: &Frame) -> ManipulatorResult<PathBuf> {
        if frame.bytes.is_empty() {
            return Err(create_capture_exception("frame is empty"));
        }
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            create_capture_exception(&format!(
                "cannot create {}: {}",
                self.directory.display(),
                e
            ))
        })?;
        let path = self.path_for(index);
        std::fs::write(&path, &frame.bytes).map_err(|e| {
            warn!(path = %path.display(), "cannot write frame: {}", e);
            create_capture_exception(&format!("cannot write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "image saved");
        Ok(path)
    }
}

impl FrameSink for FrameSaver {
    fn store(&mut self, index: u32, frame: &Frame) -> ManipulatorResult<()> {
        self.save(index, frame).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::camera::{CameraSession, Frame, FrameSaver, FrameSink, MockFrameSource};
    use crate::exception::{create_capture_exception, ManipulatorException};
    use mockall::Sequence;

    fn frame(byte: u8) -> Frame {
        Frame { bytes: vec![byte] }
    }

    #[test]
    fn capture_drops_stale_frames() {
        let mut source = MockFrameSource::new();
        let mut sequence = Sequence::new();
        source
            .expect_read_frame()
            .times(5)
            .in_sequence(&mut sequence)
            .returning(|| Ok(frame(0)));
        source
            .expect_read_frame()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(frame(7)));
        source.expect_release().times(1).return_const(());
        let mut session = CameraSession::new(source, 5);
        assert_eq!(session.capture().unwrap(), frame(7));
        session.close();
    }

    #[test]
    fn failing_stale_frames_are_ignored() {
        let mut source = MockFrameSource::new();
        let mut sequence = Sequence::new();
        source
            .expect_read_frame()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|| Err(create_capture_exception("stale")));
        source
            .expect_read_frame()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Err(create_capture_exception("no frame")));
        source.expect_release().times(1).return_const(());
        let mut session = CameraSession::new(source, 2);
        assert!(matches!(
            session.capture(),
            Err(ManipulatorException::CaptureException { .. })
        ));
    }

    #[test]
    fn dropping_the_session_releases_once() {
        let mut source = MockFrameSource::new();
        source.expect_release().times(1).return_const(());
        let session = CameraSession::new(source, 0);
        drop(session);
    }

    #[test]
    fn saver_writes_indexed_files() {
        let directory = std::env::temp_dir().join(format!(
            "manipulator-frame-saver-{}",
            std::process::id()
        ));
        let mut saver = FrameSaver::new(&directory);
        let path = saver.save(3, &frame(42)).unwrap();
        assert_eq!(path, directory.join("box_3.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![42]);
        saver.store(4, &frame(1)).unwrap();
        assert!(directory.join("box_4.jpg").exists());
        assert!(saver.store(5, &Frame::default()).is_err());
        let png = FrameSaver::new(&directory).with_file_name("pose", "png");
        assert_eq!(png.path_for(9), directory.join("pose_9.png"));
        std::fs::remove_dir_all(&directory).unwrap();
    }
}
