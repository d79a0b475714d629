// factory-camera/src/lib.rs
// ============================================================
// Frame acquisition for the conveyor inspection pipeline
// Each lane pulls RGB frames one at a time from a FrameSource.
// ------------------------------------------------------------
// Public API:
//   * FrameSource::next_frame() – next frame or end-of-stream
//   * ImageSequence::open(dir)  – directory of stills, by name
//   * MemorySource::new(imgs)   – in-memory frames (fixtures)
//   * VideoFile::open(path)     – GStreamer decode (feature)
// ------------------------------------------------------------
// Build notes
//   * `--features gstreamer` needs the system GStreamer libs.
// ============================================================

//! Conveyor – camera layer
//!
//! A [`FrameSource`] hands out owned [`Frame`]s in arrival order. End of
//! stream is `Ok(None)`, which is the normal way a lane finishes; only
//! genuine I/O or decode failures are reported as [`CameraError`].

use image::RgbImage;
use thiserror::Error;

mod sequence;
pub use sequence::ImageSequence;

#[cfg(feature = "gstreamer")]
mod video;
#[cfg(feature = "gstreamer")]
pub use video::VideoFile;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Frame source {0} does not exist")]
    MissingSource(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Frame source {0} contains no frames")]
    Empty(String),
    #[error("Unsupported frame source {0}")]
    Unsupported(String),
    #[cfg(feature = "gstreamer")]
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to set pipeline to Playing: {0}")]
    StateChange(#[source] gst::StateChangeError),
    #[error("Pipeline element error: {0}")]
    Pipeline(String),
    #[error("Buffer map failed: {0}")]
    BufferMap(String),
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// One captured frame.
///
/// `seq` is the arrival index within its source, starting at 0.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self { image, seq }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Sequential frame provider owned by exactly one lane worker.
///
/// `next_frame` may block on physical I/O. Returning `Ok(None)` means the
/// stream is exhausted and no further frames will follow.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human readable origin, used in log lines.
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Frames held in memory, yielded once in order.
pub struct MemorySource {
    frames: std::vec::IntoIter<RgbImage>,
    next_seq: u64,
}

impl MemorySource {
    pub fn new(images: Vec<RgbImage>) -> Self {
        Self {
            frames: images.into_iter(),
            next_seq: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next().map(|image| {
            let frame = Frame::new(image, self.next_seq);
            self.next_seq += 1;
            frame
        }))
    }

    fn describe(&self) -> String {
        format!("memory ({} frames left)", self.frames.len())
    }
}

/// Open the right source for `path`: a directory becomes an
/// [`ImageSequence`], anything else a [`VideoFile`] when GStreamer support is
/// compiled in.
pub fn open_source(path: &std::path::Path) -> Result<Box<dyn FrameSource>> {
    if !path.exists() {
        return Err(CameraError::MissingSource(path.display().to_string()));
    }
    if path.is_dir() {
        return Ok(Box::new(ImageSequence::open(path)?));
    }

    #[cfg(feature = "gstreamer")]
    {
        Ok(Box::new(VideoFile::open(path)?))
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        Err(CameraError::Unsupported(format!(
            "{} (video files need --features gstreamer)",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_numbers_frames_then_ends() {
        let imgs = vec![RgbImage::new(4, 4), RgbImage::new(4, 4)];
        let mut src = MemorySource::new(imgs);
        assert_eq!(src.next_frame().unwrap().unwrap().seq, 0);
        assert_eq!(src.next_frame().unwrap().unwrap().seq, 1);
        assert!(src.next_frame().unwrap().is_none());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn open_source_rejects_missing_path() {
        let err = open_source(std::path::Path::new("/definitely/not/here")).err().unwrap();
        assert!(matches!(err, CameraError::MissingSource(_)));
    }
}
