// factory-camera/src/video.rs
// Video file playback through a filesrc → decodebin → appsink pipeline.
use crate::{CameraError, Frame, FrameSource, Result};
use gst::prelude::*;
use std::path::Path;

/// Decoded video file delivering packed RGB frames.
pub struct VideoFile {
    location: String,
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    next_seq: u64,
}

impl VideoFile {
    pub fn open(path: &Path) -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;

        let location = path.display().to_string();
        let pipe_str = format!(
            "filesrc location=\"{location}\" ! decodebin ! videoconvert \
            ! video/x-raw,format=RGB ! appsink name=sink sync=false max-buffers=4"
        );

        let pipeline = gst::parse::launch(&pipe_str)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::Pipeline("not a gst::Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Pipeline("appsink element not found".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::Pipeline("appsink downcast failed".into()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(CameraError::StateChange)?;

        Ok(Self {
            location,
            pipeline,
            appsink,
            next_seq: 0,
        })
    }

    fn sample_to_image(sample: &gst::Sample) -> Result<image::RgbImage> {
        let buffer = sample
            .buffer()
            .ok_or_else(|| CameraError::Pipeline("sample has no buffer".into()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| CameraError::Pipeline("sample has no caps".into()))?;
        let s = caps
            .structure(0)
            .ok_or_else(|| CameraError::Pipeline("caps missing struct".into()))?;
        let width = s
            .get::<i32>("width")
            .map_err(|e| CameraError::Pipeline(e.to_string()))? as usize;
        let height = s
            .get::<i32>("height")
            .map_err(|e| CameraError::Pipeline(e.to_string()))? as usize;

        if width == 0 || height == 0 {
            return Err(CameraError::Pipeline(format!("empty frame {width}x{height}")));
        }

        // GStreamer pads RGB rows to 4 bytes
        let row = width * 3;
        let stride = (row + 3) & !3;

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::BufferMap(e.to_string()))?;
        let data = map.as_slice();
        if data.len() < stride * (height - 1) + row {
            return Err(CameraError::BufferMap(format!(
                "buffer of {} bytes too small for {width}x{height}",
                data.len()
            )));
        }

        let mut bytes = Vec::with_capacity(row * height);
        for y in 0..height {
            bytes.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        image::RgbImage::from_raw(width as u32, height as u32, bytes)
            .ok_or_else(|| CameraError::BufferMap("frame size mismatch".into()))
    }
}

impl FrameSource for VideoFile {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.appsink.pull_sample() {
            Ok(sample) => {
                let image = Self::sample_to_image(&sample)?;
                let frame = Frame::new(image, self.next_seq);
                self.next_seq += 1;
                Ok(Some(frame))
            }
            Err(_) if self.appsink.is_eos() => Ok(None),
            Err(e) => Err(CameraError::Pipeline(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("video file {}", self.location)
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
