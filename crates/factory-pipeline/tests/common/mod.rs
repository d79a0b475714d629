// Scripted collaborators shared by the pipeline integration tests.
#![allow(dead_code)]

use factory_camera::{CameraError, Frame, FrameSource, MemorySource};
use factory_detect::{ActuationRule, Classification, DetectError, Detector, Rect, Region};
use factory_pipeline::{
    Actuator, ActuatorId, Collaborators, DeviceError, DisplayError, DisplaySink, Lane, NeverStop,
    SourceId, StopRequest,
};
use image::{Rgb, RgbImage};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn frames(n: usize) -> Vec<RgbImage> {
    (0..n)
        .map(|i| RgbImage::from_pixel(8, 8, Rgb([i as u8, 0, 0])))
        .collect()
}

/// Reports a whole-frame region for the listed frame sequence numbers.
pub struct FlagFrames {
    pub hits: BTreeSet<u64>,
}

impl FlagFrames {
    pub fn on(hits: &[u64]) -> Self {
        Self {
            hits: hits.iter().copied().collect(),
        }
    }
}

impl Detector for FlagFrames {
    type Input = Frame;
    type Output = Region;

    fn detect(&mut self, frame: &Frame) -> factory_detect::Result<Option<Region>> {
        if !self.hits.contains(&frame.seq) {
            return Ok(None);
        }
        Ok(Some(Region {
            image: frame.image.clone(),
            bounds: Rect {
                x: 0,
                y: 0,
                width: frame.width(),
                height: frame.height(),
            },
            frame_seq: frame.seq,
        }))
    }

    fn name(&self) -> &'static str {
        "flag-frames"
    }
}

/// Returns the same scores for every region.
pub struct FixedScores(pub Vec<(&'static str, f32)>);

impl Detector for FixedScores {
    type Input = Region;
    type Output = Classification;

    fn detect(&mut self, _: &Region) -> factory_detect::Result<Option<Classification>> {
        Ok(Some(Classification::ranked(self.0.iter().copied())))
    }

    fn name(&self) -> &'static str {
        "fixed-scores"
    }
}

pub struct PanicOnFrame(pub u64);

impl Detector for PanicOnFrame {
    type Input = Frame;
    type Output = Region;

    fn detect(&mut self, frame: &Frame) -> factory_detect::Result<Option<Region>> {
        if frame.seq == self.0 {
            panic!("detector blew up on frame {}", frame.seq);
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "panic-on-frame"
    }
}

/// Motion stage that errors on every frame.
pub struct FailingMotion;

impl Detector for FailingMotion {
    type Input = Frame;
    type Output = Region;

    fn detect(&mut self, _: &Frame) -> factory_detect::Result<Option<Region>> {
        Err(DetectError::InvalidOutputShape(vec![]))
    }

    fn name(&self) -> &'static str {
        "failing-motion"
    }
}

/// Classifier that errors on every region.
pub struct FailingClassifier;

impl Detector for FailingClassifier {
    type Input = Region;
    type Output = Classification;

    fn detect(&mut self, _: &Region) -> factory_detect::Result<Option<Classification>> {
        Err(DetectError::InvalidOutputShape(vec![1]))
    }

    fn name(&self) -> &'static str {
        "failing-classifier"
    }
}

/// Never runs out; stands in for a live camera.
pub struct Endless {
    seq: u64,
}

impl Endless {
    pub fn new() -> Self {
        Self { seq: 0 }
    }
}

impl FrameSource for Endless {
    fn next_frame(&mut self) -> factory_camera::Result<Option<Frame>> {
        let frame = Frame::new(RgbImage::new(8, 8), self.seq);
        self.seq += 1;
        Ok(Some(frame))
    }
}

/// Yields `ok` frames, then fails.
pub struct Failing {
    ok: u64,
    seq: u64,
}

impl Failing {
    pub fn after(ok: u64) -> Self {
        Self { ok, seq: 0 }
    }
}

impl FrameSource for Failing {
    fn next_frame(&mut self) -> factory_camera::Result<Option<Frame>> {
        if self.seq >= self.ok {
            return Err(CameraError::Pipeline("cable unplugged".to_string()));
        }
        let frame = Frame::new(RgbImage::new(8, 8), self.seq);
        self.seq += 1;
        Ok(Some(frame))
    }
}

pub fn bad_above_half() -> ActuationRule {
    ActuationRule::LabelAbove {
        label: "bad".to_string(),
        threshold: 0.5,
    }
}

/// A lane over in-memory frames with scripted detection and scores.
pub fn scripted_lane(camera: u8, actuator: ActuatorId, n: usize, hits: &[u64], bad: f32) -> Lane {
    Lane {
        id: SourceId(camera),
        actuator,
        source: Box::new(MemorySource::new(frames(n))),
        detector: Box::new(FlagFrames::on(hits)),
        classifier: Box::new(FixedScores(vec![("bad", bad), ("good", 1.0 - bad)])),
        rule: bad_above_half(),
    }
}

pub fn endless_lane(camera: u8, actuator: ActuatorId) -> Lane {
    Lane {
        id: SourceId(camera),
        actuator,
        source: Box::new(Endless::new()),
        detector: Box::new(FlagFrames::on(&[])),
        classifier: Box::new(FixedScores(vec![("bad", 0.0)])),
        rule: bad_above_half(),
    }
}

#[derive(Clone, Default)]
pub struct PushLog(pub Arc<Mutex<Vec<ActuatorId>>>);

impl PushLog {
    pub fn pushes(&self) -> Vec<ActuatorId> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeActuator {
    pub log: PushLog,
    pub fail: bool,
}

impl Actuator for FakeActuator {
    fn push(&mut self, lane: ActuatorId) -> Result<(), DeviceError> {
        self.log.0.lock().unwrap().push(lane);
        if self.fail {
            return Err(DeviceError::Unavailable("/dev/fake".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ShowLog(pub Arc<Mutex<Vec<String>>>);

impl ShowLog {
    pub fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeDisplay {
    pub log: ShowLog,
    /// Ask to quit once this many images were shown.
    pub quit_after: Option<usize>,
}

impl DisplaySink for FakeDisplay {
    fn show(&mut self, title: &str, _image: &RgbImage) -> Result<(), DisplayError> {
        self.log.0.lock().unwrap().push(title.to_string());
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        match self.quit_after {
            Some(n) => self.log.0.lock().unwrap().len() >= n,
            None => false,
        }
    }
}

/// Fires once the shared counter reaches `after` polls.
pub struct StopAfterPolls {
    pub polls: Arc<AtomicUsize>,
    pub after: usize,
}

impl StopRequest for StopAfterPolls {
    fn stop_requested(&mut self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after
    }
}

pub struct Harness {
    pub pushes: PushLog,
    pub shows: ShowLog,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            pushes: PushLog::default(),
            shows: ShowLog::default(),
        }
    }

    pub fn collaborators(&self, failing_actuator: bool) -> Collaborators {
        self.with_stop(failing_actuator, Box::new(NeverStop))
    }

    pub fn with_stop(&self, failing_actuator: bool, stop: Box<dyn StopRequest>) -> Collaborators {
        Collaborators {
            actuator: Box::new(FakeActuator {
                log: self.pushes.clone(),
                fail: failing_actuator,
            }),
            display: Box::new(FakeDisplay {
                log: self.shows.clone(),
                quit_after: None,
            }),
            stop,
        }
    }
}

pub fn stop_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}
