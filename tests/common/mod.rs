//! Recording collaborators shared by the integration tests.
//!
//! Every mock writes into one [`EventLog`] so tests can assert on the
//! relative order of stream stops, decodes, buffer traffic and sink
//! notifications.

#![allow(dead_code)]

use coin_counter::capture::{
    Bitmap, CaptureConfig, DecodeError, DeviceError, Frame, ImageDecoder, ImageSource,
    MediaSource, MediaStream, FRAME_CHANNELS,
};
use coin_counter::lifecycle::{CaptureCoordinator, Collaborators, FramePump};
use coin_counter::processing::{DetectionResult, FrameProcessor};
use coin_counter::runtime::{
    bring_up, BufferId, BufferShape, Circle, CircleParams, ColorConversion, EdgeThresholds,
    RuntimeError, SoftwareRuntime, VisionRuntime,
};
use coin_counter::sink::{ControlState, ResultSink, StatusLevel, StatusMessage};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StreamOpened(u64),
    TracksStopped(u64),
    Decoded,
    Allocated,
    Freed,
    Published(u64),
    Controls(ControlState),
    Status(StatusLevel, String),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Knobs and counters for [`ScriptedRuntime`].
#[derive(Debug, Default)]
pub struct RuntimeKnobs {
    pub ready: bool,
    /// Fail every circle detection whose call index (from 0) is odd.
    pub fail_odd_detections: bool,
    pub fail_all_detections: bool,
    /// Circles reported in place of what the software runtime found.
    pub circles: Option<Vec<Circle>>,
    pub detections: u64,
    pub allocations: u64,
    pub frees: u64,
}

impl RuntimeKnobs {
    pub fn outstanding(&self) -> u64 {
        self.allocations - self.frees
    }
}

/// Software runtime with failure injection and buffer accounting.
pub struct ScriptedRuntime {
    inner: SoftwareRuntime,
    knobs: Rc<RefCell<RuntimeKnobs>>,
    log: EventLog,
}

impl VisionRuntime for ScriptedRuntime {
    fn is_ready(&self) -> bool {
        self.knobs.borrow().ready && self.inner.is_ready()
    }

    fn allocate_buffer(&mut self, shape: BufferShape) -> Result<BufferId, RuntimeError> {
        let id = self.inner.allocate_buffer(shape)?;
        self.knobs.borrow_mut().allocations += 1;
        self.log.borrow_mut().push(Event::Allocated);
        Ok(id)
    }

    fn free_buffer(&mut self, id: BufferId) -> Result<(), RuntimeError> {
        self.inner.free_buffer(id)?;
        self.knobs.borrow_mut().frees += 1;
        self.log.borrow_mut().push(Event::Freed);
        Ok(())
    }

    fn upload(&mut self, id: BufferId, pixels: &[u8]) -> Result<(), RuntimeError> {
        self.inner.upload(id, pixels)
    }

    fn convert_color(
        &mut self,
        src: BufferId,
        dst: BufferId,
        conversion: ColorConversion,
    ) -> Result<(), RuntimeError> {
        self.inner.convert_color(src, dst, conversion)
    }

    fn blur(&mut self, src: BufferId, dst: BufferId, kernel: u32) -> Result<(), RuntimeError> {
        self.inner.blur(src, dst, kernel)
    }

    fn detect_edges(
        &mut self,
        src: BufferId,
        dst: BufferId,
        thresholds: EdgeThresholds,
    ) -> Result<(), RuntimeError> {
        self.inner.detect_edges(src, dst, thresholds)
    }

    fn detect_circles(
        &mut self,
        edges: BufferId,
        params: &CircleParams,
    ) -> Result<Vec<Circle>, RuntimeError> {
        let found = self.inner.detect_circles(edges, params)?;
        let mut knobs = self.knobs.borrow_mut();
        let call = knobs.detections;
        knobs.detections += 1;

        if knobs.fail_all_detections || (knobs.fail_odd_detections && call % 2 == 1) {
            return Err(RuntimeError::Internal(format!("injected failure #{call}")));
        }
        Ok(knobs.circles.clone().unwrap_or(found))
    }
}

/// Counters for [`ScriptedCamera`] streams.
#[derive(Debug, Default)]
pub struct CameraKnobs {
    pub deny: bool,
    pub fail_stop: bool,
    pub fail_reads: bool,
    pub opened: u64,
    pub live: u64,
}

pub struct ScriptedCamera {
    knobs: Rc<RefCell<CameraKnobs>>,
    log: EventLog,
}

impl MediaSource for ScriptedCamera {
    fn request_stream(
        &mut self,
        constraints: &CaptureConfig,
    ) -> Result<Box<dyn MediaStream>, DeviceError> {
        let mut knobs = self.knobs.borrow_mut();
        if knobs.deny {
            return Err(DeviceError::PermissionDenied);
        }
        constraints
            .validate()
            .map_err(|e| DeviceError::Overconstrained(e.to_string()))?;
        knobs.opened += 1;
        knobs.live += 1;
        let id = knobs.opened;
        self.log.borrow_mut().push(Event::StreamOpened(id));

        Ok(Box::new(ScriptedStream {
            id,
            width: constraints.width,
            height: constraints.height,
            sequence: 0,
            live: true,
            knobs: Rc::clone(&self.knobs),
            log: Rc::clone(&self.log),
        }))
    }
}

struct ScriptedStream {
    id: u64,
    width: u32,
    height: u32,
    sequence: u64,
    live: bool,
    knobs: Rc<RefCell<CameraKnobs>>,
    log: EventLog,
}

impl MediaStream for ScriptedStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        if !self.live {
            return Err(DeviceError::Stopped);
        }
        if self.knobs.borrow().fail_reads {
            return Err(DeviceError::ReadFailed("sensor glitch".into()));
        }
        self.sequence += 1;
        let pixels = vec![32; self.width as usize * self.height as usize * FRAME_CHANNELS];
        Ok(Frame::new(pixels, self.width, self.height, self.sequence))
    }

    fn stop_all_tracks(&mut self) -> Result<(), DeviceError> {
        if self.live {
            self.live = false;
            self.knobs.borrow_mut().live -= 1;
            self.log.borrow_mut().push(Event::TracksStopped(self.id));
        }
        if self.knobs.borrow().fail_stop {
            return Err(DeviceError::StopFailed("track busy".into()));
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Decodes any non-empty byte source into a flat 24x24 bitmap.
pub struct ScriptedDecoder {
    log: EventLog,
}

impl ImageDecoder for ScriptedDecoder {
    fn decode(&mut self, source: &ImageSource) -> Result<Bitmap, DecodeError> {
        match source {
            ImageSource::Bytes(bytes) if !bytes.is_empty() => {
                self.log.borrow_mut().push(Event::Decoded);
                Bitmap::from_rgba(24, 24, vec![bytes[0]; 24 * 24 * 4])
            }
            ImageSource::Bytes(_) => Err(DecodeError::Format("empty input".into())),
            ImageSource::Path(path) => Err(DecodeError::Io(format!("{} not found", path.display()))),
        }
    }
}

pub struct RecordingSink {
    log: EventLog,
    pub results: Rc<RefCell<Vec<DetectionResult>>>,
}

impl ResultSink for RecordingSink {
    fn publish(&mut self, result: &DetectionResult) {
        self.log.borrow_mut().push(Event::Published(result.total()));
        self.results.borrow_mut().push(result.clone());
    }

    fn controls_changed(&mut self, controls: ControlState) {
        self.log.borrow_mut().push(Event::Controls(controls));
    }

    fn status(&mut self, message: &StatusMessage) {
        self.log
            .borrow_mut()
            .push(Event::Status(message.level, message.text.clone()));
    }
}

/// A coordinator wired to recording collaborators.
pub struct Harness {
    pub coordinator: CaptureCoordinator,
    pub pump: FramePump,
    pub log: EventLog,
    pub runtime: Rc<RefCell<RuntimeKnobs>>,
    pub camera: Rc<RefCell<CameraKnobs>>,
    pub results: Rc<RefCell<Vec<DetectionResult>>>,
}

impl Harness {
    pub fn new() -> Self {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let runtime = Rc::new(RefCell::new(RuntimeKnobs {
            ready: true,
            ..Default::default()
        }));
        let camera = Rc::new(RefCell::new(CameraKnobs::default()));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut inner = SoftwareRuntime::new();
        bring_up(&mut inner).expect("software runtime bring-up");

        let pump = FramePump::new();
        let coordinator = CaptureCoordinator::new(
            Collaborators {
                runtime: Box::new(ScriptedRuntime {
                    inner,
                    knobs: Rc::clone(&runtime),
                    log: Rc::clone(&log),
                }),
                media: Box::new(ScriptedCamera {
                    knobs: Rc::clone(&camera),
                    log: Rc::clone(&log),
                }),
                decoder: Box::new(ScriptedDecoder {
                    log: Rc::clone(&log),
                }),
                scheduler: Box::new(pump.clone()),
                sink: Box::new(RecordingSink {
                    log: Rc::clone(&log),
                    results: Rc::clone(&results),
                }),
            },
            CaptureConfig::with_dimensions(48, 36),
            FrameProcessor::default(),
        );

        Self {
            coordinator,
            pump,
            log,
            runtime,
            camera,
            results,
        }
    }

    /// One display refresh: fire the pump and deliver every queued ticket.
    pub fn refresh(&mut self) {
        self.pump.tick();
        for ticket in self.pump.drain() {
            self.coordinator.on_frame(ticket);
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn position(&self, wanted: &Event) -> Option<usize> {
        self.log.borrow().iter().position(|event| event == wanted)
    }

    pub fn last_controls(&self) -> Option<ControlState> {
        self.log.borrow().iter().rev().find_map(|event| match event {
            Event::Controls(controls) => Some(*controls),
            _ => None,
        })
    }

    pub fn danger_messages(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Status(StatusLevel::Danger, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Encoded bytes for the scripted decoder; the first byte becomes the fill.
pub fn image_bytes(fill: u8) -> Vec<u8> {
    vec![fill, 0, 0, 0]
}
