//! Deterministic in-process display for demos and tests.

use super::{
    Anchor, AnchorOffset, BaseLayer, CoordinateSystem, CoordinateSystemKind, Coordinates, Eye,
    FrameRequestId, NormalizedViewport, SessionEvent, SessionInit, SessionType, View, ViewPose,
    XrDisplay, XrFrame, XrSession,
};
use crate::error::{XrError, XrResult};
use crate::math::Matrix4;
use crate::render::GraphicsContext;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const FRAME_RATE: f32 = 90.0;
const HEAD_SWAY_METERS: f32 = 0.05;
const HEAD_YAW_RADIANS_PER_SECOND: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloorLookup {
    #[default]
    Available,
    Missing,
    Failing,
}

#[derive(Debug, Clone)]
pub struct SimulatedDisplayConfig {
    pub name: String,
    pub supports_reality: bool,
    pub supports_augmentation: bool,
    pub eye_resolution: [u32; 2],
    pub fov_y_degrees: f32,
    pub eye_height: f32,
    pub floor_height: f32,
}

impl Default for SimulatedDisplayConfig {
    fn default() -> Self {
        Self {
            name: "Simulated HMD".to_string(),
            supports_reality: true,
            supports_augmentation: false,
            eye_resolution: [1440, 1600],
            fov_y_degrees: 90.0,
            eye_height: 1.6,
            floor_height: 0.0,
        }
    }
}

#[derive(Default)]
struct SimulatedState {
    anchors: HashMap<String, Anchor>,
    events: VecDeque<SessionEvent>,
    floor_lookup: FloorLookup,
    reject_sessions: bool,
    end_requested: bool,
    sessions_started: u32,
    frame_requests: u64,
    frames_delivered: u64,
}

fn lock(state: &Mutex<SimulatedState>) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle for steering a simulated display from outside the session.
#[derive(Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedController {
    pub fn add_anchor(&self, uid: impl Into<String>, coordinates: Coordinates) {
        let uid = uid.into();
        lock(&self.state)
            .anchors
            .insert(uid.clone(), Anchor { uid, coordinates });
    }

    pub fn remove_anchor(&self, uid: &str) -> bool {
        lock(&self.state).anchors.remove(uid).is_some()
    }

    pub fn push_event(&self, event: SessionEvent) {
        lock(&self.state).events.push_back(event);
    }

    /// Ends the session from the device side, as if the user took off the headset.
    pub fn end_session(&self) {
        let mut state = lock(&self.state);
        if !state.end_requested {
            state.end_requested = true;
            state.events.push_back(SessionEvent::End);
        }
    }

    pub fn set_floor_lookup(&self, lookup: FloorLookup) {
        lock(&self.state).floor_lookup = lookup;
    }

    pub fn set_reject_sessions(&self, reject: bool) {
        lock(&self.state).reject_sessions = reject;
    }

    pub fn sessions_started(&self) -> u32 {
        lock(&self.state).sessions_started
    }

    pub fn frame_requests(&self) -> u64 {
        lock(&self.state).frame_requests
    }

    pub fn frames_delivered(&self) -> u64 {
        lock(&self.state).frames_delivered
    }
}

pub struct SimulatedDisplay {
    config: SimulatedDisplayConfig,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedDisplay {
    pub fn new(config: SimulatedDisplayConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimulatedState::default())),
        }
    }

    pub fn augmentation() -> Self {
        Self::new(SimulatedDisplayConfig {
            name: "Simulated Passthrough".to_string(),
            supports_reality: false,
            supports_augmentation: true,
            ..SimulatedDisplayConfig::default()
        })
    }

    pub fn controller(&self) -> SimulatedController {
        SimulatedController {
            state: Arc::clone(&self.state),
        }
    }

    pub fn config(&self) -> &SimulatedDisplayConfig {
        &self.config
    }
}

impl Default for SimulatedDisplay {
    fn default() -> Self {
        Self::new(SimulatedDisplayConfig::default())
    }
}

impl XrDisplay for SimulatedDisplay {
    fn display_name(&self) -> &str {
        &self.config.name
    }

    fn supports_session(&self, init: &SessionInit) -> bool {
        match init.session_type {
            SessionType::Reality => self.config.supports_reality,
            SessionType::Augmentation => self.config.supports_augmentation,
        }
    }

    fn request_session(&mut self, init: &SessionInit) -> XrResult<Box<dyn XrSession>> {
        if !self.supports_session(init) {
            return Err(XrError::SessionRequest(format!(
                "{} does not support {:?} sessions",
                self.config.name, init.session_type
            )));
        }

        {
            let mut state = lock(&self.state);
            if state.reject_sessions {
                return Err(XrError::SessionRequest(format!(
                    "{} rejected the session request",
                    self.config.name
                )));
            }
            state.sessions_started += 1;
            state.end_requested = false;
            state.events.clear();
        }

        log::debug!(
            "[simulated] {} session started on {}",
            if init.exclusive { "exclusive" } else { "shared" },
            self.config.name
        );

        Ok(Box::new(SimulatedSession {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            depth_range: (0.1, 1000.0),
            base_layer: None,
            pending: None,
            next_request: 0,
            frame_index: 0,
            ended: false,
        }))
    }
}

pub struct SimulatedSession {
    config: SimulatedDisplayConfig,
    state: Arc<Mutex<SimulatedState>>,
    depth_range: (f32, f32),
    base_layer: Option<BaseLayer>,
    pending: Option<FrameRequestId>,
    next_request: u64,
    frame_index: u64,
    ended: bool,
}

impl SimulatedSession {
    fn build_views(&self) -> Vec<View> {
        let [width, height] = self.config.eye_resolution;
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let (near, far) = self.depth_range;
        let projection =
            Matrix4::perspective(self.config.fov_y_degrees.to_radians(), aspect, near, far);

        [(Eye::Left, 0.0), (Eye::Right, 0.5)]
            .into_iter()
            .map(|(eye, x)| View {
                eye,
                projection_matrix: projection,
                viewport: NormalizedViewport {
                    x,
                    y: 0.0,
                    width: 0.5,
                    height: 1.0,
                },
            })
            .collect()
    }
}

impl XrSession for SimulatedSession {
    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth_range = (near, far);
    }

    fn depth_range(&self) -> (f32, f32) {
        self.depth_range
    }

    fn create_base_layer(&mut self, context: GraphicsContext) -> XrResult<BaseLayer> {
        if self.is_ended() {
            return Err(XrError::SessionEnded);
        }
        let [width, height] = self.config.eye_resolution;
        let layer = BaseLayer {
            framebuffer_width: width * 2,
            framebuffer_height: height,
            context,
        };
        self.base_layer = Some(layer);
        Ok(layer)
    }

    fn base_layer(&self) -> Option<&BaseLayer> {
        self.base_layer.as_ref()
    }

    fn request_frame(&mut self) -> FrameRequestId {
        self.next_request += 1;
        let request = FrameRequestId(self.next_request);
        self.pending = Some(request);
        lock(&self.state).frame_requests += 1;
        request
    }

    fn cancel_frame(&mut self, request: FrameRequestId) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }

    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>> {
        if self.is_ended() {
            return None;
        }
        self.pending.take()?;
        self.frame_index += 1;
        lock(&self.state).frames_delivered += 1;

        let seconds = self.frame_index as f32 / FRAME_RATE;
        let head = Matrix4::translation(
            HEAD_SWAY_METERS * seconds.sin(),
            self.config.eye_height,
            0.0,
        ) * Matrix4::rotation_y(HEAD_YAW_RADIANS_PER_SECOND * seconds);

        Some(Box::new(SimulatedFrame {
            state: Arc::clone(&self.state),
            views: self.build_views(),
            head,
            eye_height: self.config.eye_height,
            floor_height: self.config.floor_height,
        }))
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        lock(&self.state).events.pop_front()
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.pending = None;
        let mut state = lock(&self.state);
        if !state.end_requested {
            state.end_requested = true;
            state.events.push_back(SessionEvent::End);
        }
    }

    fn is_ended(&self) -> bool {
        self.ended || lock(&self.state).end_requested
    }
}

pub struct SimulatedFrame {
    state: Arc<Mutex<SimulatedState>>,
    views: Vec<View>,
    head: Matrix4,
    eye_height: f32,
    floor_height: f32,
}

impl XrFrame for SimulatedFrame {
    fn coordinate_system(&self, kind: CoordinateSystemKind) -> Option<CoordinateSystem> {
        let to_tracker = match kind {
            CoordinateSystemKind::Tracker => Matrix4::identity(),
            CoordinateSystemKind::EyeLevel | CoordinateSystemKind::HeadModel => {
                Matrix4::translation(0.0, self.eye_height, 0.0)
            }
        };
        Some(CoordinateSystem { kind, to_tracker })
    }

    fn view_pose(&self, coordinate_system: &CoordinateSystem) -> Option<ViewPose> {
        let from_tracker = coordinate_system.to_tracker.inverse()?;
        Some(ViewPose {
            pose_model_matrix: from_tracker * self.head,
        })
    }

    fn views(&self) -> &[View] {
        &self.views
    }

    fn anchor(&self, uid: &str) -> Option<Anchor> {
        lock(&self.state).anchors.get(uid).cloned()
    }

    fn find_floor_anchor(&self, name: &str) -> XrResult<Option<AnchorOffset>> {
        let mut state = lock(&self.state);
        match state.floor_lookup {
            FloorLookup::Failing => Err(XrError::Anchor("floor detection failed".to_string())),
            FloorLookup::Missing => Ok(None),
            FloorLookup::Available => {
                let eye_level = self
                    .coordinate_system(CoordinateSystemKind::EyeLevel)
                    .unwrap_or_else(CoordinateSystem::tracker);
                state.anchors.insert(
                    name.to_string(),
                    Anchor {
                        uid: name.to_string(),
                        coordinates: Coordinates {
                            coordinate_system: eye_level,
                            pose_matrix: Matrix4::translation(
                                0.0,
                                self.floor_height - self.eye_height,
                                0.0,
                            ),
                        },
                    },
                );
                Ok(Some(AnchorOffset::new(name, Matrix4::identity())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(display: &mut SimulatedDisplay) -> Box<dyn XrSession> {
        display
            .request_session(&SessionInit::new(true))
            .expect("simulated display supports reality")
    }

    #[test]
    fn frames_are_delivered_once_per_request() {
        let mut display = SimulatedDisplay::default();
        let controller = display.controller();
        let mut session = start(&mut display);

        assert!(session.poll_frame().is_none());
        session.request_frame();
        assert!(session.poll_frame().is_some());
        assert!(session.poll_frame().is_none());
        assert_eq!(controller.frame_requests(), 1);
        assert_eq!(controller.frames_delivered(), 1);
    }

    #[test]
    fn cancelled_request_delivers_nothing() {
        let mut display = SimulatedDisplay::default();
        let mut session = start(&mut display);
        let request = session.request_frame();
        session.cancel_frame(request);
        assert!(session.poll_frame().is_none());
    }

    #[test]
    fn augmentation_only_display_rejects_reality() {
        let mut display = SimulatedDisplay::augmentation();
        assert!(!display.supports_session(&SessionInit::new(true)));
        assert!(display.supports_session(&SessionInit::new(false)));
        assert!(matches!(
            display.request_session(&SessionInit::new(true)),
            Err(XrError::SessionRequest(_))
        ));
    }

    #[test]
    fn base_layer_spans_both_eyes() {
        let mut display = SimulatedDisplay::default();
        let mut session = start(&mut display);
        let layer = session
            .create_base_layer(GraphicsContext { id: 3 })
            .expect("session is live");
        assert_eq!(layer.framebuffer_width, 2880);
        assert_eq!(layer.framebuffer_height, 1600);
        assert_eq!(session.base_layer(), Some(&layer));
    }

    #[test]
    fn head_pose_is_at_eye_height_in_tracker_space() {
        let mut display = SimulatedDisplay::default();
        let mut session = start(&mut display);
        session.request_frame();
        let frame = session.poll_frame().expect("frame requested");

        let tracker = frame
            .coordinate_system(CoordinateSystemKind::Tracker)
            .expect("tracker space");
        let pose = frame.view_pose(&tracker).expect("pose");
        assert!((pose.pose_model_matrix.position()[1] - 1.6).abs() < 1e-5);

        let head_model = frame
            .coordinate_system(CoordinateSystemKind::HeadModel)
            .expect("head model space");
        let pose = frame.view_pose(&head_model).expect("pose");
        assert!(pose.pose_model_matrix.position()[1].abs() < 1e-5);
        assert_eq!(frame.views().len(), 2);
    }

    #[test]
    fn floor_anchor_registers_in_eye_level_space() {
        let mut display = SimulatedDisplay::default();
        let mut session = start(&mut display);
        session.request_frame();
        let frame = session.poll_frame().expect("frame");

        let offset = frame
            .find_floor_anchor("first-floor-anchor")
            .expect("lookup succeeds")
            .expect("floor available");
        let anchor = frame.anchor(&offset.anchor_uid).expect("anchor registered");
        assert_eq!(
            anchor.coordinates.coordinate_system.kind,
            CoordinateSystemKind::EyeLevel
        );
    }

    #[test]
    fn floor_lookup_modes() {
        let mut display = SimulatedDisplay::default();
        let controller = display.controller();
        let mut session = start(&mut display);
        session.request_frame();
        let frame = session.poll_frame().expect("frame");

        controller.set_floor_lookup(FloorLookup::Missing);
        assert!(frame.find_floor_anchor("floor").unwrap().is_none());
        controller.set_floor_lookup(FloorLookup::Failing);
        assert!(matches!(
            frame.find_floor_anchor("floor"),
            Err(XrError::Anchor(_))
        ));
    }

    #[test]
    fn ending_queues_a_single_end_event() {
        let mut display = SimulatedDisplay::default();
        let controller = display.controller();
        let mut session = start(&mut display);

        session.request_frame();
        controller.end_session();
        session.end();

        assert!(session.is_ended());
        assert!(session.poll_frame().is_none());
        assert_eq!(session.poll_event(), Some(SessionEvent::End));
        assert_eq!(session.poll_event(), None);
    }
}
