//! Immersive display surface: displays, sessions, frames and the pose/anchor
//! value types they report.

pub mod simulated;

use crate::error::XrResult;
use crate::math::Matrix4;
use crate::render::{GraphicsContext, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    Reality,
    Augmentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInit {
    pub exclusive: bool,
    pub session_type: SessionType,
}

impl SessionInit {
    /// Virtual reality sessions are exclusive; augmentation sessions share the display.
    pub fn new(create_virtual_reality: bool) -> Self {
        Self {
            exclusive: create_virtual_reality,
            session_type: if create_virtual_reality {
                SessionType::Reality
            } else {
                SessionType::Augmentation
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystemKind {
    HeadModel,
    EyeLevel,
    Tracker,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSystem {
    pub kind: CoordinateSystemKind,
    /// Maps poses expressed in this system into tracker space.
    pub to_tracker: Matrix4,
}

impl CoordinateSystem {
    pub fn tracker() -> Self {
        Self {
            kind: CoordinateSystemKind::Tracker,
            to_tracker: Matrix4::identity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub coordinate_system: CoordinateSystem,
    pub pose_matrix: Matrix4,
}

impl Coordinates {
    /// Re-expresses this pose in `target`. `None` when `target` cannot be inverted.
    pub fn transformed_to(&self, target: &CoordinateSystem) -> Option<Coordinates> {
        let from_tracker = target.to_tracker.inverse()?;
        Some(Coordinates {
            coordinate_system: *target,
            pose_matrix: from_tracker * self.coordinate_system.to_tracker * self.pose_matrix,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub uid: String,
    pub coordinates: Coordinates,
}

/// Application-chosen offset from a device anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorOffset {
    pub anchor_uid: String,
    pub offset: Matrix4,
}

impl AnchorOffset {
    pub fn new(anchor_uid: impl Into<String>, offset: Matrix4) -> Self {
        Self {
            anchor_uid: anchor_uid.into(),
            offset,
        }
    }

    /// Anchor pose with the offset applied, in the anchor's own coordinate system.
    pub fn transformed_coordinates(&self, anchor: &Anchor) -> Coordinates {
        Coordinates {
            coordinate_system: anchor.coordinates.coordinate_system,
            pose_matrix: anchor.coordinates.pose_matrix * self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPose {
    pub pose_model_matrix: Matrix4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
    Mono,
}

/// Viewport rectangle in `[0, 1]` units of the base layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub eye: Eye,
    pub projection_matrix: Matrix4,
    pub viewport: NormalizedViewport,
}

impl View {
    pub fn viewport(&self, layer: &BaseLayer) -> Viewport {
        let width = layer.framebuffer_width as f32;
        let height = layer.framebuffer_height as f32;
        Viewport {
            x: (self.viewport.x * width).round() as i32,
            y: (self.viewport.y * height).round() as i32,
            width: (self.viewport.width * width).round() as u32,
            height: (self.viewport.height * height).round() as u32,
        }
    }
}

/// The framebuffer a session presents from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseLayer {
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub context: GraphicsContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Focus,
    Blur,
    End,
    LayerFocus,
    LayerBlur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

pub trait XrDisplay {
    fn display_name(&self) -> &str;
    fn supports_session(&self, init: &SessionInit) -> bool;
    fn request_session(&mut self, init: &SessionInit) -> XrResult<Box<dyn XrSession>>;
}

pub trait XrSession {
    fn set_depth_range(&mut self, near: f32, far: f32);
    fn depth_range(&self) -> (f32, f32);
    /// Binds a base layer for `context`; the device chooses the framebuffer size.
    fn create_base_layer(&mut self, context: GraphicsContext) -> XrResult<BaseLayer>;
    fn base_layer(&self) -> Option<&BaseLayer>;
    /// Arms the frame callback. At most one request is outstanding; a new
    /// request replaces the previous one.
    fn request_frame(&mut self) -> FrameRequestId;
    fn cancel_frame(&mut self, request: FrameRequestId);
    /// Delivers the frame for the outstanding request, consuming it.
    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>>;
    fn poll_event(&mut self) -> Option<SessionEvent>;
    fn end(&mut self);
    fn is_ended(&self) -> bool;
}

pub trait XrFrame {
    fn coordinate_system(&self, kind: CoordinateSystemKind) -> Option<CoordinateSystem>;
    fn view_pose(&self, coordinate_system: &CoordinateSystem) -> Option<ViewPose>;
    fn views(&self) -> &[View];
    fn anchor(&self, uid: &str) -> Option<Anchor>;
    fn find_floor_anchor(&self, name: &str) -> XrResult<Option<AnchorOffset>>;
}
