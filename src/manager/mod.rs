//! Binds an immersive display to the scene renderer: negotiates the session,
//! keeps anchored nodes registered to the device's anchors and renders every
//! view of every frame.

mod lifecycle;

pub use lifecycle::{LoggingObserver, SceneUpdate, SessionObserver};

use crate::config::SessionConfig;
use crate::device::{
    AnchorOffset, CoordinateSystemKind, SessionInit, XrDisplay, XrFrame, XrSession,
};
use crate::error::{XrError, XrResult};
use crate::render::SceneRenderer;
use crate::scene::{Camera, NodeId, Scene, SceneError};
use serde::Serialize;

/// A scene node whose pose follows a device anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredNode {
    pub anchor_offset: AnchorOffset,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frames: u64,
    pub views_rendered: u64,
    pub skipped_renders: u64,
    pub anchor_misses: u64,
}

pub struct XrManager<R: SceneRenderer> {
    displays: Vec<Box<dyn XrDisplay>>,
    display: Option<usize>,
    session: Option<Box<dyn XrSession>>,
    renderer: R,
    camera: Camera,
    scene: Scene,
    updater: Box<dyn SceneUpdate>,
    observer: Box<dyn SessionObserver>,
    anchored_nodes: Vec<AnchoredNode>,
    floor_group: NodeId,
    requested_floor: bool,
    config: SessionConfig,
    stats: FrameStats,
}

impl<R: SceneRenderer> XrManager<R> {
    pub fn new(
        displays: Vec<Box<dyn XrDisplay>>,
        renderer: R,
        camera: Camera,
        mut scene: Scene,
        updater: impl SceneUpdate + 'static,
    ) -> Self {
        let floor_group = scene.create_group("floor");
        Self {
            displays,
            display: None,
            session: None,
            renderer,
            camera,
            scene,
            updater: Box::new(updater),
            observer: Box::new(LoggingObserver),
            anchored_nodes: Vec::new(),
            floor_group,
            requested_floor: false,
            config: SessionConfig::default(),
            stats: FrameStats::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn displays(&self) -> &[Box<dyn XrDisplay>] {
        &self.displays
    }

    pub fn active_display(&self) -> Option<&dyn XrDisplay> {
        self.display
            .and_then(|index| self.displays.get(index))
            .map(|display| display.as_ref())
    }

    /// Starts a session using the mode and presenting flag from the config.
    pub fn start_configured_session(&mut self) -> XrResult<()> {
        let create_virtual_reality = self.config.create_virtual_reality;
        let start_presenting = self.config.start_presenting;
        self.start_session(create_virtual_reality, start_presenting)
    }

    /// Picks the first display that supports the requested session type and
    /// negotiates a session with it.
    pub fn start_session(
        &mut self,
        create_virtual_reality: bool,
        should_start_presenting: bool,
    ) -> XrResult<()> {
        self.config.validate()?;
        let init = SessionInit::new(create_virtual_reality);

        let Some(index) = self
            .displays
            .iter()
            .position(|display| display.supports_session(&init))
        else {
            log::error!("[session] could not find a display for this type of session");
            return Err(XrError::NoCompatibleDisplay(init.session_type));
        };
        self.display = Some(index);

        if self.session.as_ref().is_some_and(|session| !session.is_ended()) {
            log::info!("[session] ending the previous session before starting a new one");
            self.end_session();
        }

        let delay = self.config.session_request_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let display = &mut self.displays[index];
        let mut session = display.request_session(&init).map_err(|err| {
            log::error!("[session] error requesting session: {err}");
            err
        })?;
        log::info!(
            "[session] {:?} session started on {}",
            init.session_type,
            display.display_name()
        );

        session.set_depth_range(self.config.depth_near, self.config.depth_far);
        self.session = Some(session);

        if should_start_presenting {
            self.start_presenting()?;
        }
        Ok(())
    }

    /// Binds the session's base layer to the renderer and arms the first frame.
    pub fn start_presenting(&mut self) -> XrResult<()> {
        let context = self.renderer.context();
        let Some(session) = self.session.as_mut() else {
            log::error!("[session] can not start presenting without a session");
            return Err(XrError::NoSession);
        };

        let layer = session.create_base_layer(context)?;
        log::debug!(
            "[session] presenting into {}x{} base layer",
            layer.framebuffer_width,
            layer.framebuffer_height
        );
        session.request_frame();
        Ok(())
    }

    /// Delivers pending lifecycle events, then handles at most one frame.
    /// Returns whether a frame was handled.
    pub fn pump_frame(&mut self) -> XrResult<bool> {
        self.dispatch_events();
        let Some(session) = self.session.as_mut() else {
            return Err(XrError::NoSession);
        };
        if session.is_ended() {
            return Ok(false);
        }
        let Some(frame) = session.poll_frame() else {
            return Ok(false);
        };

        self.handle_frame(frame.as_ref())?;
        Ok(true)
    }

    /// Pumps frames until the session stops delivering them or `max_frames`
    /// have been handled.
    pub fn run(&mut self, max_frames: u32) -> XrResult<u32> {
        let mut handled = 0;
        while handled < max_frames {
            if !self.pump_frame()? {
                break;
            }
            handled += 1;
        }
        self.dispatch_events();
        Ok(handled)
    }

    pub fn handle_frame(&mut self, frame: &dyn XrFrame) -> XrResult<()> {
        let session = self.session.as_mut().ok_or(XrError::NoSession)?;
        session.request_frame();
        let layer = session.base_layer().copied();

        let head_pose = frame
            .coordinate_system(CoordinateSystemKind::HeadModel)
            .and_then(|head_model| frame.view_pose(&head_model));

        if !self.requested_floor {
            self.requested_floor = true;
            self.request_floor_anchor(frame);
        }

        for AnchoredNode {
            anchor_offset,
            node,
        } in self.anchored_nodes.clone()
        {
            self.update_node_from_anchor_offset(frame, node, &anchor_offset);
        }

        self.update_scene(frame);
        self.stats.frames += 1;

        let Some(head_pose) = head_pose else {
            log::warn!("[frame] no head pose for frame {}; skipping render", self.stats.frames);
            self.stats.skipped_renders += 1;
            return Ok(());
        };
        let Some(layer) = layer else {
            log::error!("[frame] {}; skipping render", XrError::NoBaseLayer);
            self.stats.skipped_renders += 1;
            return Ok(());
        };

        self.renderer.set_auto_clear(false);
        self.renderer
            .set_size(layer.framebuffer_width, layer.framebuffer_height, false);
        self.renderer.clear();
        self.camera.matrix_auto_update = false;

        for view in frame.views() {
            self.camera.projection_matrix = view.projection_matrix;
            self.camera.matrix = head_pose.pose_model_matrix;
            self.camera.update_matrix_world();

            self.renderer.clear_depth();
            self.renderer.set_viewport(view.viewport(&layer));
            self.do_render()?;
            self.stats.views_rendered += 1;
        }
        Ok(())
    }

    /// Runs the application hook for this frame.
    pub fn update_scene(&mut self, frame: &dyn XrFrame) {
        self.updater.update_scene(frame, &mut self.scene);
    }

    pub fn do_render(&mut self) -> XrResult<()> {
        self.renderer.render(&mut self.scene, &self.camera)?;
        Ok(())
    }

    /// Adds `node` to the scene and keeps its pose driven by `anchor_offset`.
    pub fn add_anchored_node(&mut self, anchor_offset: AnchorOffset, node: NodeId) -> XrResult<()> {
        self.scene.add(node)?;
        log::debug!(
            "[anchors] tracking node {:?} against anchor {}",
            node,
            anchor_offset.anchor_uid
        );
        self.anchored_nodes.push(AnchoredNode {
            anchor_offset,
            node,
        });
        Ok(())
    }

    /// Writes the tracker-space pose of `anchor_offset` into `node`. Returns
    /// false, leaving the node untouched, when the pose cannot be resolved.
    pub fn update_node_from_anchor_offset(
        &mut self,
        frame: &dyn XrFrame,
        node: NodeId,
        anchor_offset: &AnchorOffset,
    ) -> bool {
        let Some(anchor) = frame.anchor(&anchor_offset.anchor_uid) else {
            log::error!("[anchors] unknown anchor uid {}", anchor_offset.anchor_uid);
            self.stats.anchor_misses += 1;
            return false;
        };

        let offset_coordinates = anchor_offset.transformed_coordinates(&anchor);
        let pose = if offset_coordinates.coordinate_system.kind == CoordinateSystemKind::Tracker {
            offset_coordinates.pose_matrix
        } else {
            let tracker_pose = frame
                .coordinate_system(CoordinateSystemKind::Tracker)
                .and_then(|tracker| offset_coordinates.transformed_to(&tracker));
            match tracker_pose {
                Some(coordinates) => coordinates.pose_matrix,
                None => {
                    log::error!(
                        "[anchors] anchor {} cannot be expressed in tracker space",
                        anchor_offset.anchor_uid
                    );
                    self.stats.anchor_misses += 1;
                    return false;
                }
            }
        };

        let updated = self
            .scene
            .set_matrix(node, pose)
            .and_then(|()| self.scene.update_matrix_world(node));
        match updated {
            Ok(()) => true,
            Err(SceneError::NoSuchNode(_)) => {
                log::warn!("[anchors] node {node:?} left the scene; no longer tracking it");
                self.anchored_nodes.retain(|anchored| anchored.node != node);
                false
            }
            Err(err) => {
                log::error!("[anchors] failed to update anchored node: {err}");
                false
            }
        }
    }

    pub fn end_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.end();
        }
        self.dispatch_events();
    }

    pub fn session(&self) -> Option<&dyn XrSession> {
        self.session.as_deref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn floor_group(&self) -> NodeId {
        self.floor_group
    }

    pub fn anchored_nodes(&self) -> &[AnchoredNode] {
        &self.anchored_nodes
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn request_floor_anchor(&mut self, frame: &dyn XrFrame) {
        match frame.find_floor_anchor(&self.config.floor_anchor_name) {
            Ok(Some(anchor_offset)) => {
                if let Err(err) = self.add_anchored_node(anchor_offset, self.floor_group) {
                    log::error!("[anchors] failed to attach the floor group: {err}");
                }
            }
            Ok(None) => log::error!("[anchors] could not find the floor anchor"),
            Err(err) => log::error!("[anchors] error finding the floor anchor: {err}"),
        }
    }

    fn dispatch_events(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        while let Some(event) = session.poll_event() {
            lifecycle::dispatch(self.observer.as_mut(), event);
        }
    }
}
