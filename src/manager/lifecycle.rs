use crate::device::{SessionEvent, XrFrame};
use crate::scene::Scene;

/// Receives session and base-layer lifecycle events. The default bodies only log.
pub trait SessionObserver {
    fn handle_session_focus(&mut self) {
        log::info!("[session] handle_session_focus");
    }

    fn handle_session_blur(&mut self) {
        log::info!("[session] handle_session_blur");
    }

    fn handle_session_ended(&mut self) {
        log::info!("[session] handle_session_ended");
    }

    fn handle_layer_focus(&mut self) {
        log::info!("[session] handle_layer_focus");
    }

    fn handle_layer_blur(&mut self) {
        log::info!("[session] handle_layer_blur");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {}

pub(crate) fn dispatch(observer: &mut dyn SessionObserver, event: SessionEvent) {
    match event {
        SessionEvent::Focus => observer.handle_session_focus(),
        SessionEvent::Blur => observer.handle_session_blur(),
        SessionEvent::End => observer.handle_session_ended(),
        SessionEvent::LayerFocus => observer.handle_layer_focus(),
        SessionEvent::LayerBlur => observer.handle_layer_blur(),
    }
}

/// Per-frame application hook, run after anchored nodes are updated and
/// before any view is rendered.
pub trait SceneUpdate {
    fn update_scene(&mut self, frame: &dyn XrFrame, scene: &mut Scene);
}

impl<F> SceneUpdate for F
where
    F: FnMut(&dyn XrFrame, &mut Scene),
{
    fn update_scene(&mut self, frame: &dyn XrFrame, scene: &mut Scene) {
        self(frame, scene)
    }
}
