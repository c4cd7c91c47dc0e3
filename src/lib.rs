pub mod config;
pub mod device;
pub mod error;
pub mod manager;
pub mod math;
pub mod render;
pub mod scene;

use config::SessionConfig;
use device::{XrDisplay, XrFrame};
use device::simulated::SimulatedDisplay;
use error::XrResult;
use manager::{FrameStats, XrManager};
use render::RecordingRenderer;
use scene::{Camera, Scene};

/// Runs a session against the simulated displays with a single spinning node
/// in front of the viewer, returning the frame counters.
pub fn run(config: SessionConfig) -> XrResult<FrameStats> {
    let displays: Vec<Box<dyn XrDisplay>> = vec![
        Box::new(SimulatedDisplay::default()),
        Box::new(SimulatedDisplay::augmentation()),
    ];

    let mut scene = Scene::new();
    let marker = scene.create_group("marker");
    scene.add(marker)?;
    if let Some(transform) = scene.transform_mut(marker) {
        transform.position = [0.0, 1.5, -1.0];
    }

    let mut angle = 0.0f32;
    let spin = move |_frame: &dyn XrFrame, scene: &mut Scene| {
        angle += 0.02;
        if let Some(transform) = scene.transform_mut(marker) {
            let half = angle * 0.5;
            transform.rotation = [0.0, half.sin(), 0.0, half.cos()];
        }
    };

    let max_frames = config.max_frames;
    let mut manager = XrManager::new(
        displays,
        RecordingRenderer::default(),
        Camera::default(),
        scene,
        spin,
    )
    .with_config(config);

    manager.start_configured_session()?;
    if !manager.config().start_presenting {
        manager.start_presenting()?;
    }
    let frames = manager.run(max_frames)?;
    log::info!(
        "[session] handled {frames} frames, {} draws",
        manager.renderer().total_draws()
    );
    manager.end_session();
    Ok(*manager.stats())
}
