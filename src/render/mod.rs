use crate::math::Matrix4;
use crate::scene::{Camera, Scene};
use thiserror::Error;

/// Opaque handle to the graphics context a renderer draws with. Devices bind
/// their base layer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicsContext {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("viewport {0:?} has no area")]
    EmptyViewport(Viewport),
    #[error("render target has not been sized")]
    Unsized,
}

pub type RenderResult<T> = Result<T, RenderError>;

/// The calls the session manager makes on a scene renderer each frame.
pub trait SceneRenderer {
    fn label(&self) -> &'static str;
    fn context(&self) -> GraphicsContext;
    fn set_auto_clear(&mut self, enabled: bool);
    fn set_size(&mut self, width: u32, height: u32, update_style: bool);
    fn clear(&mut self);
    fn clear_depth(&mut self);
    fn set_viewport(&mut self, viewport: Viewport);
    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> RenderResult<()>;
}

impl<R: SceneRenderer + ?Sized> SceneRenderer for Box<R> {
    fn label(&self) -> &'static str {
        (**self).label()
    }

    fn context(&self) -> GraphicsContext {
        (**self).context()
    }

    fn set_auto_clear(&mut self, enabled: bool) {
        (**self).set_auto_clear(enabled)
    }

    fn set_size(&mut self, width: u32, height: u32, update_style: bool) {
        (**self).set_size(width, height, update_style)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn clear_depth(&mut self) {
        (**self).clear_depth()
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        (**self).set_viewport(viewport)
    }

    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> RenderResult<()> {
        (**self).render(scene, camera)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    SetAutoClear(bool),
    SetSize {
        width: u32,
        height: u32,
        update_style: bool,
    },
    Clear,
    ClearDepth,
    SetViewport(Viewport),
    Draw(DrawCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub viewport: Viewport,
    pub projection: Matrix4,
    pub camera_world: Matrix4,
    pub node_count: usize,
}

/// Reference renderer: keeps no GPU state, refreshes world matrices like a
/// real scene renderer would and records every call it receives.
pub struct RecordingRenderer {
    context: GraphicsContext,
    auto_clear: bool,
    size: Option<[u32; 2]>,
    viewport: Viewport,
    commands: Vec<RenderCommand>,
    draws: u64,
}

impl RecordingRenderer {
    pub fn new(context: GraphicsContext) -> Self {
        Self {
            context,
            auto_clear: true,
            size: None,
            viewport: Viewport::default(),
            commands: Vec::new(),
            draws: 0,
        }
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            RenderCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn total_draws(&self) -> u64 {
        self.draws
    }

    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    pub fn size(&self) -> Option<[u32; 2]> {
        self.size
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new(GraphicsContext { id: 1 })
    }
}

impl SceneRenderer for RecordingRenderer {
    fn label(&self) -> &'static str {
        "Recording Renderer"
    }

    fn context(&self) -> GraphicsContext {
        self.context
    }

    fn set_auto_clear(&mut self, enabled: bool) {
        self.auto_clear = enabled;
        self.commands.push(RenderCommand::SetAutoClear(enabled));
    }

    fn set_size(&mut self, width: u32, height: u32, update_style: bool) {
        self.size = Some([width, height]);
        self.commands.push(RenderCommand::SetSize {
            width,
            height,
            update_style,
        });
    }

    fn clear(&mut self) {
        self.commands.push(RenderCommand::Clear);
    }

    fn clear_depth(&mut self) {
        self.commands.push(RenderCommand::ClearDepth);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.commands.push(RenderCommand::SetViewport(viewport));
    }

    fn render(&mut self, scene: &mut Scene, camera: &Camera) -> RenderResult<()> {
        if self.size.is_none() {
            return Err(RenderError::Unsized);
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(RenderError::EmptyViewport(self.viewport));
        }

        scene.update_world();
        let node_count = scene.attached_nodes().len();
        log::trace!(
            "[renderer] draw {} nodes into {:?}",
            node_count,
            self.viewport
        );

        self.draws += 1;
        self.commands.push(RenderCommand::Draw(DrawCall {
            viewport: self.viewport,
            projection: camera.projection_matrix,
            camera_world: camera.matrix_world,
            node_count,
        }));
        Ok(())
    }
}
