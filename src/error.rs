use crate::config::ConfigError;
use crate::device::SessionType;
use crate::render::RenderError;
use crate::scene::SceneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrError {
    #[error("could not find a display for a {0:?} session")]
    NoCompatibleDisplay(SessionType),
    #[error("error requesting session: {0}")]
    SessionRequest(String),
    #[error("can not start presenting without a session")]
    NoSession,
    #[error("session has ended")]
    SessionEnded,
    #[error("session has no base layer")]
    NoBaseLayer,
    #[error("error finding anchor: {0}")]
    Anchor(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type XrResult<T> = Result<T, XrError>;
