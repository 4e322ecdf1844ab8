use thiserror::Error;
use crate::board::BoardError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("IO/Terminal error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Board error: {0}")]
    BoardError(#[from] BoardError),

    #[error("Key binding error: {0}")]
    KeyBindingError(#[from] ConfigError),

    #[error("Render error: {0}")]
    RenderError(String),
}
