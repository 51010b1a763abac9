use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    #[error("{tool} exited with {status}: {detail}")]
    ToolFailed {
        tool: String,
        status: String,
        detail: String,
    },

    #[error("frame dump failed: {0}")]
    FrameDump(String),

    #[error("invalid trajectory: {0}")]
    Trajectory(String),

    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
