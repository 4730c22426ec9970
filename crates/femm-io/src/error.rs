//! Error kinds for `femm-io`: the mesh-file/problem-descriptor loader and
//! the solution-file writer, realized as a `thiserror` enum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("bad problem file: {0}")]
    BadProblemFile(String),

    #[error("bad node file: {0}")]
    BadNodeFile(String),

    #[error("bad element file: {0}")]
    BadElementFile(String),

    #[error("bad periodic-boundary-condition file: {0}")]
    BadPbcFile(String),

    #[error("bad edge file: {0}")]
    BadEdgeFile(String),

    #[error("missing material properties: {0}")]
    MissingMaterialProperties(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
