use std::path::PathBuf;

/// Errors produced by teslad outside the device refresh path.
///
/// Refreshes and commands on a constructed device never fail; they degrade
/// to the last known value instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid vehicle snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no device named {0}")]
    UnknownDevice(String),

    #[error("device {0} is not a switch")]
    NotASwitch(String),

    #[error("engine is not running")]
    EngineStopped,
}
