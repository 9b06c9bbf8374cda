use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the supervision core.
///
/// Launch failures feed into the playback retry policy instead of crashing
/// the supervisor; only caller-misuse errors (`NoUrl`) propagate
/// synchronously to the API caller.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// A recording was requested but no stream url is known.
    #[error("geen URL om op te nemen")]
    NoUrl,

    /// Neither `cvlc` nor `vlc` could be located beside the executable or
    /// on PATH.
    #[error("player binary not found (looked for cvlc/vlc)")]
    BinaryNotFound,

    /// The OS refused to spawn the player process.
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recordings directory could not be created.
    #[error("failed to create recordings directory {path:?}: {source}")]
    RecordingsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
