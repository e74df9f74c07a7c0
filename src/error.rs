//! Top-level error type aggregating each module's error enum.
//!
//! Individual modules keep their own `thiserror` enum local to the concern
//! it guards (parsing, leveling, configuration, controller I/O); this type
//! exists only at the binary boundary, where callers want one `Result` to
//! propagate with `?` without caring which module raised it.

use crate::command::ParseError;
use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::probe::LevelingError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("leveling error: {0}")]
    Leveling(#[from] LevelingError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
