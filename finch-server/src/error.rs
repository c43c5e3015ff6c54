use thiserror::Error;

/// Crate-wide error sum type. One variant per error kind named in the
/// external contract, plus the ambient `Config`/`Io` variants needed at
/// startup. Only `HardwareUnavailable` is ever allowed to propagate out
/// of the tick loop; everything else is caught, logged, and the loop
/// moves on to the next tick.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("GPIO coprocessor connection unavailable: {0}")]
    HardwareUnavailable(String),
    #[error(transparent)]
    Sequencer(#[from] finch_gpio::SequencerError),
    #[error(transparent)]
    Camera(#[from] finch_capture::CameraError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("shell variable expansion error: {0}")]
    ShellExpand(#[from] shellexpand::LookupError<std::env::VarError>),
}
