use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tracker configuration: {0}")]
    Config(String),

    /// Innovation covariance could not be inverted during a Kalman
    /// correction. Terminates the affected track only.
    #[error("singular innovation covariance in motion filter")]
    Singular,

    #[error("assignment solver failed: {0}")]
    Assignment(String),

    /// Frames must be processed strictly in presentation order.
    #[error("frame timestamp {current} precedes already-processed timestamp {previous}")]
    FrameOrder { current: f32, previous: f32 },

    #[error("unknown detector backend: {0}")]
    UnknownDetector(String),
}
