pub type PicloopResult<T> = Result<T, PicloopError>;

#[derive(thiserror::Error, Debug)]
pub enum PicloopError {
    /// No usable source image at export time.
    #[error("input error: {0}")]
    Input(String),

    /// Malformed configuration or parameter domain violation.
    #[error("config error: {0}")]
    Config(String),

    /// Encoder rejected the frame sequence; no output was produced.
    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PicloopError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
