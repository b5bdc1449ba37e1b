use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImbotError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel {0} is no longer registered")]
    ChannelGone(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, ImbotError>;
