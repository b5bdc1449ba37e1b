use std::time::Duration;

use imbot_core::ImbotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Response engine error: {0}")]
    Engine(String),

    #[error("Response engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reply send failed: {0}")]
    Send(#[from] ImbotError),
}

impl From<async_openai::error::OpenAIError> for DispatchError {
    fn from(e: async_openai::error::OpenAIError) -> Self {
        DispatchError::Engine(e.to_string())
    }
}

impl From<DispatchError> for ImbotError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Send(inner) => inner,
            other => ImbotError::Handler(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
