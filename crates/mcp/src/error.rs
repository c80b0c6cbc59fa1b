//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for JsonRpcError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::MethodNotFound(_) => JsonRpcError::METHOD_NOT_FOUND,
            Error::InvalidParams(_) => JsonRpcError::INVALID_PARAMS,
            Error::Json(_) => JsonRpcError::PARSE_ERROR,
            Error::Io(_) => JsonRpcError::INTERNAL_ERROR,
        };
        JsonRpcError::new(code, err.to_string())
    }
}
