use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {0}")]
    Http(reqwest::StatusCode),

    #[error("rpc error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("client already released")]
    Released,
}

pub type Result<T> = std::result::Result<T, RpcError>;
