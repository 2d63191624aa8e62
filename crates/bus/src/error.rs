use thiserror::Error;

/// Errors that can occur in the cardwatch messaging layer.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("envelope encode/decode error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
