//! Crate-level error type.
//!
//! Per-request failures (malformed header, no handler matched, websocket
//! pool exhausted) are represented as latched [`crate::header::HttpStatus`]
//! values on the connection, not as `Result` propagation — mirroring the
//! original engine, which never unwinds across the connection boundary.
//! `ServerError` only crosses the handful of boundaries where the original
//! also returns a hard failure: transport setup, and handler registration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on port {port}: {source}")]
    Listen {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("file serving is disabled in this server's configuration")]
    FileServingDisabled,

    #[error("max_websockets is 0, websocket handlers cannot be registered")]
    WebSocketsDisabled,

    #[error("websocket channel ID pool exhausted")]
    ChannelPoolExhausted,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
