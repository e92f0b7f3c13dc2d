//! Embedded HTTP/1.1 server engine: a fixed-size connection slot pool
//! driving pluggable [`Responder`]s (static data/file, REST JSON
//! endpoints, WebSocket, Server-Sent Events) behind a small set of
//! [`Handler`] route matchers.
//!
//! ```no_run
//! use rdweb_engine::{ServerConfig, WebServer};
//! use rdweb_engine::handler::StaticDataHandler;
//!
//! let mut server = WebServer::new(ServerConfig::default()).unwrap();
//! server
//!     .add_handler(Box::new(StaticDataHandler::new("/", b"hello".to_vec(), "text/plain", "/")))
//!     .unwrap();
//! server.run();
//! ```

pub mod chunker;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod header;
pub mod manager;
pub mod multipart;
pub mod responder;
pub mod server;
pub mod transport;
pub mod wslink;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use handler::Handler;
pub use header::{ConnType, HttpStatus, Method, RequestHeader};
pub use manager::ConnectionManager;
pub use responder::Responder;
pub use server::WebServer;
pub use transport::{ListenerAdapter, TcpTransport, TransportAdapter};
pub use wslink::{WsEvent, WsLinkError};
