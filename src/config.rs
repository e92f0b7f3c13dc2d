//! Server configuration (§6).

/// Configuration for a [`crate::server::WebServer`] instance.
///
/// Built in code by the hosting binary, not parsed from a file — the
/// original engine is configured by the embedding firmware the same way.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the listener binds to.
    pub port: u16,
    /// Number of concurrent connection slots.
    pub num_conn_slots: usize,
    /// Maximum number of simultaneously open websocket responders.
    pub max_websockets: usize,
    /// Ping interval for idle websocket links, in milliseconds.
    pub ws_ping_interval_ms: u64,
    /// Per-send chunk size used by responders when filling the outbound
    /// buffer (`getResponseNext` style chunking).
    pub send_buffer_max_len: usize,
    /// Whether the static file responder/handler may be registered at all.
    pub enable_file_server: bool,
    /// Root directory served by the static file handler, if enabled.
    pub file_server_root: String,
    /// Maximum number of pending (accepted but not yet slotted) connections
    /// queued before the listener starts dropping.
    pub pending_conn_queue_len: usize,
    /// Timeout, in milliseconds, the listener waits trying to push an
    /// accepted connection onto the pending queue before dropping it.
    pub pending_conn_queue_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 80,
            num_conn_slots: 6,
            max_websockets: 3,
            ws_ping_interval_ms: 1000,
            send_buffer_max_len: 1000,
            enable_file_server: false,
            file_server_root: String::from("/"),
            pending_conn_queue_len: 10,
            pending_conn_queue_timeout_ms: 10,
        }
    }
}
