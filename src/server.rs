//! Top-level server: owns the listener and connection manager and runs
//! the accept + service loop (§4.1, §4.2).
//!
//! Grounded on `RdWebServer::socketListenerTask` and
//! `RdWebConnManager::service`: the listener polls for new connections
//! and hands each to the manager's pending queue; the manager services
//! every slot once per loop tick. The original runs the listener and the
//! connection service loop as two separate FreeRTOS tasks; here both live
//! in `tick()` on one thread, since `run()`/`tick()` can be driven from
//! whatever threading model the embedder wants instead.

use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::handler::Handler;
use crate::manager::ConnectionManager;
use crate::transport::{ListenerAdapter, LISTENER_RETRY_DELAY};

/// Delay between successive service loop ticks when `run()` drives the
/// loop itself.
const SERVICE_TICK: Duration = Duration::from_millis(2);

pub struct WebServer {
    listener: ListenerAdapter,
    manager: ConnectionManager,
    port: u16,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let listener = ListenerAdapter::bind(config.port)?;
        let port = config.port;
        let manager = ConnectionManager::new(&config);
        Ok(WebServer {
            listener,
            manager,
            port,
        })
    }

    pub fn add_handler(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        self.manager.add_handler(handler)
    }

    pub fn add_standard_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.manager.add_standard_header(name, value);
    }

    /// Direct access to the manager, for producers wiring up
    /// `ws_send`/`sse_send` calls from application code.
    pub fn manager(&mut self) -> &mut ConnectionManager {
        &mut self.manager
    }

    /// Runs the accept + service loop until the process is killed. A hard
    /// listener failure rebinds after [`LISTENER_RETRY_DELAY`] rather than
    /// returning, matching the original's tolerance of transient network
    /// stack faults.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
            thread::sleep(SERVICE_TICK);
        }
    }

    /// Runs exactly one accept-and-service cycle. Exposed separately from
    /// `run()` so embedders can drive the loop from their own scheduler.
    pub fn tick(&mut self) {
        match self.listener.accept_once() {
            Ok(Some(transport)) => {
                if !self.manager.on_new_connection(Box::new(transport)) {
                    debug!("new connection refused, pending queue full");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "listener on port {} failed, rebinding after retry delay: {e}",
                    self.port
                );
                thread::sleep(LISTENER_RETRY_DELAY);
                match ListenerAdapter::bind(self.port) {
                    Ok(l) => self.listener = l,
                    Err(e) => warn!("failed to rebind listener on port {}: {e}", self.port),
                }
            }
        }
        self.manager.service();
    }
}
