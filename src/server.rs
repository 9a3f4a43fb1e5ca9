//! Accept loop (spec §4.7, §6).
//!
//! Structurally this is `seb-mul-game`'s `main` accept loop in
//! `src/bin/server.rs` — bind, log, loop on `listener.accept()`, spawn a
//! task per connection — generalized from "pair up exactly two sockets
//! per game, gated by a `Semaphore`" to "every accepted socket joins the
//! same shared [`World`] immediately", since LoBotomy has no fixed player
//! count or match lifecycle to gate on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;

use crate::error::ServerError;
use crate::events::GameEvent;
use crate::logger::Logger;
use crate::registry::World;
use crate::session;

pub struct Server {
    listener: TcpListener,
    world: Arc<Mutex<World>>,
    log: Arc<Logger>,
}

impl Server {
    pub async fn bind(addr: &str, world: Arc<Mutex<World>>, log: Arc<Logger>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.to_string(), source })?;

        world.lock().expect("world mutex poisoned").emitter.emit(GameEvent::Listening { addr: addr.to_string() });
        log.info(GameEvent::Listening { addr: addr.to_string() });

        Ok(Self { listener, world, log })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until SIGINT, setting `shutdown` so the turn
    /// engine (running concurrently) also stops at its next turn boundary.
    pub async fn run(self, shutdown: Arc<AtomicBool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let world = Arc::clone(&self.world);
                            let log = Arc::clone(&self.log);
                            tokio::spawn(async move {
                                session::handle_connection(stream, addr, world, log).await;
                            });
                        }
                        Err(err) => {
                            self.log.warn(GameEvent::AcceptError { reason: err.to_string() });
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    shutdown.store(true, Ordering::Relaxed);
                    self.log.info("received interrupt, no longer accepting connections");
                    break;
                }
            }
        }
    }
}
