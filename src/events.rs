//! Structured event fan-out (spec §1: "the event-emitter used for
//! instrumentation" is an external collaborator; this module is the seam it
//! attaches to) plus the `Display` impl the server binary uses to turn the
//! same events into log lines, in the style of `seb-mul-game`'s `Event`
//! enum in `src/bin/server.rs`.
//!
//! Grounded in the Python original's `lobotomy/event.py`, which is a bare
//! `Listener`/`Emitter` pair — kept minimal here too: production wiring
//! attaches zero listeners (no sink is mandated by the core), tests attach
//! a recording listener to assert on event sequences instead of scraping
//! log text.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Listening {
        addr: String,
    },
    Accepted {
        addr: SocketAddr,
    },
    Joined {
        name: String,
    },
    JoinRejected {
        name: String,
    },
    Spawned {
        name: String,
        x: f64,
        y: f64,
    },
    TurnBegan {
        turn: u64,
    },
    TurnEnded {
        turn: u64,
    },
    Moved {
        name: String,
    },
    Fired {
        name: String,
        x: f64,
        y: f64,
    },
    Hit {
        attacker: String,
        victim: String,
        charge: f64,
    },
    Scanned {
        name: String,
    },
    Detected {
        scanner: String,
        target: String,
    },
    Died {
        name: String,
        dead_turns: u32,
    },
    CommandRejected {
        name: String,
        errno: u32,
    },
    Disconnected {
        name: String,
    },
    AcceptError {
        reason: String,
    },
    ShuttingDown,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::Listening { addr } => write!(f, "server listening on {addr}"),
            GameEvent::Accepted { addr } => write!(f, "accepted connection from {addr}"),
            GameEvent::Joined { name } => write!(f, "{name} joined"),
            GameEvent::JoinRejected { name } => write!(f, "join rejected, name taken: {name}"),
            GameEvent::Spawned { name, x, y } => {
                write!(f, "{name} spawned at ({x:.3}, {y:.3})")
            }
            GameEvent::TurnBegan { turn } => write!(f, "turn {turn} began"),
            GameEvent::TurnEnded { turn } => write!(f, "turn {turn} ended"),
            GameEvent::Moved { name } => write!(f, "{name} moved"),
            GameEvent::Fired { name, x, y } => {
                write!(f, "{name} fired, epicenter ({x:.3}, {y:.3})")
            }
            GameEvent::Hit {
                attacker,
                victim,
                charge,
            } => write!(f, "{victim} hit by {attacker} for {charge:.3}"),
            GameEvent::Scanned { name } => write!(f, "{name} scanned"),
            GameEvent::Detected { scanner, target } => write!(f, "{scanner} detected {target}"),
            GameEvent::Died { name, dead_turns } => {
                write!(f, "{name} died, respawns in {dead_turns} turns")
            }
            GameEvent::CommandRejected { name, errno } => {
                write!(f, "{name} rejected with errno {errno}")
            }
            GameEvent::Disconnected { name } => write!(f, "{name} disconnected"),
            GameEvent::AcceptError { reason } => write!(f, "accept error: {reason}"),
            GameEvent::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

/// Receives submitted events; implementors decide whether to keep them.
pub trait Listener: Send + Sync {
    fn accepts(&self, _event: &GameEvent) -> bool {
        true
    }

    fn accept(&self, event: &GameEvent);

    fn submit(&self, event: &GameEvent) {
        if self.accepts(event) {
            self.accept(event);
        }
    }
}

/// Fan-out of [`GameEvent`]s to zero or more [`Listener`]s.
#[derive(Default)]
pub struct Emitter {
    listeners: Mutex<Vec<Box<dyn Listener>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Box<dyn Listener>) {
        self.listeners.lock().expect("emitter mutex poisoned").push(listener);
    }

    pub fn emit(&self, event: GameEvent) {
        for listener in self.listeners.lock().expect("emitter mutex poisoned").iter() {
            listener.submit(&event);
        }
    }
}
