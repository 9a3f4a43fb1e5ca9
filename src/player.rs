//! Per-connection session state (spec §3, §4.4).
//!
//! This is `seb-mul-game`'s per-connection model generalized from a fixed
//! two-player `GameState` to an arbitrary-sized roster of independently
//! ticking players, and from the teacher's informal turn field (`u8`) to
//! the closed state machine spec §4.4 requires. Per the "Enumerated
//! states" design note this is a plain tagged enum with an exhaustive
//! transition table in [`crate::registry`] and [`crate::turn`], not string
//! comparison.

use crate::geometry::Point;
use crate::spatial::PointId;
use tokio::sync::mpsc::UnboundedSender;

pub type PlayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Connected, not yet joined.
    Void,
    /// Joined and alive, outside the ACTING window.
    Waiting,
    /// Turn in progress; may submit at most one of each intent.
    Acting,
    /// Dead, waiting out `dead_turns` before it may `spawn` again.
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveIntent {
    pub angle: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireIntent {
    pub angle: f64,
    pub distance: f64,
    pub radius: f64,
    pub charge: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanIntent {
    pub radius: f64,
}

/// At most one of each action kind, buffered for the current ACTING phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intents {
    pub move_: Option<MoveIntent>,
    pub fire: Option<FireIntent>,
    pub scan: Option<ScanIntent>,
}

impl Intents {
    pub fn clear(&mut self) {
        *self = Intents::default();
    }
}

/// One player's authoritative state, owned by [`crate::registry::World`].
///
/// `outbox` decouples state mutation (performed while holding the world
/// lock) from the actual socket write (performed by a dedicated writer
/// task) — see spec §5's requirement that `send` never happen while the
/// lock is held. Pushing a line onto an unbounded channel is non-blocking,
/// so doing it under the lock does not stall the turn even if the
/// corresponding client is a slow consumer.
pub struct Player {
    pub id: PlayerId,
    pub name: Option<String>,
    pub state: PlayerState,
    pub position: Option<Point>,
    pub energy: f64,
    pub dead_turns: u32,
    pub intents: Intents,
    /// True from a successful `spawn` until `unregister`; independent of
    /// `state`, a dead player awaiting respawn is still in-game.
    pub in_game: bool,
    pub spatial_id: Option<PointId>,
    pub outbox: UnboundedSender<String>,
}

impl Player {
    pub fn new(id: PlayerId, outbox: UnboundedSender<String>) -> Self {
        Self {
            id,
            name: None,
            state: PlayerState::Void,
            position: None,
            energy: 0.0,
            dead_turns: 0,
            intents: Intents::default(),
            in_game: false,
            spatial_id: None,
            outbox,
        }
    }

    pub fn send(&self, msg: crate::protocol::ServerMessage) {
        // An error here means the writer task already exited (client gone);
        // the reader task will observe the same disconnect and tear down
        // the session, so there is nothing further to do.
        let _ = self.outbox.send(msg.to_line());
    }
}
