//! Registry + shared world state (spec §4.6 and the "Shared-resource
//! policy" of §5).
//!
//! `World` is the single coarse-grained critical section spec §5 calls
//! "sufficient and correct": one `std::sync::Mutex<World>`, shared as
//! `Arc<Mutex<World>>` between the accept loop, every session reader task
//! and the turn engine. Because mutation inside the lock is always
//! synchronous (no `.await` is ever reached while holding the guard), a
//! blocking `std::sync::Mutex` is the right tool — reaching for
//! `tokio::sync::Mutex` here would only add async overhead for a
//! lock that is never held across a suspension point.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{PROTOCOL_VERSION, ServerConfig};
use crate::error::{AdmissionError, CommandError};
use crate::events::{Emitter, GameEvent};
use crate::geometry::Point;
use crate::player::{FireIntent, MoveIntent, Player, PlayerId, PlayerState, ScanIntent};
use crate::protocol::ServerMessage;
use crate::spatial::QuadTree;

pub struct World {
    pub config: ServerConfig,
    pub players: HashMap<PlayerId, Player>,
    pub registry: HashMap<String, PlayerId>,
    pub spatial: QuadTree<PlayerId>,
    pub emitter: Arc<Emitter>,
    next_id: PlayerId,
}

impl World {
    pub fn new(config: ServerConfig, emitter: Arc<Emitter>) -> Self {
        Self {
            spatial: QuadTree::new(config.field()),
            config,
            players: HashMap::new(),
            registry: HashMap::new(),
            emitter,
            next_id: 0,
        }
    }

    /// Registers a freshly accepted TCP connection, returning its id.
    pub fn insert_connection(&mut self, outbox: UnboundedSender<String>) -> PlayerId {
        let id = self.next_id;
        self.next_id += 1;
        self.players.insert(id, Player::new(id, outbox));
        id
    }

    /// Tears a connection down: removes it from the registry, the spatial
    /// index and the player map. Idempotent (a repeat call is a no-op,
    /// matching spec §4.6's `unregister`).
    pub fn remove_connection(&mut self, id: PlayerId) {
        let Some(player) = self.players.remove(&id) else {
            return;
        };
        if let Some(name) = &player.name {
            self.registry.remove(name);
            self.emitter.emit(GameEvent::Disconnected { name: name.clone() });
        }
        if let Some(spatial_id) = player.spatial_id {
            self.spatial.remove(spatial_id);
        }
    }

    fn player(&self, id: PlayerId) -> &Player {
        self.players.get(&id).expect("unknown player id")
    }

    fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        self.players.get_mut(&id).expect("unknown player id")
    }

    /// spec §4.4 `VOID` -> `join` -> `DEAD`; spec §4.6 `register`.
    pub fn handle_join(&mut self, id: PlayerId, name: String) -> Result<(), CommandError> {
        if self.player(id).state != PlayerState::Void {
            return Err(AdmissionError::InvalidState.into());
        }
        if self.registry.contains_key(&name) {
            self.emitter.emit(GameEvent::JoinRejected { name: name.clone() });
            return Err(AdmissionError::NameTaken.into());
        }

        let max_energy = self.config.max_energy;
        let turn_heal = self.config.turn_heal;
        let turn_duration_ms = self.config.turn_duration_ms;
        self.registry.insert(name.clone(), id);
        let player = self.player_mut(id);
        player.name = Some(name.clone());
        player.state = PlayerState::Dead;
        player.dead_turns = 0;
        player.send(ServerMessage::Welcome {
            version: PROTOCOL_VERSION,
            energy: max_energy,
            heal: turn_heal,
            turn_duration_ms,
            turns_left: -1,
        });
        self.emitter.emit(GameEvent::Joined { name });
        Ok(())
    }

    /// spec §4.4 `DEAD` -> `spawn` -> `WAITING`.
    pub fn handle_spawn(&mut self, id: PlayerId) -> Result<(), CommandError> {
        if self.player(id).state != PlayerState::Dead {
            return Err(AdmissionError::InvalidState.into());
        }
        if self.player(id).dead_turns > 0 {
            return Err(AdmissionError::StillDead.into());
        }

        let (x, y) = {
            let mut rng = rand::rng();
            (
                rng.random_range(0.0..self.config.width),
                rng.random_range(0.0..self.config.height),
            )
        };
        let spatial_id = self.spatial.add(x, y, id);

        let name = self.player(id).name.clone();
        let max_energy = self.config.max_energy;
        let player = self.player_mut(id);
        player.position = Some(Point::new(x, y));
        player.energy = max_energy;
        player.dead_turns = 0;
        player.in_game = true;
        player.state = PlayerState::Waiting;
        player.spatial_id = Some(spatial_id);

        if let Some(name) = name {
            self.emitter.emit(GameEvent::Spawned { name, x, y });
        }
        Ok(())
    }

    /// spec §4.4 admission for `move`: a pre-flight check only — the cost
    /// is deducted at resolution, not here.
    pub fn handle_move(&mut self, id: PlayerId, angle: f64, distance: f64) -> Result<(), CommandError> {
        if self.player(id).state != PlayerState::Acting {
            return Err(AdmissionError::InvalidState.into());
        }
        if distance < 0.0 || crate::energy::move_cost(distance) > self.config.max_energy {
            return Err(AdmissionError::MoveInfeasible.into());
        }
        self.player_mut(id).intents.move_ = Some(MoveIntent { angle, distance });
        Ok(())
    }

    pub fn handle_fire(
        &mut self,
        id: PlayerId,
        angle: f64,
        distance: f64,
        radius: f64,
        charge: f64,
    ) -> Result<(), CommandError> {
        if self.player(id).state != PlayerState::Acting {
            return Err(AdmissionError::InvalidState.into());
        }
        if distance < 0.0
            || radius < 0.0
            || charge < 0.0
            || crate::energy::fire_cost(distance, radius, charge) > self.config.max_energy
        {
            return Err(AdmissionError::FireInfeasible.into());
        }
        self.player_mut(id).intents.fire = Some(FireIntent { angle, distance, radius, charge });
        Ok(())
    }

    pub fn handle_scan(&mut self, id: PlayerId, radius: f64) -> Result<(), CommandError> {
        if self.player(id).state != PlayerState::Acting {
            return Err(AdmissionError::InvalidState.into());
        }
        if radius < 0.0 || crate::energy::scan_cost(radius) > self.config.max_energy {
            return Err(AdmissionError::ScanInfeasible.into());
        }
        self.player_mut(id).intents.scan = Some(ScanIntent { radius });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn test_world() -> (World, PlayerId) {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let (tx, _rx) = unbounded_channel();
        let id = world.insert_connection(tx);
        (world, id)
    }

    #[test]
    fn join_then_spawn_happy_path() {
        let (mut world, id) = test_world();
        world.handle_join(id, "alice".to_string()).unwrap();
        assert_eq!(world.player(id).state, PlayerState::Dead);
        world.handle_spawn(id).unwrap();
        assert_eq!(world.player(id).state, PlayerState::Waiting);
        assert!(world.player(id).position.is_some());
        assert_eq!(world.player(id).energy, 1.0);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (mut world, id) = test_world();
        world.handle_join(id, "alice".to_string()).unwrap();

        let (tx, _rx) = unbounded_channel();
        let id2 = world.insert_connection(tx);
        let err = world.handle_join(id2, "alice".to_string()).unwrap_err();
        assert_eq!(err.errno(), 201);
    }

    #[test]
    fn spawn_before_join_is_invalid_state() {
        let (mut world, id) = test_world();
        let err = world.handle_spawn(id).unwrap_err();
        assert_eq!(err.errno(), 202);
    }

    #[test]
    fn move_cost_exceeding_max_energy_is_rejected_at_admission() {
        let (mut world, id) = test_world();
        world.handle_join(id, "alice".to_string()).unwrap();
        world.handle_spawn(id).unwrap();
        world.player_mut(id).state = PlayerState::Acting;
        let err = world.handle_move(id, 0.0, 10.0).unwrap_err();
        assert_eq!(err.errno(), 101);
    }

    #[test]
    fn move_intent_idempotent_last_writer_wins() {
        let (mut world, id) = test_world();
        world.handle_join(id, "alice".to_string()).unwrap();
        world.handle_spawn(id).unwrap();
        world.player_mut(id).state = PlayerState::Acting;
        world.handle_move(id, 0.0, 0.01).unwrap();
        world.handle_move(id, 1.0, 0.02).unwrap();
        let intent = world.player(id).intents.move_.unwrap();
        assert_eq!(intent.angle, 1.0);
        assert_eq!(intent.distance, 0.02);
    }

    #[test]
    fn remove_connection_frees_the_name() {
        let (mut world, id) = test_world();
        world.handle_join(id, "alice".to_string()).unwrap();
        world.remove_connection(id);
        assert!(!world.registry.contains_key("alice"));

        let (tx, _rx) = unbounded_channel();
        let id2 = world.insert_connection(tx);
        world.handle_join(id2, "alice".to_string()).unwrap();
    }
}
