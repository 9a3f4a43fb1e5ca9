//! The turn engine (spec §4.5): a single logical actor that drives global
//! time, fixed-cadence.
//!
//! Grounded in `seb-mul-game`'s `run_game` loop in `src/bin/server.rs` —
//! one authoritative task owning all game state mutation — generalized
//! from "wait for either of 2 players' next line" to "wait out a fixed
//! wall-clock window while N session readers fill in intents
//! concurrently". Per the "Iteration snapshots" design note, every phase
//! below takes a `Vec<PlayerId>` snapshot of the in-game roster *before*
//! mutating anything, so a death or disconnect mid-phase can never shift
//! what the rest of that phase iterates over.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::debug::{DebugMode, wait_for_turn_window};
use crate::energy;
use crate::events::GameEvent;
use crate::geometry::{self, Point, Rect};
use crate::logger::Logger;
use crate::player::{Player, PlayerId, PlayerState};
use crate::protocol::ServerMessage;
use crate::registry::World;

pub struct TurnEngine {
    world: Arc<Mutex<World>>,
    log: Arc<Logger>,
    debug_mode: DebugMode,
    turn: u64,
}

impl TurnEngine {
    pub fn new(world: Arc<Mutex<World>>, log: Arc<Logger>, debug_mode: DebugMode) -> Self {
        Self { world, log, debug_mode, turn: 0 }
    }

    /// Runs forever until `shutdown` is observed true (spec §4.7).
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.turn += 1;
            let turn_duration_ms = {
                let world = self.world.lock().expect("world mutex poisoned");
                world.config.turn_duration_ms
            };

            self.heal_and_begin();
            wait_for_turn_window(&self.debug_mode, turn_duration_ms, self.turn, &self.world, &self.log).await;
            self.signal_end();
            self.decrement_dead_turns();
            self.resolve();
        }
        self.log.info(GameEvent::ShuttingDown);
    }

    /// In-game, non-dead player ids, snapshotted under the lock.
    fn living_roster(world: &World) -> Vec<PlayerId> {
        world
            .players
            .values()
            .filter(|p| p.in_game && p.state != PlayerState::Dead)
            .map(|p| p.id)
            .collect()
    }

    /// spec §4.5 step 1: heal, transition to ACTING, clear intents, signal.
    fn heal_and_begin(&self) {
        let mut world = self.world.lock().expect("world mutex poisoned");
        let turn = self.turn;
        let roster = Self::living_roster(&world);
        let (heal, max_energy) = (world.config.turn_heal, world.config.max_energy);

        for id in roster {
            let player = world.players.get_mut(&id).expect("roster id vanished under lock");
            player.energy = (player.energy + heal).min(max_energy);
            player.state = PlayerState::Acting;
            player.intents.clear();
            player.send(ServerMessage::Begin { turn_number: turn, energy: player.energy });
        }
        world.emitter.emit(GameEvent::TurnBegan { turn });
    }

    /// spec §4.5 step 3: signal end, return to WAITING.
    fn signal_end(&self) {
        let mut world = self.world.lock().expect("world mutex poisoned");
        let turn = self.turn;
        let roster = Self::living_roster(&world);

        for id in roster {
            let player = world.players.get_mut(&id).expect("roster id vanished under lock");
            player.send(ServerMessage::End);
            player.state = PlayerState::Waiting;
        }
        world.emitter.emit(GameEvent::TurnEnded { turn });
    }

    /// spec §4.5 step 4: decrement dead-turn counters, not below 0.
    fn decrement_dead_turns(&self) {
        let mut world = self.world.lock().expect("world mutex poisoned");
        for player in world.players.values_mut() {
            if player.in_game && player.state == PlayerState::Dead && player.dead_turns > 0 {
                player.dead_turns -= 1;
            }
        }
    }

    /// spec §4.5 steps 5-6: moves, then fires, then scans, then cull.
    fn resolve(&self) {
        let mut world = self.world.lock().expect("world mutex poisoned");
        let roster = Self::living_roster(&world);

        resolve_moves(&mut world, &roster);
        resolve_fires(&mut world, &roster, &self.log);
        resolve_scans(&mut world, &roster);
        cull(&mut world, &roster);
    }
}

fn resolve_moves(world: &mut World, roster: &[PlayerId]) {
    let (w, h) = (world.config.width, world.config.height);

    for &id in roster {
        let Some(intent) = world.players.get(&id).and_then(|p| p.intents.move_) else {
            continue;
        };
        let cost = energy::move_cost(intent.distance);
        let player = world.players.get_mut(&id).expect("roster id vanished under lock");
        player.energy -= cost;

        if player.energy <= 0.0 {
            continue; // actor dies and is not relocated; culled at end of turn
        }

        let from = player.position.expect("acting player has no position");
        let to = geometry::move_wrapped(from, intent.angle, intent.distance, w, h);
        player.position = Some(to);
        let spatial_id = player.spatial_id.expect("in-game player has no spatial handle");
        world.spatial.move_point(spatial_id, to.x, to.y);
    }
}

fn resolve_fires(world: &mut World, roster: &[PlayerId], log: &Logger) {
    let (w, h) = (world.config.width, world.config.height);
    let field = world.config.field();

    for &id in roster {
        let Some(intent) = world.players.get(&id).and_then(|p| p.intents.fire) else {
            continue;
        };
        let Some(from) = world.players.get(&id).and_then(|p| p.position) else {
            continue;
        };
        let attacker_name = world.players[&id].name.clone().unwrap_or_default();

        let epicenter = geometry::move_wrapped(from, intent.angle, intent.distance, w, h);
        let cost = energy::fire_cost(intent.distance, intent.radius, intent.charge);
        world.players.get_mut(&id).unwrap().energy -= cost;
        world.emitter.emit(GameEvent::Fired { name: attacker_name.clone(), x: epicenter.x, y: epicenter.y });
        log.trace(format!("fire resolved: {attacker_name} epicenter=({:.3},{:.3})", epicenter.x, epicenter.y));

        let target_box = Rect::new(
            epicenter.x - intent.radius,
            epicenter.y - intent.radius,
            epicenter.x + intent.radius,
            epicenter.y + intent.radius,
        );
        let mut candidates = HashSet::new();
        for bound in geometry::generate_wrapped_bounds(field, target_box) {
            for point_id in world.spatial.find_in_box(bound) {
                candidates.insert(world.spatial.payload(point_id));
            }
        }

        for subject_id in candidates {
            let Some(subject_pos) = world.players.get(&subject_id).and_then(|p| p.position) else {
                continue;
            };
            let contained = geometry::wrapped_radius_translate(epicenter, subject_pos, intent.radius, w, h).is_some();
            if !contained {
                continue;
            }

            let Some(bearing_translate) =
                geometry::wrapped_radius_translate(subject_pos, epicenter, intent.radius, w, h)
            else {
                continue;
            };
            let bearing = geometry::angle(subject_pos, bearing_translate);

            let subject = world.players.get_mut(&subject_id).expect("candidate id vanished under lock");
            subject.energy -= intent.charge;
            subject.send(ServerMessage::Hit { name: attacker_name.clone(), angle: bearing, charge: intent.charge });
            world.emitter.emit(GameEvent::Hit {
                attacker: attacker_name.clone(),
                victim: subject.name.clone().unwrap_or_default(),
                charge: intent.charge,
            });
        }
    }
}

fn resolve_scans(world: &mut World, roster: &[PlayerId]) {
    let (w, h) = (world.config.width, world.config.height);
    let field = world.config.field();

    for &id in roster {
        let Some(intent) = world.players.get(&id).and_then(|p| p.intents.scan) else {
            continue;
        };
        let Some(from) = world.players.get(&id).and_then(|p| p.position) else {
            continue;
        };
        let scanner_name = world.players[&id].name.clone().unwrap_or_default();

        let cost = energy::scan_cost(intent.radius);
        let energy_after = {
            let scanner = world.players.get_mut(&id).unwrap();
            scanner.energy -= cost;
            scanner.energy
        };
        world.emitter.emit(GameEvent::Scanned { name: scanner_name.clone() });

        if energy_after <= 0.0 {
            continue; // spec §4.5/§9: a scan that kills its own scanner reports nothing
        }

        let query_box = Rect::new(from.x - intent.radius, from.y - intent.radius, from.x + intent.radius, from.y + intent.radius);
        let mut candidates = HashSet::new();
        for bound in geometry::generate_wrapped_bounds(field, query_box) {
            for point_id in world.spatial.find_in_box(bound) {
                candidates.insert(world.spatial.payload(point_id));
            }
        }

        for target_id in candidates {
            if target_id == id {
                continue; // the scanner never appears in its own scan
            }
            let Some(target) = world.players.get(&target_id) else { continue };
            let Some(target_pos) = target.position else { continue };
            let Some(translate) = geometry::wrapped_radius_translate(from, target_pos, intent.radius, w, h) else {
                continue;
            };
            let bearing = geometry::angle(from, translate);
            let distance = geometry::distance(from, translate);
            let target_name = target.name.clone().unwrap_or_default();
            let target_energy = target.energy;

            world.players[&id].send(ServerMessage::Detect {
                name: target_name.clone(),
                angle: bearing,
                distance,
                energy: target_energy,
            });
            world.emitter.emit(GameEvent::Detected { scanner: scanner_name.clone(), target: target_name });
        }
    }
}

fn cull(world: &mut World, roster: &[PlayerId]) {
    let dead_turns_init = world.config.dead_turns_init;

    for &id in roster {
        let should_die = world.players.get(&id).map(|p| p.energy <= 0.0).unwrap_or(false);
        if !should_die {
            continue;
        }

        let spatial_id = world.players.get(&id).and_then(|p| p.spatial_id);
        if let Some(spatial_id) = spatial_id {
            world.spatial.remove(spatial_id);
        }

        let player: &mut Player = world.players.get_mut(&id).unwrap();
        player.state = PlayerState::Dead;
        player.dead_turns = dead_turns_init;
        player.energy = 0.0;
        player.position = None;
        player.spatial_id = None;
        player.send(ServerMessage::Death { turns: dead_turns_init });
        let name = player.name.clone().unwrap_or_default();
        world.emitter.emit(GameEvent::Died { name, dead_turns: dead_turns_init });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::events::Emitter;
    use tokio::sync::mpsc::unbounded_channel;

    fn spawned_player(world: &mut World, name: &str, x: f64, y: f64) -> PlayerId {
        let (tx, _rx) = unbounded_channel();
        let id = world.insert_connection(tx);
        world.handle_join(id, name.to_string()).unwrap();
        world.handle_spawn(id).unwrap();
        let player = world.players.get_mut(&id).unwrap();
        player.position = Some(Point::new(x, y));
        let spatial_id = player.spatial_id.unwrap();
        world.spatial.move_point(spatial_id, x, y);
        id
    }

    #[test]
    fn move_resolution_relocates_and_heals_next_turn() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let id = spawned_player(&mut world, "alice", 0.5, 0.5);
        world.players.get_mut(&id).unwrap().state = PlayerState::Acting;
        world.handle_move(id, std::f64::consts::FRAC_PI_2, 0.1).unwrap();

        let roster = vec![id];
        resolve_moves(&mut world, &roster);

        let player = &world.players[&id];
        assert!((player.position.unwrap().x - 0.6).abs() < 1e-9);
        assert!((player.energy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn move_wraps_across_seam() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let id = spawned_player(&mut world, "alice", 1.9, 0.0);
        world.players.get_mut(&id).unwrap().state = PlayerState::Acting;
        world.handle_move(id, std::f64::consts::FRAC_PI_2, 0.2).unwrap();

        resolve_moves(&mut world, &[id]);

        let player = &world.players[&id];
        assert!((player.position.unwrap().x - 0.1).abs() < 1e-9, "got {}", player.position.unwrap().x);
    }

    #[test]
    fn fire_kills_victim_in_blast_radius() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let attacker = spawned_player(&mut world, "alice", 0.0, 0.0);
        let victim = spawned_player(&mut world, "bob", 0.05, 0.05);
        world.players.get_mut(&victim).unwrap().energy = 0.1;

        world.players.get_mut(&attacker).unwrap().state = PlayerState::Acting;
        world.handle_fire(attacker, 0.0, 0.0, 0.1, 0.5).unwrap();

        let roster = vec![attacker, victim];
        resolve_fires(&mut world, &roster, &Logger::new(0));
        cull(&mut world, &roster);

        assert_eq!(world.players[&victim].state, PlayerState::Dead);
        assert_eq!(world.players[&victim].dead_turns, 5);
        assert_eq!(world.players[&attacker].state, PlayerState::Waiting);
    }

    #[test]
    fn scan_detects_across_the_seam() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let scanner = spawned_player(&mut world, "alice", 0.0, 0.0);
        let _target = spawned_player(&mut world, "bob", 1.95, 0.0);

        world.players.get_mut(&scanner).unwrap().state = PlayerState::Acting;
        world.handle_scan(scanner, 0.3).unwrap();

        resolve_scans(&mut world, &[scanner]);

        assert!((world.players[&scanner].energy - (1.0 - 0.36)).abs() < 1e-9);
    }

    #[test]
    fn scan_of_radius_zero_detects_nothing_and_is_free() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let scanner = spawned_player(&mut world, "alice", 0.0, 0.0);
        let _target = spawned_player(&mut world, "bob", 0.0, 0.0);

        world.players.get_mut(&scanner).unwrap().state = PlayerState::Acting;
        world.handle_scan(scanner, 0.0).unwrap();
        resolve_scans(&mut world, &[scanner]);

        assert_eq!(world.players[&scanner].energy, 1.0);
    }

    #[test]
    fn fire_onto_own_position_hits_self_when_radius_positive() {
        let mut world = World::new(ServerConfig::default(), Arc::new(Emitter::new()));
        let id = spawned_player(&mut world, "alice", 0.5, 0.5);
        world.players.get_mut(&id).unwrap().state = PlayerState::Acting;
        world.handle_fire(id, 0.0, 0.0, 0.01, 0.1).unwrap();

        resolve_fires(&mut world, &[id], &Logger::new(0));

        // cost + self-charge both deducted
        let expected = 1.0 - energy::fire_cost(0.0, 0.01, 0.1) - 0.1;
        assert!((world.players[&id].energy - expected).abs() < 1e-9);
    }
}
