//! Debug pause / inspector hook (spec §6 CLI, spec §1 names the actual
//! interactive console as an out-of-scope external collaborator —
//! "`manual_control.py`" in the Python original — so this module is
//! deliberately just the seam such a collaborator attaches to: a stand-in
//! for the turn window's sleep, plus a minimal read-only state dump for
//! the `pdb` keyword. It does not implement per-player manual intent
//! override (`--debug_names`'s deeper behavior); that stays an external
//! concern, `ServerConfig`/`Args` only carry the names through so a future
//! collaborator has something to key off of.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::logger::Logger;
use crate::registry::World;

#[derive(Debug, Clone, Default)]
pub enum DebugMode {
    #[default]
    Off,
    /// Operator must hit enter (or type something containing `pdb`)
    /// between turns instead of the fixed wall-clock sleep.
    Paused { debug_names: Vec<String> },
}

/// Replaces the turn engine's fixed sleep (spec §4.5 step 2) with either a
/// real sleep or an operator prompt, depending on `mode`.
pub async fn wait_for_turn_window(
    mode: &DebugMode,
    turn_duration_ms: u64,
    turn: u64,
    world: &Arc<Mutex<World>>,
    log: &Logger,
) {
    match mode {
        DebugMode::Off => {
            tokio::time::sleep(Duration::from_millis(turn_duration_ms)).await;
        }
        DebugMode::Paused { .. } => {
            let mut stdin = BufReader::new(tokio::io::stdin()).lines();
            loop {
                log.info(format!(
                    "turn {turn}: press enter to advance (type a line containing 'pdb' to inspect state)"
                ));
                match stdin.next_line().await {
                    Ok(Some(line)) if line.contains("pdb") => {
                        dump_state(world, log);
                        continue;
                    }
                    _ => break,
                }
            }
        }
    }
}

fn dump_state(world: &Arc<Mutex<World>>, log: &Logger) {
    let world = world.lock().expect("world mutex poisoned");
    log.info(format!(
        "-- debug state: {} connections, {} registered names --",
        world.players.len(),
        world.registry.len()
    ));
    for (name, id) in &world.registry {
        if let Some(player) = world.players.get(id) {
            log.info(format!(
                "   {name}: state={:?} energy={:.3} dead_turns={} position={:?}",
                player.state, player.energy, player.dead_turns, player.position
            ));
        }
    }
}
