//! Per-connection session plumbing (spec §4.1/§5).
//!
//! Generalizes `seb-mul-game`'s `run_game` — one task per fixed pair of
//! sockets, reading both with `tokio::select!` and writing straight back
//! out on each `ClientCmd` — into one reader task per connection against
//! an arbitrary-sized roster, plus a dedicated writer task per connection
//! instead of scattered `write_all` call sites. The split matters here
//! because spec §5 forbids holding the world lock across a `send`: the
//! reader locks [`World`] only for the synchronous duration of a command,
//! and every outbound line crosses an unbounded channel to the writer,
//! which owns the socket's write half and never touches the lock at all.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::error::CommandError;
use crate::events::GameEvent;
use crate::logger::Logger;
use crate::player::PlayerId;
use crate::protocol::{ClientCommand, ServerMessage};
use crate::registry::World;

/// Owns one accepted connection end to end: spawns the writer task, reads
/// lines until EOF or error, then tears the player down.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, world: Arc<Mutex<World>>, log: Arc<Logger>) {
    let (read_half, write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    let (tx, rx) = unbounded_channel();

    let id = {
        let mut world = world.lock().expect("world mutex poisoned");
        let id = world.insert_connection(tx);
        world.emitter.emit(GameEvent::Accepted { addr });
        id
    };

    tokio::spawn(write_loop(write_half, rx));

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&world, id, &line),
            Ok(None) => break,
            Err(err) => {
                log.warn(format!("read error on connection {id} ({addr}): {err}"));
                break;
            }
        }
    }

    let mut world = world.lock().expect("world mutex poisoned");
    world.remove_connection(id);
}

/// Drains outbound lines for one connection until the sender side (held by
/// the connection's [`crate::player::Player`]) is dropped, or the socket
/// itself refuses a write.
async fn write_loop(mut writer: WriteHalf<TcpStream>, mut rx: UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Parses and admits one line under the world lock, replying with either
/// the command's own success side-effects or an `error <errno>` line.
fn dispatch(world: &Arc<Mutex<World>>, id: PlayerId, line: &str) {
    let mut world = world.lock().expect("world mutex poisoned");

    let outcome = ClientCommand::parse(line)
        .map_err(CommandError::from)
        .and_then(|cmd| apply(&mut world, id, cmd));

    if let Err(err) = outcome {
        let errno = err.errno();
        let name = world
            .players
            .get(&id)
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| format!("conn#{id}"));
        world.emitter.emit(GameEvent::CommandRejected { name, errno });

        if let Some(player) = world.players.get(&id) {
            player.send(ServerMessage::Error { errno, message: err.to_string() });
        }
    }
}

fn apply(world: &mut World, id: PlayerId, cmd: ClientCommand) -> Result<(), CommandError> {
    match cmd {
        ClientCommand::Join { name } => world.handle_join(id, name),
        ClientCommand::Spawn => world.handle_spawn(id),
        ClientCommand::Move { angle, distance } => world.handle_move(id, angle, distance),
        ClientCommand::Fire { angle, distance, radius, charge } => {
            world.handle_fire(id, angle, distance, radius, charge)
        }
        ClientCommand::Scan { radius } => world.handle_scan(id, radius),
    }
}
