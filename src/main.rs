use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use clap::{ArgAction, Parser};

use lobotomy::config::{DEFAULT_PORT, ServerConfig};
use lobotomy::debug::DebugMode;
use lobotomy::events::{Emitter, GameEvent};
use lobotomy::logger::Logger;
use lobotomy::registry::World;
use lobotomy::server::Server;
use lobotomy::turn::TurnEngine;

#[derive(Parser, Debug)]
#[command(
    name = "lobotomy",
    version,
    about = "LoBotomy — turn-synchronous multiplayer combat arena server",
    long_about = "Accepts any number of TCP clients and runs a single shared, \
                  turn-synchronous arena. Protocol is line-delimited UTF-8; \
                  see src/protocol.rs for the full wire format."
)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    bind: String,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Pause between turns for operator input instead of sleeping
    #[arg(short, long)]
    debug: bool,

    /// Comma-separated player names to flag in the debug state dump; implies --debug
    #[arg(long, value_delimiter = ',')]
    debug_names: Vec<String>,

    /// Battlefield width
    #[arg(long, default_value_t = ServerConfig::default().width)]
    width: f64,

    /// Battlefield height
    #[arg(long, default_value_t = ServerConfig::default().height)]
    height: f64,

    /// Length of a turn's ACTING window, in milliseconds
    #[arg(long, default_value_t = ServerConfig::default().turn_duration_ms)]
    turn_duration_ms: u64,

    /// Turns a player stays dead before it may respawn
    #[arg(long, default_value_t = ServerConfig::default().dead_turns_init)]
    dead_turns: u32,

    /// Energy restored to each living player at the start of every turn
    #[arg(long, default_value_t = ServerConfig::default().turn_heal)]
    turn_heal: f64,

    /// Maximum (and starting) energy a player may hold
    #[arg(long, default_value_t = ServerConfig::default().max_energy)]
    max_energy: f64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let log = Arc::new(Logger::new(args.verbose));

    let debug_mode = if args.debug || !args.debug_names.is_empty() {
        DebugMode::Paused { debug_names: args.debug_names.clone() }
    } else {
        DebugMode::Off
    };

    let config = ServerConfig {
        width: args.width,
        height: args.height,
        turn_duration_ms: args.turn_duration_ms,
        dead_turns_init: args.dead_turns,
        turn_heal: args.turn_heal,
        max_energy: args.max_energy,
    };

    let emitter = Arc::new(Emitter::new());
    let world = Arc::new(Mutex::new(World::new(config, emitter)));
    let shutdown = Arc::new(AtomicBool::new(false));

    let server = match Server::bind(&args.bind, Arc::clone(&world), Arc::clone(&log)).await {
        Ok(server) => server,
        Err(err) => {
            log.warn(err.to_string());
            std::process::exit(1);
        }
    };

    let mut turn_engine = TurnEngine::new(Arc::clone(&world), Arc::clone(&log), debug_mode);
    let turn_shutdown = Arc::clone(&shutdown);
    let turn_task = tokio::spawn(async move { turn_engine.run(turn_shutdown).await });

    server.run(Arc::clone(&shutdown)).await;

    world.lock().expect("world mutex poisoned").emitter.emit(GameEvent::ShuttingDown);
    let _ = turn_task.await;
}
