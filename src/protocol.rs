//! Line protocol codec (spec §4.1/§6).
//!
//! Parsing follows the shape of `seb-mul-game`'s `ClientCmd::parse` in
//! `src/bin/server.rs` (split on whitespace, match the leading token,
//! `.parse()` the rest) but returns a typed [`ProtocolError`] instead of
//! `Option`, since LoBotomy's wire errors are numbered and client-visible.
//!
//! Rust's `f64`/`u32`/`i64` `Display` impls already produce the shortest
//! string that round-trips exactly, so no custom float formatting is
//! needed to satisfy spec §6's "parsing recovers the exact value to >= 9
//! significant digits".

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Join { name: String },
    Spawn,
    Move { angle: f64, distance: f64 },
    Fire {
        angle: f64,
        distance: f64,
        radius: f64,
        charge: f64,
    },
    Scan { radius: f64 },
}

fn parse_f64(tok: Option<&str>, field: &str) -> Result<f64, ProtocolError> {
    tok.ok_or_else(|| ProtocolError::Malformed(format!("missing argument: {field}")))?
        .parse::<f64>()
        .map_err(|_| ProtocolError::Malformed(format!("{field} is not a number")))
}

fn require_no_more(rest: &mut std::str::SplitWhitespace, name: &str) -> Result<(), ProtocolError> {
    if rest.next().is_some() {
        Err(ProtocolError::Malformed(format!("too many arguments for {name}")))
    } else {
        Ok(())
    }
}

impl ClientCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| ProtocolError::Malformed("empty command".into()))?;

        match name {
            "join" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| ProtocolError::Malformed("missing argument: name".into()))?;
                if name.is_empty() {
                    return Err(ProtocolError::Malformed("name must not be empty".into()));
                }
                require_no_more(&mut tokens, "join")?;
                Ok(ClientCommand::Join { name: name.to_string() })
            }
            "spawn" => {
                require_no_more(&mut tokens, "spawn")?;
                Ok(ClientCommand::Spawn)
            }
            "move" => {
                let angle = parse_f64(tokens.next(), "angle")?;
                let distance = parse_f64(tokens.next(), "distance")?;
                require_no_more(&mut tokens, "move")?;
                Ok(ClientCommand::Move { angle, distance })
            }
            "fire" => {
                let angle = parse_f64(tokens.next(), "angle")?;
                let distance = parse_f64(tokens.next(), "distance")?;
                let radius = parse_f64(tokens.next(), "radius")?;
                let charge = parse_f64(tokens.next(), "charge")?;
                require_no_more(&mut tokens, "fire")?;
                Ok(ClientCommand::Fire { angle, distance, radius, charge })
            }
            "scan" => {
                let radius = parse_f64(tokens.next(), "radius")?;
                require_no_more(&mut tokens, "scan")?;
                Ok(ClientCommand::Scan { radius })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome {
        version: u32,
        energy: f64,
        heal: f64,
        turn_duration_ms: u64,
        turns_left: i64,
    },
    Begin {
        turn_number: u64,
        energy: f64,
    },
    End,
    Hit {
        name: String,
        angle: f64,
        charge: f64,
    },
    Death {
        turns: u32,
    },
    Detect {
        name: String,
        angle: f64,
        distance: f64,
        energy: f64,
    },
    Error {
        errno: u32,
        message: String,
    },
}

impl ServerMessage {
    /// Renders the message as a single line, terminated by `\n`.
    pub fn to_line(&self) -> String {
        match self {
            ServerMessage::Welcome {
                version,
                energy,
                heal,
                turn_duration_ms,
                turns_left,
            } => format!("welcome {version} {energy} {heal} {turn_duration_ms} {turns_left}\n"),
            ServerMessage::Begin { turn_number, energy } => {
                format!("begin {turn_number} {energy}\n")
            }
            ServerMessage::End => "end\n".to_string(),
            ServerMessage::Hit { name, angle, charge } => format!("hit {name} {angle} {charge}\n"),
            ServerMessage::Death { turns } => format!("death {turns}\n"),
            ServerMessage::Detect { name, angle, distance, energy } => {
                format!("detect {name} {angle} {distance} {energy}\n")
            }
            ServerMessage::Error { errno, message } => format!("error {errno} {message}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_errno_301() {
        let err = ClientCommand::parse("dance now").unwrap_err();
        assert_eq!(err.errno(), 301);
    }

    #[test]
    fn wrong_arity_is_errno_302() {
        let err = ClientCommand::parse("move 1.0").unwrap_err();
        assert_eq!(err.errno(), 302);
    }

    #[test]
    fn bad_type_is_errno_302() {
        let err = ClientCommand::parse("move abc 1.0").unwrap_err();
        assert_eq!(err.errno(), 302);
    }

    #[test]
    fn parses_join() {
        let cmd = ClientCommand::parse("join alice").unwrap();
        assert_eq!(cmd, ClientCommand::Join { name: "alice".to_string() });
    }

    #[test]
    fn parses_fire_with_all_fields() {
        let cmd = ClientCommand::parse("fire 0 0 0.1 0.5").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Fire { angle: 0.0, distance: 0.0, radius: 0.1, charge: 0.5 }
        );
    }

    #[test]
    fn welcome_round_trips_through_reparse() {
        let msg = ServerMessage::Welcome {
            version: 0,
            energy: 1.0,
            heal: 0.2,
            turn_duration_ms: 5000,
            turns_left: -1,
        };
        let line = msg.to_line();
        assert_eq!(line, "welcome 0 1 0.2 5000 -1\n");

        let mut tokens = line.trim().split_whitespace();
        assert_eq!(tokens.next().unwrap(), "welcome");
        let version: u32 = tokens.next().unwrap().parse().unwrap();
        let energy: f64 = tokens.next().unwrap().parse().unwrap();
        let heal: f64 = tokens.next().unwrap().parse().unwrap();
        let turn_duration: u64 = tokens.next().unwrap().parse().unwrap();
        let turns_left: i64 = tokens.next().unwrap().parse().unwrap();
        assert_eq!(version, 0);
        assert!((energy - 1.0).abs() < 1e-9);
        assert!((heal - 0.2).abs() < 1e-9);
        assert_eq!(turn_duration, 5000);
        assert_eq!(turns_left, -1);
    }

    #[test]
    fn float_formatting_round_trips_within_tolerance() {
        let original = 1.5707963267948966_f64;
        let msg = ServerMessage::Hit { name: "bob".to_string(), angle: original, charge: 0.5 };
        let line = msg.to_line();
        let parsed: f64 = line.trim().split_whitespace().nth(2).unwrap().parse().unwrap();
        assert!((parsed - original).abs() < 1e-9);
    }
}
