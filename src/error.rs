//! Wire-visible error taxonomy (spec §6/§7).
//!
//! `thiserror` is used here the way `valence_network` and `packet_inspector`
//! use it: one enum per failure class, each variant carrying just enough
//! context to render a client-facing message and recover its errno.

use thiserror::Error;

/// A command line that failed to parse (spec §4.1).
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("unrecognised command {0:?}")]
    UnknownCommand(String),
    #[error("malformed command: {0}")]
    Malformed(String),
}

impl ProtocolError {
    pub fn errno(&self) -> u32 {
        match self {
            ProtocolError::UnknownCommand(_) => 301,
            ProtocolError::Malformed(_) => 302,
        }
    }
}

/// A syntactically valid command rejected by state/energy rules (spec §4.4).
#[derive(Debug, Error, PartialEq)]
pub enum AdmissionError {
    #[error("move infeasible: cost exceeds max energy")]
    MoveInfeasible,
    #[error("fire infeasible: cost exceeds max energy")]
    FireInfeasible,
    #[error("scan infeasible: cost exceeds max energy")]
    ScanInfeasible,
    #[error("action impossible, you are dead")]
    StillDead,
    #[error("name taken, choose another one")]
    NameTaken,
    #[error("invalid state for command")]
    InvalidState,
}

impl AdmissionError {
    pub fn errno(&self) -> u32 {
        match self {
            AdmissionError::MoveInfeasible => 101,
            AdmissionError::FireInfeasible => 102,
            AdmissionError::ScanInfeasible => 103,
            AdmissionError::StillDead => 104,
            AdmissionError::NameTaken => 201,
            AdmissionError::InvalidState => 202,
        }
    }
}

/// Any wire-visible rejection, unified so a session only needs one `match`
/// to turn a failure into an `error <errno> <message>` line.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
}

impl CommandError {
    pub fn errno(&self) -> u32 {
        match self {
            CommandError::Protocol(e) => e.errno(),
            CommandError::Admission(e) => e.errno(),
        }
    }
}

/// Failures that keep the whole server from starting (spec §7,
/// "server-fatal errors"): these propagate out of `main` and set a
/// non-zero exit code, they never reach a client.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
