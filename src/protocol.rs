use crate::game::types::{
    GlobalHighscore, Leaderboard, Minimap, Prey, SessionConstants, Vec2,
};
use thiserror::Error;

pub mod codec;
pub mod handshake;
pub mod inbound;
pub mod outbound;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("payload truncated")]
    Truncated,
    #[error("opcode '{opcode}' payload length {len} matches no known variant")]
    UnexpectedLength { opcode: char, len: usize },
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("handshake failure: {0}")]
    Handshake(String),
}

/// Full snake descriptor from a long `s` frame. `body` is ordered tail
/// first with the head (the frame's leading position) at the back.
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeDescriptor {
    pub id: u16,
    pub ehang: f64,
    pub dir: i16,
    pub wang: f64,
    pub speed: f64,
    pub fam: f64,
    pub skin: u8,
    pub name: String,
    pub custom_skin: Option<Vec<u8>>,
    pub body: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoodSpawn {
    pub x: u16,
    pub y: u16,
    pub color_index: u8,
    pub size: f64,
}

/// Where a grow/move frame puts the new head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadTarget {
    Absolute(Vec2),
    /// Raw delta bytes; the store resolves them against the current head
    /// as `(dx − 128, dy − 128)`.
    Relative { dx: u8, dy: u8 },
}

/// Everything the server can say, one variant per opcode family.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Setup(SessionConstants),
    Secret(Vec<u8>),
    OwnDeath,
    SnakeGone { id: u16, died: bool },
    SnakeSeen(Box<SnakeDescriptor>),
    Grow { id: u16, head: HeadTarget, fam: f64 },
    Move { id: u16, head: HeadTarget },
    Rotation { id: u16, ang: Option<f64>, wang: Option<f64>, sp: Option<f64> },
    Fullness { id: u16, fam: f64 },
    TailPop { id: u16, fam: Option<f64> },
    FoodBatch(Vec<FoodSpawn>),
    FoodEaten { x: u16, y: u16, eater: u16 },
    PreySeen { id: u16, prey: Prey },
    PreyGone { id: u16, eater: Option<u16> },
    PreyMoved { id: u16, pos: Vec2 },
    SectorAdd { x: u8, y: u8 },
    SectorRemove { x: u8, y: u8 },
    Leaderboard(Leaderboard),
    Minimap(Minimap),
    Kill { killer: u16, kills_raw: u8, kills_norm: f64 },
    Highscore(GlobalHighscore),
    VerifyCode(Vec<u8>),
    Pong,
}

/// Every inbound frame carries a 3-byte prefix; the third byte is the
/// ASCII opcode and the payload is everything after it.
pub fn split_frame(frame: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    if frame.len() < 3 {
        return Err(ProtocolError::Truncated);
    }
    Ok((frame[2], &frame[3..]))
}

pub fn parse_frame(frame: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let (opcode, payload) = split_frame(frame)?;
    parse_payload(opcode, payload)
}

pub fn parse_payload(opcode: u8, payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match opcode {
        b'a' => inbound::setup(payload),
        b'6' => Ok(ServerMessage::Secret(payload.to_vec())),
        b'v' => Ok(ServerMessage::OwnDeath),
        b's' => inbound::snake_presence(payload),
        b'n' | b'N' => inbound::grow(opcode, payload),
        b'g' | b'G' => inbound::step(opcode, payload),
        b'e' | b'E' | b'3' | b'4' | b'5' => inbound::rotation(opcode, payload),
        b'h' => inbound::fullness(payload),
        b'r' => inbound::tail_pop(payload),
        b'F' | b'f' | b'b' => inbound::food_batch(payload),
        b'c' => inbound::eat_food(payload),
        b'y' => inbound::prey_presence(payload),
        b'j' => inbound::prey_update(payload),
        b'W' => inbound::sector(payload, true),
        b'w' => inbound::sector(payload, false),
        b'l' => inbound::leaderboard(payload),
        b'u' => inbound::minimap(payload),
        b'k' => inbound::kill(payload),
        b'm' => inbound::highscore(payload),
        b'o' => Ok(ServerMessage::VerifyCode(payload.to_vec())),
        b'p' => Ok(ServerMessage::Pong),
        other => Err(ProtocolError::UnknownOpcode(other)),
    }
}
