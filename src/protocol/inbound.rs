use super::codec::{
    angle_from_u24, angle_from_u8, fam_from_u24, pos_from_u24, speed_from_u16, speed_from_u8,
    Reader, U24_MAX,
};
use super::{FoodSpawn, HeadTarget, ProtocolError, ServerMessage, SnakeDescriptor};
use crate::game::constants::{LEADERBOARD_TOP, MINIMAP_BITS};
use crate::game::types::{
    GlobalHighscore, Leaderboard, LeaderboardEntry, Minimap, Prey, SessionConstants, Vec2,
};

fn unexpected(opcode: u8, payload: &[u8]) -> ProtocolError {
    ProtocolError::UnexpectedLength {
        opcode: opcode as char,
        len: payload.len(),
    }
}

fn lossy_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn setup(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let constants = SessionConstants {
        game_radius: reader.read_u24()?,
        mscps: reader.read_u16()?,
        sector_size: reader.read_u16()?,
        sector_count_along_edge: reader.read_u16()?,
        spangdv: reader.read_u8()?,
        nsp1: reader.read_u16()?,
        nsp2: reader.read_u16()?,
        nsp3: reader.read_u16()?,
        mamu: reader.read_u16()?,
        manu2: reader.read_u16()?,
        cst: reader.read_u16()?,
        protocol_version: reader.read_u8()?,
    };
    Ok(ServerMessage::Setup(constants))
}

pub fn snake_presence(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match payload.len() {
        // The short form also arrives padded to six bytes.
        3 | 6 => {
            let mut reader = Reader::new(payload);
            let id = reader.read_u16()?;
            let status = reader.read_u8()?;
            match status {
                0 => Ok(ServerMessage::SnakeGone { id, died: false }),
                1 => Ok(ServerMessage::SnakeGone { id, died: true }),
                other => Err(ProtocolError::Invariant(format!(
                    "snake {id} presence with status {other}"
                ))),
            }
        }
        len if len >= 31 => snake_descriptor(payload),
        _ => Err(unexpected(b's', payload)),
    }
}

fn snake_descriptor(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let ehang = angle_from_u24(reader.read_u24()?);
    let dir = reader.read_u8()? as i16 - 48;
    let wang = angle_from_u24(reader.read_u24()?);
    let speed = speed_from_u16(reader.read_u16()?);
    let fam = fam_from_u24(reader.read_u24()?);
    let skin = reader.read_u8()?;
    let head = Vec2 {
        x: pos_from_u24(reader.read_u24()?),
        y: pos_from_u24(reader.read_u24()?),
    };
    let name_len = reader.read_u8()? as usize;
    let name = lossy_name(reader.read_slice(name_len)?);
    let custom_skin_len = reader.read_u8()? as usize;
    let custom_skin = if custom_skin_len > 0 {
        Some(reader.read_slice(custom_skin_len)?.to_vec())
    } else {
        None
    };

    // Trailing pairs are body segments relative to the head, half-unit
    // resolution. The frame lists them head-outward; the replica keeps the
    // head at the back, so the order is flipped on the way in.
    let mut body = Vec::with_capacity(1 + reader.remaining() / 2);
    body.push(head);
    while reader.remaining() >= 2 {
        let bx = reader.read_u8()? as f64;
        let by = reader.read_u8()? as f64;
        body.push(Vec2 {
            x: head.x + (bx - 127.0) / 2.0,
            y: head.y + (by - 127.0) / 2.0,
        });
    }
    if reader.remaining() != 0 {
        tracing::debug!(id, "dangling byte after snake body pairs");
    }
    body.reverse();

    Ok(ServerMessage::SnakeSeen(Box::new(SnakeDescriptor {
        id,
        ehang,
        dir,
        wang,
        speed,
        fam,
        skin,
        name,
        custom_skin,
        body,
    })))
}

fn head_target(opcode: u8, reader: &mut Reader) -> Result<HeadTarget, ProtocolError> {
    if opcode.is_ascii_lowercase() {
        Ok(HeadTarget::Absolute(Vec2 {
            x: reader.read_u16()? as f64,
            y: reader.read_u16()? as f64,
        }))
    } else {
        Ok(HeadTarget::Relative {
            dx: reader.read_u8()?,
            dy: reader.read_u8()?,
        })
    }
}

/// `n`/`N`: append a head segment and update fullness.
pub fn grow(opcode: u8, payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let head = head_target(opcode, &mut reader)?;
    let fam = fam_from_u24(reader.read_u24()?);
    Ok(ServerMessage::Grow { id, head, fam })
}

/// `g`/`G`: ordinary movement, oldest segment retired.
pub fn step(opcode: u8, payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let head = head_target(opcode, &mut reader)?;
    Ok(ServerMessage::Move { id, head })
}

/// Rotation family. Which fields the tail bytes carry depends on both the
/// opcode variant and the tail length.
pub fn rotation(opcode: u8, payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let tail = reader.remaining();

    let mut ang = None;
    let mut wang = None;
    let mut sp = None;
    match (opcode, tail) {
        (b'e', 1) => ang = Some(angle_from_u8(reader.read_u8()?)),
        (b'e', 2) => {
            ang = Some(angle_from_u8(reader.read_u8()?));
            sp = Some(speed_from_u8(reader.read_u8()?));
        }
        (b'e', 3) | (b'4', 3) => {
            ang = Some(angle_from_u8(reader.read_u8()?));
            wang = Some(angle_from_u8(reader.read_u8()?));
            sp = Some(speed_from_u8(reader.read_u8()?));
        }
        (b'E', 1) | (b'4', 1) | (b'5', 1) => wang = Some(angle_from_u8(reader.read_u8()?)),
        (b'E', 2) | (b'4', 2) => {
            wang = Some(angle_from_u8(reader.read_u8()?));
            sp = Some(speed_from_u8(reader.read_u8()?));
        }
        (b'3', 1) => sp = Some(speed_from_u8(reader.read_u8()?)),
        (b'3', 2) | (b'5', 2) => {
            ang = Some(angle_from_u8(reader.read_u8()?));
            wang = Some(angle_from_u8(reader.read_u8()?));
        }
        _ => return Err(unexpected(opcode, payload)),
    }

    Ok(ServerMessage::Rotation { id, ang, wang, sp })
}

pub fn fullness(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let fam = fam_from_u24(reader.read_u24()?);
    Ok(ServerMessage::Fullness { id, fam })
}

pub fn tail_pop(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    match payload.len() {
        2 => Ok(ServerMessage::TailPop { id, fam: None }),
        6 => {
            reader.skip(1)?;
            let fam = fam_from_u24(reader.read_u24()?);
            Ok(ServerMessage::TailPop { id, fam: Some(fam) })
        }
        _ => Err(unexpected(b'r', payload)),
    }
}

/// Food batches are a packed run of 6-byte records. A short trailing run
/// aborts the remainder but keeps what already parsed.
pub fn food_batch(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let mut batch = Vec::with_capacity(payload.len() / 6);
    while reader.remaining() > 0 {
        if reader.remaining() < 6 {
            tracing::warn!(
                trailing = reader.remaining(),
                "short food record, dropping rest of batch"
            );
            break;
        }
        let color_index = reader.read_u8()?;
        let x = reader.read_u16()?;
        let y = reader.read_u16()?;
        let size = reader.read_u8()? as f64 / 5.0;
        batch.push(FoodSpawn {
            x,
            y,
            color_index,
            size,
        });
    }
    Ok(ServerMessage::FoodBatch(batch))
}

pub fn eat_food(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    Ok(ServerMessage::FoodEaten {
        x: reader.read_u16()?,
        y: reader.read_u16()?,
        eater: reader.read_u16()?,
    })
}

pub fn prey_presence(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    match payload.len() {
        2 | 5 => Ok(ServerMessage::PreyGone {
            id: reader.read_u16()?,
            eater: None,
        }),
        7 => Ok(ServerMessage::PreyGone {
            id: reader.read_u16()?,
            eater: Some(reader.read_u16()?),
        }),
        19 | 22 => {
            let id = reader.read_u16()?;
            let color = reader.read_u8()?;
            let x = reader.read_u16()? as f64 * 3.0 + 1.0;
            let y = reader.read_u16()? as f64 * 3.0 + 1.0;
            let size = reader.read_u8()? as f64 / 5.0;
            let dir = reader.read_u8()? as i16 - 48;
            let wang = angle_from_u24(reader.read_u16()? as u32);
            let ang = angle_from_u24(reader.read_u16()? as u32);
            let speed = speed_from_u16(reader.read_u16()?);
            Ok(ServerMessage::PreySeen {
                id,
                prey: Prey {
                    color,
                    pos: Vec2 { x, y },
                    size,
                    dir,
                    wang,
                    ang,
                    speed,
                },
            })
        }
        _ => Err(unexpected(b'y', payload)),
    }
}

pub fn prey_update(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u16()?;
    let x = reader.read_i16()? as f64;
    let y = reader.read_i16()? as f64;
    Ok(ServerMessage::PreyMoved {
        id,
        pos: Vec2 { x, y },
    })
}

pub fn sector(payload: &[u8], add: bool) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let x = reader.read_u8()?;
    let y = reader.read_u8()?;
    Ok(if add {
        ServerMessage::SectorAdd { x, y }
    } else {
        ServerMessage::SectorRemove { x, y }
    })
}

pub fn leaderboard(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let player_rank = reader.read_u8()?;
    reader.skip(2)?;
    let player_count = reader.read_u16()?;

    let mut entries = Vec::with_capacity(LEADERBOARD_TOP);
    while reader.remaining() > 0 && entries.len() < LEADERBOARD_TOP {
        let snake_length = reader.read_u16()?;
        let fam = fam_from_u24(reader.read_u24()?);
        let color_index = reader.read_u8()?;
        let name_len = reader.read_u8()? as usize;
        let raw_name = reader.read_slice(name_len)?;
        let stripped: Vec<u8> = raw_name.iter().copied().filter(|&b| b != 0).collect();
        let score = (15.0 * (snake_length as f64 / 10.0 + fam / 4.0 - 1.0) - 5.0).floor() as i64;
        entries.push(LeaderboardEntry {
            username: lossy_name(&stripped),
            snake_length,
            fam,
            color_index,
            score,
        });
    }

    Ok(ServerMessage::Leaderboard(Leaderboard {
        player_rank,
        player_count,
        entries,
    }))
}

/// Run-length bit stream: bytes ≥ 128 encode a run of `b − 128` clear
/// bits, anything else contributes its eight bits MSB-first. Decoding
/// stops once the grid is full.
pub fn minimap(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut grid = Minimap::default();
    let mut written = 0usize;
    for &byte in payload {
        if written >= MINIMAP_BITS {
            break;
        }
        if byte >= 128 {
            written += (byte - 128) as usize;
        } else {
            for bit in (0..8).rev() {
                if written >= MINIMAP_BITS {
                    break;
                }
                if byte & (1 << bit) != 0 {
                    grid.set(written);
                }
                written += 1;
            }
        }
    }
    Ok(ServerMessage::Minimap(grid))
}

pub fn kill(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let killer = reader.read_u16()?;
    let kills_raw = reader.read_u8()?;
    Ok(ServerMessage::Kill {
        killer,
        kills_raw,
        kills_norm: kills_raw as f64 / U24_MAX,
    })
}

pub fn highscore(payload: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let mut reader = Reader::new(payload);
    let length_norm = reader.read_u16()? as f64 / U24_MAX;
    let fam_norm = reader.read_u16()? as f64 / U24_MAX;
    reader.skip(5)?;
    let name_len = reader.read_u8()? as usize;
    let winner_name = lossy_name(reader.read_slice(name_len)?);
    let winner_message = lossy_name(reader.read_slice(reader.remaining())?);
    Ok(ServerMessage::Highscore(GlobalHighscore {
        winner_name,
        winner_message,
        length_norm,
        fam_norm,
    }))
}
