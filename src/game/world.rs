use super::constants::{BODY_CAP, FOOD_PALETTE, SNAKE_PALETTE};
use super::snake::Snake;
use super::types::{
    Food, GlobalHighscore, Leaderboard, Minimap, Prey, SessionConstants, Vec2,
};
use crate::protocol::{self, HeadTarget, ServerMessage, SnakeDescriptor};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

pub type SharedWorld = Arc<parking_lot::RwLock<World>>;

pub fn shared() -> SharedWorld {
    Arc::new(parking_lot::RwLock::new(World::default()))
}

/// Local replica of everything the server has told us about. All mutation
/// goes through `apply`; a bad update is warned about and dropped so the
/// replica never ends up half-written.
#[derive(Debug, Default)]
pub struct World {
    pub snakes: HashMap<u16, Snake>,
    pub foods: HashMap<(u16, u16), Food>,
    pub preys: HashMap<u16, Prey>,
    pub sectors: HashSet<(u8, u8)>,
    pub leaderboard: Leaderboard,
    pub minimap: Minimap,
    pub constants: Option<SessionConstants>,
    pub own_snake_id: Option<u16>,
    pub alive: bool,
    pub snakes_seen: u64,
    pub kills_seen: u64,
    pub eat_credits: HashMap<u16, u32>,
    pub last_highscore: Option<GlobalHighscore>,
}

impl World {
    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Setup(constants) => self.set_session_constants(constants),
            ServerMessage::Secret(_) => {}
            ServerMessage::OwnDeath => self.alive = false,
            ServerMessage::SnakeGone { id, died } => self.remove_snake(id, died),
            ServerMessage::SnakeSeen(descriptor) => self.add_or_update_snake(*descriptor),
            ServerMessage::Grow { id, head, fam } => self.append_head(id, head, Some(fam), false),
            ServerMessage::Move { id, head } => self.append_head(id, head, None, true),
            ServerMessage::Rotation { id, ang, wang, sp } => self.set_rotation(id, ang, wang, sp),
            ServerMessage::Fullness { id, fam } => self.set_fam(id, fam),
            ServerMessage::TailPop { id, fam } => self.pop_tail(id, fam),
            ServerMessage::FoodBatch(batch) => self.add_food_batch(&batch),
            ServerMessage::FoodEaten { x, y, eater } => self.remove_food(x, y, eater),
            ServerMessage::PreySeen { id, prey } => self.upsert_prey(id, prey),
            ServerMessage::PreyGone { id, eater } => self.remove_prey(id, eater),
            ServerMessage::PreyMoved { id, pos } => self.move_prey(id, pos),
            ServerMessage::SectorAdd { x, y } => {
                self.sectors.insert((x, y));
            }
            ServerMessage::SectorRemove { x, y } => {
                self.sectors.remove(&(x, y));
            }
            ServerMessage::Leaderboard(board) => self.set_leaderboard(board),
            ServerMessage::Minimap(grid) => self.minimap = grid,
            ServerMessage::Kill { killer, kills_raw, .. } => {
                self.kills_seen += 1;
                tracing::debug!(killer, kills_raw, "kill notification");
            }
            ServerMessage::Highscore(entry) => self.last_highscore = Some(entry),
            ServerMessage::VerifyCode(raw) => {
                tracing::debug!(len = raw.len(), "verify-code response");
            }
            ServerMessage::Pong => {}
        }
    }

    pub fn set_session_constants(&mut self, constants: SessionConstants) {
        tracing::info!(
            game_radius = constants.game_radius,
            sector_size = constants.sector_size,
            protocol_version = constants.protocol_version,
            "session constants received"
        );
        self.constants = Some(constants);
    }

    /// The first full descriptor after spawn is the player's snake; once
    /// adopted the id never changes for the rest of the life.
    pub fn adopt_own_snake(&mut self, id: u16) {
        match self.own_snake_id {
            None => {
                self.own_snake_id = Some(id);
                self.alive = true;
                tracing::info!(id, "own snake adopted");
            }
            Some(existing) if existing != id => {
                tracing::warn!(existing, id, "refusing to rewrite own snake id");
            }
            Some(_) => {}
        }
    }

    pub fn add_or_update_snake(&mut self, descriptor: SnakeDescriptor) {
        if descriptor.body.is_empty() {
            tracing::warn!(id = descriptor.id, "snake descriptor with no body, dropped");
            return;
        }
        let is_new = !self.snakes.contains_key(&descriptor.id);
        if is_new {
            self.snakes_seen += 1;
        }
        // Long descriptors carry the whole body; only the newest segments
        // are retained, same as the head-append path.
        let mut body = VecDeque::from(descriptor.body);
        while body.len() > BODY_CAP {
            body.pop_front();
        }
        let ehang = descriptor.ehang;
        let speed = descriptor.speed;
        let snake = Snake {
            id: descriptor.id,
            name: descriptor.name,
            skin: descriptor.skin,
            custom_skin: descriptor.custom_skin,
            body,
            fam: descriptor.fam.clamp(0.0, 1.0),
            ang: ehang,
            wang: descriptor.wang,
            ehang,
            sp: speed,
            dir: descriptor.dir,
        };
        self.snakes.insert(descriptor.id, snake);
    }

    pub fn remove_snake(&mut self, id: u16, died: bool) {
        if self.snakes.remove(&id).is_none() {
            tracing::debug!(id, "removal for snake not in range");
            return;
        }
        tracing::debug!(id, died, "snake removed");
    }

    fn resolve_head(snake: &Snake, target: HeadTarget) -> Option<Vec2> {
        match target {
            HeadTarget::Absolute(point) => Some(point),
            HeadTarget::Relative { dx, dy } => {
                let head = snake.head()?;
                Some(Vec2 {
                    x: head.x + protocol::codec::i8_shifted(dx),
                    y: head.y + protocol::codec::i8_shifted(dy),
                })
            }
        }
    }

    /// Grow (`retire_oldest = false`) appends a head; move also retires the
    /// oldest segment first. A relative target against an empty body is a
    /// stale reference and is dropped.
    pub fn append_head(&mut self, id: u16, target: HeadTarget, fam: Option<f64>, retire_oldest: bool) {
        let Some(snake) = self.snakes.get_mut(&id) else {
            tracing::warn!(id, "head update for unknown snake");
            return;
        };
        let Some(head) = Self::resolve_head(snake, target) else {
            tracing::warn!(id, "relative head update but snake has no body");
            return;
        };
        if retire_oldest && snake.body.len() > 1 {
            snake.pop_tail();
        }
        snake.append_head(head);
        if let Some(fam) = fam {
            snake.set_fam(fam);
        }
    }

    pub fn set_rotation(&mut self, id: u16, ang: Option<f64>, wang: Option<f64>, sp: Option<f64>) {
        let Some(snake) = self.snakes.get_mut(&id) else {
            tracing::warn!(id, "rotation for unknown snake");
            return;
        };
        snake.set_rotation(ang, wang, sp);
    }

    pub fn set_fam(&mut self, id: u16, fam: f64) {
        let Some(snake) = self.snakes.get_mut(&id) else {
            tracing::warn!(id, "fullness for unknown snake");
            return;
        };
        snake.set_fam(fam);
    }

    pub fn pop_tail(&mut self, id: u16, fam: Option<f64>) {
        let Some(snake) = self.snakes.get_mut(&id) else {
            tracing::warn!(id, "tail removal for unknown snake");
            return;
        };
        if snake.body.len() <= 1 {
            tracing::warn!(id, "tail removal would empty the body, dropped");
            return;
        }
        snake.pop_tail();
        if let Some(fam) = fam {
            snake.set_fam(fam);
        }
    }

    pub fn add_food_batch(&mut self, batch: &[protocol::FoodSpawn]) {
        for spawn in batch {
            self.foods.insert(
                (spawn.x, spawn.y),
                Food {
                    color_index: spawn.color_index,
                    size: spawn.size,
                },
            );
        }
    }

    pub fn remove_food(&mut self, x: u16, y: u16, eater: u16) {
        if self.foods.remove(&(x, y)).is_none() {
            tracing::warn!(x, y, "eat-food for unknown cell");
            return;
        }
        *self.eat_credits.entry(eater).or_insert(0) += 1;
    }

    pub fn upsert_prey(&mut self, id: u16, prey: Prey) {
        self.preys.insert(id, prey);
    }

    pub fn remove_prey(&mut self, id: u16, eater: Option<u16>) {
        if self.preys.remove(&id).is_none() {
            tracing::debug!(id, "removal for prey not in range");
            return;
        }
        if let Some(eater) = eater {
            *self.eat_credits.entry(eater).or_insert(0) += 1;
        }
    }

    pub fn move_prey(&mut self, id: u16, pos: Vec2) {
        let Some(prey) = self.preys.get_mut(&id) else {
            tracing::warn!(id, "position update for unknown prey");
            return;
        };
        prey.pos = pos;
    }

    pub fn set_leaderboard(&mut self, board: Leaderboard) {
        if board.player_count > 0 && u16::from(board.player_rank) > board.player_count {
            tracing::warn!(
                rank = board.player_rank,
                count = board.player_count,
                "leaderboard rank exceeds player count, dropped"
            );
            return;
        }
        self.leaderboard = board;
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let mut snakes: Vec<SnakeView> = self
            .snakes
            .values()
            .map(|snake| SnakeView {
                id: snake.id,
                name: snake.name.clone(),
                color: SNAKE_PALETTE[snake.color_index()],
                fam: snake.fam,
                ang: snake.ang,
                wang: snake.wang,
                ehang: snake.ehang,
                sp: snake.sp,
                dir: snake.dir,
                head: snake.head(),
                body: snake.body.iter().copied().collect(),
            })
            .collect();
        snakes.sort_by_key(|view| view.id);

        let mut foods: Vec<FoodView> = self
            .foods
            .iter()
            .map(|(&(x, y), food)| FoodView {
                x,
                y,
                color: FOOD_PALETTE[food.color_index as usize % FOOD_PALETTE.len()],
                size: food.size,
            })
            .collect();
        foods.sort_by_key(|view| (view.x, view.y));

        let mut preys: Vec<PreyView> = self
            .preys
            .iter()
            .map(|(&id, prey)| PreyView {
                id,
                pos: prey.pos,
                size: prey.size,
                color: prey.color,
                speed: prey.speed,
            })
            .collect();
        preys.sort_by_key(|view| view.id);

        WorldSnapshot {
            own_snake_id: self.own_snake_id,
            alive: self.alive,
            constants: self.constants,
            snakes,
            foods,
            preys,
            leaderboard: self.leaderboard.clone(),
            minimap: self.minimap.clone(),
            sectors: {
                let mut sectors: Vec<(u8, u8)> = self.sectors.iter().copied().collect();
                sectors.sort_unstable();
                sectors
            },
            kills_seen: self.kills_seen,
            last_highscore: self.last_highscore.clone(),
        }
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub own_snake_id: Option<u16>,
    pub alive: bool,
    pub constants: Option<SessionConstants>,
    pub snakes: Vec<SnakeView>,
    pub foods: Vec<FoodView>,
    pub preys: Vec<PreyView>,
    pub leaderboard: Leaderboard,
    pub minimap: Minimap,
    pub sectors: Vec<(u8, u8)>,
    pub kills_seen: u64,
    pub last_highscore: Option<GlobalHighscore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnakeView {
    pub id: u16,
    pub name: String,
    pub color: [u8; 3],
    pub fam: f64,
    pub ang: f64,
    pub wang: f64,
    pub ehang: f64,
    pub sp: f64,
    pub dir: i16,
    pub head: Option<Vec2>,
    pub body: Vec<Vec2>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodView {
    pub x: u16,
    pub y: u16,
    pub color: [u8; 3],
    pub size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreyView {
    pub id: u16,
    pub pos: Vec2,
    pub size: f64,
    pub color: u8,
    pub speed: f64,
}
