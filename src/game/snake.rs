use super::constants::{BODY_CAP, SNAKE_PALETTE};
use super::types::{normalize_angle, Vec2};
use std::collections::VecDeque;

/// One snake as replicated from the server. The body is ordered oldest
/// (tail) at the front, head at the back; moves pop the front and push the
/// back, so both ends stay O(1).
#[derive(Debug, Clone)]
pub struct Snake {
    pub id: u16,
    pub name: String,
    pub skin: u8,
    pub custom_skin: Option<Vec<u8>>,
    pub body: VecDeque<Vec2>,
    pub fam: f64,
    pub ang: f64,
    pub wang: f64,
    pub ehang: f64,
    pub sp: f64,
    pub dir: i16,
}

impl Snake {
    pub fn head(&self) -> Option<Vec2> {
        self.body.back().copied()
    }

    /// Appends a new head, trimming the tail to the retained-segment cap.
    pub fn append_head(&mut self, point: Vec2) {
        self.body.push_back(point);
        while self.body.len() > BODY_CAP {
            self.body.pop_front();
        }
    }

    /// Drops the oldest (tail) segment. Callers guard against emptying the
    /// body entirely.
    pub fn pop_tail(&mut self) -> Option<Vec2> {
        self.body.pop_front()
    }

    pub fn set_rotation(&mut self, ang: Option<f64>, wang: Option<f64>, sp: Option<f64>) {
        if let Some(ang) = ang {
            self.ang = normalize_angle(ang);
        }
        if let Some(wang) = wang {
            self.wang = normalize_angle(wang);
        }
        if let Some(sp) = sp {
            self.sp = sp;
        }
    }

    pub fn set_fam(&mut self, fam: f64) {
        self.fam = fam.clamp(0.0, 1.0);
    }

    pub fn color_index(&self) -> usize {
        self.skin as usize % SNAKE_PALETTE.len()
    }
}
