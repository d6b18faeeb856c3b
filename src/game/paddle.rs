//! Player paddles

use serde::{Deserialize, Serialize};

use super::physics::{
    PhysicsSystem, Vec2, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_HEIGHT, PADDLE_MARGIN, PADDLE_SPEED,
    PADDLE_WIDTH,
};

/// Court side a paddle defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// A controllable paddle travelling vertically along its side
#[derive(Debug, Clone)]
pub struct Paddle {
    pub name: String,
    pub side: Side,
    pub width: f32,
    pub height: f32,
    /// Vertical center of the paddle
    pub position: f32,
    /// Travel per tick
    pub speed: f32,
    /// -1 (towards y = 0), 0 or +1
    pub direction: i8,
}

impl Paddle {
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            position: FIELD_HEIGHT / 2.0,
            speed: PADDLE_SPEED,
            direction: 0,
        }
    }

    /// Horizontal center of the paddle
    pub fn x(&self) -> f32 {
        match self.side {
            Side::Left => PADDLE_MARGIN,
            Side::Right => FIELD_WIDTH - PADDLE_MARGIN,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x(), self.position)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Any positive value moves towards the bottom wall, any negative towards the top
    pub fn set_direction(&mut self, direction: f64) {
        self.direction = if direction > 0.0 {
            1
        } else if direction < 0.0 {
            -1
        } else {
            0
        };
    }

    /// Advance one tick along the current direction, clamped to the field
    pub fn update_position(&mut self) {
        let next = self.position + self.direction as f32 * self.speed;
        self.position = PhysicsSystem::clamp_center(next, self.height / 2.0, 0.0, FIELD_HEIGHT);
    }

    pub fn reset(&mut self) {
        self.position = FIELD_HEIGHT / 2.0;
        self.direction = 0;
    }
}
