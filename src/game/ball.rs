//! The volley ball: flight, spin, collisions and scoring

use rand::Rng;

use super::paddle::{Paddle, Side};
use super::physics::{
    PhysicsSystem, Vec2, BALL_BASE_SPEED, BALL_DEFAULT_HEIGHT, BALL_DEFAULT_WIDTH, CURVE_DECAY,
    CURVE_RESPONSE, DEFAULT_MAX_CURVE_DEG, FIELD_CENTER, FIELD_HEIGHT, FIELD_WIDTH,
    MAX_BALL_SPEED_FACTOR, MAX_BOUNCE_ANGLE_DEG, MAX_CURVE_ANGLE_DEG, MAX_FLIGHT_ANGLE_DEG,
    MAX_RALLY_SPEED_GAIN, PADDLE_SPIN_SHARE, SERVE_ANGLE_DEG, SPEED_GAIN_PER_HIT,
};
use super::score::Score;
use super::settings::GameMode;
use super::SimulationError;

/// Ball state after one tick, as framed on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub is_out_of_bounds: bool,
    pub curve: f32,
    pub bounced_off_surface: bool,
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    pub width: f32,
    pub height: f32,
    /// Configured serve speed (units per tick)
    pub speed: f32,
    /// Current spin, in degrees of remaining deflection
    pub curve: f32,
    /// Spin bound, in degrees
    pub max_curve_angle: f32,
    pub is_out_of_bounds: bool,
    pub bounced_off_surface: bool,
    /// Horizontal direction of the next serve (-1 or +1)
    serve_direction: f32,
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

impl Ball {
    pub fn new() -> Self {
        let mut ball = Self {
            position: FIELD_CENTER,
            velocity: Vec2::default(),
            width: BALL_DEFAULT_WIDTH,
            height: BALL_DEFAULT_HEIGHT,
            speed: BALL_BASE_SPEED,
            curve: 0.0,
            max_curve_angle: DEFAULT_MAX_CURVE_DEG,
            is_out_of_bounds: false,
            bounced_off_surface: false,
            serve_direction: 1.0,
        };
        ball.serve();
        ball
    }

    pub fn set_dimensions(&mut self, width: f32, height: f32) -> Result<(), SimulationError> {
        let valid = |v: f32| v.is_finite() && v > 0.0 && v < FIELD_HEIGHT / 2.0;
        if !valid(width) || !valid(height) {
            return Err(SimulationError::InvalidSetting("ball dimensions"));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// `factor` multiplies the base speed
    pub fn set_speed(&mut self, factor: f32) -> Result<(), SimulationError> {
        if !factor.is_finite() || factor <= 0.0 || factor > MAX_BALL_SPEED_FACTOR {
            return Err(SimulationError::InvalidSetting("ball_speed"));
        }
        self.speed = BALL_BASE_SPEED * factor;
        Ok(())
    }

    pub fn set_max_curve_angle(&mut self, degrees: f32) -> Result<(), SimulationError> {
        if !degrees.is_finite() || !(0.0..=MAX_CURVE_ANGLE_DEG).contains(&degrees) {
            return Err(SimulationError::InvalidSetting("max_ball_curve"));
        }
        self.max_curve_angle = degrees;
        self.curve = self.curve.clamp(-degrees, degrees);
        Ok(())
    }

    /// Back to center with a fresh serve for a new match under `mode`
    pub fn reset(&mut self, mode: GameMode) {
        self.serve_direction = match mode {
            // Attract play opens towards a random side
            GameMode::Demo if rand::thread_rng().gen_bool(0.5) => -1.0,
            _ => 1.0,
        };
        self.serve();
    }

    fn serve(&mut self) {
        let angle = rand::thread_rng().gen_range(-SERVE_ANGLE_DEG..=SERVE_ANGLE_DEG);
        self.position = FIELD_CENTER;
        self.velocity = Vec2::from_heading(self.serve_direction, angle.to_radians(), self.speed);
        self.curve = 0.0;
    }

    fn park(&mut self) {
        self.position = FIELD_CENTER;
        self.velocity = Vec2::default();
        self.curve = 0.0;
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn snapshot(&self) -> BallSnapshot {
        BallSnapshot {
            position: self.position,
            velocity: self.velocity,
            is_out_of_bounds: self.is_out_of_bounds,
            curve: self.curve,
            bounced_off_surface: self.bounced_off_surface,
        }
    }

    /// Advance one tick. `on_score` runs once for every point scored this tick.
    pub fn update_ball<F>(
        &mut self,
        mode: GameMode,
        paddles: &[Paddle],
        score: &mut Score,
        mut on_score: F,
    ) -> BallSnapshot
    where
        F: FnMut(&Score),
    {
        self.is_out_of_bounds = false;
        self.bounced_off_surface = false;

        if score.winner().is_some() {
            self.park();
            return self.snapshot();
        }

        if mode.has_curve() && self.curve != 0.0 {
            let turn = (self.curve * CURVE_RESPONSE).to_radians();
            self.velocity = PhysicsSystem::limit_heading(
                self.velocity.rotated(turn),
                MAX_FLIGHT_ANGLE_DEG.to_radians(),
            );
            self.curve *= CURVE_DECAY;
        }

        let previous = self.position;
        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;

        self.bounce_off_walls();
        self.bounce_off_paddles(mode, paddles, previous);

        if let Some(scorer) = self.goal_scorer() {
            self.is_out_of_bounds = true;
            score.add_point(scorer);
            on_score(score);
            // Next serve goes to the side that conceded
            self.serve_direction = match scorer {
                Side::Left => 1.0,
                Side::Right => -1.0,
            };
            self.serve();
        }

        self.snapshot()
    }

    fn bounce_off_walls(&mut self) {
        let half = self.height / 2.0;
        if self.position.y - half <= 0.0 {
            self.position.y = half;
            self.velocity.y = self.velocity.y.abs();
        } else if self.position.y + half >= FIELD_HEIGHT {
            self.position.y = FIELD_HEIGHT - half;
            self.velocity.y = -self.velocity.y.abs();
        } else {
            return;
        }
        self.curve = -self.curve;
        self.bounced_off_surface = true;
    }

    /// `previous` is the position before this tick's move. A fast ball that
    /// jumps over a paddle still hits it where it crossed the face plane.
    fn bounce_off_paddles(&mut self, mode: GameMode, paddles: &[Paddle], previous: Vec2) {
        let incoming = if self.velocity.x < 0.0 {
            Side::Left
        } else {
            Side::Right
        };

        let hit = paddles
            .iter()
            .filter(|paddle| paddle.side == incoming)
            .find_map(|paddle| self.contact_y(paddle, previous).map(|y| (paddle, y)));
        let Some((paddle, contact_y)) = hit else {
            return;
        };
        self.position.y = contact_y;

        let reach = paddle.height / 2.0 + self.height / 2.0;
        let offset = ((self.position.y - paddle.position) / reach).clamp(-1.0, 1.0);
        let angle = (offset * MAX_BOUNCE_ANGLE_DEG).to_radians();

        let rally_speed = (self.velocity.length() * SPEED_GAIN_PER_HIT)
            .min(self.speed * MAX_RALLY_SPEED_GAIN);
        let outgoing = match paddle.side {
            Side::Left => 1.0,
            Side::Right => -1.0,
        };
        self.velocity = Vec2::from_heading(outgoing, angle, rally_speed);

        // Place the ball in front of the paddle face
        let clearance = paddle.width / 2.0 + self.width / 2.0;
        self.position.x = paddle.x() + outgoing * clearance;

        if mode.has_curve() {
            let spin = offset * self.max_curve_angle
                + paddle.direction as f32 * self.max_curve_angle * PADDLE_SPIN_SHARE;
            self.curve = spin.clamp(-self.max_curve_angle, self.max_curve_angle);
        }
        self.bounced_off_surface = true;
    }

    /// Ball center height where it meets `paddle` this tick, if it does
    fn contact_y(&self, paddle: &Paddle, previous: Vec2) -> Option<f32> {
        let (size, paddle_size) = (self.size(), paddle.size());
        if PhysicsSystem::rects_overlap(self.position, size, paddle.center(), paddle_size) {
            return Some(self.position.y);
        }

        // Signed distances in front of the face, positive on the field side
        let facing = match paddle.side {
            Side::Left => 1.0,
            Side::Right => -1.0,
        };
        let face = paddle.x() + facing * (paddle.width / 2.0 + self.width / 2.0);
        let before = (previous.x - face) * facing;
        let after = (self.position.x - face) * facing;
        if before < 0.0 || after >= 0.0 {
            return None;
        }

        let t = before / (before - after);
        let y = previous.y + t * (self.position.y - previous.y);
        let reach = paddle.height / 2.0 + self.height / 2.0;
        ((y - paddle.position).abs() <= reach).then_some(y)
    }

    /// The side that wins the point when the ball has fully crossed a goal line
    fn goal_scorer(&self) -> Option<Side> {
        let half = self.width / 2.0;
        if self.position.x + half < 0.0 {
            Some(Side::Right)
        } else if self.position.x - half > FIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        }
    }
}
