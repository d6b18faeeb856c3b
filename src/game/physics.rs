//! Field geometry and movement helpers shared by the ball and paddles

/// Playing field width (units). Goal lines sit at x = 0 and x = FIELD_WIDTH.
pub const FIELD_WIDTH: f32 = 100.0;
/// Playing field height (units). Walls sit at y = 0 and y = FIELD_HEIGHT.
pub const FIELD_HEIGHT: f32 = 100.0;

/// Distance between a goal line and the paddle center line
pub const PADDLE_MARGIN: f32 = 3.0;
pub const PADDLE_WIDTH: f32 = 2.0;
pub const PADDLE_HEIGHT: f32 = 20.0;
/// Paddle travel per tick while a direction is held
pub const PADDLE_SPEED: f32 = 1.5;

pub const BALL_DEFAULT_WIDTH: f32 = 2.0;
pub const BALL_DEFAULT_HEIGHT: f32 = 2.0;
/// Ball travel per tick at `ball_speed = 1.0`
pub const BALL_BASE_SPEED: f32 = 0.9;
/// Upper bound for the `ball_speed` multiplier
pub const MAX_BALL_SPEED_FACTOR: f32 = 5.0;
/// Speed multiplier applied on every paddle hit
pub const SPEED_GAIN_PER_HIT: f32 = 1.05;
/// Rally speed never exceeds this multiple of the configured speed
pub const MAX_RALLY_SPEED_GAIN: f32 = 2.0;

/// Largest deflection off a paddle edge, in degrees
pub const MAX_BOUNCE_ANGLE_DEG: f32 = 60.0;
/// Flight never gets steeper than this, in degrees from horizontal
pub const MAX_FLIGHT_ANGLE_DEG: f32 = 75.0;
/// Serve angle is drawn from +/- this many degrees
pub const SERVE_ANGLE_DEG: f32 = 30.0;

/// Upper bound for `max_ball_curve`, in degrees
pub const MAX_CURVE_ANGLE_DEG: f32 = 90.0;
pub const DEFAULT_MAX_CURVE_DEG: f32 = 15.0;
/// Fraction of spin kept after each tick
pub const CURVE_DECAY: f32 = 0.98;
/// Share of the current spin turned into heading change each tick.
/// Equal to the decayed share, so a whole flight bends by `curve` degrees.
pub const CURVE_RESPONSE: f32 = 1.0 - CURVE_DECAY;
/// Share of the curve budget imparted by a moving paddle
pub const PADDLE_SPIN_SHARE: f32 = 0.5;

/// 2D vector in field units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Rotate counter-clockwise by `radians`
    pub fn rotated(self, radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Vector of length `speed` heading `radians` off horizontal, toward `dir` (-1 or +1)
    pub fn from_heading(dir: f32, radians: f32, speed: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            x: dir.signum() * speed * cos,
            y: speed * sin,
        }
    }
}

/// Center of the field
pub const FIELD_CENTER: Vec2 = Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0);

/// Stateless geometry checks
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Clamp a center coordinate so that `center +/- half_extent` stays in `[min, max]`
    pub fn clamp_center(center: f32, half_extent: f32, min: f32, max: f32) -> f32 {
        let low = min + half_extent;
        let high = max - half_extent;
        if low > high {
            // Object larger than the range: pin to the middle
            return (min + max) / 2.0;
        }
        center.clamp(low, high)
    }

    /// Overlap test between two center-anchored rectangles
    pub fn rects_overlap(a_center: Vec2, a_size: Vec2, b_center: Vec2, b_size: Vec2) -> bool {
        (a_center.x - b_center.x).abs() * 2.0 <= a_size.x + b_size.x
            && (a_center.y - b_center.y).abs() * 2.0 <= a_size.y + b_size.y
    }

    /// Keep a heading within `max_radians` of horizontal while preserving
    /// its horizontal direction and its speed
    pub fn limit_heading(velocity: Vec2, max_radians: f32) -> Vec2 {
        let speed = velocity.length();
        if speed == 0.0 {
            return velocity;
        }
        let dir = if velocity.x < 0.0 { -1.0 } else { 1.0 };
        let angle = velocity.y.atan2(velocity.x.abs());
        if angle.abs() <= max_radians {
            return velocity;
        }
        Vec2::from_heading(dir, angle.clamp(-max_radians, max_radians), speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_center_respects_extent() {
        assert_eq!(PhysicsSystem::clamp_center(-5.0, 10.0, 0.0, 100.0), 10.0);
        assert_eq!(PhysicsSystem::clamp_center(95.0, 10.0, 0.0, 100.0), 90.0);
        assert_eq!(PhysicsSystem::clamp_center(50.0, 10.0, 0.0, 100.0), 50.0);
        assert_eq!(PhysicsSystem::clamp_center(10.0, 80.0, 0.0, 100.0), 50.0);
    }

    #[test]
    fn rects_touching_edges_overlap() {
        let size = Vec2::new(2.0, 2.0);
        assert!(PhysicsSystem::rects_overlap(
            Vec2::new(0.0, 0.0),
            size,
            Vec2::new(2.0, 0.0),
            size
        ));
        assert!(!PhysicsSystem::rects_overlap(
            Vec2::new(0.0, 0.0),
            size,
            Vec2::new(2.1, 0.0),
            size
        ));
    }

    #[test]
    fn limit_heading_keeps_speed_and_direction() {
        let steep = Vec2::new(-0.1, 1.0);
        let limited = PhysicsSystem::limit_heading(steep, 45f32.to_radians());
        assert!(limited.x < 0.0);
        assert!((limited.length() - steep.length()).abs() < 1e-5);
        assert!((limited.x.abs() - limited.y.abs()).abs() < 1e-5);
    }
}
