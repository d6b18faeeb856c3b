//! Match configuration carried by `start` commands and tournament records

use serde::{Deserialize, Deserializer, Serialize};

use super::physics::{DEFAULT_MAX_CURVE_DEG, MAX_BALL_SPEED_FACTOR, MAX_CURVE_ANGLE_DEG};
use super::SimulationError;

/// Win threshold used when a record or command leaves it out
pub const DEFAULT_END_SCORE: u32 = 6;

/// Rule variant for a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Attract/demo play: straight flight, no spin
    Demo,
    /// Regular single-session match
    #[default]
    Game,
    /// Match played for a tournament bracket
    Tournament,
}

impl GameMode {
    /// Whether paddle contact imparts spin and the ball curves in flight
    pub fn has_curve(self) -> bool {
        !matches!(self, GameMode::Demo)
    }
}

/// Scoring rules (`game` section)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(default = "default_end_score")]
    pub end_score: u32,
    #[serde(default, deserialize_with = "deserialize_deuce_flag")]
    pub is_deuce_on: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            end_score: DEFAULT_END_SCORE,
            is_deuce_on: false,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.end_score == 0 {
            return Err(SimulationError::InvalidSetting("end_score"));
        }
        Ok(())
    }
}

fn default_end_score() -> u32 {
    DEFAULT_END_SCORE
}

/// Clients send either a boolean or the numeric option code, where 2 means "on"
fn deserialize_deuce_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DeuceFlag {
        Bool(bool),
        Code(u64),
    }

    Ok(match DeuceFlag::deserialize(deserializer)? {
        DeuceFlag::Bool(on) => on,
        DeuceFlag::Code(code) => code == 2,
    })
}

/// Ball behavior (`gameplay` section)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameplaySettings {
    /// Multiplier of the base ball speed
    #[serde(default = "default_ball_speed")]
    pub ball_speed: f32,
    /// Maximum spin, in degrees of total deflection per flight
    #[serde(default = "default_max_ball_curve")]
    pub max_ball_curve: f32,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            ball_speed: default_ball_speed(),
            max_ball_curve: default_max_ball_curve(),
        }
    }
}

impl GameplaySettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.ball_speed.is_finite()
            || self.ball_speed <= 0.0
            || self.ball_speed > MAX_BALL_SPEED_FACTOR
        {
            return Err(SimulationError::InvalidSetting("ball_speed"));
        }
        if !self.max_ball_curve.is_finite()
            || self.max_ball_curve < 0.0
            || self.max_ball_curve > MAX_CURVE_ANGLE_DEG
        {
            return Err(SimulationError::InvalidSetting("max_ball_curve"));
        }
        Ok(())
    }
}

fn default_ball_speed() -> f32 {
    1.0
}

fn default_max_ball_curve() -> f32 {
    DEFAULT_MAX_CURVE_DEG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deuce_flag_accepts_bool_and_code() {
        let on: GameSettings =
            serde_json::from_str(r#"{"end_score": 11, "is_deuce_on": 2}"#).unwrap();
        assert!(on.is_deuce_on);
        let off: GameSettings =
            serde_json::from_str(r#"{"end_score": 11, "is_deuce_on": 1}"#).unwrap();
        assert!(!off.is_deuce_on);
        let on: GameSettings = serde_json::from_str(r#"{"is_deuce_on": true}"#).unwrap();
        assert!(on.is_deuce_on);
        assert_eq!(on.end_score, DEFAULT_END_SCORE);
    }

    #[test]
    fn zero_end_score_is_rejected() {
        let settings = GameSettings {
            end_score: 0,
            is_deuce_on: false,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn gameplay_bounds() {
        assert!(GameplaySettings::default().validate().is_ok());
        let too_fast = GameplaySettings {
            ball_speed: MAX_BALL_SPEED_FACTOR + 1.0,
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());
        let negative_curve = GameplaySettings {
            max_ball_curve: -1.0,
            ..Default::default()
        };
        assert!(negative_curve.validate().is_err());
    }

    #[test]
    fn mode_selects_curve_rules() {
        assert!(!GameMode::Demo.has_curve());
        assert!(GameMode::Game.has_curve());
        assert!(GameMode::Tournament.has_curve());
        let mode: GameMode = serde_json::from_str("\"tournament\"").unwrap();
        assert_eq!(mode, GameMode::Tournament);
    }
}
