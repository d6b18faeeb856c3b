//! WebSocket protocol message definitions
//! Text frames carry JSON control and status messages, binary frames carry
//! the fixed-layout per-tick state and error records.

#[cfg(test)]
use bytes::Buf;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::ball::BallSnapshot;
use crate::game::paddle::{Paddle, Side};
use crate::game::score::ScoreSnapshot;
use crate::game::settings::GameMode;
use crate::game::GameStatus;

/// Type tag leading every binary error frame
pub const ERROR_FRAME_TAG: u8 = 0xFF;

/// Ball section of a tick frame: 4 floats, flag, float, flag
pub const BALL_FRAME_SIZE: usize = 4 * 4 + 1 + 4 + 1;
/// One paddle record: width, height, position, speed
pub const PADDLE_FRAME_SIZE: usize = 4 * 4;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ball rendering dimensions measured by the client
    UpdateDimensions {
        ball_width: Option<f32>,
        ball_height: Option<f32>,
    },

    /// Configure and start a match
    Start { data: StartSettings },

    Pause,

    Resume,

    Stop,

    /// Paddle movement input
    UpdatePaddle {
        name: String,
        /// Negative = up, positive = down, zero = hold
        #[serde(default)]
        direction: f64,
    },
}

const KNOWN_ACTIONS: [&str; 6] = [
    "update_dimensions",
    "start",
    "pause",
    "resume",
    "stop",
    "update_paddle",
];

/// Payload of a `start` command. The roster and the two settings sections
/// stay raw here so each can fail with its own error during match setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartSettings {
    #[serde(default)]
    pub mode: GameMode,
    #[serde(default)]
    pub tournament_id: Option<Uuid>,
    #[serde(default)]
    pub controllers: Vec<Value>,
    #[serde(default)]
    pub game: Option<Value>,
    #[serde(default)]
    pub gameplay: Option<Value>,
}

/// One roster entry of a `start` command
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSpec {
    pub name: String,
    pub side: Side,
}

/// Client message decoding errors. `Display` is the text sent back to the client.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Unknown action")]
    UnknownAction(String),

    #[error("Invalid input for action '{action}'")]
    InvalidInput {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a text frame into a client command
pub fn decode_client_msg(text: &str) -> Result<ClientMsg, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;

    let action = value
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !KNOWN_ACTIONS.contains(&action.as_str()) {
        return Err(ProtocolError::UnknownAction(action));
    }

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidInput { action, source })
}

/// Text messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Session status and score, pushed on every state change and scoring event
    #[serde(rename_all = "camelCase")]
    GameState {
        status: u8,
        left_score: u32,
        right_score: u32,
        is_deuce: bool,
        is_left_advantage: bool,
        is_right_advantage: bool,
        winner: u8,
    },
}

impl ServerMsg {
    /// Status frame; a session without a score reports zeros
    pub fn game_state(status: GameStatus, score: Option<ScoreSnapshot>) -> Self {
        let score = score.unwrap_or_default();
        ServerMsg::GameState {
            status: status.code(),
            left_score: score.left,
            right_score: score.right,
            is_deuce: score.is_deuce,
            is_left_advantage: score.is_left_advantage,
            is_right_advantage: score.is_right_advantage,
            winner: score.winner,
        }
    }
}

/// `{ "error": <message> }` text frame
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMsg {
    pub error: String,
}

impl ErrorMsg {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Outbound frame, independent of the socket implementation
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn json<T: Serialize>(msg: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(msg).map(Frame::Text)
    }
}

/// Encode one tick: ball state followed by one record per paddle, little-endian
pub fn encode_tick_frame(ball: &BallSnapshot, paddles: &[Paddle]) -> Bytes {
    let mut buf = BytesMut::with_capacity(BALL_FRAME_SIZE + paddles.len() * PADDLE_FRAME_SIZE);
    buf.put_f32_le(ball.position.x);
    buf.put_f32_le(ball.position.y);
    buf.put_f32_le(ball.velocity.x);
    buf.put_f32_le(ball.velocity.y);
    buf.put_u8(ball.is_out_of_bounds as u8);
    buf.put_f32_le(ball.curve);
    buf.put_u8(ball.bounced_off_surface as u8);
    for paddle in paddles {
        buf.put_f32_le(paddle.width);
        buf.put_f32_le(paddle.height);
        buf.put_f32_le(paddle.position);
        buf.put_f32_le(paddle.speed);
    }
    buf.freeze()
}

/// Decoded per-tick frame
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct TickFrame {
    pub ball_x: f32,
    pub ball_y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub is_out_of_bounds: bool,
    pub curve: f32,
    pub bounced_off_surface: bool,
    pub paddles: Vec<PaddleFrame>,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleFrame {
    pub width: f32,
    pub height: f32,
    pub position: f32,
    pub speed: f32,
}

#[cfg(test)]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("unexpected frame tag {0:#04x}")]
    UnexpectedTag(u8),

    #[error("error frame message is not UTF-8")]
    InvalidText,
}

/// Decode a tick frame for a session with `paddle_count` paddles
#[cfg(test)]
pub fn decode_tick_frame(mut data: &[u8], paddle_count: usize) -> Result<TickFrame, FrameError> {
    let expected = BALL_FRAME_SIZE + paddle_count * PADDLE_FRAME_SIZE;
    if data.len() < expected {
        return Err(FrameError::TooShort {
            expected,
            actual: data.len(),
        });
    }

    let ball_x = data.get_f32_le();
    let ball_y = data.get_f32_le();
    let vel_x = data.get_f32_le();
    let vel_y = data.get_f32_le();
    let is_out_of_bounds = data.get_u8() == 1;
    let curve = data.get_f32_le();
    let bounced_off_surface = data.get_u8() == 1;
    let paddles = (0..paddle_count)
        .map(|_| PaddleFrame {
            width: data.get_f32_le(),
            height: data.get_f32_le(),
            position: data.get_f32_le(),
            speed: data.get_f32_le(),
        })
        .collect();

    Ok(TickFrame {
        ball_x,
        ball_y,
        vel_x,
        vel_y,
        is_out_of_bounds,
        curve,
        bounced_off_surface,
        paddles,
    })
}

/// Binary error record: tag, u32 length, UTF-8 message
pub fn encode_error_frame(message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 4 + message.len());
    buf.put_u8(ERROR_FRAME_TAG);
    buf.put_u32_le(message.len() as u32);
    buf.put_slice(message.as_bytes());
    buf.freeze()
}

#[cfg(test)]
pub fn decode_error_frame(mut data: &[u8]) -> Result<String, FrameError> {
    if data.len() < 5 {
        return Err(FrameError::TooShort {
            expected: 5,
            actual: data.len(),
        });
    }
    let tag = data.get_u8();
    if tag != ERROR_FRAME_TAG {
        return Err(FrameError::UnexpectedTag(tag));
    }
    let len = data.get_u32_le() as usize;
    if data.len() < len {
        return Err(FrameError::TooShort {
            expected: 5 + len,
            actual: 5 + data.len(),
        });
    }
    String::from_utf8(data[..len].to_vec()).map_err(|_| FrameError::InvalidText)
}
