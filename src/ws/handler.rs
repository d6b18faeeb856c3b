//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchSession, ResultReporter};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{encode_error_frame, Frame};

/// Sent back for any binary client frame
const BINARY_INPUT_ERROR: &str = "Binary input is not supported";
/// Sent back for a text frame over the per-connection quota
const RATE_LIMITED_ERROR: &str = "Too many messages, slow down";

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");
    state.sessions.register(session_id);

    let (ws_sink, ws_stream) = socket.split();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Frame>();

    let reporter: Arc<dyn ResultReporter> = state.tournaments.clone();
    let session = MatchSession::new(
        session_id,
        frame_tx.clone(),
        Some(reporter),
        state.config.tick_interval(),
    );

    run_session(session, frame_tx, frame_rx, ws_sink, ws_stream).await;

    let open_ms = state
        .sessions
        .remove(&session_id)
        .map(|info| unix_millis().saturating_sub(info.opened_at));
    info!(session_id = %session_id, open_ms = ?open_ms, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    mut session: MatchSession,
    frame_tx: mpsc::UnboundedSender<Frame>,
    mut frame_rx: mpsc::UnboundedReceiver<Frame>,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
) {
    let session_id = session.id();
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: session frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes.to_vec()),
            };
            if let Err(e) = ws_sink.send(message).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session commands
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text_frame(&mut session, &rate_limiter, &text).await,
            Ok(Message::Binary(_)) => {
                debug!(session_id = %session_id, "Rejected binary client frame");
                let _ = frame_tx.send(Frame::Binary(encode_error_frame(BINARY_INPUT_ERROR)));
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.shutdown().await;
    writer_handle.abort();
}

/// Feed one text frame to the session. Over quota the frame is dropped and
/// the client is told so.
async fn handle_text_frame(
    session: &mut MatchSession,
    rate_limiter: &ConnectionRateLimiter,
    text: &str,
) {
    if !rate_limiter.check_input() {
        warn!(session_id = %session.id(), "Rate limited control message");
        session.send_error(RATE_LIMITED_ERROR);
        return;
    }
    session.handle_text(text).await;
}
