//! Per-connection match session: command state machine and tick loop

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::tournament::{BracketError, MatchScore};
use crate::ws::protocol::{
    decode_client_msg, encode_tick_frame, ClientMsg, ControllerSpec, ErrorMsg, Frame, ServerMsg,
    StartSettings,
};

use super::ball::Ball;
use super::paddle::{Paddle, Side};
use super::score::Score;
use super::settings::{GameMode, GameSettings, GameplaySettings};
use super::{GameStatus, SetupError, SimulationError};

/// Receives the outcome of tournament-linked matches
pub trait ResultReporter: Send + Sync {
    fn report_result(
        &self,
        tournament_id: Uuid,
        winner: &str,
        score: MatchScore,
    ) -> Result<(), BracketError>;
}

/// Simulation state shared between the command side and the tick loop
struct MatchState {
    status: GameStatus,
    mode: GameMode,
    ball: Ball,
    /// Insertion order is the tick frame order
    paddles: Vec<Paddle>,
    score: Option<Score>,
    dimensions_confirmed: bool,
    tournament_id: Option<Uuid>,
    side_roster: HashMap<Side, Vec<String>>,
    result_reported: bool,
}

impl MatchState {
    fn new() -> Self {
        Self {
            status: GameStatus::Idle,
            mode: GameMode::default(),
            ball: Ball::new(),
            paddles: Vec::new(),
            score: None,
            dimensions_confirmed: false,
            tournament_id: None,
            side_roster: HashMap::new(),
            result_reported: false,
        }
    }

    fn status_msg(&self) -> ServerMsg {
        ServerMsg::game_state(self.status, self.score.as_ref().map(Score::get_score))
    }
}

/// Validated `start` payload, ready to be installed
struct MatchSetup {
    mode: GameMode,
    tournament_id: Option<Uuid>,
    ball: Ball,
    paddles: Vec<Paddle>,
    score: Score,
    side_roster: HashMap<Side, Vec<String>>,
}

impl MatchSetup {
    /// Each section fails with its own error, checked in roster, scoring,
    /// gameplay, paddle order
    fn build(settings: StartSettings, current_ball: &Ball) -> Result<Self, SetupError> {
        if settings.controllers.is_empty() {
            return Err(SetupError::MissingControllers);
        }

        let game: GameSettings = match settings.game {
            Some(value) => serde_json::from_value(value).map_err(|_| SetupError::Score)?,
            None => GameSettings::default(),
        };
        game.validate().map_err(|_| SetupError::Score)?;
        let score = Score::new(game.end_score, game.is_deuce_on);

        let gameplay: GameplaySettings = match settings.gameplay {
            Some(value) => serde_json::from_value(value).map_err(|_| SetupError::Gameplay)?,
            None => GameplaySettings::default(),
        };
        let mut ball = current_ball.clone();
        ball.set_speed(gameplay.ball_speed)
            .and_then(|_| ball.set_max_curve_angle(gameplay.max_ball_curve))
            .map_err(|_| SetupError::Gameplay)?;
        ball.reset(settings.mode);

        let mut paddles = Vec::with_capacity(settings.controllers.len());
        let mut names = HashSet::new();
        let mut side_roster: HashMap<Side, Vec<String>> = HashMap::new();
        for value in settings.controllers {
            let controller: ControllerSpec =
                serde_json::from_value(value).map_err(|_| SetupError::Paddles)?;
            let name = controller.name.trim().to_string();
            if name.is_empty() || !names.insert(name.clone()) {
                return Err(SetupError::Paddles);
            }
            side_roster.entry(controller.side).or_default().push(name.clone());
            paddles.push(Paddle::new(name, controller.side));
        }

        Ok(Self {
            mode: settings.mode,
            tournament_id: settings.tournament_id,
            ball,
            paddles,
            score,
            side_roster,
        })
    }
}

/// Result that has to leave the session once
struct PendingReport {
    tournament_id: Uuid,
    winner: String,
    score: MatchScore,
}

/// One connection's match. Commands arrive through `handle_text`; frames
/// leave through the outbound channel.
pub struct MatchSession {
    id: Uuid,
    shared: Arc<Mutex<MatchState>>,
    outbound: mpsc::UnboundedSender<Frame>,
    pause_tx: watch::Sender<bool>,
    tick_task: Option<JoinHandle<()>>,
    reporter: Option<Arc<dyn ResultReporter>>,
    tick_interval: Duration,
}

impl MatchSession {
    pub fn new(
        id: Uuid,
        outbound: mpsc::UnboundedSender<Frame>,
        reporter: Option<Arc<dyn ResultReporter>>,
        tick_interval: Duration,
    ) -> Self {
        let (pause_tx, _) = watch::channel(false);
        Self {
            id,
            shared: Arc::new(Mutex::new(MatchState::new())),
            outbound,
            pause_tx,
            tick_task: None,
            reporter,
            tick_interval,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> GameStatus {
        self.shared.lock().status
    }

    /// Decode and apply one text frame. Bad input answers with an error frame.
    pub async fn handle_text(&mut self, text: &str) {
        match decode_client_msg(text) {
            Ok(msg) => self.handle_command(msg).await,
            Err(e) => {
                debug!(session_id = %self.id, error = %e, "Rejected client message");
                self.send_error(e.to_string());
            }
        }
    }

    pub async fn handle_command(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::UpdateDimensions {
                ball_width,
                ball_height,
            } => self.update_dimensions(ball_width, ball_height),
            ClientMsg::Start { data } => self.start(data).await,
            ClientMsg::Pause => self.pause(),
            ClientMsg::Resume => self.resume(),
            ClientMsg::Stop => self.stop().await,
            ClientMsg::UpdatePaddle { name, direction } => self.update_paddle(&name, direction),
        }
    }

    fn update_dimensions(&mut self, width: Option<f32>, height: Option<f32>) {
        let mut state = self.shared.lock();
        let width = width.unwrap_or(state.ball.width);
        let height = height.unwrap_or(state.ball.height);
        if let Err(e) = state.ball.set_dimensions(width, height) {
            drop(state);
            debug!(session_id = %self.id, error = %e, "Rejected ball dimensions");
            self.send_error("Invalid ball dimensions");
            return;
        }

        // A renderer joining late needs the current state right away
        if !state.dimensions_confirmed {
            state.dimensions_confirmed = true;
            let msg = state.status_msg();
            drop(state);
            self.send(&msg);
        }
    }

    async fn start(&mut self, settings: StartSettings) {
        self.set_status(GameStatus::Initializing);

        let current_ball = self.shared.lock().ball.clone();
        let setup = match MatchSetup::build(settings, &current_ball) {
            Ok(setup) => setup,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Match setup failed");
                self.cancel_tick_loop().await;
                self.send_error(e.to_string());
                self.set_status(GameStatus::Idle);
                return;
            }
        };

        if self.cancel_tick_loop().await {
            self.set_status(GameStatus::Ended);
        }

        {
            let mut state = self.shared.lock();
            state.mode = setup.mode;
            state.ball = setup.ball;
            state.paddles = setup.paddles;
            state.score = Some(setup.score);
            state.tournament_id = setup.tournament_id;
            state.side_roster = setup.side_roster;
            state.result_reported = false;
        }
        self.pause_tx.send_replace(false);
        self.spawn_tick_loop();

        info!(
            session_id = %self.id,
            mode = ?setup.mode,
            tournament_id = ?setup.tournament_id,
            "Match started"
        );
        self.set_status(GameStatus::InProgress);
    }

    fn pause(&mut self) {
        if self.status() != GameStatus::InProgress {
            debug!(session_id = %self.id, "Pause ignored, match not running");
            return;
        }
        self.pause_tx.send_replace(true);
        self.set_status(GameStatus::Paused);
    }

    fn resume(&mut self) {
        if self.status() != GameStatus::Paused {
            debug!(session_id = %self.id, "Resume ignored, match not paused");
            return;
        }
        self.pause_tx.send_replace(false);
        self.set_status(GameStatus::InProgress);
    }

    async fn stop(&mut self) {
        if self.cancel_tick_loop().await {
            info!(session_id = %self.id, "Match stopped");
        }
        self.shared.lock().score = None;
        self.set_status(GameStatus::Ended);
        self.set_status(GameStatus::Idle);
    }

    fn update_paddle(&mut self, name: &str, direction: f64) {
        let mut state = self.shared.lock();
        match state.paddles.iter_mut().find(|p| p.name == name) {
            Some(paddle) => paddle.set_direction(direction),
            None => debug!(session_id = %self.id, paddle = %name, "Input for unknown paddle"),
        }
    }

    /// Connection closed: stop ticking, a running match counts as ended
    pub async fn shutdown(&mut self) {
        if self.cancel_tick_loop().await {
            self.shared.lock().status = GameStatus::Ended;
            info!(session_id = %self.id, "Match ended by disconnect");
        }
    }

    /// Abort the running loop and wait until it is gone. Returns whether one existed.
    async fn cancel_tick_loop(&mut self) -> bool {
        let Some(handle) = self.tick_task.take() else {
            return false;
        };
        handle.abort();
        match handle.await {
            Err(e) if e.is_panic() => {
                error!(session_id = %self.id, "Tick loop panicked");
            }
            _ => debug!(session_id = %self.id, "Tick loop cancelled"),
        }
        true
    }

    fn spawn_tick_loop(&mut self) {
        let ticker = TickLoop {
            session_id: self.id,
            shared: self.shared.clone(),
            outbound: self.outbound.clone(),
            pause_rx: self.pause_tx.subscribe(),
            reporter: self.reporter.clone(),
            tick_interval: self.tick_interval,
        };
        self.tick_task = Some(tokio::spawn(ticker.run()));
    }

    fn set_status(&self, status: GameStatus) {
        let msg = {
            let mut state = self.shared.lock();
            state.status = status;
            state.status_msg()
        };
        self.send(&msg);
    }

    fn send<T: Serialize>(&self, msg: &T) {
        push_json(&self.outbound, msg);
    }

    /// Queue an `{error}` text frame for this client
    pub fn send_error(&self, message: impl Into<String>) {
        self.send(&ErrorMsg::new(message));
    }
}

/// Queue a JSON text frame. A closed channel means the client is gone.
fn push_json<T: Serialize>(outbound: &mpsc::UnboundedSender<Frame>, msg: &T) {
    match Frame::json(msg) {
        Ok(frame) => {
            let _ = outbound.send(frame);
        }
        Err(e) => error!(error = %e, "Failed to serialize frame"),
    }
}

/// Everything the spawned tick task owns
struct TickLoop {
    session_id: Uuid,
    shared: Arc<Mutex<MatchState>>,
    outbound: mpsc::UnboundedSender<Frame>,
    pause_rx: watch::Receiver<bool>,
    reporter: Option<Arc<dyn ResultReporter>>,
    tick_interval: Duration,
}

impl TickLoop {
    async fn run(mut self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.pause_rx.wait_for(|paused| !*paused).await.is_err() {
                break;
            }

            let (frame, report) = match self.tick() {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        session_id = %self.session_id,
                        error = %e,
                        "Simulation fault, tick loop stopped"
                    );
                    break;
                }
            };

            if let Some(report) = report {
                self.deliver(report);
            }

            if self.outbound.send(Frame::Binary(frame)).is_err() {
                debug!(session_id = %self.session_id, "Outbound channel closed, tick loop exiting");
                break;
            }
        }
    }

    /// One simulation step under the state lock
    fn tick(&self) -> Result<(bytes::Bytes, Option<PendingReport>), SimulationError> {
        let mut guard = self.shared.lock();
        let MatchState {
            status,
            mode,
            ball,
            paddles,
            score,
            tournament_id,
            side_roster,
            result_reported,
            ..
        } = &mut *guard;
        let score = score.as_mut().ok_or(SimulationError::ScoreMissing)?;

        for paddle in paddles.iter_mut() {
            paddle.update_position();
        }

        let outbound = &self.outbound;
        let status = *status;
        let snapshot = ball.update_ball(*mode, paddles, score, |score| {
            push_json(outbound, &ServerMsg::game_state(status, Some(score.get_score())));
        });
        if !snapshot.position.is_finite() || !snapshot.velocity.is_finite() {
            return Err(SimulationError::NonFinite);
        }

        let mut report = None;
        if let (Some(side), Some(tournament_id)) = (score.winner(), *tournament_id) {
            if !*result_reported {
                *result_reported = true;
                let current = score.get_score();
                match side_roster.get(&side).and_then(|names| names.first()) {
                    Some(winner) => {
                        report = Some(PendingReport {
                            tournament_id,
                            winner: winner.clone(),
                            score: MatchScore {
                                left: current.left,
                                right: current.right,
                            },
                        })
                    }
                    None => warn!(
                        session_id = %self.session_id,
                        side = ?side,
                        "Winning side has no participant, result not reported"
                    ),
                }
            }
        }

        Ok((encode_tick_frame(&snapshot, paddles), report))
    }

    fn deliver(&self, report: PendingReport) {
        let Some(reporter) = &self.reporter else {
            warn!(session_id = %self.session_id, "No result reporter, tournament result dropped");
            return;
        };
        match reporter.report_result(report.tournament_id, &report.winner, report.score) {
            Ok(()) => info!(
                session_id = %self.session_id,
                tournament_id = %report.tournament_id,
                winner = %report.winner,
                "Tournament match result reported"
            ),
            Err(e) => warn!(
                session_id = %self.session_id,
                tournament_id = %report.tournament_id,
                error = %e,
                "Tournament result rejected"
            ),
        }
    }
}
