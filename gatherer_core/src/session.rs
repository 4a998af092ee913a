//! The live episode, owned by a single tokio task.
//!
//! Everything outside the task talks to it through [`SessionHandle`]:
//! mutation requests go in over a command channel and are applied later,
//! and the resulting state is published as an immutable snapshot. Callers
//! must never assume a request is visible as soon as it is sent.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{
    Action, Direction, Position, ResourceKind,
    bot::GameControl,
    config::GameConfig,
    dataset::LogEntry,
    episode::{EpisodeState, InteractOutcome, MoveOutcome},
    generator::{GenerationError, MapGenerator},
    grid::Tile,
    scores::HighScores,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("session task has stopped")]
    Closed,
}

/// Why an episode stopped accepting actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    BudgetReached,
    /// The bot found nothing left worth doing.
    Exhausted,
}

/// Notifications published after each applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    EpisodeStarted {
        episode_id: u64,
    },
    Moved {
        position: Position,
        tile: Tile,
        cost: u32,
    },
    Collected {
        kind: ResourceKind,
    },
    Delivered {
        kind: ResourceKind,
        value: u32,
        score: u32,
    },
    /// The running score crossed the target for this budget.
    TargetReached {
        target: u32,
    },
    /// Emitted just before `EpisodeEnded` when the final score beats the best one.
    NewHighScore {
        score: u32,
    },
    EpisodeEnded {
        episode_id: u64,
        reason: EndReason,
        score: u32,
    },
    LogCleared,
}

/// What observers see: the latest episode state and whether it is live.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub episode: Option<Arc<EpisodeState>>,
    pub active: bool,
    /// Best score recorded for the configured budget.
    pub high_score: u32,
}

enum Command {
    Move(Direction),
    CollectOrDeliver,
    Record {
        action: Action,
        state: Arc<EpisodeState>,
    },
    End(EndReason),
    Restart {
        reply: oneshot::Sender<Result<u64, GenerationError>>,
    },
    TakeLog {
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    ClearLog,
    SetHighScores(HighScores),
    HighScores {
        reply: oneshot::Sender<HighScores>,
    },
    Shutdown,
}

/// Session worker. Sole owner and mutator of the episode state.
pub struct Session {
    config: Arc<GameConfig>,
    generator: MapGenerator,
    state: EpisodeState,
    active: bool,
    log: Vec<LogEntry>,
    next_log_id: u64,
    high_scores: HighScores,
    command_rx: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
    event_tx: broadcast::Sender<GameEvent>,
}

impl Session {
    /// Generates a first episode and spawns the worker on the current tokio
    /// runtime. The episode stays inactive until [`SessionHandle::restart`].
    pub fn spawn(config: GameConfig, seed: Option<u64>) -> Result<SessionHandle, SessionError> {
        let mut generator = seed.map_or_else(MapGenerator::from_entropy, MapGenerator::new);
        let state = generator.generate(&config, 1)?;
        Ok(Self::start(config, generator, state, false))
    }

    /// Spawns a worker around a prepared, already active episode.
    pub fn spawn_with_state(
        config: GameConfig,
        state: EpisodeState,
        seed: u64,
    ) -> Result<SessionHandle, SessionError> {
        config.validate().map_err(GenerationError::from)?;
        Ok(Self::start(config, MapGenerator::new(seed), state, true))
    }

    fn start(
        config: GameConfig,
        generator: MapGenerator,
        state: EpisodeState,
        active: bool,
    ) -> SessionHandle {
        let config = Arc::new(config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let (event_tx, _) = broadcast::channel(256);

        let session = Session {
            config: Arc::clone(&config),
            generator,
            state,
            active,
            log: Vec::new(),
            next_log_id: 0,
            high_scores: HighScores::default(),
            command_rx,
            snapshot_tx,
            event_tx: event_tx.clone(),
        };
        session.publish();
        tokio::spawn(session.run());

        SessionHandle {
            config,
            command_tx,
            snapshot_rx,
            event_tx,
        }
    }

    /// Main worker loop
    async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            if !self.handle_command(cmd) {
                break;
            }
        }
        tracing::debug!("Session worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Move(direction) => self.apply_move(direction),
            Command::CollectOrDeliver => self.apply_interaction(),
            Command::Record { action, state } => {
                let entry = LogEntry::new(self.next_log_id, action, &state, self.config.budget);
                self.next_log_id += 1;
                self.log.push(entry);
            }
            Command::End(reason) => {
                if self.active {
                    self.end_episode(reason);
                }
            }
            Command::Restart { reply } => {
                let _ = reply.send(self.restart());
            }
            Command::TakeLog { reply } => {
                let _ = reply.send(std::mem::take(&mut self.log));
            }
            Command::ClearLog => {
                self.log.clear();
                self.next_log_id = 0;
                tracing::info!("Decision log cleared");
                self.emit(GameEvent::LogCleared);
            }
            Command::SetHighScores(scores) => {
                self.high_scores = scores;
                self.publish();
            }
            Command::HighScores { reply } => {
                let _ = reply.send(self.high_scores.clone());
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn apply_move(&mut self, direction: Direction) {
        if !self.active {
            tracing::debug!(?direction, "Ignoring move, episode inactive");
            return;
        }

        match self.state.apply_move(direction) {
            MoveOutcome::Moved {
                position,
                cost,
                tile,
            } => {
                self.emit(GameEvent::Moved {
                    position,
                    tile,
                    cost,
                });
                if self.state.is_exhausted(self.config.budget) {
                    self.end_episode(EndReason::BudgetReached);
                }
            }
            MoveOutcome::Blocked => tracing::debug!(?direction, "Move blocked by grid edge"),
        }
        self.publish();
    }

    fn apply_interaction(&mut self) {
        if !self.active {
            tracing::debug!("Ignoring collect/deliver, episode inactive");
            return;
        }

        match self.state.apply_collect_or_deliver(&mut self.generator) {
            InteractOutcome::Collected(resource) => {
                self.emit(GameEvent::Collected {
                    kind: resource.kind,
                });
            }
            InteractOutcome::Delivered { kind, value, .. } => {
                let score = self.state.score;
                self.emit(GameEvent::Delivered { kind, value, score });

                let target = self.config.target_score();
                if score - value < target && score >= target {
                    tracing::info!(target, score, "Target score reached");
                    self.emit(GameEvent::TargetReached { target });
                }
            }
            InteractOutcome::Nothing => tracing::debug!("Nothing to collect or deliver"),
        }
        self.publish();
    }

    fn end_episode(&mut self, reason: EndReason) {
        self.active = false;
        let score = self.state.score;
        if self.high_scores.record(self.config.budget, score) {
            tracing::info!(score, budget = self.config.budget, "New high score");
            self.emit(GameEvent::NewHighScore { score });
        }
        tracing::info!(
            episode_id = self.state.episode_id,
            ?reason,
            score,
            step_cost = self.state.step_cost,
            "Episode ended"
        );
        self.emit(GameEvent::EpisodeEnded {
            episode_id: self.state.episode_id,
            reason,
            score,
        });
        self.publish();
    }

    /// Replaces the whole episode with a freshly generated one.
    fn restart(&mut self) -> Result<u64, GenerationError> {
        let episode_id = self.state.episode_id + 1;
        self.state = self.generator.generate(&self.config, episode_id)?;
        self.active = true;
        tracing::info!(episode_id, "Episode started");
        self.emit(GameEvent::EpisodeStarted { episode_id });
        self.publish();
        Ok(episode_id)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Snapshot {
            episode: Some(Arc::new(self.state.clone())),
            active: self.active,
            high_score: self.high_scores.best(self.config.budget),
        });
    }

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Client-facing handle to the session worker.
#[derive(Clone)]
pub struct SessionHandle {
    config: Arc<GameConfig>,
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<Snapshot>,
    event_tx: broadcast::Sender<GameEvent>,
}

impl SessionHandle {
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    fn send(&self, cmd: Command) {
        if self.command_tx.send(cmd).is_err() {
            tracing::warn!("Session worker is gone, command dropped");
        }
    }

    /// Fire-and-forget: the move shows up in a later snapshot.
    pub fn request_move(&self, direction: Direction) {
        self.send(Command::Move(direction));
    }

    /// Fire-and-forget: collects when standing on a resource with free hands,
    /// delivers when holding one on the base.
    pub fn request_collect_or_deliver(&self) {
        self.send(Command::CollectOrDeliver);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn observe_state(&self) -> Option<Arc<EpisodeState>> {
        self.snapshot_rx.borrow().episode.clone()
    }

    pub fn observe_active(&self) -> bool {
        self.snapshot_rx.borrow().active
    }

    /// Ends the running episode because no profitable action is left.
    pub fn notify_exhausted(&self) {
        self.send(Command::End(EndReason::Exhausted));
    }

    /// Appends a dataset entry. Queued on the command channel, so it is
    /// ordered before any action requested after it.
    pub fn record_decision(&self, action: Action, state: Arc<EpisodeState>) {
        self.send(Command::Record { action, state });
    }

    /// Generates and activates a new episode, returning its id.
    pub async fn restart(&self) -> Result<u64, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Restart { reply })
            .map_err(|_| SessionError::Closed)?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    /// Drains the recorded decisions.
    pub async fn take_log(&self) -> Result<Vec<LogEntry>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::TakeLog { reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Empties the decision log and restarts its entry ids at 0.
    pub fn clear_log(&self) {
        self.send(Command::ClearLog);
    }

    /// Replaces the high score table, e.g. with one loaded from disk.
    pub fn set_high_scores(&self, scores: HighScores) {
        self.send(Command::SetHighScores(scores));
    }

    pub async fn high_scores(&self) -> Result<HighScores, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::HighScores { reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.event_tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }
}

impl GameControl for SessionHandle {
    fn request_move(&self, direction: Direction) {
        SessionHandle::request_move(self, direction);
    }

    fn request_collect_or_deliver(&self) {
        SessionHandle::request_collect_or_deliver(self);
    }

    fn observe_state(&self) -> Option<Arc<EpisodeState>> {
        SessionHandle::observe_state(self)
    }

    fn observe_active(&self) -> bool {
        SessionHandle::observe_active(self)
    }

    fn notify_exhausted(&self) {
        SessionHandle::notify_exhausted(self);
    }

    fn record_decision(&self, action: Action, state: Arc<EpisodeState>) {
        SessionHandle::record_decision(self, action, state);
    }
}
