//! Greedy expert bot.
//!
//! Each planning cycle looks at a single snapshot, picks the resource with
//! the best value per unit of round-trip cost that the remaining budget can
//! pay for, and walks the fetch/deliver loop one confirmed step at a time.

use std::{cmp::Ordering, fmt, sync::Arc};

use tokio::time::{Instant, sleep};

use crate::{
    Action, Direction, Position, Resource,
    config::BotConfig,
    episode::EpisodeState,
    pathfinding::{PathResult, find_path},
    session::{SessionError, SessionHandle},
};

/// The bot's view of the game: fire-and-forget commands plus snapshot reads.
///
/// Commands are applied out of band; their effect only becomes visible in a
/// later `observe_state`.
pub trait GameControl {
    fn request_move(&self, direction: Direction);
    fn request_collect_or_deliver(&self);
    fn observe_state(&self) -> Option<Arc<EpisodeState>>;
    fn observe_active(&self) -> bool;
    fn notify_exhausted(&self);
    /// Called once per issued action, before it is requested.
    fn record_decision(&self, action: Action, state: Arc<EpisodeState>);
}

/// Planner state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotPhase {
    Idle,
    Scanning,
    MovingToResource,
    Collecting,
    MovingToBase,
    Delivering,
    Terminating,
    Terminated,
}

/// Post-condition a confirmation wait was blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    Move(Position),
    Collect,
    Deliver,
    EpisodeStart,
}

impl fmt::Display for Awaiting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Awaiting::Move(pos) => write!(f, "move to ({}, {})", pos.x, pos.y),
            Awaiting::Collect => write!(f, "collection"),
            Awaiting::Deliver => write!(f, "delivery"),
            Awaiting::EpisodeStart => write!(f, "episode start"),
        }
    }
}

/// Why a cycle was abandoned. None of these escape the episode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("episode is no longer active")]
    Inactive,
    #[error("no episode state available")]
    StateUnavailable,
    #[error("agent is at {actual:?}, expected {expected:?}")]
    Desync { expected: Position, actual: Position },
    #[error("timed out waiting for {0}")]
    Timeout(Awaiting),
    #[error("path step {from:?} -> {to:?} is not a single cardinal move")]
    InvalidStep { from: Position, to: Position },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered(Resource),
    /// No reachable, affordable resource is left.
    Exhausted,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEnd {
    Exhausted,
    /// The episode stopped accepting actions (budget spent or ended elsewhere).
    Inactive,
    /// Too many aborted cycles in a row.
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSummary {
    pub episode_id: u64,
    pub score: u32,
    pub step_cost: u32,
    pub deliveries: usize,
    pub aborts: usize,
    pub end: EpisodeEnd,
}

/// A chosen resource together with both legs of its round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub target: Resource,
    pub to_resource: PathResult,
    pub to_base: PathResult,
}

impl Plan {
    pub fn outbound_cost(&self) -> u32 {
        self.to_resource.cost.unwrap_or(u32::MAX)
    }

    pub fn total_cost(&self) -> u32 {
        self.outbound_cost()
            .saturating_add(self.to_base.cost.unwrap_or(u32::MAX))
    }
}

// value / total, compared by cross-multiplication.
fn compare_efficiency(value_a: u32, total_a: u32, value_b: u32, total_b: u32) -> Ordering {
    (u64::from(value_a) * u64::from(total_b)).cmp(&(u64::from(value_b) * u64::from(total_a)))
}

/// Picks the most efficient affordable round trip in `state`.
///
/// A positive-value resource with a zero-cost round trip wins outright.
/// Otherwise candidates whose full round trip would push the step cost past
/// `budget` are skipped, the highest `value / cost` wins, and exact ties go
/// to the smaller outbound cost.
pub fn select_target(state: &EpisodeState, budget: u32) -> Option<Plan> {
    let mut best: Option<Plan> = None;

    for resource in &state.resources {
        let to_resource = find_path(state.agent.position, resource.position, &state.terrain);
        let to_base = find_path(resource.position, state.base, &state.terrain);
        let (Some(outbound), Some(inbound)) = (to_resource.cost, to_base.cost) else {
            continue;
        };

        let total = outbound + inbound;
        if total == 0 {
            if resource.value > 0 {
                return Some(Plan {
                    target: *resource,
                    to_resource,
                    to_base,
                });
            }
            continue;
        }

        let spent_after = state.step_cost.saturating_add(total);
        if spent_after > budget {
            continue;
        }
        if spent_after == budget {
            // The session ends the episode on the last move, before the drop-off.
            tracing::debug!(
                x = resource.position.x,
                y = resource.position.y,
                total,
                "Round trip uses the whole budget, delivery would be refused"
            );
        }

        let better = match &best {
            None => true,
            Some(current) => {
                match compare_efficiency(
                    resource.value,
                    total,
                    current.target.value,
                    current.total_cost(),
                ) {
                    Ordering::Greater => true,
                    Ordering::Equal => outbound < current.outbound_cost(),
                    Ordering::Less => false,
                }
            }
        };
        if better {
            best = Some(Plan {
                target: *resource,
                to_resource,
                to_base,
            });
        }
    }

    best
}

/// Value per step for the hover preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Efficiency {
    Finite(f64),
    Infinite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub path: PathResult,
    /// `None` when the resource cannot be reached.
    pub efficiency: Option<Efficiency>,
}

/// Path from the agent to `resource`, with efficiency estimated as if the
/// way back cost the same as the way there.
pub fn preview(state: &EpisodeState, resource: &Resource) -> Preview {
    let path = find_path(state.agent.position, resource.position, &state.terrain);
    let efficiency = path.cost.map(|cost| match cost.saturating_mul(2) {
        0 => Efficiency::Infinite,
        round_trip => Efficiency::Finite(f64::from(resource.value) / f64::from(round_trip)),
    });
    Preview { path, efficiency }
}

pub struct ExpertBot {
    config: BotConfig,
    budget: u32,
    phase: BotPhase,
    episode_id: u64,
}

impl ExpertBot {
    pub fn new(config: BotConfig, budget: u32) -> Self {
        Self {
            config,
            budget,
            phase: BotPhase::Idle,
            episode_id: 0,
        }
    }

    pub fn phase(&self) -> BotPhase {
        self.phase
    }

    fn enter(&mut self, phase: BotPhase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "Bot phase");
            self.phase = phase;
        }
    }

    /// Plays cycles until the episode ends, nothing is worth doing, or the
    /// bot keeps failing.
    pub async fn run_episode<C: GameControl>(&mut self, ctl: &C) -> EpisodeSummary {
        let mut deliveries = 0;
        let mut aborts = 0;
        let mut consecutive_aborts = 0;

        let end = loop {
            if !ctl.observe_active() {
                self.enter(BotPhase::Terminated);
                break EpisodeEnd::Inactive;
            }

            match self.run_cycle(ctl).await {
                CycleOutcome::Delivered(_) => {
                    deliveries += 1;
                    consecutive_aborts = 0;
                }
                CycleOutcome::Exhausted => {
                    ctl.notify_exhausted();
                    self.enter(BotPhase::Terminated);
                    break EpisodeEnd::Exhausted;
                }
                CycleOutcome::Aborted(_) => {
                    aborts += 1;
                    consecutive_aborts += 1;
                    if consecutive_aborts >= self.config.max_consecutive_aborts {
                        tracing::error!(consecutive_aborts, "Bot stalled, giving up on episode");
                        self.enter(BotPhase::Terminated);
                        break EpisodeEnd::Stalled;
                    }
                }
            }
        };

        let state = ctl.observe_state();
        EpisodeSummary {
            episode_id: state.as_ref().map_or(self.episode_id, |s| s.episode_id),
            score: state.as_ref().map_or(0, |s| s.score),
            step_cost: state.as_ref().map_or(0, |s| s.step_cost),
            deliveries,
            aborts,
            end,
        }
    }

    /// One planning cycle: scan a snapshot, then fetch and deliver the pick.
    ///
    /// Any failure abandons the plan; the caller replans from scratch.
    pub async fn run_cycle<C: GameControl>(&mut self, ctl: &C) -> CycleOutcome {
        self.enter(BotPhase::Scanning);
        let Some(snapshot) = ctl.observe_state() else {
            return self.abort(ctl, AbortReason::StateUnavailable);
        };
        if !ctl.observe_active() {
            return self.abort(ctl, AbortReason::Inactive);
        }
        self.episode_id = snapshot.episode_id;

        // An earlier cycle was cut short on the way back.
        if let Some(held) = snapshot.agent.holding {
            let to_base = find_path(snapshot.agent.position, snapshot.base, &snapshot.terrain);
            if !to_base.is_reachable() {
                self.enter(BotPhase::Terminating);
                return CycleOutcome::Exhausted;
            }
            tracing::info!(kind = ?held.kind, "Returning held resource to base");
            return self.deliver(ctl, held, &to_base).await;
        }

        let Some(plan) = select_target(&snapshot, self.budget) else {
            tracing::info!(
                step_cost = snapshot.step_cost,
                budget = self.budget,
                "No affordable resource left"
            );
            self.enter(BotPhase::Terminating);
            return CycleOutcome::Exhausted;
        };
        tracing::info!(
            target_x = plan.target.position.x,
            target_y = plan.target.position.y,
            kind = ?plan.target.kind,
            value = plan.target.value,
            round_trip = plan.total_cost(),
            "Selected resource"
        );

        self.enter(BotPhase::MovingToResource);
        if let Err(reason) = self.follow_path(ctl, &plan.to_resource.path).await {
            return self.abort(ctl, reason);
        }

        self.enter(BotPhase::Collecting);
        if let Err(reason) = self
            .interact(ctl, Awaiting::Collect, |s| s.agent.holding.is_some())
            .await
        {
            return self.abort(ctl, reason);
        }

        self.deliver(ctl, plan.target, &plan.to_base).await
    }

    async fn deliver<C: GameControl>(
        &mut self,
        ctl: &C,
        resource: Resource,
        to_base: &PathResult,
    ) -> CycleOutcome {
        self.enter(BotPhase::MovingToBase);
        if let Err(reason) = self.follow_path(ctl, &to_base.path).await {
            return self.abort(ctl, reason);
        }

        self.enter(BotPhase::Delivering);
        let at_base = match self.current_state(ctl) {
            Ok(state) if state.agent_at_base() => Ok(()),
            Ok(state) => Err(AbortReason::Desync {
                expected: state.base,
                actual: state.agent.position,
            }),
            Err(reason) => Err(reason),
        };
        let delivered = match at_base {
            Ok(()) => {
                self.interact(ctl, Awaiting::Deliver, |s| s.agent.holding.is_none())
                    .await
            }
            Err(reason) => Err(reason),
        };
        if let Err(reason) = delivered {
            return self.abort(ctl, reason);
        }

        tracing::info!(kind = ?resource.kind, value = resource.value, "Delivered resource");
        self.enter(BotPhase::Idle);
        CycleOutcome::Delivered(resource)
    }

    /// Walks `path` one confirmed step at a time. `path[0]` must be where the
    /// agent is now.
    async fn follow_path<C: GameControl>(
        &self,
        ctl: &C,
        path: &[Position],
    ) -> Result<(), AbortReason> {
        for step in path.windows(2) {
            let (current, next) = (step[0], step[1]);

            let state = self.current_state(ctl)?;
            if state.agent.position != current {
                tracing::error!(
                    expected = ?current,
                    actual = ?state.agent.position,
                    "Bot desync, agent is not at the expected path position"
                );
                return Err(AbortReason::Desync {
                    expected: current,
                    actual: state.agent.position,
                });
            }

            let direction = Direction::between(&current, &next).ok_or(AbortReason::InvalidStep {
                from: current,
                to: next,
            })?;
            ctl.record_decision(Action::Move(direction), state);
            ctl.request_move(direction);

            self.wait_for(ctl, Awaiting::Move(next), |s| s.agent.position == next)
                .await?;
        }
        Ok(())
    }

    /// Issues collect-or-deliver and waits for `confirmed`.
    async fn interact<C, F>(
        &self,
        ctl: &C,
        awaiting: Awaiting,
        confirmed: F,
    ) -> Result<(), AbortReason>
    where
        C: GameControl,
        F: Fn(&EpisodeState) -> bool,
    {
        let state = self.current_state(ctl)?;
        ctl.record_decision(Action::CollectOrDeliver, state);
        ctl.request_collect_or_deliver();
        self.wait_for(ctl, awaiting, confirmed).await.map(|_| ())
    }

    /// Latest snapshot of the episode this cycle is working on.
    fn current_state<C: GameControl>(&self, ctl: &C) -> Result<Arc<EpisodeState>, AbortReason> {
        if !ctl.observe_active() {
            return Err(AbortReason::Inactive);
        }
        let state = ctl.observe_state().ok_or(AbortReason::StateUnavailable)?;
        if state.episode_id != self.episode_id {
            return Err(AbortReason::Inactive);
        }
        Ok(state)
    }

    /// Polls until `condition` holds for this episode, the episode goes
    /// inactive, or the confirmation timeout passes.
    async fn wait_for<C, F>(
        &self,
        ctl: &C,
        awaiting: Awaiting,
        condition: F,
    ) -> Result<Arc<EpisodeState>, AbortReason>
    where
        C: GameControl,
        F: Fn(&EpisodeState) -> bool,
    {
        let deadline = Instant::now() + self.config.confirm_timeout();
        loop {
            if let Some(state) = ctl.observe_state()
                && state.episode_id == self.episode_id
                && condition(&state)
            {
                return Ok(state);
            }
            if !ctl.observe_active() {
                return Err(AbortReason::Inactive);
            }
            if Instant::now() >= deadline {
                tracing::error!(%awaiting, "Bot timed out waiting for state change");
                return Err(AbortReason::Timeout(awaiting));
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    fn abort<C: GameControl>(&mut self, ctl: &C, reason: AbortReason) -> CycleOutcome {
        tracing::warn!(%reason, phase = ?self.phase, "Abandoning plan");
        if ctl.observe_active() {
            self.enter(BotPhase::Idle);
        } else {
            self.enter(BotPhase::Terminated);
        }
        CycleOutcome::Aborted(reason)
    }

    /// Blocks until episode `episode_id` is observed live with nothing spent.
    pub async fn await_episode_start<C: GameControl>(
        &mut self,
        ctl: &C,
        episode_id: u64,
    ) -> Result<(), AbortReason> {
        self.episode_id = episode_id;
        self.enter(BotPhase::Idle);
        self.wait_for(ctl, Awaiting::EpisodeStart, |s| s.step_cost == 0)
            .await
            .map(|_| ())
    }
}

/// Plays `episodes` back-to-back bot games on `session`.
pub async fn run_games(
    session: &SessionHandle,
    bot: &mut ExpertBot,
    episodes: usize,
) -> Result<Vec<EpisodeSummary>, SessionError> {
    let mut summaries = Vec::with_capacity(episodes);
    for game in 1..=episodes {
        let episode_id = session.restart().await?;
        if let Err(reason) = bot.await_episode_start(session, episode_id).await {
            tracing::error!(episode_id, %reason, "New episode never became ready");
            continue;
        }

        let summary = bot.run_episode(session).await;
        tracing::info!(
            game,
            episode_id,
            score = summary.score,
            step_cost = summary.step_cost,
            deliveries = summary.deliveries,
            end = ?summary.end,
            "Bot game finished"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}
