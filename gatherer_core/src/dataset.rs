//! State/action records for training data.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::{Action, ResourceKind, episode::EpisodeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Holding {
    None,
    Normal,
    Golden,
}

/// Flattened view of an episode state as fed to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRepresentation {
    pub agent_pos: (usize, usize),
    pub holding: Holding,
    pub base_pos: (usize, usize),
    pub normal_resources_pos: Vec<(usize, usize)>,
    pub golden_resources_pos: Vec<(usize, usize)>,
    pub mud_pos: Vec<(usize, usize)>,
    pub remaining_cost: u32,
}

impl StateRepresentation {
    pub fn capture(state: &EpisodeState, budget: u32) -> Self {
        let positions_of = |kind: ResourceKind| -> Vec<(usize, usize)> {
            state
                .resources
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| (r.position.x, r.position.y))
                .collect()
        };

        StateRepresentation {
            agent_pos: (state.agent.position.x, state.agent.position.y),
            holding: match state.agent.holding.map(|r| r.kind) {
                None => Holding::None,
                Some(ResourceKind::Normal) => Holding::Normal,
                Some(ResourceKind::Golden) => Holding::Golden,
            },
            base_pos: (state.base.x, state.base.y),
            normal_resources_pos: positions_of(ResourceKind::Normal),
            golden_resources_pos: positions_of(ResourceKind::Golden),
            mud_pos: state
                .terrain
                .hindered_positions()
                .into_iter()
                .map(|p| (p.x, p.y))
                .collect(),
            remaining_cost: state.remaining_budget(budget),
        }
    }
}

/// One recorded decision: the state before the action and the action taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub episode_id: u64,
    pub state: StateRepresentation,
    pub action: u8,
    pub score: u32,
    pub cost: u32,
}

impl LogEntry {
    pub fn new(id: u64, action: Action, state: &EpisodeState, budget: u32) -> Self {
        LogEntry {
            id,
            episode_id: state.episode_id,
            state: StateRepresentation::capture(state, budget),
            action: action.code(),
            score: state.score,
            cost: state.step_cost,
        }
    }
}

/// Writes entries as JSON lines.
pub fn write_jsonl<W: Write>(entries: &[LogEntry], mut writer: W) -> io::Result<()> {
    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
