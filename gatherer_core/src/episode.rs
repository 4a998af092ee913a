use serde::{Deserialize, Serialize};

use crate::{
    Direction, Position, Resource, ResourceKind,
    generator::MapGenerator,
    grid::{Terrain, Tile},
};

/// The gathering agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub position: Position,
    /// At most one resource is carried at a time.
    pub holding: Option<Resource>,
}

/// Complete state of one episode.
///
/// Snapshots of this type are what planners and views read; only the
/// session applies the mutation methods below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub episode_id: u64,
    pub agent: Agent,
    pub base: Position,
    pub terrain: Terrain,
    pub resources: Vec<Resource>,
    pub score: u32,
    pub step_cost: u32,
}

/// Result of a single move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved {
        position: Position,
        cost: u32,
        tile: Tile,
    },
    /// The move would leave the grid; nothing changed.
    Blocked,
}

/// Result of a collect-or-deliver request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    Collected(Resource),
    Delivered {
        kind: ResourceKind,
        value: u32,
        /// `None` only if no free cell was left for the replacement.
        respawned_at: Option<Position>,
    },
    Nothing,
}

impl EpisodeState {
    /// Builds a fresh episode with the agent standing on the base.
    pub fn new(
        episode_id: u64,
        base: Position,
        terrain: Terrain,
        resources: Vec<Resource>,
    ) -> Self {
        EpisodeState {
            episode_id,
            agent: Agent {
                position: base,
                holding: None,
            },
            base,
            terrain,
            resources,
            score: 0,
            step_cost: 0,
        }
    }

    pub fn grid_size(&self) -> usize {
        self.terrain.size()
    }

    pub fn agent_at_base(&self) -> bool {
        self.agent.position == self.base
    }

    pub fn resource_at(&self, pos: Position) -> Option<&Resource> {
        self.resources.iter().find(|r| r.position == pos)
    }

    /// Whether the accumulated step cost has used up `budget`.
    pub fn is_exhausted(&self, budget: u32) -> bool {
        self.step_cost >= budget
    }

    pub fn remaining_budget(&self, budget: u32) -> u32 {
        budget.saturating_sub(self.step_cost)
    }

    /// Whether `pos` is taken by the base, a live resource or a hindered tile.
    pub fn is_occupied(&self, pos: Position) -> bool {
        pos == self.base || self.terrain.is_hindered(pos) || self.resource_at(pos).is_some()
    }

    /// Moves the agent one cell and charges the entry cost of the new cell.
    pub fn apply_move(&mut self, direction: Direction) -> MoveOutcome {
        let Some(target) = self.agent.position.step(direction, self.grid_size()) else {
            return MoveOutcome::Blocked;
        };
        let (Some(tile), Some(cost)) = (self.terrain.tile(target), self.terrain.entry_cost(target))
        else {
            return MoveOutcome::Blocked;
        };

        self.agent.position = target;
        self.step_cost += cost;
        MoveOutcome::Moved {
            position: target,
            cost,
            tile,
        }
    }

    /// Delivers the held resource when on the base, otherwise picks up the
    /// resource under the agent if the agent's hands are free.
    pub fn apply_collect_or_deliver(&mut self, generator: &mut MapGenerator) -> InteractOutcome {
        if self.agent_at_base() {
            if let Some(held) = self.agent.holding.take() {
                self.score += held.value;
                let respawned_at = generator.free_position(self);
                match respawned_at {
                    Some(position) => self.resources.push(Resource { position, ..held }),
                    None => tracing::warn!(kind = ?held.kind, "No free cell to respawn resource"),
                }
                return InteractOutcome::Delivered {
                    kind: held.kind,
                    value: held.value,
                    respawned_at,
                };
            }
        }

        if self.agent.holding.is_none() {
            let here = self.agent.position;
            if let Some(index) = self.resources.iter().position(|r| r.position == here) {
                let resource = self.resources.remove(index);
                self.agent.holding = Some(resource);
                return InteractOutcome::Collected(resource);
            }
        }

        InteractOutcome::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> EpisodeState {
        let terrain = Terrain::with_hindered(5, 1, 5, [Position::new(0, 1)]).unwrap();
        let resources = vec![Resource {
            position: Position::new(2, 0),
            kind: ResourceKind::Normal,
            value: 10,
        }];
        EpisodeState::new(1, Position::new(0, 0), terrain, resources)
    }

    #[test]
    fn move_charges_entry_cost() {
        let mut state = scenario();

        assert_eq!(
            state.apply_move(Direction::Down),
            MoveOutcome::Moved {
                position: Position::new(0, 1),
                cost: 5,
                tile: Tile::Hindered
            }
        );
        assert_eq!(state.step_cost, 5);

        state.apply_move(Direction::Right);
        assert_eq!(state.agent.position, Position::new(1, 1));
        assert_eq!(state.step_cost, 6);
    }

    #[test]
    fn move_off_grid_is_free() {
        let mut state = scenario();
        assert_eq!(state.apply_move(Direction::Up), MoveOutcome::Blocked);
        assert_eq!(state.apply_move(Direction::Left), MoveOutcome::Blocked);
        assert_eq!(state.agent.position, Position::new(0, 0));
        assert_eq!(state.step_cost, 0);
    }

    #[test]
    fn collect_then_deliver_respawns_resource() {
        let mut state = scenario();
        let mut generator = MapGenerator::new(7);

        // Nothing under the agent yet.
        assert_eq!(
            state.apply_collect_or_deliver(&mut generator),
            InteractOutcome::Nothing
        );

        state.apply_move(Direction::Right);
        state.apply_move(Direction::Right);
        let collected = state.apply_collect_or_deliver(&mut generator);
        assert!(matches!(collected, InteractOutcome::Collected(r) if r.value == 10));
        assert!(state.resources.is_empty());
        assert!(state.agent.holding.is_some());

        // Holding, but not on the base.
        assert_eq!(
            state.apply_collect_or_deliver(&mut generator),
            InteractOutcome::Nothing
        );

        state.apply_move(Direction::Left);
        state.apply_move(Direction::Left);
        let delivered = state.apply_collect_or_deliver(&mut generator);
        let InteractOutcome::Delivered {
            kind,
            value,
            respawned_at: Some(respawn),
        } = delivered
        else {
            panic!("expected delivery, got {delivered:?}");
        };
        assert_eq!((kind, value), (ResourceKind::Normal, 10));
        assert_eq!(state.score, 10);
        assert_eq!(state.step_cost, 4);
        assert!(state.agent.holding.is_none());
        assert_eq!(state.resources.len(), 1);
        assert_ne!(respawn, state.base);
        assert!(!state.terrain.is_hindered(respawn));
    }

    #[test]
    fn budget_accounting() {
        let mut state = scenario();
        state.step_cost = 7;
        assert!(!state.is_exhausted(8));
        assert_eq!(state.remaining_budget(8), 1);
        state.step_cost = 8;
        assert!(state.is_exhausted(8));
        assert_eq!(state.remaining_budget(3), 0);
    }
}
