use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use serde::{Deserialize, Serialize};

use crate::{Direction, Position, grid::Terrain};

/// Outcome of a path query.
///
/// `cost` is `None` when the goal cannot be reached; the path is then empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<Position>,
    pub cost: Option<u32>,
}

impl PathResult {
    pub fn unreachable() -> Self {
        PathResult {
            path: Vec::new(),
            cost: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_some()
    }

    /// Number of moves along the path.
    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

// Frontier entry. Reverse ordering turns the max-heap into a min-heap on
// `priority`; among equal priorities the entry pushed first pops first.
#[derive(Clone, Eq, PartialEq)]
struct FrontierNode {
    priority: u32,
    sequence: u64,
    position: Position,
}

impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest 4-connected path from `start` to `goal`.
///
/// A* with a manhattan heuristic scaled by the cheapest step cost, so the
/// heuristic stays consistent. Finalized cells are never re-expanded; that is
/// only optimal while the heuristic is consistent.
///
/// A cheaper route to a cell that is already queued pushes a fresh entry with
/// a new sequence number instead of updating the queued one in place; the old
/// entry is skipped when it surfaces. Costs are unaffected, but among paths of
/// equal cost the one returned is the first to reach each cell at its final
/// cost, which may differ from a decrease-key open list.
#[tracing::instrument(
    level = "trace",
    skip(terrain),
    fields(start_x = start.x, start_y = start.y, goal_x = goal.x, goal_y = goal.y)
)]
pub fn find_path(start: Position, goal: Position, terrain: &Terrain) -> PathResult {
    if !terrain.contains(start) || !terrain.contains(goal) {
        return PathResult::unreachable();
    }
    if start == goal {
        return PathResult {
            path: vec![start],
            cost: Some(0),
        };
    }

    let size = terrain.size();
    let unit = terrain.min_step_cost();
    let heuristic = |pos: Position| pos.manhattan(&goal) as u32 * unit;

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut cost_so_far: HashMap<Position, u32> = HashMap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut sequence = 0u64;

    cost_so_far.insert(start, 0);
    frontier.push(FrontierNode {
        priority: heuristic(start),
        sequence,
        position: start,
    });

    while let Some(FrontierNode {
        position: current, ..
    }) = frontier.pop()
    {
        // Stale duplicate of an already finalized cell.
        if !closed.insert(current) {
            continue;
        }

        let current_cost = cost_so_far[&current];
        if current == goal {
            tracing::trace!(expanded = closed.len(), cost = current_cost, "Path found");
            return PathResult {
                path: reconstruct_path(&came_from, current),
                cost: Some(current_cost),
            };
        }

        for direction in Direction::ALL {
            let Some(neighbor) = current.step(direction, size) else {
                continue;
            };
            if closed.contains(&neighbor) {
                continue;
            }
            let Some(step_cost) = terrain.entry_cost(neighbor) else {
                continue;
            };

            let new_cost = current_cost + step_cost;
            if cost_so_far
                .get(&neighbor)
                .is_none_or(|&known| new_cost < known)
            {
                cost_so_far.insert(neighbor, new_cost);
                came_from.insert(neighbor, current);
                sequence += 1;
                frontier.push(FrontierNode {
                    priority: new_cost + heuristic(neighbor),
                    sequence,
                    position: neighbor,
                });
            }
        }
    }

    tracing::trace!(expanded = closed.len(), "No path found");
    PathResult::unreachable()
}

fn reconstruct_path(
    came_from: &HashMap<Position, Position>,
    mut current: Position,
) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
