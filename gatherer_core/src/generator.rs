use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    Position, Resource, ResourceKind,
    config::{ConfigError, GameConfig},
    episode::EpisodeState,
    grid::Terrain,
    pathfinding::find_path,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no solvable layout found after {attempts} attempts")]
    Unsolvable { attempts: usize },
}

/// Random scenario generator.
#[derive(Debug)]
pub struct MapGenerator {
    rng: StdRng,
}

impl MapGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Generates a layout in which at least one resource can be reached from
    /// the base and can reach the base again.
    ///
    /// Unsolvable layouts are thrown away and regenerated from scratch, up to
    /// `max_generation_attempts` times.
    pub fn generate(
        &mut self,
        config: &GameConfig,
        episode_id: u64,
    ) -> Result<EpisodeState, GenerationError> {
        config.validate()?;

        for attempt in 1..=config.max_generation_attempts {
            let state = self.place_entities(config, episode_id);
            if is_solvable(&state) {
                tracing::debug!(attempt, episode_id, "Generated layout");
                return Ok(state);
            }
            tracing::warn!(attempt, "Generated an unsolvable map, retrying");
        }

        Err(GenerationError::Unsolvable {
            attempts: config.max_generation_attempts,
        })
    }

    /// A uniformly random cell not taken by the base, a resource or a hindered tile.
    pub fn free_position(&mut self, state: &EpisodeState) -> Option<Position> {
        let size = state.grid_size();
        let free: Vec<Position> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Position::new(x, y)))
            .filter(|pos| !state.is_occupied(*pos))
            .collect();
        free.choose(&mut self.rng).copied()
    }

    fn place_entities(&mut self, config: &GameConfig, episode_id: u64) -> EpisodeState {
        let size = config.grid_size;
        let mut free: Vec<Position> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Position::new(x, y)))
            .collect();
        // Capacity was checked by `validate`, so `free` never runs dry here.
        let mut take = |rng: &mut StdRng| {
            let index = rng.random_range(0..free.len());
            free.swap_remove(index)
        };

        let base = take(&mut self.rng);

        let mut terrain = Terrain::new(size, config.normal_cost, config.hindered_cost);
        for _ in 0..config.hindered_tiles {
            let pos = take(&mut self.rng);
            // In bounds by construction.
            let _ = terrain.set_hindered(pos);
        }

        let mut resources = Vec::with_capacity(config.normal_resources + config.golden_resources);
        for _ in 0..config.normal_resources {
            resources.push(Resource {
                position: take(&mut self.rng),
                kind: ResourceKind::Normal,
                value: config.normal_value,
            });
        }
        for _ in 0..config.golden_resources {
            resources.push(Resource {
                position: take(&mut self.rng),
                kind: ResourceKind::Golden,
                value: config.golden_value,
            });
        }

        EpisodeState::new(episode_id, base, terrain, resources)
    }
}

/// Whether some resource has a finite round trip from and back to the base.
pub fn is_solvable(state: &EpisodeState) -> bool {
    state.resources.iter().any(|resource| {
        find_path(state.base, resource.position, &state.terrain).is_reachable()
            && find_path(resource.position, state.base, &state.terrain).is_reachable()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn layouts_are_exclusive_and_solvable() {
        let config = GameConfig::default();
        let mut generator = MapGenerator::new(42);

        for episode_id in 1..=25 {
            let state = generator.generate(&config, episode_id).unwrap();

            assert_eq!(state.episode_id, episode_id);
            assert_eq!(state.agent.position, state.base);
            assert!(state.agent.holding.is_none());
            assert_eq!((state.score, state.step_cost), (0, 0));

            let hindered = state.terrain.hindered_positions();
            assert_eq!(hindered.len(), config.hindered_tiles);
            assert_eq!(
                state.resources.len(),
                config.normal_resources + config.golden_resources
            );

            let mut cells: HashSet<Position> = HashSet::new();
            assert!(cells.insert(state.base));
            for pos in hindered {
                assert!(cells.insert(pos), "hindered tile overlaps at {pos:?}");
            }
            for resource in &state.resources {
                assert!(
                    cells.insert(resource.position),
                    "resource overlaps at {:?}",
                    resource.position
                );
            }

            // At least one finite round trip exists.
            assert!(state.resources.iter().any(|r| {
                let out = find_path(state.base, r.position, &state.terrain);
                let back = find_path(r.position, state.base, &state.terrain);
                out.cost.zip(back.cost).is_some()
            }));
        }
    }

    #[test]
    fn resource_kinds_and_values_follow_config() {
        let config = GameConfig {
            normal_resources: 3,
            golden_resources: 2,
            normal_value: 4,
            golden_value: 9,
            ..GameConfig::default()
        };
        let state = MapGenerator::new(1).generate(&config, 1).unwrap();

        let kinds: Vec<(ResourceKind, u32)> =
            state.resources.iter().map(|r| (r.kind, r.value)).collect();
        assert_eq!(
            kinds,
            vec![
                (ResourceKind::Normal, 4),
                (ResourceKind::Normal, 4),
                (ResourceKind::Normal, 4),
                (ResourceKind::Golden, 9),
                (ResourceKind::Golden, 9),
            ]
        );
    }

    #[test]
    fn same_seed_same_layout() {
        let config = GameConfig::default();
        let a = MapGenerator::new(99).generate(&config, 1).unwrap();
        let b = MapGenerator::new(99).generate(&config, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn over_capacity_fails_before_placing() {
        let config = GameConfig {
            grid_size: 2,
            hindered_tiles: 2,
            normal_resources: 1,
            golden_resources: 0,
            ..GameConfig::default()
        };
        assert!(matches!(
            MapGenerator::new(3).generate(&config, 1),
            Err(GenerationError::Config(ConfigError::OverCapacity { .. }))
        ));
    }

    #[test]
    fn zero_attempts_is_unsolvable() {
        let config = GameConfig {
            max_generation_attempts: 0,
            ..GameConfig::default()
        };
        assert_eq!(
            MapGenerator::new(3).generate(&config, 1),
            Err(GenerationError::Unsolvable { attempts: 0 })
        );
    }

    #[test]
    fn free_position_skips_occupied_cells() {
        let config = GameConfig {
            grid_size: 3,
            hindered_tiles: 4,
            normal_resources: 3,
            golden_resources: 0,
            ..GameConfig::default()
        };
        let mut generator = MapGenerator::new(5);
        let state = generator.generate(&config, 1).unwrap();

        // 9 cells, 8 taken: the only free one must come back every time.
        for _ in 0..10 {
            let pos = generator.free_position(&state).unwrap();
            assert!(!state.is_occupied(pos));
        }
    }
}
