use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration errors, raised before any episode is generated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("grid size must be at least 2, got {0}")]
    GridTooSmall(usize),
    #[error("step costs must satisfy 1 <= normal ({normal}) <= hindered ({hindered})")]
    InvalidCosts { normal: u32, hindered: u32 },
    #[error("at least one resource is required")]
    NoResources,
    #[error("resource values must be positive")]
    ZeroValue,
    #[error("budget must be positive")]
    ZeroBudget,
    #[error("benchmark cost per point must be positive")]
    ZeroBenchmark,
    #[error("{required} entities do not fit on a grid of {cells} cells")]
    OverCapacity { required: usize, cells: usize },
    #[error("poll interval {poll_ms}ms exceeds confirmation timeout {timeout_ms}ms")]
    PollSlowerThanTimeout { poll_ms: u64, timeout_ms: u64 },
    #[error("invalid config file: {0}")]
    Parse(String),
}

/// Game rules and episode parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub grid_size: usize,
    pub normal_cost: u32,
    pub hindered_cost: u32,
    pub hindered_tiles: usize,
    pub normal_resources: usize,
    pub golden_resources: usize,
    pub normal_value: u32,
    pub golden_value: u32,
    /// Step-cost budget; the episode ends once the accumulated cost reaches it.
    pub budget: u32,
    /// Budget spent per point of the target score.
    pub benchmark_cost_per_point: u32,
    pub max_generation_attempts: usize,
    pub bot: BotConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            grid_size: 10,
            normal_cost: 1,
            hindered_cost: 5,
            hindered_tiles: 15,
            normal_resources: 5,
            golden_resources: 1,
            normal_value: 10,
            golden_value: 50,
            budget: 200,
            benchmark_cost_per_point: 2,
            max_generation_attempts: 1000,
            bot: BotConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Score a run should reach with this budget.
    pub fn target_score(&self) -> u32 {
        self.budget / self.benchmark_cost_per_point.max(1)
    }

    /// Number of cells the generator has to fill: base, hindered tiles and resources.
    pub fn required_cells(&self) -> usize {
        1 + self.hindered_tiles + self.normal_resources + self.golden_resources
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < 2 {
            return Err(ConfigError::GridTooSmall(self.grid_size));
        }
        if self.normal_cost == 0 || self.hindered_cost < self.normal_cost {
            return Err(ConfigError::InvalidCosts {
                normal: self.normal_cost,
                hindered: self.hindered_cost,
            });
        }
        if self.normal_resources + self.golden_resources == 0 {
            return Err(ConfigError::NoResources);
        }
        if (self.normal_resources > 0 && self.normal_value == 0)
            || (self.golden_resources > 0 && self.golden_value == 0)
        {
            return Err(ConfigError::ZeroValue);
        }
        if self.budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.benchmark_cost_per_point == 0 {
            return Err(ConfigError::ZeroBenchmark);
        }
        let cells = self.grid_size * self.grid_size;
        // One spare cell so a delivered resource always has somewhere to respawn.
        if self.required_cells() >= cells {
            return Err(ConfigError::OverCapacity {
                required: self.required_cells(),
                cells,
            });
        }
        self.bot.validate()
    }
}

/// Timing of the expert bot's confirmation waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub confirm_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Aborted cycles in a row, without a delivery in between, before the bot gives up.
    pub max_consecutive_aborts: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            confirm_timeout_ms: 500,
            poll_interval_ms: 10,
            max_consecutive_aborts: 3,
        }
    }
}

impl BotConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms > self.confirm_timeout_ms {
            return Err(ConfigError::PollSlowerThanTimeout {
                poll_ms: self.poll_interval_ms,
                timeout_ms: self.confirm_timeout_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(GameConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            GameConfig::from_json_str(r#"{ "budget": 50, "bot": { "poll_interval_ms": 5 } }"#)
                .unwrap();
        assert_eq!(config.budget, 50);
        assert_eq!(config.grid_size, 10);
        assert_eq!(config.bot.poll_interval_ms, 5);
        assert_eq!(config.bot.confirm_timeout_ms, 500);
    }

    #[test]
    fn target_score_rounds_down() {
        let config = GameConfig {
            budget: 75,
            benchmark_cost_per_point: 2,
            ..GameConfig::default()
        };
        assert_eq!(config.target_score(), 37);
        assert_eq!(GameConfig::default().target_score(), 100);

        let config = GameConfig {
            benchmark_cost_per_point: 0,
            ..config
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBenchmark));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            GameConfig::from_json_str("{ budget: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_crowded_grid() {
        let config = GameConfig {
            grid_size: 3,
            hindered_tiles: 6,
            normal_resources: 1,
            golden_resources: 1,
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OverCapacity {
                required: 9,
                cells: 9
            })
        );
    }

    #[test]
    fn rejects_inverted_costs() {
        let config = GameConfig {
            normal_cost: 3,
            hindered_cost: 2,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCosts { .. })
        ));
    }

    #[test]
    fn rejects_poll_interval_longer_than_timeout() {
        let config = GameConfig {
            bot: BotConfig {
                confirm_timeout_ms: 5,
                poll_interval_ms: 10,
                max_consecutive_aborts: 3,
            },
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PollSlowerThanTimeout { .. })
        ));
    }
}
