//! Best score per budget, cached in a local JSON file.

use std::{collections::BTreeMap, fs, io, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("high score file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid high score file: {0}")]
    Json(String),
}

/// Best final score seen for each budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighScores {
    by_budget: BTreeMap<u32, u32>,
}

impl HighScores {
    pub fn best(&self, budget: u32) -> u32 {
        self.by_budget.get(&budget).copied().unwrap_or(0)
    }

    /// Stores `score` if it beats the best for `budget`. Returns whether it did.
    pub fn record(&mut self, budget: u32, score: u32) -> bool {
        if score <= self.best(budget) {
            return false;
        }
        self.by_budget.insert(budget, score);
        true
    }

    /// Loads the cache. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        let scores: HighScores =
            serde_json::from_str(&json).map_err(|e| ScoreError::Json(e.to_string()))?;
        tracing::debug!(budgets = scores.by_budget.len(), "Loaded high scores");
        Ok(scores)
    }

    pub fn save(&self, path: &Path) -> Result<(), ScoreError> {
        let temp_path = path.with_extension("json.tmp");
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ScoreError::Json(e.to_string()))?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        tracing::debug!(path = %path.display(), "Saved high scores");
        Ok(())
    }
}
