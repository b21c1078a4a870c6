use serde::{Deserialize, Serialize};

/// Parameters of a `fit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub batch_size: u32,
    pub epochs: u32,
    /// Renders progress on stdout when non zero.
    pub verbose: u8,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 10,
            verbose: 1,
        }
    }
}

/// Parameters of a `predict` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
    pub batch_size: u32,
    pub verbose: u8,
    /// Lets the engine keep the model loaded for later predictions.
    pub cache: bool,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            verbose: 1,
            cache: true,
        }
    }
}
