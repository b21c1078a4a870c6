use std::{
    fs,
    path::{Path, PathBuf},
};

use comms::specs::GraphSpec;
use model::{FitConfig, PredictConfig};
use serde::Deserialize;

use crate::{Result, ToolErr};

/// A tensor file of features, optionally paired with one of labels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetConfig {
    pub x: PathBuf,
    #[serde(default)]
    pub y: Option<PathBuf>,
    /// Every feature is divided by this, integer features are cast to `f32`
    /// first.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Keeps only the first `limit` samples.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Where a prediction's model comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// A blob written by a previous `fit` run, read here and uploaded.
    File(PathBuf),
    /// A path the engine loads the model from on its own.
    Engine(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FitRun {
    pub graph: GraphSpec,
    pub train: DatasetConfig,
    /// Evaluated after training when present.
    #[serde(default)]
    pub test: Option<DatasetConfig>,
    #[serde(default)]
    pub params: FitConfig,
    #[serde(default)]
    pub model_out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictRun {
    pub model: ModelSource,
    pub input: DatasetConfig,
    #[serde(default)]
    pub params: PredictConfig,
    #[serde(default)]
    pub predictions_out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Fit(FitRun),
    Predict(PredictRun),
}

/// A whole run of the tool, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub engine: Option<PathBuf>,
    #[serde(flatten)]
    pub command: Command,
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The engine library to load, `env_override` (`ENGINE_LIB`) wins over
    /// the config file.
    pub fn engine_path(&self, env_override: Option<String>) -> Result<PathBuf> {
        env_override
            .map(PathBuf::from)
            .or_else(|| self.engine.clone())
            .ok_or(ToolErr::NoEngine)
    }
}
