//! Runs a `fit` or `predict` described by a JSON file against the engine:
//!
//! ```text
//! ENGINE_LIB=./libengine.so RUST_LOG=info engine-run mnist.json
//! ```

mod config;
mod dataset;
mod error;

use std::{env, fs::File, io};

use bridge::Engine;
use log::{error, info, warn};
use model::Sequential;

use config::{Command, DatasetConfig, FitRun, ModelSource, PredictRun, RunConfig};
use error::{Result, ToolErr};

fn fit(engine: &mut Engine, run: FitRun) -> Result<()> {
    let mut model = Sequential::from_graph(run.graph)?;

    let (x, y) = run.train.load()?;
    let y = y.ok_or(ToolErr::MissingLabels)?;

    model.fit(engine, &x, &y, run.params)?;

    if let Some(path) = &run.model_out {
        model.save_file(path)?;
        info!(path:? = path; "model saved");
    }

    if let Some(test) = &run.test {
        let (x, y) = test.load()?;
        let predictions = model.predict(engine, &x, Default::default())?;

        match y {
            Some(y) => println!("accuracy: {:.4}", dataset::accuracy(&predictions, &y)?),
            None => warn!("the test set has no labels, skipping evaluation"),
        }
    }

    Ok(())
}

fn predict(engine: &mut Engine, run: PredictRun) -> Result<()> {
    let mut model = Sequential::new();
    match &run.model {
        ModelSource::File(path) => model.load(File::open(path)?)?,
        ModelSource::Engine(path) => model.load_path(path),
    }

    let (x, y) = run.input.load()?;
    let predictions = model.predict(engine, &x, run.params)?;
    info!(shape:? = predictions.shape(); "predicted");

    if let Some(y) = y {
        println!("accuracy: {:.4}", dataset::accuracy(&predictions, &y)?);
    }

    if let Some(path) = &run.predictions_out {
        dataset::write_file(path, &predictions)?;
        info!(path:? = path; "predictions written");
    }

    Ok(())
}

fn run(config_path: &str) -> Result<()> {
    let config = RunConfig::from_file(config_path)?;
    let engine_path = config.engine_path(env::var("ENGINE_LIB").ok())?;
    let mut engine = Engine::load(&engine_path)?;
    info!(path:? = engine_path; "engine loaded");

    match config.command {
        Command::Fit(run) => fit(&mut engine, run),
        Command::Predict(run) => predict(&mut engine, run),
    }
}

fn main() -> io::Result<()> {
    env_logger::init();

    let config_path = env::args().nth(1).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "usage: engine-run <run.json>")
    })?;

    if let Err(e) = run(&config_path) {
        error!("{e}");
        return Err(e.into());
    }

    Ok(())
}
