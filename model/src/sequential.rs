use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use bridge::{ConsoleProgress, Engine, ProgressSink};
use comms::{
    Hyperparams, ModelRef, Request,
    specs::{CompileSpec, GraphSpec, LayerSpec, NameOr, OptimizerSpec},
};
use log::{debug, info};
use tensor::Tensor;

use crate::{FitConfig, ModelErr, PredictConfig, Result, layers};

/// A linear stack of layers trained and run by the native engine.
///
/// The model itself lives on the engine side: after `fit` this only keeps the
/// opaque blob it returned, and after `predict` the id the engine assigned to
/// it, so later predictions don't upload the blob again.
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    graph: GraphSpec,
    model: Option<Vec<u8>>,
    model_id: Option<String>,
    path: Option<String>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model out of an already assembled graph, e.g. one read from a
    /// config file.
    ///
    /// # Errors
    /// `InvalidLayer` for the first layer the engine can't build.
    pub fn from_graph(graph: GraphSpec) -> Result<Self> {
        graph.graph.iter().try_for_each(layers::validate)?;
        Ok(Self {
            graph,
            ..Default::default()
        })
    }

    /// Appends a layer to the end of the stack.
    ///
    /// # Errors
    /// `InvalidLayer` if the layer's parameters can't be built by the engine.
    pub fn add(&mut self, layer: impl Into<LayerSpec>) -> Result<&mut Self> {
        let layer = layer.into();
        layers::validate(&layer)?;
        self.graph.graph.push(layer);
        Ok(self)
    }

    /// Sets the loss, optimizer and metrics to train with.
    ///
    /// # Arguments
    /// * `loss` - The loss function's name.
    /// * `optimizer` - Either an optimizer name or an `Sgd`/`Adadelta` instance.
    /// * `metrics` - The names of the metrics reported while training.
    pub fn compile(
        &mut self,
        loss: &str,
        optimizer: impl Into<NameOr<OptimizerSpec>>,
        metrics: &[&str],
    ) -> &mut Self {
        self.graph.compile_params = Some(CompileSpec {
            loss: loss.to_owned(),
            optimizer: optimizer.into(),
            metrics: metrics.iter().map(|&m| m.to_owned()).collect(),
        });
        self
    }

    pub fn graph(&self) -> &GraphSpec {
        &self.graph
    }

    /// Renders the graph document sent to the engine.
    pub fn to_document(&self) -> Result<String> {
        Ok(self.graph.to_document()?)
    }

    /// Trains the model, rendering progress on stdout when `config.verbose`
    /// is set.
    pub fn fit(
        &mut self,
        engine: &mut Engine,
        x: &Tensor,
        y: &Tensor,
        config: FitConfig,
    ) -> Result<()> {
        if config.verbose == 0 {
            return self.fit_with(engine, x, y, config, &mut ());
        }

        let mut progress = ConsoleProgress::stdout(config.epochs, samples(x) as u64);
        self.fit_with(engine, x, y, config, &mut progress)
    }

    /// Trains the model, reporting progress to `sink`.
    ///
    /// # Arguments
    /// * `engine` - The engine to train on.
    /// * `x` - The features, samples along the first dimension.
    /// * `y` - The labels, with as many samples as `x`.
    /// * `config` - Batch size, epochs and verbosity.
    /// * `sink` - Receives every progress event of the call.
    ///
    /// # Errors
    /// `NotCompiled` if `compile` wasn't called, `SampleMismatch` if `x` and
    /// `y` disagree on the amount of samples, and whatever the engine call
    /// fails with.
    pub fn fit_with(
        &mut self,
        engine: &mut Engine,
        x: &Tensor,
        y: &Tensor,
        config: FitConfig,
        sink: &mut dyn ProgressSink,
    ) -> Result<()> {
        if self.graph.compile_params.is_none() {
            return Err(ModelErr::NotCompiled);
        }

        let (xs, ys) = (samples(x), samples(y));
        if xs != ys {
            return Err(ModelErr::SampleMismatch { x: xs, y: ys });
        }

        let hyperparams = Hyperparams {
            batch_size: config.batch_size,
            epochs: config.epochs,
            verbose: config.verbose,
            cache: false,
        };

        let request = Request::fit(
            self.to_document()?,
            hyperparams,
            x.clone(),
            y.clone(),
            ModelRef::None,
        );

        debug!(samples = xs, layers = self.graph.graph.len(); "fitting model");
        let response = engine.call(request, sink)?;

        let model = response.model.ok_or(ModelErr::NoModel)?;
        info!(bytes = model.len(); "model trained");

        self.model = Some(model);
        self.model_id = None;
        Ok(())
    }

    /// Runs the model on `x`, see [`Sequential::predict_with`].
    pub fn predict(
        &mut self,
        engine: &mut Engine,
        x: &Tensor,
        config: PredictConfig,
    ) -> Result<Tensor> {
        self.predict_with(engine, x, config, &mut ())
    }

    /// Runs the model on `x` and returns its first output.
    ///
    /// The model is referred to by its blob if there's one, then by the id
    /// the engine assigned on a previous prediction, then by the loaded path.
    ///
    /// # Errors
    /// `NoModel` if none of those are known, `NoOutputs` if the engine
    /// answered without tensors, and whatever the engine call fails with.
    pub fn predict_with(
        &mut self,
        engine: &mut Engine,
        x: &Tensor,
        config: PredictConfig,
        sink: &mut dyn ProgressSink,
    ) -> Result<Tensor> {
        let model = ModelRef::resolve(
            self.model.as_deref(),
            self.model_id.as_deref(),
            self.path.as_deref(),
        );

        if model.is_none() {
            return Err(ModelErr::NoModel);
        }

        let hyperparams = Hyperparams {
            batch_size: config.batch_size,
            epochs: 0,
            verbose: config.verbose,
            cache: config.cache,
        };

        debug!(samples = samples(x); "predicting");
        let request = Request::predict(None, hyperparams, x.clone(), model);
        let response = engine.call(request, sink)?;

        if let Some(id) = response.model_id {
            debug!(id:% = id; "engine assigned a model id");
            self.model_id = Some(id);
        }

        response
            .outputs
            .into_iter()
            .next()
            .ok_or(ModelErr::NoOutputs)
    }

    /// Writes the trained model's blob verbatim.
    ///
    /// # Errors
    /// `NoModel` if the model was never trained or loaded.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let model = self.model.as_ref().ok_or(ModelErr::NoModel)?;
        writer.write_all(model)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the trained model's blob to a file at `path`.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(File::create(path)?)
    }

    /// Reads a blob previously written by `save`, replacing any model this
    /// one had.
    pub fn load<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let mut model = Vec::new();
        reader.read_to_end(&mut model)?;
        info!(bytes = model.len(); "model loaded");

        self.model = Some(model);
        self.model_id = None;
        Ok(())
    }

    /// Makes the engine load the model from `path` on the next prediction,
    /// the file is never read on this side.
    pub fn load_path(&mut self, path: &str) {
        self.path = Some(path.to_owned());
        self.model = None;
        self.model_id = None;
    }

    pub fn model_blob(&self) -> Option<&[u8]> {
        self.model.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}

fn samples(t: &Tensor) -> usize {
    t.shape().first().copied().unwrap_or(1)
}
