use std::fmt;

use bytes::BufMut;
use tensor::Tensor;

use crate::{
    Deserialize, Header, REQUEST_KIND, RESPONSE_KIND, Result, Serialize, WireErr, codec,
};

/// What the engine is asked to do with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Fit,
    Predict,
}

impl Mode {
    /// The amount of tensors a request in this mode carries: features and
    /// labels for `Fit`, only features for `Predict`.
    pub fn tensor_count(self) -> usize {
        match self {
            Mode::Fit => 2,
            Mode::Predict => 1,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Mode::Fit => 0,
            Mode::Predict => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Mode::Fit),
            1 => Ok(Mode::Predict),
            tag => Err(WireErr::UnknownTag {
                context: "mode",
                tag,
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Fit => f.write_str("fit"),
            Mode::Predict => f.write_str("predict"),
        }
    }
}

/// Scalar parameters shared by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hyperparams {
    pub batch_size: u32,
    pub epochs: u32,
    pub verbose: u8,
    /// Lets the engine keep the loaded model around between predictions.
    pub cache: bool,
}

/// The model a request refers to. Only one reference travels per message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModelRef {
    #[default]
    None,
    Blob(Vec<u8>),
    Id(String),
    Path(String),
}

impl ModelRef {
    /// Picks the reference to send out of everything the caller knows about
    /// a model. A blob wins over an engine assigned id, which wins over a
    /// path.
    ///
    /// # Arguments
    /// * `blob` - The raw model bytes, if any.
    /// * `id` - The id the engine assigned on a previous call, if any.
    /// * `path` - A path the engine can load the model from, if any.
    pub fn resolve(blob: Option<&[u8]>, id: Option<&str>, path: Option<&str>) -> Self {
        match (blob, id, path) {
            (Some(blob), _, _) => ModelRef::Blob(blob.to_vec()),
            (None, Some(id), _) => ModelRef::Id(id.to_owned()),
            (None, None, Some(path)) => ModelRef::Path(path.to_owned()),
            (None, None, None) => ModelRef::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ModelRef::None)
    }
}

/// A request for the engine.
#[derive(Debug, Clone)]
pub struct Request {
    pub mode: Mode,
    /// The graph document, absent when predicting from an existing model.
    pub graph: Option<String>,
    pub hyperparams: Hyperparams,
    pub tensors: Vec<Tensor>,
    pub model: ModelRef,
    /// Address of the native progress callback, set by the bridge.
    pub progress_callback: Option<u64>,
}

impl Request {
    /// Creates a new `Fit` request.
    ///
    /// # Arguments
    /// * `graph` - The graph document to train.
    /// * `hyperparams` - Batch size, epochs and verbosity.
    /// * `x` - The features.
    /// * `y` - The labels, in the same sample order as `x`.
    /// * `model` - An existing model to keep training, if any.
    pub fn fit(
        graph: String,
        hyperparams: Hyperparams,
        x: Tensor,
        y: Tensor,
        model: ModelRef,
    ) -> Self {
        Self {
            mode: Mode::Fit,
            graph: Some(graph),
            hyperparams,
            tensors: vec![x, y],
            model,
            progress_callback: None,
        }
    }

    /// Creates a new `Predict` request.
    ///
    /// # Arguments
    /// * `graph` - The graph document, only needed when `model` can't be
    ///   resolved by the engine on its own.
    /// * `hyperparams` - Batch size, verbosity and caching.
    /// * `x` - The features.
    /// * `model` - The model to predict with.
    pub fn predict(
        graph: Option<String>,
        hyperparams: Hyperparams,
        x: Tensor,
        model: ModelRef,
    ) -> Self {
        Self {
            mode: Mode::Predict,
            graph,
            hyperparams,
            tensors: vec![x],
            model,
            progress_callback: None,
        }
    }

    fn check_tensor_count(&self) -> Result<()> {
        let expected = self.mode.tensor_count();
        if self.tensors.len() != expected {
            return Err(WireErr::TensorCount {
                mode: self.mode,
                got: self.tensors.len(),
                expected,
            });
        }

        Ok(())
    }
}

/// The engine's answer to a successful request.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// The trained model, present after `Fit`.
    pub model: Option<Vec<u8>>,
    /// The id the engine filed the model under, present after `Predict`.
    pub model_id: Option<String>,
    pub outputs: Vec<Tensor>,
}

// Messages are laid out as `| kind: u32 | body len: u64 | body |`. Request
// field tags, the body holds `| tag: u8 | value |` fields, tensors repeat in
// order.
const MODE: u8 = 1;
const GRAPH: u8 = 2;
const BATCH_SIZE: u8 = 3;
const EPOCHS: u8 = 4;
const VERBOSE: u8 = 5;
const CACHE: u8 = 6;
const TENSOR: u8 = 7;
const MODEL_BLOB: u8 = 8;
const MODEL_ID: u8 = 9;
const MODEL_PATH: u8 = 10;
const CALLBACK: u8 = 11;

// Response field tags.
const OUT_MODEL: u8 = 1;
const OUT_MODEL_ID: u8 = 2;
const OUT_TENSOR: u8 = 3;

fn put_header<B: BufMut>(buf: &mut B, kind: Header) {
    buf.put_u32(kind);
}

impl Serialize for Request {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.check_tensor_count()?;
        put_header(buf, REQUEST_KIND);
        codec::put_body(buf, |body| self.put_fields(body))
    }
}

impl Request {
    fn put_fields(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.put_u8(MODE);
        buf.put_u8(self.mode.tag());

        if let Some(graph) = &self.graph {
            buf.put_u8(GRAPH);
            codec::put_bytes(buf, graph.as_bytes());
        }

        let Hyperparams {
            batch_size,
            epochs,
            verbose,
            cache,
        } = self.hyperparams;

        buf.put_u8(BATCH_SIZE);
        buf.put_u32(batch_size);
        buf.put_u8(EPOCHS);
        buf.put_u32(epochs);
        buf.put_u8(VERBOSE);
        buf.put_u8(verbose);
        buf.put_u8(CACHE);
        buf.put_u8(cache as u8);

        for tensor in &self.tensors {
            buf.put_u8(TENSOR);
            tensor.serialize(buf)?;
        }

        match &self.model {
            ModelRef::None => {}
            ModelRef::Blob(blob) => {
                buf.put_u8(MODEL_BLOB);
                codec::put_bytes(buf, blob);
            }
            ModelRef::Id(id) => {
                buf.put_u8(MODEL_ID);
                codec::put_bytes(buf, id.as_bytes());
            }
            ModelRef::Path(path) => {
                buf.put_u8(MODEL_PATH);
                codec::put_bytes(buf, path.as_bytes());
            }
        }

        if let Some(callback) = self.progress_callback {
            buf.put_u8(CALLBACK);
            buf.put_u64(callback);
        }

        Ok(())
    }
}

impl Deserialize for Request {
    fn deserialize(buf: &mut &[u8]) -> Result<Self> {
        codec::expect_kind(buf, REQUEST_KIND)?;
        let buf = &mut codec::get_body(buf)?;

        let mut mode = None;
        let mut graph = None;
        let mut batch_size = None;
        let mut epochs = None;
        let mut verbose = None;
        let mut cache = false;
        let mut tensors = Vec::new();
        let mut model = ModelRef::None;
        let mut progress_callback = None;

        while !buf.is_empty() {
            match codec::get_u8(buf, "field tag")? {
                MODE => mode = Some(Mode::from_tag(codec::get_u8(buf, "mode")?)?),
                GRAPH => graph = Some(codec::get_string(buf, "graph")?),
                BATCH_SIZE => batch_size = Some(codec::get_u32(buf, "batch size")?),
                EPOCHS => epochs = Some(codec::get_u32(buf, "epochs")?),
                VERBOSE => verbose = Some(codec::get_u8(buf, "verbose")?),
                CACHE => cache = codec::get_u8(buf, "cache")? != 0,
                TENSOR => tensors.push(Tensor::deserialize(buf)?),
                tag @ (MODEL_BLOB | MODEL_ID | MODEL_PATH) => {
                    if !model.is_none() {
                        return Err(WireErr::ConflictingModelRef);
                    }

                    model = match tag {
                        MODEL_BLOB => ModelRef::Blob(codec::get_bytes(buf, "model blob")?.to_vec()),
                        MODEL_ID => ModelRef::Id(codec::get_string(buf, "model id")?),
                        _ => ModelRef::Path(codec::get_string(buf, "model path")?),
                    };
                }
                CALLBACK => progress_callback = Some(codec::get_u64(buf, "callback")?),
                tag => {
                    return Err(WireErr::UnknownTag {
                        context: "request field",
                        tag,
                    });
                }
            }
        }

        let request = Self {
            mode: mode.ok_or(WireErr::MissingField("mode"))?,
            graph,
            hyperparams: Hyperparams {
                batch_size: batch_size.ok_or(WireErr::MissingField("batch size"))?,
                epochs: epochs.ok_or(WireErr::MissingField("epochs"))?,
                verbose: verbose.ok_or(WireErr::MissingField("verbose"))?,
                cache,
            },
            tensors,
            model,
            progress_callback,
        };

        request.check_tensor_count()?;
        Ok(request)
    }
}

impl Serialize for Response {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        put_header(buf, RESPONSE_KIND);
        codec::put_body(buf, |body| self.put_fields(body))
    }
}

impl Response {
    fn put_fields(&self, buf: &mut Vec<u8>) -> Result<()> {
        if let Some(model) = &self.model {
            buf.put_u8(OUT_MODEL);
            codec::put_bytes(buf, model);
        }

        if let Some(id) = &self.model_id {
            buf.put_u8(OUT_MODEL_ID);
            codec::put_bytes(buf, id.as_bytes());
        }

        for tensor in &self.outputs {
            buf.put_u8(OUT_TENSOR);
            tensor.serialize(buf)?;
        }

        Ok(())
    }
}

impl Deserialize for Response {
    fn deserialize(buf: &mut &[u8]) -> Result<Self> {
        codec::expect_kind(buf, RESPONSE_KIND)?;
        let buf = &mut codec::get_body(buf)?;
        let mut response = Response::default();

        while !buf.is_empty() {
            match codec::get_u8(buf, "field tag")? {
                OUT_MODEL => response.model = Some(codec::get_bytes(buf, "model blob")?.to_vec()),
                OUT_MODEL_ID => response.model_id = Some(codec::get_string(buf, "model id")?),
                OUT_TENSOR => response.outputs.push(Tensor::deserialize(buf)?),
                tag => {
                    return Err(WireErr::UnknownTag {
                        context: "response field",
                        tag,
                    });
                }
            }
        }

        Ok(response)
    }
}

/// Encodes `request` into a fresh buffer.
///
/// # Errors
/// Fails if the request doesn't carry the amount of tensors its mode requires
/// or a tensor can't be laid out on the wire.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    request.serialize(&mut buf)?;
    Ok(buf)
}

pub fn decode_request(mut bytes: &[u8]) -> Result<Request> {
    let request = Request::deserialize(&mut bytes)?;
    codec::expect_end(bytes)?;
    Ok(request)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    response.serialize(&mut buf)?;
    Ok(buf)
}

/// Decodes a response buffer copied out of the engine.
///
/// # Errors
/// Any truncation, trailing bytes or unknown tag, the stream is corrupt and
/// the whole call must be treated as failed.
pub fn decode_response(mut bytes: &[u8]) -> Result<Response> {
    let response = Response::deserialize(&mut bytes)?;
    codec::expect_end(bytes)?;
    Ok(response)
}
