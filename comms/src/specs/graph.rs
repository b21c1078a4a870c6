//! The graph document handed to the engine. The bridge never looks inside,
//! it's produced here and carried as a string field of the request.

use serde::{Deserialize, Serialize};

/// A field that takes either a well known name or a full description,
/// e.g. `"glorot_uniform"` or a `RandomNormal` initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOr<T> {
    Name(String),
    Spec(T),
}

impl<T> From<&str> for NameOr<T> {
    fn from(value: &str) -> Self {
        NameOr::Name(value.to_owned())
    }
}

impl From<InitializerSpec> for NameOr<InitializerSpec> {
    fn from(value: InitializerSpec) -> Self {
        NameOr::Spec(value)
    }
}

impl From<OptimizerSpec> for NameOr<OptimizerSpec> {
    fn from(value: OptimizerSpec) -> Self {
        NameOr::Spec(value)
    }
}

/// Weight initializer descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum InitializerSpec {
    RandomNormal {
        mean: f64,
        stddev: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    TruncatedNormal {
        mean: f64,
        stddev: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    RandomUniform {
        minval: f64,
        maxval: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
}

/// The optimizer of the compile section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum OptimizerSpec {
    #[serde(rename = "SGD")]
    Sgd {
        lr: f64,
        momentum: f64,
        decay: f64,
        // the engine reads this spelling
        nestorov: bool,
    },
    Adadelta {
        lr: f64,
        rho: f64,
        epsilon: f64,
        decay: f64,
    },
}

/// Convolution parameters, `K` is `i32` for 1D and `[i32; 2]` for 2D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvSpec<K> {
    pub filters: i32,
    pub kernel_size: K,
    pub strides: K,
    pub use_bias: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<String>,
    pub bias_initializer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<i32>>,
}

/// Pooling parameters, `K` is `i32` for 1D and `[i32; 2]` for 2D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingSpec<K> {
    pub pool_size: K,
    pub strides: K,
    pub padding: String,
    pub data_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<i32>>,
}

/// A single layer of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum LayerSpec {
    Activation {
        activation: String,
    },
    Dense {
        units: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activation: Option<String>,
        kernel_initializer: NameOr<InitializerSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_shape: Option<Vec<i32>>,
    },
    Dropout {
        rate: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_shape: Option<Vec<i32>>,
    },
    Flatten {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_shape: Option<Vec<i32>>,
    },
    Conv1D(ConvSpec<i32>),
    Conv2D(ConvSpec<[i32; 2]>),
    MaxPooling1D(PoolingSpec<i32>),
    MaxPooling2D(PoolingSpec<[i32; 2]>),
    AveragePooling1D(PoolingSpec<i32>),
    AveragePooling2D(PoolingSpec<[i32; 2]>),
    GlobalMaxPooling1D,
    Embedding {
        input_dim: u64,
        output_dim: u64,
        embedding_initializer: NameOr<InitializerSpec>,
        mask_zero: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_shape: Option<Vec<i32>>,
    },
    #[serde(rename = "LSTM")]
    Lstm {
        units: u64,
        activation: String,
        recurrent_activation: String,
        use_bias: bool,
        kernel_initializer: NameOr<InitializerSpec>,
        recurrent_initializer: NameOr<InitializerSpec>,
        bias_initializer: NameOr<InitializerSpec>,
        unit_forget_bias: bool,
        dropout: f64,
        recurrent_dropout: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_shape: Option<Vec<i32>>,
    },
}

/// The loss, optimizer and metrics the engine compiles the graph with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileSpec {
    pub loss: String,
    pub optimizer: NameOr<OptimizerSpec>,
    pub metrics: Vec<String>,
}

/// The whole graph document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub graph: Vec<LayerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_params: Option<CompileSpec>,
}

impl GraphSpec {
    /// Renders the compact document sent to the engine.
    pub fn to_document(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_document(doc: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(doc)?)
    }
}
