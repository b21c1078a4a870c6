//! Builders for the layers of a `Sequential`, carrying the engine's defaults.
//! Every builder turns into a `LayerSpec`, which is checked when it's added
//! to a model.

use comms::specs::{ConvSpec, InitializerSpec, LayerSpec, NameOr, PoolingSpec};

use crate::{ModelErr, Result};

const CHANNELS_LAST: &str = "channels_last";
const VALID: &str = "valid";

/// Implements the `input_shape` setter, only needed on the first layer.
macro_rules! input_shape {
    () => {
        pub fn input_shape(mut self, shape: &[i32]) -> Self {
            self.input_shape = Some(shape.to_vec());
            self
        }
    };
}

/// Applies an activation function element wise.
pub fn activation(name: &str) -> LayerSpec {
    LayerSpec::Activation {
        activation: name.to_owned(),
    }
}

/// Max over the whole temporal dimension.
pub fn global_max_pooling1d() -> LayerSpec {
    LayerSpec::GlobalMaxPooling1D
}

/// A fully connected layer.
#[derive(Debug, Clone)]
pub struct Dense {
    units: u64,
    activation: Option<String>,
    kernel_initializer: NameOr<InitializerSpec>,
    input_shape: Option<Vec<i32>>,
}

impl Dense {
    pub fn new(units: u64) -> Self {
        Self {
            units,
            activation: None,
            kernel_initializer: "glorot_uniform".into(),
            input_shape: None,
        }
    }

    pub fn activation(mut self, name: &str) -> Self {
        self.activation = Some(name.to_owned());
        self
    }

    pub fn kernel_initializer(mut self, init: impl Into<NameOr<InitializerSpec>>) -> Self {
        self.kernel_initializer = init.into();
        self
    }

    input_shape!();
}

impl From<Dense> for LayerSpec {
    fn from(value: Dense) -> Self {
        LayerSpec::Dense {
            units: value.units,
            activation: value.activation,
            kernel_initializer: value.kernel_initializer,
            input_shape: value.input_shape,
        }
    }
}

/// Randomly zeroes a fraction `rate` of its inputs while training.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f64,
    seed: Option<u32>,
    input_shape: Option<Vec<i32>>,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            seed: None,
            input_shape: None,
        }
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    input_shape!();
}

impl From<Dropout> for LayerSpec {
    fn from(value: Dropout) -> Self {
        LayerSpec::Dropout {
            rate: value.rate,
            seed: value.seed,
            input_shape: value.input_shape,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Flatten {
    input_shape: Option<Vec<i32>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    input_shape!();
}

impl From<Flatten> for LayerSpec {
    fn from(value: Flatten) -> Self {
        LayerSpec::Flatten {
            input_shape: value.input_shape,
        }
    }
}

/// A convolution, `K` is `i32` for [`Conv1D`] and `[i32; 2]` for [`Conv2D`].
#[derive(Debug, Clone)]
pub struct Conv<K> {
    filters: i32,
    kernel_size: K,
    strides: K,
    use_bias: bool,
    activation: Option<String>,
    input_shape: Option<Vec<i32>>,
}

pub type Conv1D = Conv<i32>;
pub type Conv2D = Conv<[i32; 2]>;

impl Conv<i32> {
    pub fn new(filters: i32, kernel_size: i32) -> Self {
        Self::with_unit_strides(filters, kernel_size, 1)
    }
}

impl Conv<[i32; 2]> {
    pub fn new(filters: i32, kernel_size: [i32; 2]) -> Self {
        Self::with_unit_strides(filters, kernel_size, [1, 1])
    }
}

impl<K> Conv<K> {
    fn with_unit_strides(filters: i32, kernel_size: K, strides: K) -> Self {
        Self {
            filters,
            kernel_size,
            strides,
            use_bias: true,
            activation: None,
            input_shape: None,
        }
    }

    pub fn strides(mut self, strides: K) -> Self {
        self.strides = strides;
        self
    }

    pub fn use_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    pub fn activation(mut self, name: &str) -> Self {
        self.activation = Some(name.to_owned());
        self
    }

    input_shape!();

    fn into_spec(self) -> ConvSpec<K> {
        ConvSpec {
            filters: self.filters,
            kernel_size: self.kernel_size,
            strides: self.strides,
            use_bias: self.use_bias,
            activation: self.activation,
            bias_initializer: "zeros".to_owned(),
            input_shape: self.input_shape,
        }
    }
}

impl From<Conv1D> for LayerSpec {
    fn from(value: Conv1D) -> Self {
        LayerSpec::Conv1D(value.into_spec())
    }
}

impl From<Conv2D> for LayerSpec {
    fn from(value: Conv2D) -> Self {
        LayerSpec::Conv2D(value.into_spec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolingKind {
    Max,
    Average,
}

/// A max or average pooling, `K` is `i32` for 1D and `[i32; 2]` for 2D.
/// Strides default to the pool size.
#[derive(Debug, Clone)]
pub struct Pooling<K> {
    kind: PoolingKind,
    pool_size: K,
    strides: Option<K>,
    padding: String,
    data_format: String,
    input_shape: Option<Vec<i32>>,
}

pub type Pooling1D = Pooling<i32>;
pub type Pooling2D = Pooling<[i32; 2]>;

impl<K: Copy> Pooling<K> {
    fn new(kind: PoolingKind, pool_size: K) -> Self {
        Self {
            kind,
            pool_size,
            strides: None,
            padding: VALID.to_owned(),
            data_format: CHANNELS_LAST.to_owned(),
            input_shape: None,
        }
    }

    pub fn max(pool_size: K) -> Self {
        Self::new(PoolingKind::Max, pool_size)
    }

    pub fn average(pool_size: K) -> Self {
        Self::new(PoolingKind::Average, pool_size)
    }

    pub fn strides(mut self, strides: K) -> Self {
        self.strides = Some(strides);
        self
    }

    pub fn padding(mut self, padding: &str) -> Self {
        self.padding = padding.to_owned();
        self
    }

    pub fn data_format(mut self, data_format: &str) -> Self {
        self.data_format = data_format.to_owned();
        self
    }

    input_shape!();

    fn into_spec(self) -> (PoolingKind, PoolingSpec<K>) {
        let spec = PoolingSpec {
            pool_size: self.pool_size,
            strides: self.strides.unwrap_or(self.pool_size),
            padding: self.padding,
            data_format: self.data_format,
            input_shape: self.input_shape,
        };

        (self.kind, spec)
    }
}

impl From<Pooling1D> for LayerSpec {
    fn from(value: Pooling1D) -> Self {
        match value.into_spec() {
            (PoolingKind::Max, spec) => LayerSpec::MaxPooling1D(spec),
            (PoolingKind::Average, spec) => LayerSpec::AveragePooling1D(spec),
        }
    }
}

impl From<Pooling2D> for LayerSpec {
    fn from(value: Pooling2D) -> Self {
        match value.into_spec() {
            (PoolingKind::Max, spec) => LayerSpec::MaxPooling2D(spec),
            (PoolingKind::Average, spec) => LayerSpec::AveragePooling2D(spec),
        }
    }
}

/// Maps integer indices to dense vectors.
#[derive(Debug, Clone)]
pub struct Embedding {
    input_dim: u64,
    output_dim: u64,
    initializer: NameOr<InitializerSpec>,
    mask_zero: bool,
    input_length: Option<u64>,
    input_shape: Option<Vec<i32>>,
}

impl Embedding {
    pub fn new(input_dim: u64, output_dim: u64) -> Self {
        Self {
            input_dim,
            output_dim,
            initializer: "uniform".into(),
            mask_zero: false,
            input_length: None,
            input_shape: None,
        }
    }

    pub fn initializer(mut self, init: impl Into<NameOr<InitializerSpec>>) -> Self {
        self.initializer = init.into();
        self
    }

    pub fn mask_zero(mut self, mask_zero: bool) -> Self {
        self.mask_zero = mask_zero;
        self
    }

    pub fn input_length(mut self, len: u64) -> Self {
        self.input_length = Some(len);
        self
    }

    input_shape!();
}

impl From<Embedding> for LayerSpec {
    fn from(value: Embedding) -> Self {
        LayerSpec::Embedding {
            input_dim: value.input_dim,
            output_dim: value.output_dim,
            embedding_initializer: value.initializer,
            mask_zero: value.mask_zero,
            input_length: value.input_length,
            input_shape: value.input_shape,
        }
    }
}

/// Long short-term memory.
#[derive(Debug, Clone)]
pub struct Lstm {
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
    input_shape: Option<Vec<i32>>,
}

impl Lstm {
    pub fn new(units: u64) -> Self {
        Self {
            units,
            activation: "tanh".to_owned(),
            recurrent_activation: "hard_sigmoid".to_owned(),
            use_bias: true,
            kernel_initializer: "glorot_uniform".into(),
            recurrent_initializer: "orthogonal".into(),
            bias_initializer: "zeros".into(),
            unit_forget_bias: true,
            dropout: 0.0,
            recurrent_dropout: 0.0,
            input_shape: None,
        }
    }

    pub fn activation(mut self, name: &str) -> Self {
        self.activation = name.to_owned();
        self
    }

    pub fn recurrent_activation(mut self, name: &str) -> Self {
        self.recurrent_activation = name.to_owned();
        self
    }

    pub fn use_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    pub fn kernel_initializer(mut self, init: impl Into<NameOr<InitializerSpec>>) -> Self {
        self.kernel_initializer = init.into();
        self
    }

    pub fn recurrent_initializer(mut self, init: impl Into<NameOr<InitializerSpec>>) -> Self {
        self.recurrent_initializer = init.into();
        self
    }

    pub fn bias_initializer(mut self, init: impl Into<NameOr<InitializerSpec>>) -> Self {
        self.bias_initializer = init.into();
        self
    }

    pub fn unit_forget_bias(mut self, unit_forget_bias: bool) -> Self {
        self.unit_forget_bias = unit_forget_bias;
        self
    }

    pub fn dropout(mut self, rate: f64) -> Self {
        self.dropout = rate;
        self
    }

    pub fn recurrent_dropout(mut self, rate: f64) -> Self {
        self.recurrent_dropout = rate;
        self
    }

    input_shape!();
}

impl From<Lstm> for LayerSpec {
    fn from(value: Lstm) -> Self {
        LayerSpec::Lstm {
            units: value.units,
            activation: value.activation,
            recurrent_activation: value.recurrent_activation,
            use_bias: value.use_bias,
            kernel_initializer: value.kernel_initializer,
            recurrent_initializer: value.recurrent_initializer,
            bias_initializer: value.bias_initializer,
            unit_forget_bias: value.unit_forget_bias,
            dropout: value.dropout,
            recurrent_dropout: value.recurrent_dropout,
            input_shape: value.input_shape,
        }
    }
}

fn invalid(op: &'static str, reason: impl Into<String>) -> ModelErr {
    ModelErr::InvalidLayer {
        op,
        reason: reason.into(),
    }
}

fn check_rate(op: &'static str, what: &str, rate: f64) -> Result<()> {
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(op, format!("{what} {rate} must be in [0, 1)")));
    }

    Ok(())
}

fn check_positive(op: &'static str, what: &str, values: &[i64]) -> Result<()> {
    if let Some(v) = values.iter().find(|&&v| v <= 0) {
        return Err(invalid(op, format!("{what} must be positive, got {v}")));
    }

    Ok(())
}

fn check_input_shape(op: &'static str, shape: &Option<Vec<i32>>) -> Result<()> {
    match shape {
        Some(shape) if shape.is_empty() => Err(invalid(op, "input shape can't be empty")),
        Some(shape) => check_positive(
            op,
            "input shape dimensions",
            &shape.iter().map(|&d| i64::from(d)).collect::<Vec<_>>(),
        ),
        None => Ok(()),
    }
}

/// Kernel, pool and stride sizes, one value per spatial dimension.
trait Window {
    fn dims(&self) -> Vec<i64>;
}

impl Window for i32 {
    fn dims(&self) -> Vec<i64> {
        vec![i64::from(*self)]
    }
}

impl Window for [i32; 2] {
    fn dims(&self) -> Vec<i64> {
        self.map(i64::from).to_vec()
    }
}

fn check_conv<K: Window>(op: &'static str, spec: &ConvSpec<K>) -> Result<()> {
    check_positive(op, "filters", &[i64::from(spec.filters)])?;
    check_positive(op, "kernel size", &spec.kernel_size.dims())?;
    check_positive(op, "strides", &spec.strides.dims())?;
    check_input_shape(op, &spec.input_shape)
}

fn check_pooling<K: Window>(op: &'static str, spec: &PoolingSpec<K>) -> Result<()> {
    check_positive(op, "pool size", &spec.pool_size.dims())?;
    check_positive(op, "strides", &spec.strides.dims())?;
    check_input_shape(op, &spec.input_shape)
}

/// Checks the parameters of `layer` before it goes into a graph.
///
/// # Errors
/// `InvalidLayer` naming the op and the offending parameter.
pub(crate) fn validate(layer: &LayerSpec) -> Result<()> {
    match layer {
        LayerSpec::Activation { activation } if activation.is_empty() => {
            Err(invalid("Activation", "the activation name can't be empty"))
        }
        LayerSpec::Activation { .. } | LayerSpec::GlobalMaxPooling1D => Ok(()),
        LayerSpec::Dense {
            units, input_shape, ..
        } => {
            check_positive("Dense", "units", &[*units as i64])?;
            check_input_shape("Dense", input_shape)
        }
        LayerSpec::Dropout {
            rate, input_shape, ..
        } => {
            check_rate("Dropout", "rate", *rate)?;
            check_input_shape("Dropout", input_shape)
        }
        LayerSpec::Flatten { input_shape } => check_input_shape("Flatten", input_shape),
        LayerSpec::Conv1D(spec) => check_conv("Conv1D", spec),
        LayerSpec::Conv2D(spec) => check_conv("Conv2D", spec),
        LayerSpec::MaxPooling1D(spec) => check_pooling("MaxPooling1D", spec),
        LayerSpec::MaxPooling2D(spec) => check_pooling("MaxPooling2D", spec),
        LayerSpec::AveragePooling1D(spec) => check_pooling("AveragePooling1D", spec),
        LayerSpec::AveragePooling2D(spec) => check_pooling("AveragePooling2D", spec),
        LayerSpec::Embedding {
            input_dim,
            output_dim,
            input_shape,
            ..
        } => {
            check_positive(
                "Embedding",
                "dimensions",
                &[*input_dim as i64, *output_dim as i64],
            )?;
            check_input_shape("Embedding", input_shape)
        }
        LayerSpec::Lstm {
            units,
            dropout,
            recurrent_dropout,
            input_shape,
            ..
        } => {
            check_positive("LSTM", "units", &[*units as i64])?;
            check_rate("LSTM", "dropout", *dropout)?;
            check_rate("LSTM", "recurrent dropout", *recurrent_dropout)?;
            check_input_shape("LSTM", input_shape)
        }
    }
}
