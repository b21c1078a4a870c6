use std::{error::Error, fmt, io};

use bridge::BridgeErr;
use comms::WireErr;
use model::ModelErr;
use tensor::TensorErr;

pub type Result<T> = std::result::Result<T, ToolErr>;

#[derive(Debug)]
pub enum ToolErr {
    Config(serde_json::Error),
    /// Neither the run config nor `ENGINE_LIB` name an engine library.
    NoEngine,
    /// Training data without a `y` file.
    MissingLabels,
    LabelMismatch {
        predictions: usize,
        labels: usize,
    },
    Tensor(TensorErr),
    Wire(WireErr),
    Bridge(BridgeErr),
    Model(ModelErr),
    Io(io::Error),
}

impl fmt::Display for ToolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolErr::Config(e) => write!(f, "invalid run config: {e}"),
            ToolErr::NoEngine => write!(
                f,
                "no engine library, set `engine` in the run config or ENGINE_LIB"
            ),
            ToolErr::MissingLabels => write!(f, "training needs a labels file"),
            ToolErr::LabelMismatch {
                predictions,
                labels,
            } => write!(f, "{predictions} predictions for {labels} labels"),
            ToolErr::Tensor(e) => write!(f, "tensor error: {e}"),
            ToolErr::Wire(e) => write!(f, "{e}"),
            ToolErr::Bridge(e) => write!(f, "{e}"),
            ToolErr::Model(e) => write!(f, "{e}"),
            ToolErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ToolErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ToolErr::Config(e) => Some(e),
            ToolErr::Tensor(e) => Some(e),
            ToolErr::Wire(e) => Some(e),
            ToolErr::Bridge(e) => Some(e),
            ToolErr::Model(e) => Some(e),
            ToolErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ToolErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

impl From<TensorErr> for ToolErr {
    fn from(value: TensorErr) -> Self {
        Self::Tensor(value)
    }
}

impl From<WireErr> for ToolErr {
    fn from(value: WireErr) -> Self {
        Self::Wire(value)
    }
}

impl From<BridgeErr> for ToolErr {
    fn from(value: BridgeErr) -> Self {
        Self::Bridge(value)
    }
}

impl From<ModelErr> for ToolErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<io::Error> for ToolErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ToolErr> for io::Error {
    fn from(value: ToolErr) -> Self {
        match value {
            ToolErr::Io(e) => e,
            ToolErr::Bridge(e) => e.into(),
            ToolErr::Model(e) => e.into(),
            ToolErr::Wire(e) => e.into(),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
