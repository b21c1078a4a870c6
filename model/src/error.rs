use std::{error::Error, fmt, io};

use bridge::BridgeErr;
use comms::WireErr;
use tensor::TensorErr;

/// The result type used in the entire model module.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model module's error type.
#[derive(Debug)]
pub enum ModelErr {
    InvalidLayer {
        op: &'static str,
        reason: String,
    },
    InvalidInitializer {
        op: &'static str,
        reason: &'static str,
    },
    NotCompiled,
    /// There's no blob, id or path to predict with.
    NoModel,
    NoOutputs,
    SampleMismatch {
        x: usize,
        y: usize,
    },
    Tensor(TensorErr),
    Wire(WireErr),
    Bridge(BridgeErr),
    Io(io::Error),
}

impl fmt::Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::InvalidLayer { op, reason } => write!(f, "invalid {op} layer: {reason}"),
            ModelErr::InvalidInitializer { op, reason } => {
                write!(f, "invalid {op} initializer: {reason}")
            }
            ModelErr::NotCompiled => write!(f, "the model must be compiled before fitting"),
            ModelErr::NoModel => write!(f, "there's no trained, loaded or referenced model"),
            ModelErr::NoOutputs => write!(f, "the engine returned no output tensors"),
            ModelErr::SampleMismatch { x, y } => {
                write!(f, "features have {x} samples but labels have {y}")
            }
            ModelErr::Tensor(e) => write!(f, "tensor error: {e}"),
            ModelErr::Wire(e) => write!(f, "{e}"),
            ModelErr::Bridge(e) => write!(f, "{e}"),
            ModelErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Tensor(e) => Some(e),
            ModelErr::Wire(e) => Some(e),
            ModelErr::Bridge(e) => Some(e),
            ModelErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TensorErr> for ModelErr {
    fn from(value: TensorErr) -> Self {
        Self::Tensor(value)
    }
}

impl From<WireErr> for ModelErr {
    fn from(value: WireErr) -> Self {
        Self::Wire(value)
    }
}

impl From<BridgeErr> for ModelErr {
    fn from(value: BridgeErr) -> Self {
        Self::Bridge(value)
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ModelErr> for io::Error {
    fn from(value: ModelErr) -> Self {
        match value {
            ModelErr::Io(e) => e,
            ModelErr::Bridge(e) => e.into(),
            ModelErr::Wire(e) => e.into(),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
