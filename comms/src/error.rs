use std::{error::Error, fmt, io};

use tensor::TensorErr;

use crate::Mode;

/// The result type used in the entire comms module.
pub type Result<T> = std::result::Result<T, WireErr>;

/// Wire protocol failures. Any of these on a received buffer means the
/// stream is corrupt, they are never retried.
#[derive(Debug)]
pub enum WireErr {
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    UnexpectedKind {
        got: u32,
        expected: u32,
    },
    UnknownTag {
        context: &'static str,
        tag: u8,
    },
    UnknownDtype(u8),
    InvalidUtf8 {
        field: &'static str,
    },
    MissingField(&'static str),
    TensorCount {
        mode: Mode,
        got: usize,
        expected: usize,
    },
    TensorLength {
        got: usize,
        expected: usize,
    },
    DimensionTooLarge {
        dim: usize,
        size: usize,
    },
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    TrailingBytes(usize),
    ConflictingModelRef,
    BadMagic([u8; 4]),
    Graph(serde_json::Error),
    Tensor(TensorErr),
    Io(io::Error),
}

impl fmt::Display for WireErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireErr::Truncated {
                field,
                needed,
                remaining,
            } => write!(
                f,
                "truncated message reading {field}: needed {needed} bytes, {remaining} remaining"
            ),
            WireErr::UnexpectedKind { got, expected } => {
                write!(f, "unexpected message kind {got}, expected {expected}")
            }
            WireErr::UnknownTag { context, tag } => write!(f, "unknown {context} tag {tag}"),
            WireErr::UnknownDtype(tag) => write!(f, "unknown element type tag {tag}"),
            WireErr::InvalidUtf8 { field } => write!(f, "{field} is not valid utf-8"),
            WireErr::MissingField(field) => write!(f, "missing required field {field}"),
            WireErr::TensorCount {
                mode,
                got,
                expected,
            } => write!(f, "{mode} carries {expected} tensors, got {got}"),
            WireErr::TensorLength { got, expected } => write!(
                f,
                "tensor payload length mismatch: got {got} bytes, expected {expected}"
            ),
            WireErr::DimensionTooLarge { dim, size } => {
                write!(f, "dimension {dim} of size {size} does not fit in an int32")
            }
            WireErr::FieldTooLong { field, len, max } => {
                write!(f, "{field} of length {len} exceeds the maximum of {max}")
            }
            WireErr::TrailingBytes(n) => write!(f, "{n} unexpected trailing bytes"),
            WireErr::ConflictingModelRef => {
                write!(f, "a message carries at most one model reference")
            }
            WireErr::BadMagic(magic) => write!(f, "not a tensor file, magic {magic:?}"),
            WireErr::Graph(e) => write!(f, "graph document error: {e}"),
            WireErr::Tensor(e) => write!(f, "tensor error: {e}"),
            WireErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for WireErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WireErr::Graph(e) => Some(e),
            WireErr::Tensor(e) => Some(e),
            WireErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TensorErr> for WireErr {
    fn from(value: TensorErr) -> Self {
        Self::Tensor(value)
    }
}

impl From<io::Error> for WireErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for WireErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Graph(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WireErr> for io::Error {
    fn from(value: WireErr) -> Self {
        match value {
            WireErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
