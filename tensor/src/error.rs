use std::{error::Error, fmt};

use crate::DType;

/// The result type used in the entire tensor module.
pub type Result<T> = std::result::Result<T, TensorErr>;

/// Shape and contract violations detected by the tensor module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorErr {
    NegativeDimension {
        dim: usize,
        size: i64,
    },
    SizeOverflow,
    LengthMismatch {
        got: usize,
        expected: usize,
    },
    ElementCountMismatch {
        from: usize,
        to: usize,
    },
    NotContiguous,
    InvalidPermutation {
        axes: Vec<usize>,
        rank: usize,
    },
    DimOutOfRange {
        dim: usize,
        rank: usize,
    },
    NarrowOutOfBounds {
        dim: usize,
        start: usize,
        length: usize,
        size: usize,
    },
    RankMismatch {
        got: usize,
        expected: usize,
    },
    IndexOutOfBounds {
        dim: usize,
        index: usize,
        size: usize,
    },
    DtypeMismatch {
        got: DType,
        expected: DType,
    },
    ShapeMismatch {
        a: Vec<usize>,
        b: Vec<usize>,
    },
    UnsupportedDtype {
        op: &'static str,
        dtype: DType,
    },
}

impl fmt::Display for TensorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorErr::NegativeDimension { dim, size } => {
                write!(f, "dimension {dim} has a negative size {size}")
            }
            TensorErr::SizeOverflow => {
                write!(f, "the tensor's byte size overflows a signed 64 bit integer")
            }
            TensorErr::LengthMismatch { got, expected } => write!(
                f,
                "raw data length mismatch: got {got} bytes, storage holds {expected}"
            ),
            TensorErr::ElementCountMismatch { from, to } => write!(
                f,
                "cannot view {from} elements as a shape holding {to} elements"
            ),
            TensorErr::NotContiguous => write!(f, "the operation requires a contiguous tensor"),
            TensorErr::InvalidPermutation { axes, rank } => {
                write!(f, "{axes:?} is not a permutation of 0..{rank}")
            }
            TensorErr::DimOutOfRange { dim, rank } => {
                write!(f, "dimension {dim} is out of range for a rank {rank} tensor")
            }
            TensorErr::NarrowOutOfBounds {
                dim,
                start,
                length,
                size,
            } => write!(
                f,
                "narrow out of bounds at dimension {dim}: {start} + {length} exceeds {size}"
            ),
            TensorErr::RankMismatch { got, expected } => {
                write!(f, "got {got} indices for a rank {expected} tensor")
            }
            TensorErr::IndexOutOfBounds { dim, index, size } => write!(
                f,
                "index {index} is out of bounds for dimension {dim} of size {size}"
            ),
            TensorErr::DtypeMismatch { got, expected } => {
                write!(f, "element type mismatch: got {got}, expected {expected}")
            }
            TensorErr::ShapeMismatch { a, b } => write!(f, "shape mismatch: {a:?} and {b:?}"),
            TensorErr::UnsupportedDtype { op, dtype } => {
                write!(f, "{op} is not supported for {dtype} tensors")
            }
        }
    }
}

impl Error for TensorErr {}
