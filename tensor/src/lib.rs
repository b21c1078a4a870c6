mod dtype;
pub mod error;
mod layout;
mod storage;
mod tensor;

pub use dtype::{DType, Element};
pub use error::{Result, TensorErr};
pub use layout::contiguous_strides;
pub use storage::Storage;
pub use tensor::Tensor;
