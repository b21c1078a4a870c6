mod codec;
mod deserialize;
pub mod error;
pub mod msg;
pub mod progress;
mod serialize;
pub mod specs;
mod tensor_record;
pub mod tensor_file;

pub use deserialize::Deserialize;
pub use error::{Result, WireErr};
pub use msg::{
    Hyperparams, Mode, ModelRef, Request, Response, decode_request, decode_response,
    encode_request, encode_response,
};
pub use progress::{Metrics, ProgressKind, ProgressRecord};
pub use serialize::Serialize;
pub use tensor_file::{read_tensor, write_tensor};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

/// Message kinds, the first `HEADER_SIZE` bytes of every top level buffer.
const REQUEST_KIND: Header = 1;
const RESPONSE_KIND: Header = 2;
const PROGRESS_KIND: Header = 3;
