use std::{error::Error, fmt, io};

use comms::WireErr;

/// The bridge module's result type.
pub type Result<T> = std::result::Result<T, BridgeErr>;

/// Failures of a call into the engine.
#[derive(Debug)]
pub enum BridgeErr {
    /// The engine library or one of its entry points couldn't be resolved.
    Load(libloading::Error),
    /// Another engine binding is still alive in this process.
    AlreadyLoaded,
    /// The engine filled the error channel, this is its text.
    Engine(String),
    /// The request couldn't be laid out on the wire.
    Encode(WireErr),
    /// A response or progress record coming out of the engine is corrupt.
    Decode(WireErr),
    /// The progress sink panicked while handling a record.
    Callback(String),
    RequestTooLarge(usize),
}

impl fmt::Display for BridgeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeErr::Load(e) => write!(f, "failed to load the engine: {e}"),
            BridgeErr::AlreadyLoaded => write!(f, "an engine is already loaded in this process"),
            BridgeErr::Engine(text) => write!(f, "engine error: {text}"),
            BridgeErr::Encode(e) => write!(f, "failed to encode request: {e}"),
            BridgeErr::Decode(e) => write!(f, "corrupt engine output: {e}"),
            BridgeErr::Callback(msg) => write!(f, "progress sink panicked: {msg}"),
            BridgeErr::RequestTooLarge(len) => {
                write!(f, "request of {len} bytes exceeds the engine's 4GiB limit")
            }
        }
    }
}

impl Error for BridgeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BridgeErr::Load(e) => Some(e),
            BridgeErr::Encode(e) | BridgeErr::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<libloading::Error> for BridgeErr {
    fn from(value: libloading::Error) -> Self {
        Self::Load(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<BridgeErr> for io::Error {
    fn from(value: BridgeErr) -> Self {
        let kind = match value {
            BridgeErr::Load(_) => io::ErrorKind::NotFound,
            BridgeErr::AlreadyLoaded => io::ErrorKind::AlreadyExists,
            _ => io::ErrorKind::InvalidData,
        };

        io::Error::new(kind, value)
    }
}
