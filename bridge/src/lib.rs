mod engine;
pub mod error;
pub mod progress;

pub use engine::{Engine, EntryFn, ReleaseFn, Symbols};
pub use error::{BridgeErr, Result};
pub use progress::{ConsoleProgress, ProgressFn, ProgressSink};
