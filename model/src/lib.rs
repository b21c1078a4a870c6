//! A sequential model description trained and run by the native engine.

mod config;
mod error;
pub mod initializers;
pub mod layers;
pub mod optimizers;
mod sequential;

pub use config::{FitConfig, PredictConfig};
pub use error::{ModelErr, Result};
pub use optimizers::{Adadelta, Sgd};
pub use sequential::Sequential;
