//! Weight initializers the engine supports. Names like `"glorot_uniform"`
//! can be used directly wherever an initializer is taken.

use comms::specs::InitializerSpec;

use crate::{ModelErr, Result};

/// Normal distribution with mean zero.
pub fn random_normal(stddev: f64, seed: Option<u64>) -> InitializerSpec {
    InitializerSpec::RandomNormal {
        mean: 0.0,
        stddev,
        seed,
    }
}

/// Truncated normal distribution.
///
/// # Errors
/// The engine fixes the mean at zero, any other `mean` is rejected.
pub fn truncated_normal(mean: f64, stddev: f64, seed: Option<u64>) -> Result<InitializerSpec> {
    if mean != 0.0 {
        return Err(ModelErr::InvalidInitializer {
            op: "TruncatedNormal",
            reason: "the mean is fixed at 0",
        });
    }

    Ok(InitializerSpec::TruncatedNormal { mean, stddev, seed })
}

/// Uniform distribution over `[minval, maxval]`.
///
/// # Errors
/// The interval must be symmetric around zero, `-minval == maxval`.
pub fn random_uniform(minval: f64, maxval: f64, seed: Option<u64>) -> Result<InitializerSpec> {
    if -minval != maxval {
        return Err(ModelErr::InvalidInitializer {
            op: "RandomUniform",
            reason: "only intervals symmetric around zero are supported",
        });
    }

    Ok(InitializerSpec::RandomUniform {
        minval,
        maxval,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_normal_rejects_non_zero_mean() {
        assert!(truncated_normal(0.0, 0.05, None).is_ok());
        assert!(matches!(
            truncated_normal(0.5, 0.05, None),
            Err(ModelErr::InvalidInitializer {
                op: "TruncatedNormal",
                ..
            })
        ));
    }

    #[test]
    fn random_uniform_must_be_symmetric() {
        assert!(random_uniform(-0.05, 0.05, Some(1)).is_ok());
        assert!(random_uniform(-0.1, 0.05, None).is_err());
        assert!(random_uniform(0.0, 0.0, None).is_ok());
    }
}
