use comms::specs::{NameOr, OptimizerSpec};

/// Stochastic gradient descent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    lr: f64,
    momentum: f64,
    decay: f64,
    nesterov: bool,
}

impl Sgd {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            momentum: 0.0,
            decay: 0.0,
            nesterov: false,
        }
    }

    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl From<Sgd> for OptimizerSpec {
    fn from(value: Sgd) -> Self {
        OptimizerSpec::Sgd {
            lr: value.lr,
            momentum: value.momentum,
            decay: value.decay,
            nestorov: value.nesterov,
        }
    }
}

/// Adadelta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adadelta {
    lr: f64,
    rho: f64,
    epsilon: f64,
    decay: f64,
}

impl Adadelta {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            rho: 0.95,
            epsilon: 1e-8,
            decay: 0.0,
        }
    }

    pub fn rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }
}

impl Default for Adadelta {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl From<Adadelta> for OptimizerSpec {
    fn from(value: Adadelta) -> Self {
        OptimizerSpec::Adadelta {
            lr: value.lr,
            rho: value.rho,
            epsilon: value.epsilon,
            decay: value.decay,
        }
    }
}

impl From<Sgd> for NameOr<OptimizerSpec> {
    fn from(value: Sgd) -> Self {
        NameOr::Spec(value.into())
    }
}

impl From<Adadelta> for NameOr<OptimizerSpec> {
    fn from(value: Adadelta) -> Self {
        NameOr::Spec(value.into())
    }
}
