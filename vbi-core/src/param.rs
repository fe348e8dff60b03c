use candle_core::{Result, Tensor, Var};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a Bayesian parameter.
///
/// Keys accumulated statistics and survives cloning of the owning handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

impl ParamId {
    fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A conjugate exponential-family parameter: fixed prior natural
/// hyperparameters, learned posterior natural hyperparameters, and a
/// natural-gradient accumulator.
///
/// Clones share the posterior and accumulator storage (candle `Var`s), so
/// the owning model and an optimizer can hold the same parameter.
#[derive(Clone, Debug)]
pub struct BayesianParameter {
    id: ParamId,
    prior: Tensor,
    posterior: Var,
    natural_grad: Var,
}

impl BayesianParameter {
    /// Create a parameter from prior and initial posterior natural
    /// hyperparameters. The two must have the same shape.
    pub fn new(prior: Tensor, posterior: Tensor) -> Result<Self> {
        if prior.dims() != posterior.dims() {
            candle_core::bail!(
                "posterior natural hyperparameters {:?} do not match the prior's {:?}",
                posterior.dims(),
                prior.dims()
            );
        }
        let natural_grad = Var::zeros(prior.shape(), prior.dtype(), prior.device())?;
        let posterior = Var::from_tensor(&posterior.detach())?;
        Ok(Self {
            id: ParamId::fresh(),
            prior,
            posterior,
            natural_grad,
        })
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    /// Natural hyperparameters of the fixed prior.
    pub fn prior_natural_hparams(&self) -> &Tensor {
        &self.prior
    }

    /// Current natural hyperparameters of the variational posterior.
    pub fn posterior_natural_hparams(&self) -> &Tensor {
        self.posterior.as_tensor()
    }

    /// Current content of the natural-gradient accumulator.
    pub fn natural_grad(&self) -> &Tensor {
        self.natural_grad.as_tensor()
    }

    /// Reset the natural-gradient accumulator to zero.
    pub fn zero_natural_grad(&self) -> Result<()> {
        self.natural_grad.set(&self.natural_grad.zeros_like()?)
    }

    /// Add `delta` into the natural-gradient accumulator.
    pub fn accumulate_natural_grad(&self, delta: &Tensor) -> Result<()> {
        let updated = (self.natural_grad.as_tensor() + delta)?;
        self.natural_grad.set(&updated)
    }

    /// Move the posterior along the accumulated natural gradient:
    /// `posterior <- posterior + lrate * natural_grad`.
    ///
    /// The update is computed on detached values and written back through
    /// `Var::set`, so no autodiff graph from a previous evaluation stays
    /// alive across steps.
    pub fn apply_natural_grad(&self, lrate: f64) -> Result<()> {
        let current = self.posterior.as_tensor().detach();
        let step = (self.natural_grad.as_tensor().detach() * lrate)?;
        self.posterior.set(&(current + step)?)
    }
}
