use crate::param::BayesianParameter;
use candle_core::backprop::GradStore;
use candle_core::Result;

/// Object-safe facade over whatever updates the standard (non-Bayesian)
/// parameters. Blanket-implemented for every `candle_nn` optimizer; the
/// engine never inspects its internals.
pub trait StdOptimizer {
    fn step(&mut self, grads: &GradStore) -> Result<()>;
}

impl<O: candle_nn::Optimizer> StdOptimizer for O {
    fn step(&mut self, grads: &GradStore) -> Result<()> {
        candle_nn::Optimizer::step(self, grads)
    }
}

/// Common surface of the natural-gradient optimizers, so a training loop
/// can drive either flavor.
pub trait VariationalOptimizer {
    /// Reset every tracked natural-gradient accumulator to zero.
    ///
    /// candle builds a fresh `GradStore` on every `backward()`, so there is
    /// no persistent standard-parameter gradient state to clear here.
    fn zero_grad(&self) -> Result<()>;

    /// Apply one update. `grads` feeds the standard optimizer when both are
    /// present; `None` skips the standard side.
    fn step(&mut self, grads: Option<&GradStore>) -> Result<()>;
}

fn natural_step(parameters: &[BayesianParameter], lrate: f64) -> Result<()> {
    for param in parameters {
        param.apply_natural_grad(lrate)?;
    }
    Ok(())
}

/// Natural-gradient ascent for conjugate Bayesian parameters, optionally
/// combined with a standard gradient-descent optimizer for ordinary
/// parameters (e.g. neural-network weights feeding a variational model).
///
/// The natural update assumes a parameterization in which every real
/// vector is a valid natural hyperparameter; no clamping or projection is
/// applied here.
pub struct NaturalGradientOptimizer {
    parameters: Vec<BayesianParameter>,
    lrate: f64,
    std_optim: Option<Box<dyn StdOptimizer>>,
}

impl NaturalGradientOptimizer {
    /// Track `parameters` with the default learning rate of 1 (the exact
    /// conjugate coordinate-ascent step).
    pub fn new(parameters: Vec<BayesianParameter>) -> Self {
        Self {
            parameters,
            lrate: 1.0,
            std_optim: None,
        }
    }

    pub fn with_lrate(mut self, lrate: f64) -> Self {
        self.lrate = lrate;
        self
    }

    pub fn with_std_optim(mut self, optim: impl StdOptimizer + 'static) -> Self {
        self.std_optim = Some(Box::new(optim));
        self
    }

    pub fn lrate(&self) -> f64 {
        self.lrate
    }
}

impl VariationalOptimizer for NaturalGradientOptimizer {
    fn zero_grad(&self) -> Result<()> {
        for param in &self.parameters {
            param.zero_natural_grad()?;
        }
        Ok(())
    }

    fn step(&mut self, grads: Option<&GradStore>) -> Result<()> {
        if let (Some(optim), Some(grads)) = (self.std_optim.as_mut(), grads) {
            optim.step(grads)?;
        }
        natural_step(&self.parameters, self.lrate)
    }
}

/// Block coordinate ascent: the Bayesian parameters are partitioned into
/// groups and exactly one group moves per step, round-robin, while the
/// standard optimizer runs on every call.
///
/// Some models (probabilistic PCA is the classic case) cannot have natural
/// gradients for all parameter blocks estimated at once without breaking
/// their conjugacy assumptions; the blocks must alternate with the others
/// held fixed.
pub struct CoordinateAscentOptimizer {
    inner: NaturalGradientOptimizer,
    groups: Vec<Vec<BayesianParameter>>,
    update_idx: usize,
}

impl CoordinateAscentOptimizer {
    /// Build from disjoint parameter groups. The flat union of all groups
    /// is what `zero_grad` resets, so every accumulator is cleared on every
    /// cycle even though only one group moves per step.
    pub fn new(groups: Vec<Vec<BayesianParameter>>) -> Self {
        assert!(
            !groups.is_empty(),
            "CoordinateAscentOptimizer requires at least one group"
        );
        let flat = groups.iter().flatten().cloned().collect();
        Self {
            inner: NaturalGradientOptimizer::new(flat),
            groups,
            update_idx: 0,
        }
    }

    pub fn with_lrate(mut self, lrate: f64) -> Self {
        self.inner.lrate = lrate;
        self
    }

    pub fn with_std_optim(mut self, optim: impl StdOptimizer + 'static) -> Self {
        self.inner.std_optim = Some(Box::new(optim));
        self
    }

    /// Index of the group the next `step` will move.
    pub fn current_group(&self) -> usize {
        self.update_idx
    }
}

impl VariationalOptimizer for CoordinateAscentOptimizer {
    fn zero_grad(&self) -> Result<()> {
        self.inner.zero_grad()
    }

    fn step(&mut self, grads: Option<&GradStore>) -> Result<()> {
        if let (Some(optim), Some(grads)) = (self.inner.std_optim.as_mut(), grads) {
            optim.step(grads)?;
        }
        natural_step(&self.groups[self.update_idx], self.inner.lrate)?;
        self.update_idx = (self.update_idx + 1) % self.groups.len();
        Ok(())
    }
}
