//! Variational Bayes inference engine.
//!
//! Training combines two gradient flavors in one loop: standard parameters
//! (e.g. neural-network weights) follow ordinary autodiff gradients of the
//! negated ELBO, while conjugate exponential-family parameters follow
//! closed-form natural gradients built from accumulated sufficient
//! statistics. Both flavors are driven by the same optimizer step.
//!
//! ```ignore
//! use vbi_core::{EvidenceLowerBound, NaturalGradientOptimizer, VariationalOptimizer};
//!
//! let elbo_fn = EvidenceLowerBound::new(corpus_len);
//! let mut optim = NaturalGradientOptimizer::new(model.parameters());
//! for _epoch in 0..10 {
//!     optim.zero_grad()?;
//!     let elbo = elbo_fn.compute(&model, &batch, None)?;
//!     elbo.natural_backward()?;
//!     let grads = elbo.backward()?;
//!     optim.step(Some(&grads))?;
//! }
//! ```

pub mod elbo;
pub mod model;
pub mod optim;
pub mod param;
pub mod stats;
pub mod train;

pub use elbo::{ElboEstimate, EvidenceLowerBound};
pub use model::BayesianModel;
pub use optim::{
    CoordinateAscentOptimizer, NaturalGradientOptimizer, StdOptimizer, VariationalOptimizer,
};
pub use param::{BayesianParameter, ParamId};
pub use stats::{add_acc_stats, AccStats};
pub use train::{train, TrainConfig};

pub use candle_core;
pub use candle_nn;
