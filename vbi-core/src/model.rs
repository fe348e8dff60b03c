use crate::param::BayesianParameter;
use crate::stats::AccStats;
use candle_core::{Result, Tensor};

/// Capability contract every trainable model exposes to the ELBO engine.
///
/// Top-level models return a per-example vector from
/// [`expected_log_likelihood`](BayesianModel::expected_log_likelihood);
/// component sets return an `(n, K)` per-component matrix and are composed
/// by a mixture through this very same trait.
pub trait BayesianModel {
    /// Fixed-size summary `T(x)` of a mini-batch, one row per example.
    fn sufficient_statistics(&self, data: &Tensor) -> Result<Tensor>;

    /// Expected log-likelihood of the batch under the current variational
    /// posterior. `latent_vars` optionally fixes the per-example latent
    /// assignment instead of marginalizing it.
    fn expected_log_likelihood(
        &self,
        stats: &Tensor,
        latent_vars: Option<&Tensor>,
    ) -> Result<Tensor>;

    /// Per-example KL divergence of local (per-example) latent posteriors
    /// from their priors. Models without local latent variables return
    /// zeros; the batch size comes from `stats`.
    fn local_kl_div_posterior_prior(&self, stats: &Tensor) -> Result<Tensor>;

    /// KL divergence of the global parameter posterior from the prior.
    fn kl_div_posterior_prior(&self) -> Result<f64>;

    /// Responsibility-weighted sufficient statistics per parameter, in the
    /// conjugate-update coordinate system.
    ///
    /// `weights` carries per-example responsibilities when the caller has
    /// them (a mixture feeding its component set, supervised alignments).
    /// With `None` the model decides: single distributions sum over the
    /// batch, mixtures recompute soft responsibilities. A parameter absent
    /// from the returned mapping received no responsibility this batch.
    fn accumulate(&self, stats: &Tensor, weights: Option<&Tensor>) -> Result<AccStats>;

    /// Ordered collection of the model's Bayesian parameters.
    fn parameters(&self) -> Vec<BayesianParameter>;
}
