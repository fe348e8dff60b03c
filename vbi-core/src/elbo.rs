use crate::model::BayesianModel;
use crate::param::BayesianParameter;
use crate::stats::AccStats;
use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor};

/// Stochastic evidence lower bound over mini-batches.
///
/// `datasize` is the total corpus size (in examples/frames) and must be
/// supplied by the caller: batch quantities are scaled by
/// `datasize / batch_len` so natural gradients stay consistent with
/// full-dataset statistics. The true dataset size cannot be inferred from
/// a subsample.
pub struct EvidenceLowerBound {
    datasize: usize,
}

impl EvidenceLowerBound {
    pub fn new(datasize: usize) -> Self {
        Self { datasize }
    }

    pub fn datasize(&self) -> usize {
        self.datasize
    }

    /// Evaluate the ELBO of `model` on one mini-batch.
    ///
    /// Pure with respect to the model: everything the two backward passes
    /// need, including the accumulated statistics, is captured in the
    /// returned estimate. `latent_vars` is forwarded to both the
    /// likelihood and the accumulation so the two sides of one evaluation
    /// stay consistent.
    pub fn compute<M: BayesianModel + ?Sized>(
        &self,
        model: &M,
        data: &Tensor,
        latent_vars: Option<&Tensor>,
    ) -> Result<ElboEstimate> {
        let batch_len = data.dim(0)?;
        if batch_len == 0 {
            candle_core::bail!("cannot evaluate the ELBO on an empty mini-batch");
        }
        let scale = self.datasize as f64 / batch_len as f64;
        let stats = model.sufficient_statistics(data)?;
        ElboEstimate::new(
            model.expected_log_likelihood(&stats, latent_vars)?,
            model.local_kl_div_posterior_prior(&stats)?,
            model.kl_div_posterior_prior()?,
            model.parameters(),
            model.accumulate(&stats, latent_vars)?,
            scale,
        )
    }
}

/// One stochastic ELBO evaluation: the scalar bound (still attached to the
/// autodiff graph of any standard parameters), its per-example breakdown,
/// and everything the closed-form natural-gradient pass needs.
///
/// Meant to be consumed once per optimizer step; it owns no parameters,
/// only handles to them.
pub struct ElboEstimate {
    exp_llh: Tensor,
    local_kl: Tensor,
    global_kl: f64,
    elbo: Tensor,
    parameters: Vec<BayesianParameter>,
    acc_stats: AccStats,
    scale: f64,
}

impl ElboEstimate {
    pub(crate) fn new(
        exp_llh: Tensor,
        local_kl: Tensor,
        global_kl: f64,
        parameters: Vec<BayesianParameter>,
        acc_stats: AccStats,
        scale: f64,
    ) -> Result<Self> {
        let elbo = ((exp_llh.sum_all()? - local_kl.sum_all()?)? * scale)?
            .affine(1.0, -global_kl)?;
        Ok(Self {
            exp_llh,
            local_kl,
            global_kl,
            elbo,
            parameters,
            acc_stats,
            scale,
        })
    }

    /// Scaled stochastic ELBO `scale * (Σ llh − Σ local_kl) − global_kl` as
    /// a scalar tensor attached to the forward graph.
    pub fn value(&self) -> &Tensor {
        &self.elbo
    }

    /// The bound as a plain number.
    pub fn value_scalar(&self) -> Result<f32> {
        self.elbo.to_scalar::<f32>()
    }

    /// Total KL divergence `global + Σ local`. Informational; never part of
    /// a gradient path.
    pub fn kl_div(&self) -> Result<f64> {
        let local: f32 = self.local_kl.sum_all()?.to_scalar()?;
        Ok(self.global_kl + local as f64)
    }

    /// Summed expected log-likelihood of the batch.
    pub fn expected_llh(&self) -> Result<f32> {
        self.exp_llh.sum_all()?.to_scalar::<f32>()
    }

    /// Scale factor `datasize / batch_len` applied to the batch terms.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Per-example decomposition `llh[i] − local_kl[i] − global_kl`.
    ///
    /// The global KL is broadcast to every example, so summing this vector
    /// counts it `n` times, while [`value`](Self::value) subtracts it once
    /// and scales the batch terms. Diagnostics only; do not feed it back
    /// as a training signal.
    pub fn per_frame(&self) -> Result<Tensor> {
        (&self.exp_llh - &self.local_kl)?.affine(1.0, -self.global_kl)
    }

    /// Differentiate the negated bound with respect to every standard
    /// parameter reachable in the graph (descending the negation is
    /// ascending the ELBO). Bayesian parameters never receive autodiff
    /// gradients; they are served by
    /// [`natural_backward`](Self::natural_backward).
    pub fn backward(&self) -> Result<GradStore> {
        self.elbo.neg()?.backward()
    }

    /// Closed-form natural-gradient pass for conjugate parameters: for
    /// every parameter with accumulated statistics this batch,
    /// `natural_grad += prior + scale * stat − posterior`.
    ///
    /// A parameter with no entry received no responsibility this batch (an
    /// unused mixture component, a held-out coordinate group) and is left
    /// untouched.
    pub fn natural_backward(&self) -> Result<()> {
        for param in &self.parameters {
            if let Some(stat) = self.acc_stats.get(&param.id()) {
                let target = (param.prior_natural_hparams() + (stat * self.scale)?)?;
                let delta = (target - param.posterior_natural_hparams().detach())?;
                param.accumulate_natural_grad(&delta)?;
            }
        }
        Ok(())
    }
}
