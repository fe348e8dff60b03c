use crate::expfamily::dirichlet;
use candle_core::{Result, Tensor};
use vbi_core::{AccStats, BayesianModel, BayesianParameter};

/// Finite mixture with Dirichlet-distributed weights over a component set.
///
/// The component set is any `BayesianModel` whose expected log-likelihood
/// is the `(n, K)` per-component matrix and whose `accumulate` takes the
/// `(n, K)` responsibilities, e.g. [`crate::NormalDiagCovSet`]. The
/// mixture itself exposes the ordinary per-example interface, so mixtures
/// nest wherever a single density would.
pub struct Mixture<M: BayesianModel> {
    weights: BayesianParameter,
    components: M,
    num_comps: usize,
}

impl<M: BayesianModel> Mixture<M> {
    /// Symmetric construction: prior and initial posterior weights share
    /// the given Dirichlet concentrations (length `K`).
    pub fn new(concentrations: &Tensor, components: M) -> Result<Self> {
        let num_comps = concentrations.dims1()?;
        let nh = dirichlet::natural_hparams(concentrations)?;
        Ok(Self {
            weights: BayesianParameter::new(nh.clone(), nh)?,
            components,
            num_comps,
        })
    }

    pub fn num_components(&self) -> usize {
        self.num_comps
    }

    pub fn components(&self) -> &M {
        &self.components
    }

    /// Expected log mixture weights `E[ln π]` under the current posterior.
    pub fn expected_log_weights(&self) -> Result<Tensor> {
        dirichlet::expected_log_weights(self.weights.posterior_natural_hparams())
    }

    /// Posterior responsibilities `(n, K)` of each component for each
    /// example: softmax of the weighted per-component log-likelihoods.
    pub fn responsibilities(&self, stats: &Tensor) -> Result<Tensor> {
        candle_nn::ops::softmax(&self.weighted_component_llh(stats)?, 1)
    }

    fn weighted_component_llh(&self, stats: &Tensor) -> Result<Tensor> {
        let comp_llh = self.components.expected_log_likelihood(stats, None)?;
        comp_llh.broadcast_add(&self.expected_log_weights()?)
    }
}

impl<M: BayesianModel> BayesianModel for Mixture<M> {
    fn sufficient_statistics(&self, data: &Tensor) -> Result<Tensor> {
        self.components.sufficient_statistics(data)
    }

    /// With `latent_vars = None`, the component indicator is marginalized:
    /// `log Σ_k exp(E[ln π_k] + llh_k)`. With fixed responsibilities
    /// `(n, K)` (e.g. a supervised alignment), the weighted sum is used
    /// instead.
    fn expected_log_likelihood(
        &self,
        stats: &Tensor,
        latent_vars: Option<&Tensor>,
    ) -> Result<Tensor> {
        let weighted = self.weighted_component_llh(stats)?;
        match latent_vars {
            None => weighted.log_sum_exp(1),
            Some(resps) => (&weighted * resps)?.sum(1),
        }
    }

    fn local_kl_div_posterior_prior(&self, stats: &Tensor) -> Result<Tensor> {
        Tensor::zeros((stats.dim(0)?,), stats.dtype(), stats.device())
    }

    fn kl_div_posterior_prior(&self) -> Result<f64> {
        let weights_kl = dirichlet::kl_div(
            self.weights.posterior_natural_hparams(),
            self.weights.prior_natural_hparams(),
        )?;
        Ok(weights_kl + self.components.kl_div_posterior_prior()?)
    }

    fn accumulate(&self, stats: &Tensor, weights: Option<&Tensor>) -> Result<AccStats> {
        let resps = match weights {
            Some(resps) => resps.clone(),
            None => self.responsibilities(stats)?,
        };
        let mut acc = self.components.accumulate(stats, Some(&resps))?;
        // Dirichlet conjugate statistic: per-component responsibility mass.
        acc.insert(self.weights.id(), resps.sum(0)?);
        Ok(acc)
    }

    fn parameters(&self) -> Vec<BayesianParameter> {
        let mut params = vec![self.weights.clone()];
        params.extend(self.components.parameters());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normal::{NormalDiagCov, NormalDiagCovSet};
    use approx::assert_relative_eq;
    use candle_core::Device;

    fn two_component_mixture(device: &Device) -> Result<Mixture<NormalDiagCovSet>> {
        let precision = Tensor::ones((1,), candle_core::DType::F32, device)?;
        let left = NormalDiagCov::from_mean_precision(
            &Tensor::new(&[-1f32], device)?,
            &precision,
            1.0,
        )?;
        let right = NormalDiagCov::from_mean_precision(
            &Tensor::new(&[1f32], device)?,
            &precision,
            1.0,
        )?;
        let concentrations = Tensor::new(&[1f32, 1.], device)?;
        Mixture::new(&concentrations, NormalDiagCovSet::new(vec![left, right]))
    }

    #[test]
    fn test_responsibilities_sum_to_one() -> Result<()> {
        let device = Device::Cpu;
        let mixture = two_component_mixture(&device)?;
        let data = Tensor::new(&[[0.5f32], [-2.], [3.]], &device)?;
        let stats = mixture.sufficient_statistics(&data)?;

        let resps = mixture.responsibilities(&stats)?;
        assert_eq!(resps.dims(), &[3, 2]);
        for row in resps.sum(1)?.to_vec1::<f32>()? {
            assert_relative_eq!(row, 1.0, epsilon = 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_symmetric_point_splits_evenly() -> Result<()> {
        let device = Device::Cpu;
        let mixture = two_component_mixture(&device)?;
        // x = 0 sits exactly between the two posterior means.
        let data = Tensor::new(&[[0f32]], &device)?;
        let stats = mixture.sufficient_statistics(&data)?;

        let resps = mixture.responsibilities(&stats)?.to_vec2::<f32>()?;
        assert_relative_eq!(resps[0][0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(resps[0][1], 0.5, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_accumulate_has_weights_and_component_entries() -> Result<()> {
        let device = Device::Cpu;
        let mixture = two_component_mixture(&device)?;
        let data = Tensor::new(&[[0.5f32], [-2.], [3.]], &device)?;
        let stats = mixture.sufficient_statistics(&data)?;

        let acc = mixture.accumulate(&stats, None)?;
        // One entry per component plus the Dirichlet counts.
        assert_eq!(acc.len(), 3);

        let params = mixture.parameters();
        assert_eq!(params.len(), 3);
        let counts = acc.get(&params[0].id()).unwrap().to_vec1::<f32>()?;
        let total: f32 = counts.iter().sum();
        assert_relative_eq!(total, 3.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_marginal_llh_upper_bounds_fixed_assignment() -> Result<()> {
        let device = Device::Cpu;
        let mixture = two_component_mixture(&device)?;
        let data = Tensor::new(&[[0.7f32], [-0.3]], &device)?;
        let stats = mixture.sufficient_statistics(&data)?;

        let marginal = mixture
            .expected_log_likelihood(&stats, None)?
            .to_vec1::<f32>()?;
        let hard = Tensor::new(&[[1f32, 0.], [0., 1.]], &device)?;
        let fixed = mixture
            .expected_log_likelihood(&stats, Some(&hard))?
            .to_vec1::<f32>()?;

        for (m, f) in marginal.iter().zip(&fixed) {
            assert!(m >= f, "logsumexp bound must dominate a hard assignment");
        }
        Ok(())
    }
}
