use crate::expfamily::normal_gamma;
use candle_core::{Result, Tensor};
use vbi_core::{AccStats, BayesianModel, BayesianParameter};

const LN_2PI: f64 = 1.8378770664093453;

/// Per-example sufficient statistics `[x², x, 1, 1]` of a
/// diagonal-covariance Normal, shape `(n, 4d)`. Shared by the single
/// density and the component set.
fn sufficient_statistics(data: &Tensor) -> Result<Tensor> {
    let ones = data.ones_like()?;
    Tensor::cat(&[&data.sqr()?, data, &ones, &ones], 1)
}

/// Bayesian Normal density with diagonal covariance. The per-dimension
/// (mean, precision) pairs carry a joint Normal-Gamma prior/posterior in
/// one conjugate parameter.
pub struct NormalDiagCov {
    dim: usize,
    mean_prec: BayesianParameter,
}

impl NormalDiagCov {
    /// Build from prior and initial-posterior natural hyperparameters
    /// (`normal_gamma` layout, length `4d`).
    pub fn new(prior: Tensor, posterior: Tensor) -> Result<Self> {
        let len = prior.dims1()?;
        if len % 4 != 0 {
            candle_core::bail!(
                "Normal-Gamma natural hyperparameters must have length 4d, got {}",
                len
            );
        }
        Ok(Self {
            dim: len / 4,
            mean_prec: BayesianParameter::new(prior, posterior)?,
        })
    }

    /// Prior and posterior both centered on `mean` with expected
    /// `precision` and `prior_count` pseudo-observations.
    pub fn from_mean_precision(
        mean: &Tensor,
        precision: &Tensor,
        prior_count: f64,
    ) -> Result<Self> {
        let nh = normal_gamma::natural_hparams(mean, precision, prior_count)?;
        Self::new(nh.clone(), nh)
    }

    /// Same prior, posterior initialized elsewhere (e.g. perturbed means to
    /// break mixture symmetry).
    pub fn with_posterior_init(
        prior_mean: &Tensor,
        prior_precision: &Tensor,
        prior_count: f64,
        posterior_mean: &Tensor,
    ) -> Result<Self> {
        let prior = normal_gamma::natural_hparams(prior_mean, prior_precision, prior_count)?;
        let posterior =
            normal_gamma::natural_hparams(posterior_mean, prior_precision, prior_count)?;
        Self::new(prior, posterior)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Expected posterior mean, one entry per dimension.
    pub fn mean(&self) -> Result<Vec<f64>> {
        let std = normal_gamma::std_params(self.mean_prec.posterior_natural_hparams())?;
        Ok(std.iter().map(|p| p.mean).collect())
    }

    /// Covariance diagonal implied by the expected posterior precision.
    pub fn cov_diag(&self) -> Result<Vec<f64>> {
        let std = normal_gamma::std_params(self.mean_prec.posterior_natural_hparams())?;
        Ok(std.iter().map(|p| p.rate / p.shape).collect())
    }

    fn expected_stats(&self) -> Result<Tensor> {
        normal_gamma::expected_stats(self.mean_prec.posterior_natural_hparams())
    }
}

impl BayesianModel for NormalDiagCov {
    fn sufficient_statistics(&self, data: &Tensor) -> Result<Tensor> {
        sufficient_statistics(data)
    }

    fn expected_log_likelihood(
        &self,
        stats: &Tensor,
        _latent_vars: Option<&Tensor>,
    ) -> Result<Tensor> {
        let expected = self.expected_stats()?.unsqueeze(1)?;
        stats
            .matmul(&expected)?
            .squeeze(1)?
            .affine(1.0, -0.5 * self.dim as f64 * LN_2PI)
    }

    fn local_kl_div_posterior_prior(&self, stats: &Tensor) -> Result<Tensor> {
        Tensor::zeros((stats.dim(0)?,), stats.dtype(), stats.device())
    }

    fn kl_div_posterior_prior(&self) -> Result<f64> {
        normal_gamma::kl_div(
            self.mean_prec.posterior_natural_hparams(),
            self.mean_prec.prior_natural_hparams(),
        )
    }

    fn accumulate(&self, stats: &Tensor, weights: Option<&Tensor>) -> Result<AccStats> {
        let stat = match weights {
            None => stats.sum(0)?,
            Some(w) => stats.broadcast_mul(&w.unsqueeze(1)?)?.sum(0)?,
        };
        let mut acc = AccStats::new();
        acc.insert(self.mean_prec.id(), stat);
        Ok(acc)
    }

    fn parameters(&self) -> Vec<BayesianParameter> {
        vec![self.mean_prec.clone()]
    }
}

/// Set of diagonal-covariance Normal components sharing one statistics
/// function. Its expected log-likelihood is the `(n, K)` per-component
/// matrix; a mixture composes it through the same `BayesianModel` trait.
pub struct NormalDiagCovSet {
    components: Vec<NormalDiagCov>,
}

impl NormalDiagCovSet {
    pub fn new(components: Vec<NormalDiagCov>) -> Self {
        assert!(
            !components.is_empty(),
            "NormalDiagCovSet requires at least one component"
        );
        let dim = components[0].dim;
        assert!(
            components.iter().all(|c| c.dim == dim),
            "all components must share the same dimensionality"
        );
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[NormalDiagCov] {
        &self.components
    }

    fn dim(&self) -> usize {
        self.components[0].dim
    }
}

impl BayesianModel for NormalDiagCovSet {
    fn sufficient_statistics(&self, data: &Tensor) -> Result<Tensor> {
        sufficient_statistics(data)
    }

    /// Per-component expected log-likelihood matrix `(n, K)`.
    fn expected_log_likelihood(
        &self,
        stats: &Tensor,
        _latent_vars: Option<&Tensor>,
    ) -> Result<Tensor> {
        let rows: Vec<Tensor> = self
            .components
            .iter()
            .map(|c| c.expected_stats())
            .collect::<Result<_>>()?;
        let expected = Tensor::stack(&rows, 0)?; // (K, 4d)
        stats
            .matmul(&expected.t()?)?
            .affine(1.0, -0.5 * self.dim() as f64 * LN_2PI)
    }

    fn local_kl_div_posterior_prior(&self, stats: &Tensor) -> Result<Tensor> {
        Tensor::zeros((stats.dim(0)?,), stats.dtype(), stats.device())
    }

    fn kl_div_posterior_prior(&self) -> Result<f64> {
        let mut total = 0f64;
        for component in &self.components {
            total += component.kl_div_posterior_prior()?;
        }
        Ok(total)
    }

    /// Responsibility-weighted statistics, one `(4d,)` row per component.
    /// The set cannot choose responsibilities on its own, so `weights` is
    /// required here.
    fn accumulate(&self, stats: &Tensor, weights: Option<&Tensor>) -> Result<AccStats> {
        let Some(weights) = weights else {
            candle_core::bail!("a component set needs per-component responsibilities to accumulate")
        };
        let weighted = weights.t()?.matmul(stats)?; // (K, 4d)
        let mut acc = AccStats::new();
        for (k, component) in self.components.iter().enumerate() {
            acc.insert(component.mean_prec.id(), weighted.get(k)?);
        }
        Ok(acc)
    }

    fn parameters(&self) -> Vec<BayesianParameter> {
        self.components
            .iter()
            .flat_map(|c| c.parameters())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_core::Device;

    fn unit_model(device: &Device, dim: usize) -> Result<NormalDiagCov> {
        let mean = Tensor::zeros((dim,), candle_core::DType::F32, device)?;
        let precision = Tensor::ones((dim,), candle_core::DType::F32, device)?;
        NormalDiagCov::from_mean_precision(&mean, &precision, 1.0)
    }

    #[test]
    fn test_sufficient_statistics_layout() -> Result<()> {
        let device = Device::Cpu;
        let model = unit_model(&device, 2)?;
        let data = Tensor::new(&[[1f32, 2.], [3., 4.]], &device)?;

        let stats = model.sufficient_statistics(&data)?;
        assert_eq!(stats.dims(), &[2, 8]);
        assert_eq!(
            stats.to_vec2::<f32>()?,
            vec![
                vec![1., 4., 1., 2., 1., 1., 1., 1.],
                vec![9., 16., 3., 4., 1., 1., 1., 1.],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_expected_llh_matches_closed_form() -> Result<()> {
        let device = Device::Cpu;
        let model = unit_model(&device, 1)?;
        let data = Tensor::new(&[[1f32]], &device)?;

        let stats = model.sufficient_statistics(&data)?;
        let llh: f32 = model
            .expected_log_likelihood(&stats, None)?
            .to_vec1::<f32>()?[0];

        // T(1) . E[stats] - ln(2 pi)/2 with m=0, beta=a=b=1:
        // (1)(-1/2) + (1)(0) + (-1/2) + psi(1)/2 - ln(2 pi)/2
        let euler_gamma = 0.5772156649015329f64;
        let expected = -0.5 - 0.5 - euler_gamma / 2. - 0.5 * LN_2PI;
        assert_relative_eq!(llh as f64, expected, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_unit_weights_match_plain_sum() -> Result<()> {
        let device = Device::Cpu;
        let model = unit_model(&device, 2)?;
        let data = Tensor::new(&[[1f32, 2.], [3., 4.], [-1., 0.]], &device)?;
        let stats = model.sufficient_statistics(&data)?;

        let plain = model.accumulate(&stats, None)?;
        let ones = Tensor::ones((3,), candle_core::DType::F32, &device)?;
        let weighted = model.accumulate(&stats, Some(&ones))?;

        let id = model.parameters()[0].id();
        assert_eq!(
            plain.get(&id).unwrap().to_vec1::<f32>()?,
            weighted.get(&id).unwrap().to_vec1::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn test_set_accumulate_is_weighted_sum() -> Result<()> {
        let device = Device::Cpu;
        let set = NormalDiagCovSet::new(vec![unit_model(&device, 1)?, unit_model(&device, 1)?]);
        let data = Tensor::new(&[[1f32], [2.]], &device)?;
        let stats = set.sufficient_statistics(&data)?;

        let resps = Tensor::new(&[[0.25f32, 0.75], [0.5, 0.5]], &device)?;
        let acc = set.accumulate(&stats, Some(&resps))?;
        assert_eq!(acc.len(), 2);

        // First component: 0.25 * T(1) + 0.5 * T(2).
        let id0 = set.components()[0].parameters()[0].id();
        let stat0 = acc.get(&id0).unwrap().to_vec1::<f32>()?;
        assert_eq!(stat0, vec![0.25 + 2.0, 0.25 + 1.0, 0.75, 0.75]);
        Ok(())
    }

    #[test]
    fn test_set_requires_responsibilities() -> Result<()> {
        let device = Device::Cpu;
        let set = NormalDiagCovSet::new(vec![unit_model(&device, 1)?]);
        let data = Tensor::new(&[[1f32]], &device)?;
        let stats = set.sufficient_statistics(&data)?;
        assert!(set.accumulate(&stats, None).is_err());
        Ok(())
    }

    #[test]
    fn test_set_llh_matches_components() -> Result<()> {
        let device = Device::Cpu;
        let first = unit_model(&device, 2)?;
        let mean = Tensor::new(&[3f32, -1.], &device)?;
        let precision = Tensor::new(&[0.5f32, 2.], &device)?;
        let second = NormalDiagCov::from_mean_precision(&mean, &precision, 2.0)?;

        let data = Tensor::new(&[[0.5f32, 1.], [2., -2.]], &device)?;
        let singles: Vec<Vec<f32>> = vec![
            first
                .expected_log_likelihood(&first.sufficient_statistics(&data)?, None)?
                .to_vec1()?,
            second
                .expected_log_likelihood(&second.sufficient_statistics(&data)?, None)?
                .to_vec1()?,
        ];

        let set = NormalDiagCovSet::new(vec![first, second]);
        let matrix = set
            .expected_log_likelihood(&set.sufficient_statistics(&data)?, None)?
            .to_vec2::<f32>()?;

        for n in 0..2 {
            for k in 0..2 {
                assert_relative_eq!(matrix[n][k], singles[k][n], epsilon = 1e-5);
            }
        }
        Ok(())
    }
}
