//! Natural-parameter arithmetic for the conjugate exponential families
//! backing the models in this crate.
//!
//! Functions operate on flat `f32` natural-hyperparameter tensors and do
//! their scalar math in `f64` on the CPU; these vectors are tiny compared
//! to the data tensors. Conjugate updating is plain addition in these
//! coordinates, and `kl_div` uses the exponential-family bracket
//! `(η_q − η_p)·E_q[T] − A(η_q) + A(η_p)` throughout.

/// Joint Normal-Gamma family over per-dimension (mean, precision) pairs,
/// conjugate to a diagonal-covariance Normal likelihood.
///
/// Natural layout `[η_a | η_b | η_c | η_d]`, each block of length `d`,
/// pairing the per-example data statistics `[x², x, 1, 1]`. In standard
/// terms (mean `m`, scale `β`, shape `a`, rate `b`):
/// `η_a = 2b + βm²`, `η_b = βm`, `η_c = β`, `η_d = 2a − 1`.
pub mod normal_gamma {
    use candle_core::{Result, Tensor};
    use special::Gamma;

    const HALF_LN_2PI: f64 = 0.9189385332046727;

    /// Standard parameters of one dimension of a Normal-Gamma.
    #[derive(Debug, Clone, Copy)]
    pub struct StdParams {
        pub mean: f64,
        pub scale: f64,
        pub shape: f64,
        pub rate: f64,
    }

    /// Natural hyperparameters centered on `mean` with expected precision
    /// `precision` and a strength of `prior_count` pseudo-observations
    /// (`β = a = prior_count`, `b = prior_count / precision`).
    pub fn natural_hparams(
        mean: &Tensor,
        precision: &Tensor,
        prior_count: f64,
    ) -> Result<Tensor> {
        if mean.dims() != precision.dims() {
            candle_core::bail!(
                "mean {:?} and precision {:?} must have the same shape",
                mean.dims(),
                precision.dims()
            );
        }
        let device = mean.device().clone();
        let mean = mean.to_vec1::<f32>()?;
        let precision = precision.to_vec1::<f32>()?;
        let d = mean.len();

        let mut nh = vec![0f32; 4 * d];
        for i in 0..d {
            let m = mean[i] as f64;
            let beta = prior_count;
            let a = prior_count;
            let b = prior_count / precision[i] as f64;
            nh[i] = (2. * b + beta * m * m) as f32;
            nh[d + i] = (beta * m) as f32;
            nh[2 * d + i] = beta as f32;
            nh[3 * d + i] = (2. * a - 1.) as f32;
        }
        Tensor::from_vec(nh, (4 * d,), &device)
    }

    /// Map natural hyperparameters back to per-dimension standard
    /// parameters. Only valid on the conjugate region (`β > 0`, `a > 0`,
    /// `b > 0`); the optimizer applies no projection, so leaving it is a
    /// caller error.
    pub fn std_params(nh: &Tensor) -> Result<Vec<StdParams>> {
        let v = nh.to_vec1::<f32>()?;
        if v.len() % 4 != 0 {
            candle_core::bail!(
                "Normal-Gamma natural hyperparameters must have length 4d, got {}",
                v.len()
            );
        }
        let d = v.len() / 4;
        let mut out = Vec::with_capacity(d);
        for i in 0..d {
            let eta_a = v[i] as f64;
            let eta_b = v[d + i] as f64;
            let beta = v[2 * d + i] as f64;
            let eta_d = v[3 * d + i] as f64;
            out.push(StdParams {
                mean: eta_b / beta,
                scale: beta,
                shape: (eta_d + 1.) / 2.,
                rate: (eta_a - eta_b * eta_b / beta) / 2.,
            });
        }
        Ok(out)
    }

    /// Log-normalizer `A(η) = Σ_d ln Γ(a) − a ln b − ½ ln β + ½ ln 2π`.
    pub fn log_norm(nh: &Tensor) -> Result<f64> {
        let mut total = 0f64;
        for p in std_params(nh)? {
            total += Gamma::ln_gamma(p.shape).0 - p.shape * p.rate.ln() - 0.5 * p.scale.ln()
                + HALF_LN_2PI;
        }
        Ok(total)
    }

    /// Expected sufficient statistics `∇A(η)`, laid out to pair with the
    /// data statistics `[x², x, 1, 1]`:
    /// `[−a/2b, m·a/b, −(1/β + m²·a/b)/2, (ψ(a) − ln b)/2]` per dimension.
    pub fn expected_stats(nh: &Tensor) -> Result<Tensor> {
        let std = std_params(nh)?;
        let d = std.len();
        let mut es = vec![0f32; 4 * d];
        for (i, p) in std.iter().enumerate() {
            let exp_prec = p.shape / p.rate;
            es[i] = (-exp_prec / 2.) as f32;
            es[d + i] = (p.mean * exp_prec) as f32;
            es[2 * d + i] = (-(1. / p.scale + p.mean * p.mean * exp_prec) / 2.) as f32;
            es[3 * d + i] = ((p.shape.digamma() - p.rate.ln()) / 2.) as f32;
        }
        Tensor::from_vec(es, (4 * d,), nh.device())
    }

    /// `KL(q ‖ p)` between two Normal-Gamma distributions given by their
    /// natural hyperparameters.
    pub fn kl_div(nh_q: &Tensor, nh_p: &Tensor) -> Result<f64> {
        let q = nh_q.to_vec1::<f32>()?;
        let p = nh_p.to_vec1::<f32>()?;
        if q.len() != p.len() {
            candle_core::bail!(
                "KL divergence between Normal-Gammas of different sizes ({} vs {})",
                q.len(),
                p.len()
            );
        }
        let expected = expected_stats(nh_q)?.to_vec1::<f32>()?;
        let mut kl = 0f64;
        for i in 0..q.len() {
            kl += (q[i] as f64 - p[i] as f64) * expected[i] as f64;
        }
        Ok(kl - log_norm(nh_q)? + log_norm(nh_p)?)
    }

}

/// Dirichlet family over mixture weights, conjugate to the categorical
/// component-indicator likelihood. Natural parameters `η = α − 1`; the
/// conjugate statistic accumulated from data is the per-component
/// responsibility count.
pub mod dirichlet {
    use candle_core::{Result, Tensor};
    use special::Gamma;

    /// Natural hyperparameters from concentrations: `η = α − 1`.
    pub fn natural_hparams(concentrations: &Tensor) -> Result<Tensor> {
        concentrations.affine(1.0, -1.0)
    }

    fn alphas(nh: &Tensor) -> Result<Vec<f64>> {
        Ok(nh
            .to_vec1::<f32>()?
            .iter()
            .map(|&eta| eta as f64 + 1.)
            .collect())
    }

    /// Log-normalizer `A(η) = Σ ln Γ(αᵢ) − ln Γ(Σ αᵢ)`.
    pub fn log_norm(nh: &Tensor) -> Result<f64> {
        let alphas = alphas(nh)?;
        let total: f64 = alphas.iter().sum();
        let per_comp: f64 = alphas.iter().map(|&a| Gamma::ln_gamma(a).0).sum();
        Ok(per_comp - Gamma::ln_gamma(total).0)
    }

    /// Expected log-weights `E[ln πᵢ] = ψ(αᵢ) − ψ(Σ αᵢ)`.
    pub fn expected_log_weights(nh: &Tensor) -> Result<Tensor> {
        let alphas = alphas(nh)?;
        let total: f64 = alphas.iter().sum();
        let digamma_total = total.digamma();
        let ew: Vec<f32> = alphas
            .iter()
            .map(|&a| (a.digamma() - digamma_total) as f32)
            .collect();
        Tensor::from_vec(ew, (alphas.len(),), nh.device())
    }

    /// `KL(q ‖ p)` between two Dirichlets given by natural hyperparameters.
    pub fn kl_div(nh_q: &Tensor, nh_p: &Tensor) -> Result<f64> {
        let q = nh_q.to_vec1::<f32>()?;
        let p = nh_p.to_vec1::<f32>()?;
        if q.len() != p.len() {
            candle_core::bail!(
                "KL divergence between Dirichlets of different sizes ({} vs {})",
                q.len(),
                p.len()
            );
        }
        let expected = expected_log_weights(nh_q)?.to_vec1::<f32>()?;
        let mut kl = 0f64;
        for i in 0..q.len() {
            kl += (q[i] as f64 - p[i] as f64) * expected[i] as f64;
        }
        Ok(kl - log_norm(nh_q)? + log_norm(nh_p)?)
    }

}
