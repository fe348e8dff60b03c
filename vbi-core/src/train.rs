use crate::elbo::EvidenceLowerBound;
use crate::model::BayesianModel;
use crate::optim::VariationalOptimizer;
use candle_core::Tensor;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mini-batch training configuration.
///
/// Shuffling is driven by the explicit `seed`; there is no ambient RNG
/// state, so two runs with the same seed visit the same batches.
pub struct TrainConfig {
    pub batch_size: usize,
    pub num_epochs: usize,
    pub seed: u64,
    pub show_progress: bool,
    pub verbose: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_epochs: 10,
            seed: 42,
            show_progress: false,
            verbose: false,
        }
    }
}

/// Variational training loop.
///
/// Per epoch: shuffle the example indices, slice mini-batches, and for each
/// batch run zero_grad → ELBO → natural backward → standard backward →
/// step. Works with either optimizer flavor through
/// [`VariationalOptimizer`].
///
/// * `data` - full training set, one example per row
/// * returns the per-batch ELBO trace
pub fn train<M, O>(
    model: &M,
    optimizer: &mut O,
    elbo_fn: &EvidenceLowerBound,
    data: &Tensor,
    config: &TrainConfig,
) -> anyhow::Result<Vec<f32>>
where
    M: BayesianModel,
    O: VariationalOptimizer,
{
    let num_examples = data.dim(0)?;
    anyhow::ensure!(config.batch_size > 0, "batch_size must be positive");
    anyhow::ensure!(num_examples > 0, "cannot train on an empty data set");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut indices: Vec<u32> = (0..num_examples as u32).collect();

    let pb = ProgressBar::new(config.num_epochs as u64);
    if !config.show_progress || config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut elbo_trace = vec![];

    for epoch in 0..config.num_epochs {
        indices.shuffle(&mut rng);

        let mut epoch_elbo = 0f32;
        let mut num_batches = 0usize;
        for batch_indices in indices.chunks(config.batch_size) {
            let ids = Tensor::from_slice(batch_indices, (batch_indices.len(),), data.device())?;
            let batch = data.index_select(&ids, 0)?;

            optimizer.zero_grad()?;
            let elbo = elbo_fn.compute(model, &batch, None)?;
            elbo.natural_backward()?;
            let grads = elbo.backward()?;
            optimizer.step(Some(&grads))?;

            let value = elbo.value_scalar()?;
            elbo_trace.push(value);
            epoch_elbo += value;
            num_batches += 1;
        }

        if config.verbose {
            info!(
                "epoch {:4}: avg ELBO = {:10.4}",
                epoch,
                epoch_elbo / num_batches as f32
            );
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(elbo_trace)
}
