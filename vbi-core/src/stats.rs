use crate::param::ParamId;
use candle_core::{Result, Tensor};
use std::collections::HashMap;

/// Accumulated sufficient statistics, keyed by parameter identity.
///
/// Values live in the conjugate-update coordinate system: adding
/// `scale * statistic` to a prior's natural hyperparameters yields the
/// closed-form posterior target for that parameter.
pub type AccStats = HashMap<ParamId, Tensor>;

/// Key-wise sum of two accumulated-statistics mappings.
///
/// Keys present in only one input are carried over unchanged; keys present
/// in both are summed elementwise. Neither input is mutated. A shape or
/// dtype mismatch between two entries surfaces as the tensor addition
/// error, signalling a broken `accumulate` implementation.
pub fn add_acc_stats(lhs: &AccStats, rhs: &AccStats) -> Result<AccStats> {
    let mut merged = lhs.clone();
    for (key, stat) in rhs {
        let summed = match merged.get(key) {
            Some(existing) => (existing + stat)?,
            None => stat.clone(),
        };
        merged.insert(*key, summed);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::BayesianParameter;
    use candle_core::Device;

    fn make_param(device: &Device, dim: usize) -> Result<BayesianParameter> {
        let zeros = Tensor::zeros((dim,), candle_core::DType::F32, device)?;
        BayesianParameter::new(zeros.clone(), zeros)
    }

    fn assert_same(lhs: &AccStats, rhs: &AccStats) -> Result<()> {
        assert_eq!(lhs.len(), rhs.len());
        for (key, stat) in lhs {
            let other = rhs.get(key).expect("missing key");
            assert_eq!(stat.to_vec1::<f32>()?, other.to_vec1::<f32>()?);
        }
        Ok(())
    }

    #[test]
    fn test_merge_commutes() -> Result<()> {
        let device = Device::Cpu;
        let p1 = make_param(&device, 2)?;
        let p2 = make_param(&device, 2)?;
        let p3 = make_param(&device, 3)?;

        let mut lhs = AccStats::new();
        lhs.insert(p1.id(), Tensor::new(&[1f32, 2.], &device)?);
        lhs.insert(p2.id(), Tensor::new(&[0.5f32, -1.], &device)?);

        let mut rhs = AccStats::new();
        rhs.insert(p2.id(), Tensor::new(&[1f32, 1.], &device)?);
        rhs.insert(p3.id(), Tensor::new(&[9f32, 8., 7.], &device)?);

        let ab = add_acc_stats(&lhs, &rhs)?;
        let ba = add_acc_stats(&rhs, &lhs)?;
        assert_same(&ab, &ba)?;

        assert_eq!(
            ab.get(&p2.id()).unwrap().to_vec1::<f32>()?,
            vec![1.5, 0.]
        );
        assert_eq!(ab.get(&p1.id()).unwrap().to_vec1::<f32>()?, vec![1., 2.]);
        assert_eq!(
            ab.get(&p3.id()).unwrap().to_vec1::<f32>()?,
            vec![9., 8., 7.]
        );
        Ok(())
    }

    #[test]
    fn test_merge_with_empty_is_identity() -> Result<()> {
        let device = Device::Cpu;
        let p1 = make_param(&device, 2)?;
        let mut lhs = AccStats::new();
        lhs.insert(p1.id(), Tensor::new(&[1f32, 2.], &device)?);

        let merged = add_acc_stats(&lhs, &AccStats::new())?;
        assert_same(&merged, &lhs)?;
        let merged = add_acc_stats(&AccStats::new(), &lhs)?;
        assert_same(&merged, &lhs)?;
        Ok(())
    }

    #[test]
    fn test_merge_shape_mismatch_propagates() -> Result<()> {
        let device = Device::Cpu;
        let p1 = make_param(&device, 2)?;

        let mut lhs = AccStats::new();
        lhs.insert(p1.id(), Tensor::new(&[1f32, 2.], &device)?);
        let mut rhs = AccStats::new();
        rhs.insert(p1.id(), Tensor::new(&[1f32, 2., 3.], &device)?);

        assert!(add_acc_stats(&lhs, &rhs).is_err());
        Ok(())
    }
}
