use anyhow::{Context, Result};
use ndarray::Array2;
use std::collections::HashMap;

/// Minimum edit distance between reference and hypothesis sequences;
/// insertions, deletions and substitutions all cost one.
pub fn edit_distance<T: PartialEq>(reference: &[T], hypothesis: &[T]) -> usize {
    let mut table = Array2::<usize>::zeros((hypothesis.len() + 1, reference.len() + 1));
    for i in 0..=reference.len() {
        table[[0, i]] = i;
    }
    for j in 0..=hypothesis.len() {
        table[[j, 0]] = j;
    }
    for i in 1..=reference.len() {
        for j in 1..=hypothesis.len() {
            let ins = table[[j - 1, i]] + 1;
            let del = table[[j, i - 1]] + 1;
            let sub = table[[j - 1, i - 1]] + usize::from(reference[i - 1] != hypothesis[j - 1]);
            table[[j, i]] = ins.min(del).min(sub);
        }
    }
    table[[hypothesis.len(), reference.len()]]
}

/// Corpus-level error rate: total edit distance over all utterances
/// divided by the total reference length. Every reference utterance must
/// have a hypothesis.
pub fn error_rate(
    refs: &HashMap<String, Vec<String>>,
    hyps: &HashMap<String, Vec<String>>,
) -> Result<f32> {
    let mut total_len = 0usize;
    let mut total_err = 0usize;
    for (utt, reference) in refs {
        let hypothesis = hyps
            .get(utt)
            .with_context(|| format!("no hypothesis for utterance {utt}"))?;
        total_err += edit_distance(reference, hypothesis);
        total_len += reference.len();
    }
    anyhow::ensure!(total_len > 0, "reference transcriptions are empty");
    Ok(total_err as f32 / total_len as f32)
}
