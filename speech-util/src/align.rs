use crate::phones::PhoneInventory;
use anyhow::{Context, Result};

/// Collapse a frame-level state path into its phone sequence.
///
/// A phone is emitted whenever the path leaves that phone's final emission
/// state; the phone of the last frame is always emitted.
pub fn states_to_phones(states: &[usize], inventory: &PhoneInventory) -> Result<Vec<String>> {
    anyhow::ensure!(!states.is_empty(), "empty state path");

    let phone_of = |state: usize| -> Result<&str> {
        inventory
            .state_phone(state)
            .with_context(|| format!("state {state} outside the phone inventory"))
    };

    let mut phones = vec![];
    for window in states.windows(2) {
        let (current, next) = (window[0], window[1]);
        if current != next && inventory.is_final_state(current) {
            phones.push(phone_of(current)?.to_string());
        }
    }
    phones.push(phone_of(states[states.len() - 1])?.to_string());
    Ok(phones)
}

/// Average per-frame log-likelihoods into per-phone scores along a state
/// path.
///
/// Serves both alignment scoring and smoothing hypothesis likelihoods with
/// a reference alignment; the path decides the phone boundaries either
/// way. Fails if the path and the likelihood sequence disagree in length.
pub fn phone_average_llhs(
    frame_llhs: &[f32],
    states: &[usize],
    inventory: &PhoneInventory,
) -> Result<Vec<f32>> {
    anyhow::ensure!(
        frame_llhs.len() == states.len(),
        "state path length {} does not match the log-likelihoods ({})",
        states.len(),
        frame_llhs.len()
    );
    anyhow::ensure!(!states.is_empty(), "empty state path");

    let mut phone_llhs = vec![];
    let mut llh_sum = 0f32;
    let mut frame_count = 0usize;
    for i in 0..states.len() - 1 {
        llh_sum += frame_llhs[i];
        frame_count += 1;
        if states[i] != states[i + 1] && inventory.is_final_state(states[i]) {
            phone_llhs.push(llh_sum / frame_count as f32);
            llh_sum = 0.;
            frame_count = 0;
        }
    }
    phone_llhs.push((llh_sum + frame_llhs[frame_llhs.len() - 1]) / (frame_count + 1) as f32);
    Ok(phone_llhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inventory() -> PhoneInventory {
        let phones: Vec<String> = ["aa", "b"].iter().map(|s| s.to_string()).collect();
        PhoneInventory::new(phones, 2).unwrap()
    }

    #[test]
    fn test_states_to_phones() -> Result<()> {
        // aa: states 0-1, b: states 2-3. Path crosses aa fully, then b.
        let states = [0, 0, 1, 2, 3, 3];
        let phones = states_to_phones(&states, &inventory())?;
        assert_eq!(phones, vec!["aa", "b"]);
        Ok(())
    }

    #[test]
    fn test_non_final_transition_not_emitted() -> Result<()> {
        // Leaving state 0 (non-final) emits nothing; only the last frame's
        // phone shows up.
        let states = [0, 2, 2];
        let phones = states_to_phones(&states, &inventory())?;
        assert_eq!(phones, vec!["b"]);
        Ok(())
    }

    #[test]
    fn test_out_of_range_state_rejected() {
        let states = [0, 9];
        assert!(states_to_phones(&states, &inventory()).is_err());
    }

    #[test]
    fn test_phone_average_llhs() -> Result<()> {
        let states = [0, 1, 2, 3];
        let llhs = [-1.0f32, -3., -2., -4.];
        let averaged = phone_average_llhs(&llhs, &states, &inventory())?;
        assert_eq!(averaged.len(), 2);
        assert_relative_eq!(averaged[0], -2.0); // (-1 - 3) / 2
        assert_relative_eq!(averaged[1], -3.0); // (-2 - 4) / 2
        Ok(())
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let states = [0, 1];
        let llhs = [-1.0f32];
        assert!(phone_average_llhs(&llhs, &states, &inventory()).is_err());
    }
}
