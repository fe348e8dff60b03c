//! Phone-level utilities for speech-recognition experiments: phoneme
//! dictionaries, plain-text transcriptions, alignment post-processing and
//! DTW scoring.
//!
//! File formats are whitespace-separated text: two-column phone maps, one
//! phone per line inventories, and `uttid phone phone ...` transcription
//! lines.

pub mod align;
pub mod phones;
pub mod score;
pub mod transcript;
