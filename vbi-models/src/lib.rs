//! Conjugate exponential-family models for the variational Bayes engine.
//!
//! The families in [`expfamily`] do natural-parameter arithmetic; the
//! model types ([`normal`], [`mixture`]) implement
//! `vbi_core::BayesianModel` on top of them. A mixture composes a
//! component set through the same trait as any single distribution.

pub mod expfamily;
pub mod mixture;
pub mod normal;

pub use mixture::Mixture;
pub use normal::{NormalDiagCov, NormalDiagCovSet};
