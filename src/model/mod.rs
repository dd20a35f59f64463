//! Core data structures that flow through the test pipeline.
//!
//! - [`beam`] – Particle species and reference energy.
//! - [`element`] – The single optical element under test, as a closed variant.
//! - [`distribution`] – Distribution parameters and the sampled initial particles.
//! - [`beamline`] – Backend-neutral lattice description consumed by the writers.
//! - [`table`] – Canonical phase-space tables and per-backend simulation output.
//! - [`optics`] – Emittance before and after the element.
//!
//! Inputs ([`ParticleDistribution`], in MAD-X units) and outputs
//! ([`PhaseSpaceTable`], in µm and rad) are kept as separate types so that unit
//! normalisation happens exactly once, inside the readers.
//!
//! [`ParticleDistribution`]: distribution::ParticleDistribution
//! [`PhaseSpaceTable`]: table::PhaseSpaceTable

pub mod beam;
pub mod beamline;
pub mod distribution;
pub mod element;
pub mod optics;
pub mod table;
