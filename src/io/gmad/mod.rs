//! BDSIM GMAD lattice input.

pub mod writer;

pub use writer::write;
