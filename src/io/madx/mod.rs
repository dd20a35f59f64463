//! MAD-X lattice input driving a PTC tracking run.

pub mod writer;

pub use writer::write;
