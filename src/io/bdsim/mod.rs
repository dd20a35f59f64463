//! BDSIM ASCII sampler output.

pub mod reader;

pub use reader::read;
