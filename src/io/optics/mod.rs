//! Plain-text emittance summary written next to a backend's output.

pub mod writer;

pub use writer::write;
