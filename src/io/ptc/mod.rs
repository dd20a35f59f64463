//! MAD-X/PTC formats: the shared `ptc_start` particle file and the
//! `trackone` observation table.

pub mod reader;
pub mod writer;

pub use reader::{Segment, TrackOne, read_inrays, read_trackone};
pub use writer::write as write_inrays;
