use std::fmt;

pub mod error;
pub mod util;

pub mod bdsim;
pub mod gmad;
pub mod madx;
pub mod optics;
pub mod ptc;

pub use error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// MAD-X `ptc_start` particle list shared by every backend.
    PtcInrays,
    /// PTC `trackone` TFS table.
    TrackOne,
    BdsimAscii,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::PtcInrays => write!(f, "PTC inrays"),
            Format::TrackOne => write!(f, "PTC trackone"),
            Format::BdsimAscii => write!(f, "BDSIM ASCII"),
        }
    }
}
