use crate::io::{error::Error, util::format_exact};
use crate::model::distribution::ParticleDistribution;
use std::io::Write;

/// Writes the shared particle file as MAD-X `ptc_start` commands.
pub fn write<W: Write>(mut writer: W, distribution: &ParticleDistribution) -> Result<(), Error> {
    for particle in distribution.iter() {
        writeln!(
            writer,
            "ptc_start, x={}, px={}, y={}, py={}, t={}, pt={};",
            format_exact(particle.x),
            format_exact(particle.px),
            format_exact(particle.y),
            format_exact(particle.py),
            format_exact(particle.t),
            format_exact(particle.pt),
        )?;
    }
    writer.flush()?;
    Ok(())
}
