use crate::io::error::Error;
use crate::model::beamline::{Beamline, SamplerPlacement};
use crate::model::element::ElementKind;
use std::io::Write;

const DISTRIBUTION_TYPE: &str = "ptc";

/// GMAD spelling of a free-form element parameter.
fn parameter_keyword(name: &str) -> &str {
    match name {
        "aperture" => "aper1",
        other => other,
    }
}

fn element_keyword(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Drift => "drift",
        ElementKind::Quadrupole => "quadrupole",
        ElementKind::Sextupole => "sextupole",
        ElementKind::Sbend => "sbend",
        ElementKind::Rbend => "rbend",
    }
}

pub fn write<W: Write>(mut writer: W, beamline: &Beamline) -> Result<(), Error> {
    let name = beamline.element_name();
    let marker = beamline.marker.as_str();

    writeln!(
        writer,
        "beam, particle=\"{}\", energy={}*GeV, distrType=\"{}\", distrFile=\"{}\";",
        beamline.beam.particle.gmad_name(),
        beamline.beam.energy,
        DISTRIBUTION_TYPE,
        beamline.distribution_file,
    )?;
    writeln!(writer)?;

    write!(
        writer,
        "{}: {}, l={}*m",
        name,
        element_keyword(beamline.element.kind()),
        beamline.length()
    )?;
    for (key, value) in beamline.element.strengths() {
        write!(writer, ", {}={}", key, value)?;
    }
    for (key, value) in &beamline.parameters {
        write!(writer, ", {}={}", parameter_keyword(key), value)?;
    }
    writeln!(writer, ";")?;
    writeln!(writer, "{}: marker;", marker)?;
    writeln!(writer)?;

    writeln!(writer, "lattice: line = ({}, {});", name, marker)?;
    writeln!(writer, "use, period=lattice;")?;

    match &beamline.sampler {
        SamplerPlacement::Marker(at) => writeln!(writer, "sample, range={};", at)?,
        SamplerPlacement::All => writeln!(writer, "sample, all;")?,
    }

    writer.flush()?;
    Ok(())
}
