use crate::io::error::Error;
use crate::model::beamline::{Beamline, SamplerPlacement};
use crate::model::element::ElementKind;
use std::io::Write;

const SEQUENCE: &str = "lattice";
const TRACK_FILE: &str = "track";
const PTC_LAYOUT: &str = "model=2, method=6, nst=10, exact=true";

fn element_keyword(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Drift => "drift",
        ElementKind::Quadrupole => "quadrupole",
        ElementKind::Sextupole => "sextupole",
        ElementKind::Sbend => "sbend",
        ElementKind::Rbend => "rbend",
    }
}

fn write_parameter<W: Write>(writer: &mut W, name: &str, value: f64) -> Result<(), Error> {
    match name {
        "aperture" => write!(writer, ", apertype=circle, aperture={{{}}}", value)?,
        other => write!(writer, ", {}={}", other, value)?,
    }
    Ok(())
}

pub fn write<W: Write>(mut writer: W, beamline: &Beamline) -> Result<(), Error> {
    let name = beamline.element_name();
    let marker = beamline.marker.as_str();
    let length = beamline.length();

    writeln!(
        writer,
        "beam, particle={}, energy={};",
        beamline.beam.particle.madx_name(),
        beamline.beam.energy
    )?;
    writeln!(writer)?;

    write!(
        writer,
        "{}: {}, l={}",
        name,
        element_keyword(beamline.element.kind()),
        length
    )?;
    for (key, value) in beamline.element.strengths() {
        write!(writer, ", {}={}", key, value)?;
    }
    for (key, value) in &beamline.parameters {
        write_parameter(&mut writer, key, *value)?;
    }
    writeln!(writer, ";")?;
    writeln!(writer, "{}: marker;", marker)?;
    writeln!(writer)?;

    writeln!(writer, "{}: sequence, refer=entry, l={};", SEQUENCE, length)?;
    writeln!(writer, "{}, at=0;", name)?;
    writeln!(writer, "{}, at={};", marker, length)?;
    writeln!(writer, "endsequence;")?;
    writeln!(writer)?;
    writeln!(writer, "use, sequence={};", SEQUENCE)?;
    writeln!(writer)?;

    writeln!(writer, "ptc_create_universe;")?;
    writeln!(writer, "ptc_create_layout, {};", PTC_LAYOUT)?;
    writeln!(writer, "call, file=\"{}\";", beamline.distribution_file)?;
    match &beamline.sampler {
        SamplerPlacement::Marker(at) => {
            writeln!(writer, "ptc_observe, place={};", at)?;
            writeln!(
                writer,
                "ptc_track, icase=6, dump, onetable, file=\"{}\";",
                TRACK_FILE
            )?;
        }
        SamplerPlacement::All => {
            writeln!(
                writer,
                "ptc_track, icase=6, element_by_element, dump, onetable, file=\"{}\";",
                TRACK_FILE
            )?;
        }
    }
    writeln!(writer, "ptc_track_end;")?;
    writeln!(writer, "ptc_end;")?;
    writeln!(writer, "stop;")?;

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::beam::{Beam, Particle};
    use crate::model::beamline::END_MARKER;
    use crate::model::element::Element;
    use std::collections::BTreeMap;

    fn render(element: Element, sampler: SamplerPlacement) -> String {
        let beamline = Beamline {
            beam: Beam::new(Particle::Proton, 7000.0),
            distribution_file: "inrays.madx".to_string(),
            element,
            parameters: BTreeMap::from([("aperture".to_string(), 0.05)]),
            marker: END_MARKER.to_string(),
            sampler,
        };
        let mut buffer = Vec::new();
        write(&mut buffer, &beamline).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn sequence_places_element_and_marker() {
        let text = render(
            Element::Sextupole { length: 0.25, k2: 3.0 },
            SamplerPlacement::All,
        );

        assert!(text.starts_with("beam, particle=proton, energy=7000;\n"));
        assert!(text.contains(
            "s1: sextupole, l=0.25, k2=3, apertype=circle, aperture={0.05};\n"
        ));
        assert!(text.contains("lattice: sequence, refer=entry, l=0.25;\n"));
        assert!(text.contains("s1, at=0;\ntheend, at=0.25;\nendsequence;\n"));
        assert!(text.contains("call, file=\"inrays.madx\";\n"));
        assert!(text.contains("element_by_element"));
        assert!(!text.contains("ptc_observe"));
        assert!(text.ends_with("ptc_track_end;\nptc_end;\nstop;\n"));
    }

    #[test]
    fn marker_sampler_adds_observation_point() {
        let text = render(
            Element::Drift { length: 1.0 },
            SamplerPlacement::Marker(END_MARKER.to_string()),
        );

        assert!(text.contains("ptc_observe, place=theend;\n"));
        assert!(!text.contains("element_by_element"));
    }
}
