use crate::io::{error::Error, util::format_exact};
use crate::model::optics::{Optics, Plane};
use std::io::Write;

const HEADER: &str = "plane emittance_before[m*rad] emittance_after[m*rad] ratio";

pub fn write<W: Write>(mut writer: W, backend: &str, optics: &Optics) -> Result<(), Error> {
    writeln!(writer, "# rms emittance from {} primaries and sampler output", backend)?;
    writeln!(writer, "{}", HEADER)?;
    for plane in [Plane::Horizontal, Plane::Vertical] {
        let pair = optics.plane(plane);
        let ratio = pair
            .ratio()
            .map(format_exact)
            .unwrap_or_else(|| "nan".to_string());
        writeln!(
            writer,
            "{} {} {} {}",
            plane,
            format_exact(pair.before),
            format_exact(pair.after),
            ratio
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::optics::EmittancePair;

    #[test]
    fn writes_one_row_per_plane() {
        let optics = Optics {
            horizontal: EmittancePair {
                before: 1e-10,
                after: 2e-10,
            },
            vertical: EmittancePair {
                before: 0.0,
                after: 1e-10,
            },
        };

        let mut buffer = Vec::new();
        write(&mut buffer, "bdsim", &optics).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], HEADER);
        assert_eq!(lines[2], "x 1e-10 2e-10 2e0");
        assert_eq!(lines[3], "y 0e0 1e-10 nan");
    }
}
