use crate::io::{
    Format,
    error::Error,
    util::{METRES_TO_MICRONS, parse_real},
};
use crate::model::distribution::{InitialCoordinates, ParticleDistribution};
use crate::model::table::PhaseSpaceRow;
use std::io::BufRead;

/// Reads a `ptc_start` particle file back into memory.
pub fn read_inrays<R: BufRead>(reader: R) -> Result<ParticleDistribution, Error> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let content = line?;
        let ln = i + 1;
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.starts_with('!') || trimmed.starts_with("//") {
            continue;
        }

        let body = trimmed.trim_end_matches(';');
        let mut fields = body.split(',');
        let command = fields.next().unwrap_or_default().trim();
        if !command.eq_ignore_ascii_case("ptc_start") {
            return Err(Error::parse(
                Format::PtcInrays,
                ln,
                format!("unexpected command '{command}'"),
            ));
        }

        let mut particle = InitialCoordinates::default();
        for field in fields {
            let (key, value) = field.split_once('=').ok_or_else(|| {
                Error::parse(Format::PtcInrays, ln, "expected key=value after ptc_start")
            })?;
            let key = key.trim().to_lowercase();
            let value = parse_real(value, Format::PtcInrays, ln, &key)?;
            match key.as_str() {
                "x" => particle.x = value,
                "px" => particle.px = value,
                "y" => particle.y = value,
                "py" => particle.py = value,
                "t" => particle.t = value,
                "pt" => particle.pt = value,
                _ => {
                    return Err(Error::parse(
                        Format::PtcInrays,
                        ln,
                        format!("unknown coordinate '{key}'"),
                    ));
                }
            }
        }
        rows.push(particle);
    }
    Ok(ParticleDistribution::new(rows))
}

/// One observation point of a `trackone` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    pub name: String,
    pub rows: Vec<PhaseSpaceRow>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackOne {
    pub segments: Vec<Segment>,
}

impl TrackOne {
    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }
}

struct Columns {
    count: usize,
    x: usize,
    px: usize,
    y: usize,
    py: usize,
}

/// Reads a PTC `trackone` TFS table, converting positions from m to µm.
pub fn read_trackone<R: BufRead>(reader: R) -> Result<TrackOne, Error> {
    let mut columns: Option<Columns> = None;
    let mut segments: Vec<Segment> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let content = line?;
        let ln = i + 1;
        let trimmed = content.trim();

        if trimmed.is_empty() || trimmed.starts_with('@') || trimmed.starts_with('$') {
            continue;
        }

        if let Some(names) = trimmed.strip_prefix('*') {
            columns = Some(parse_columns(names)?);
            continue;
        }

        if trimmed.starts_with("#segment") {
            let tokens: Vec<_> = trimmed.split_whitespace().collect();
            let name = if tokens.len() >= 6 { tokens[5] } else { "" };
            segments.push(Segment {
                name: name.to_string(),
                rows: Vec::new(),
            });
            continue;
        }

        let cols = columns.as_ref().ok_or(Error::MissingHeader(Format::TrackOne))?;
        let tokens: Vec<_> = trimmed.split_whitespace().collect();
        if tokens.len() < cols.count {
            return Err(Error::parse(
                Format::TrackOne,
                ln,
                format!("expected {} columns, found {}", cols.count, tokens.len()),
            ));
        }

        let x = parse_real(tokens[cols.x], Format::TrackOne, ln, "X")?;
        let px = parse_real(tokens[cols.px], Format::TrackOne, ln, "PX")?;
        let y = parse_real(tokens[cols.y], Format::TrackOne, ln, "Y")?;
        let py = parse_real(tokens[cols.py], Format::TrackOne, ln, "PY")?;

        if segments.is_empty() {
            segments.push(Segment::default());
        }
        if let Some(segment) = segments.last_mut() {
            segment.rows.push(PhaseSpaceRow::new(
                x * METRES_TO_MICRONS,
                y * METRES_TO_MICRONS,
                px,
                py,
            ));
        }
    }

    Ok(TrackOne { segments })
}

fn parse_columns(names: &str) -> Result<Columns, Error> {
    let names: Vec<String> = names.split_whitespace().map(str::to_uppercase).collect();
    let find = |column: &'static str| {
        names
            .iter()
            .position(|n| n == column)
            .ok_or(Error::MissingColumn {
                format: Format::TrackOne,
                column,
            })
    };
    Ok(Columns {
        count: names.len(),
        x: find("X")?,
        px: find("PX")?,
        y: find("Y")?,
        py: find("PY")?,
    })
}
