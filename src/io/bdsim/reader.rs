use crate::io::{
    Format,
    error::Error,
    util::{angle_scale, parse_real, position_scale, split_unit},
};
use crate::model::table::{PhaseSpaceRow, PhaseSpaceTable};
use std::io::BufRead;

#[derive(Debug, Clone, Copy)]
struct Column {
    index: usize,
    scale: f64,
}

struct Layout {
    count: usize,
    x: Column,
    y: Column,
    xp: Column,
    yp: Column,
}

impl Layout {
    fn from_header(line: &str, ln: usize) -> Result<Self, Error> {
        let tokens: Vec<(String, Option<String>)> = line
            .split_whitespace()
            .map(|token| {
                let (name, unit) = split_unit(token);
                (name.to_lowercase(), unit.map(str::to_string))
            })
            .collect();

        let find = |column: &'static str, position: bool| -> Result<Column, Error> {
            let index = tokens
                .iter()
                .position(|(name, _)| name == column)
                .ok_or(Error::MissingColumn {
                    format: Format::BdsimAscii,
                    column,
                })?;
            let unit = tokens[index].1.as_deref();
            let scale = if position {
                position_scale(unit)
            } else {
                angle_scale(unit)
            };
            let scale = scale.ok_or_else(|| {
                Error::parse(
                    Format::BdsimAscii,
                    ln,
                    format!("unsupported unit '{}' for column '{column}'", unit.unwrap_or("")),
                )
            })?;
            Ok(Column { index, scale })
        };

        Ok(Self {
            count: tokens.len(),
            x: find("x", true)?,
            y: find("y", true)?,
            xp: find("xp", false)?,
            yp: find("yp", false)?,
        })
    }

    fn value(&self, tokens: &[&str], column: Column, ln: usize, what: &str) -> Result<f64, Error> {
        Ok(parse_real(tokens[column.index], Format::BdsimAscii, ln, what)? * column.scale)
    }
}

fn starts_numeric(line: &str) -> bool {
    line.chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

/// Reads a BDSIM ASCII sampler file into canonical units.
///
/// Comment lines start with `#`. The first non-numeric line names the
/// columns; units in brackets (`x[m]`, `Xp[rad]`) are converted to µm and rad.
pub fn read<R: BufRead>(reader: R) -> Result<PhaseSpaceTable, Error> {
    let mut layout: Option<Layout> = None;
    let mut rows = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let content = line?;
        let ln = i + 1;
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(columns) = layout.as_ref() else {
            if starts_numeric(trimmed) {
                return Err(Error::MissingHeader(Format::BdsimAscii));
            }
            layout = Some(Layout::from_header(trimmed, ln)?);
            continue;
        };

        let tokens: Vec<_> = trimmed.split_whitespace().collect();
        if tokens.len() < columns.count {
            return Err(Error::parse(
                Format::BdsimAscii,
                ln,
                format!("expected {} columns, found {}", columns.count, tokens.len()),
            ));
        }

        rows.push(PhaseSpaceRow::new(
            columns.value(&tokens, columns.x, ln, "x")?,
            columns.value(&tokens, columns.y, ln, "y")?,
            columns.value(&tokens, columns.xp, ln, "xp")?,
            columns.value(&tokens, columns.yp, ln, "yp")?,
        ));
    }

    if layout.is_none() {
        return Err(Error::MissingHeader(Format::BdsimAscii));
    }
    Ok(PhaseSpaceTable::new(rows))
}
