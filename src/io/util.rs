use super::{Format, error::Error};

pub const METRES_TO_MICRONS: f64 = 1e6;

/// Shortest exponent form that parses back to the identical `f64`.
///
/// Used for the shared particle file so every backend reads bit-identical
/// initial conditions.
pub fn format_exact(value: f64) -> String {
    format!("{value:e}")
}

pub fn parse_real(token: &str, format: Format, line: usize, what: &str) -> Result<f64, Error> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::parse(format, line, format!("invalid {what} value '{token}'")))
}

/// Splits a header token such as `x[m]` into its name and optional unit.
pub fn split_unit(token: &str) -> (&str, Option<&str>) {
    match token.find('[') {
        Some(open) if token.ends_with(']') => {
            let unit = &token[open + 1..token.len() - 1];
            (&token[..open], (!unit.is_empty()).then_some(unit))
        }
        _ => (token, None),
    }
}

/// Factor converting a position column to µm. Unitless columns are taken as µm.
pub fn position_scale(unit: Option<&str>) -> Option<f64> {
    match unit.map(str::to_lowercase).as_deref() {
        None | Some("um") | Some("mum") | Some("µm") | Some("micron") => Some(1.0),
        Some("m") => Some(METRES_TO_MICRONS),
        Some("cm") => Some(1e4),
        Some("mm") => Some(1e3),
        Some("nm") => Some(1e-3),
        _ => None,
    }
}

/// Factor converting an angle column to rad. Unitless columns are taken as rad.
pub fn angle_scale(unit: Option<&str>) -> Option<f64> {
    match unit.map(str::to_lowercase).as_deref() {
        None | Some("rad") => Some(1.0),
        Some("mrad") => Some(1e-3),
        Some("urad") | Some("murad") | Some("µrad") => Some(1e-6),
        _ => None,
    }
}
