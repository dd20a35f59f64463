use std::io::{self, Write};

use trackcheck::{BackendFailure, Pipeline, Plane, ProcessRecord, Report, Variable};

use crate::util::text::truncate;

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

pub fn print_case_summary(pipeline: &Pipeline) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let case = pipeline.case();
    let element = case.element();

    let mut rows = vec![
        ("Element", format!("{} ({})", case.kind(), element.name())),
        ("Length", format!("{} m", element.length())),
    ];
    for (name, value) in element.strengths() {
        rows.push((name, format!("{value}")));
    }
    rows.push((
        "Beam",
        format!("{} @ {} GeV", case.beam().particle, case.beam().energy),
    ));
    rows.push((
        "Distribution",
        format!(
            "{} × {} (seed {})",
            case.distribution().distribution.kind(),
            case.particle_count(),
            case.distribution().seed
        ),
    ));

    let ids: Vec<&str> = pipeline.backends().iter().map(|b| b.id()).collect();
    rows.push(("Backends", ids.join(", ")));
    rows.push(("Reference", pipeline.reference_id().to_string()));
    rows.push(("Working Dir", case.working_dir().display().to_string()));

    print_kv_table(&mut out, "Test Case", &rows);
}

pub fn print_executions(records: &[ProcessRecord]) {
    if records.is_empty() {
        return;
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.backend.clone(),
                r.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                format!("{:.1}s", r.duration.as_secs_f64()),
            ]
        })
        .collect();

    print_grid(
        &mut out,
        "Processes",
        &[
            Column::left("Backend", 16),
            Column::right("Exit", 8),
            Column::right("Time", 10),
        ],
        &rows,
    );
}

pub fn print_residuals(report: &Report) {
    if report.residuals.is_empty() {
        return;
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut rows = Vec::new();
    for set in &report.residuals {
        for variable in Variable::ALL {
            let summary = set.summary(variable);
            rows.push(vec![
                if variable == Variable::X {
                    set.candidate.clone()
                } else {
                    String::new()
                },
                variable.to_string(),
                format!("{:.2e}", summary.mean),
                format!("{:.2e}", summary.rms),
                format!("{:.2e}", summary.max_abs),
            ]);
        }
    }

    let title = format!("Fractional Residuals vs {}", report.reference);
    print_grid(
        &mut out,
        &title,
        &[
            Column::left("Candidate", 14),
            Column::left("Var", 3),
            Column::right("Mean", 9),
            Column::right("RMS", 9),
            Column::right("Max |r|", 9),
        ],
        &rows,
    );
}

pub fn print_optics(report: &Report) {
    if report.optics.is_empty() {
        return;
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut rows = Vec::new();
    for entry in &report.optics {
        for plane in [Plane::Horizontal, Plane::Vertical] {
            let pair = entry.optics.plane(plane);
            rows.push(vec![
                if plane == Plane::Horizontal {
                    entry.backend.clone()
                } else {
                    String::new()
                },
                plane.to_string(),
                format!("{:.3e}", pair.before),
                format!("{:.3e}", pair.after),
                pair.ratio()
                    .map(|r| format!("{r:.4}"))
                    .unwrap_or_else(|| "n/a".to_string()),
            ]);
        }
    }

    print_grid(
        &mut out,
        "RMS Emittance (m·rad)",
        &[
            Column::left("Backend", 12),
            Column::left("Pl", 2),
            Column::right("Before", 9),
            Column::right("After", 9),
            Column::right("Ratio", 8),
        ],
        &rows,
    );
}

pub fn print_failures(failures: &[BackendFailure]) {
    if failures.is_empty() {
        return;
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows: Vec<(&str, String)> = failures
        .iter()
        .map(|f| (f.backend.as_str(), f.message.clone()))
        .collect();

    print_kv_table(&mut out, "Failed Backends (report is partial)", &rows);
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

#[derive(Clone, Copy)]
struct Column<'a> {
    title: &'a str,
    width: usize,
    align: Align,
}

impl<'a> Column<'a> {
    fn left(title: &'a str, width: usize) -> Self {
        Self {
            title,
            width,
            align: Align::Left,
        }
    }

    fn right(title: &'a str, width: usize) -> Self {
        Self {
            title,
            width,
            align: Align::Right,
        }
    }

    fn cell(&self, text: &str) -> String {
        let text = truncate(text, self.width);
        match self.align {
            Align::Left => format!("{:<w$}", text, w = self.width),
            Align::Right => format!("{:>w$}", text, w = self.width),
        }
    }
}

fn print_grid(out: &mut impl Write, title: &str, columns: &[Column], rows: &[Vec<String>]) {
    let rule = |left: &str, mid: &str, right: &str| {
        let parts: Vec<String> = columns.iter().map(|c| "─".repeat(c.width + 2)).collect();
        format!("{}{}{}{}", INDENT, left, parts.join(mid), right)
    };
    let line = |cells: Vec<String>| format!("{}│ {} │", INDENT, cells.join(" │ "));

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(out, "{}", rule("┌", "┬", "┐"));
    let _ = writeln!(
        out,
        "{}",
        line(columns.iter().map(|c| c.cell(c.title)).collect())
    );
    let _ = writeln!(out, "{}", rule("├", "┼", "┤"));

    for row in rows {
        let cells = columns
            .iter()
            .zip(row)
            .map(|(c, text)| c.cell(text))
            .collect();
        let _ = writeln!(out, "{}", line(cells));
    }

    let _ = writeln!(out, "{}", rule("└", "┴", "┘"));
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 16usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{k_line}┬{v_line}┐",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );

    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{}│ {:<key_w$} │ {:>val_w$} │",
            INDENT,
            truncate(key, key_w),
            truncate(val, val_w),
            key_w = key_w,
            val_w = val_w
        );
    }

    let _ = writeln!(
        out,
        "{}└{k_line}┴{v_line}┘",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
}
