use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

use trackcheck::{Pipeline, Report};

use super::prepare::{clean_substeps, make_substeps};
use crate::cli::RunArgs;
use crate::config::build_pipeline;
use crate::display::{
    Context as DisplayContext, Progress, print_case_summary, print_executions, print_failures,
    print_optics, print_residuals,
};
use crate::io::create_output;

const TOTAL_STEPS: u8 = 4;

pub fn run_all(args: RunArgs, ctx: DisplayContext) -> Result<()> {
    let mut pipeline = build_pipeline(&args.case, &args.backends, Some(&args.execution))?;

    if ctx.interactive {
        print_case_summary(&pipeline);
    }

    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS, "Run complete");

    progress.step("Cleaning working directory");
    pipeline.clean().context("Clean failed")?;
    progress.complete_step("Cleaning working directory", &clean_substeps(&pipeline));

    progress.step("Generating inputs");
    pipeline.make().context("Input generation failed")?;
    progress.complete_step("Generating inputs", &make_substeps(&pipeline));

    progress.step("Running backends");
    pipeline.execute().context("No backend completed")?;
    let execute_substeps = build_execute_substeps(&pipeline);
    if pipeline.failures().is_empty() {
        progress.complete_step("Running backends", &execute_substeps);
    } else {
        progress.degrade_step("Running backends", &execute_substeps);
    }

    progress.step("Comparing outputs");
    pipeline.compare().context("Comparison failed")?;
    let Some(report) = pipeline.report() else {
        bail!("Comparison finished without a report");
    };
    let compare_substeps = build_compare_substeps(report);
    if report.partial {
        progress.degrade_step("Comparing outputs", &compare_substeps);
    } else {
        progress.complete_step("Comparing outputs", &compare_substeps);
    }

    progress.finish();

    if ctx.interactive {
        print_executions(pipeline.executions());
        print_residuals(report);
        print_optics(report);
        print_failures(&report.failures);
    } else if report.partial {
        warn!(
            failed = report.failures.len(),
            "report is partial; see the failures section"
        );
    }

    if let Some(path) = &args.report.report {
        write_report(report, path)?;
    }

    Ok(())
}

fn build_execute_substeps(pipeline: &Pipeline) -> Vec<String> {
    let mut steps: Vec<String> = pipeline
        .executions()
        .iter()
        .map(|r| {
            format!(
                "{} ({}) finished in {:.1}s",
                r.backend,
                r.program,
                r.duration.as_secs_f64()
            )
        })
        .collect();

    steps.extend(
        pipeline
            .failures()
            .iter()
            .map(|f| format!("{} failed: {}", f.backend, f.message)),
    );

    steps
}

fn build_compare_substeps(report: &Report) -> Vec<String> {
    let mut steps: Vec<String> = report
        .residuals
        .iter()
        .map(|r| {
            format!(
                "Residuals {} vs {} over {} particles",
                r.candidate,
                r.reference,
                r.len()
            )
        })
        .collect();

    for entry in &report.optics {
        steps.push(format!("Emittance derived from {}", entry.backend));
    }
    steps.push(format!("{} figures specified", report.figures.len()));

    steps
}

fn write_report(report: &Report, path: &Path) -> Result<()> {
    let json = report.to_json().context("Failed to serialise report")?;
    let mut out = create_output(path)?;
    writeln!(out, "{json}")
        .and_then(|()| out.flush())
        .with_context(|| format!("Failed to write report: {}", path.display()))
}
