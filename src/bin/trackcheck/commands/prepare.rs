use anyhow::{Context, Result};

use trackcheck::{DISTRIBUTION_FILE, Pipeline};

use crate::cli::PrepareArgs;
use crate::config::build_pipeline;
use crate::display::{Context as DisplayContext, Progress, print_case_summary};

pub fn run_make(args: PrepareArgs, ctx: DisplayContext) -> Result<()> {
    let mut pipeline = build_pipeline(&args.case, &args.backends, None)?;

    if ctx.interactive {
        print_case_summary(&pipeline);
    }

    let mut progress = Progress::new(ctx.interactive, 2, "Inputs ready");

    progress.step("Cleaning working directory");
    pipeline.clean().context("Clean failed")?;
    progress.complete_step("Cleaning working directory", &clean_substeps(&pipeline));

    progress.step("Generating inputs");
    pipeline.make().context("Input generation failed")?;
    progress.complete_step("Generating inputs", &make_substeps(&pipeline));

    progress.finish();

    Ok(())
}

pub fn run_clean(args: PrepareArgs, ctx: DisplayContext) -> Result<()> {
    let mut pipeline = build_pipeline(&args.case, &args.backends, None)?;

    let mut progress = Progress::new(ctx.interactive, 1, "Clean complete");

    progress.step("Cleaning working directory");
    pipeline.clean().context("Clean failed")?;
    progress.complete_step("Cleaning working directory", &clean_substeps(&pipeline));

    progress.finish();

    Ok(())
}

pub(super) fn clean_substeps(pipeline: &Pipeline) -> Vec<String> {
    vec![
        format!(
            "Remove {} manifest paths under {}",
            pipeline.manifest().entries().count(),
            pipeline.manifest().root().display()
        ),
        "Absent paths skipped".to_string(),
    ]
}

pub(super) fn make_substeps(pipeline: &Pipeline) -> Vec<String> {
    let case = pipeline.case();
    let mut steps = vec![format!(
        "Sample {} {} particles (seed {}) → {}",
        case.particle_count(),
        case.distribution().distribution.kind(),
        case.distribution().seed,
        DISTRIBUTION_FILE
    )];

    for backend in pipeline.backends() {
        steps.push(format!(
            "Write {} lattice → {}",
            backend.label(),
            backend.lattice_file_name(case.kind())
        ));
    }

    steps
}
