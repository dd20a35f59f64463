use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use trackcheck::{CaseFile, Pipeline};

use crate::cli::{BackendOptions, CaseArgs, ExecutionOptions};

pub fn load_case_file(path: &Path) -> Result<CaseFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file: {}", path.display()))?;
    CaseFile::parse(&text).with_context(|| format!("Invalid case file: {}", path.display()))
}

/// Applies command-line overrides to a parsed case file.
///
/// A relative `[run].working_dir` is taken relative to the case file; without
/// one the case file's own directory is used. `-C` is taken relative to the
/// current directory.
pub fn apply_overrides(
    file: &mut CaseFile,
    case_path: &Path,
    case: &CaseArgs,
    backends: &BackendOptions,
    execution: Option<&ExecutionOptions>,
) {
    file.run.working_dir = Some(match &case.working_dir {
        Some(dir) => dir.clone(),
        None => resolve_working_dir(case_path, file.run.working_dir.as_deref()),
    });

    if !backends.backends.is_empty() {
        file.run.backends = Some(backends.backends.clone());
    }
    if let Some(reference) = &backends.reference {
        file.run.reference = Some(reference.clone());
    }

    if let Some(execution) = execution {
        file.run.parallel |= execution.parallel;
        if let Some(secs) = execution.timeout {
            file.run.timeout_secs = Some(secs);
        }
    }
}

fn resolve_working_dir(case_path: &Path, configured: Option<&Path>) -> PathBuf {
    let base = case_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match configured {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    }
}

pub fn build_pipeline(
    case: &CaseArgs,
    backends: &BackendOptions,
    execution: Option<&ExecutionOptions>,
) -> Result<Pipeline> {
    let mut file = load_case_file(&case.case_file)?;
    apply_overrides(&mut file, &case.case_file, case, backends, execution);

    let definition = file.build().context("Invalid test case")?;
    definition
        .into_pipeline()
        .context("Invalid backend selection")
}
