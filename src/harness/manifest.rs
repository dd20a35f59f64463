use super::backend::Backend;
use super::case::TestCase;
use super::error::Error;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shared particle file every lattice references.
pub const DISTRIBUTION_FILE: &str = "inrays.madx";

/// Every path a run may leave in the working directory.
///
/// Cleaning removes exactly these entries and nothing else, so unrelated
/// files next to the artifacts survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    root: PathBuf,
    entries: BTreeSet<PathBuf>,
}

impl Manifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeSet::new(),
        }
    }

    /// The artifacts of `case` run against `backends`.
    pub fn for_run(case: &TestCase, backends: &[Box<dyn Backend>]) -> Self {
        let mut manifest = Self::new(case.working_dir());
        manifest.record(DISTRIBUTION_FILE);
        for backend in backends {
            manifest.record(backend.lattice_file_name(case.kind()));
            for artifact in backend.artifacts() {
                manifest.record(artifact);
            }
            if let Some(optics) = backend.optics_path() {
                manifest.record(optics);
            }
        }
        manifest
    }

    /// Adds a path relative to the manifest root.
    pub fn record(&mut self, relative: impl Into<PathBuf>) {
        self.entries.insert(relative.into());
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter()
    }

    /// Removes every entry that exists; returns how many were removed.
    ///
    /// Absent paths are skipped, so removing twice is harmless.
    pub fn remove_all(&self) -> Result<usize, Error> {
        let mut removed = 0;
        for entry in &self.entries {
            let path = self.root.join(entry);
            let metadata = match fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::cleanup(path, e)),
            };
            let result = if metadata.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    debug!(path = %path.display(), "removed artifact");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::cleanup(path, e)),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::backend::{BdsimBackend, PtcBackend};

    fn backends() -> Vec<Box<dyn Backend>> {
        vec![Box::new(BdsimBackend::full()), Box::new(PtcBackend::new())]
    }

    #[test]
    fn run_manifest_lists_inputs_outputs_and_logs() {
        let case = TestCase::new("drift", 1.0, &[]).unwrap();
        let manifest = Manifest::for_run(&case, &backends());
        let entries: Vec<_> = manifest
            .entries()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        for expected in [
            "inrays.madx",
            "drift.bdsim.gmad",
            "drift.ptc.madx",
            "testBDS",
            "test_bds.log",
            "trackone",
            "madx.log",
            "Maxwellian_bend_for_ptc.txt",
        ] {
            assert!(entries.iter().any(|e| e == expected), "missing {expected}");
        }
    }

    #[test]
    fn removes_listed_entries_only_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("testBDS")).unwrap();
        fs::write(dir.path().join("testBDS/testBDS.txt"), "x").unwrap();
        fs::write(dir.path().join("inrays.madx"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let mut manifest = Manifest::new(dir.path());
        manifest.record("testBDS");
        manifest.record("inrays.madx");
        manifest.record("trackone");

        assert_eq!(manifest.remove_all().unwrap(), 2);
        assert!(!dir.path().join("testBDS").exists());
        assert!(!dir.path().join("inrays.madx").exists());
        assert!(dir.path().join("notes.txt").exists());

        assert_eq!(manifest.remove_all().unwrap(), 0);
    }
}
