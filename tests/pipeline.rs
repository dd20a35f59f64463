//! End-to-end runs against stand-in simulators.
//!
//! The stand-ins are shell scripts that read the shared `inrays.madx`, apply
//! a linear transfer map with `awk` and write their results in the layout the
//! real programs use.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use trackcheck::{
    Backend, BdsimBackend, CaseFile, Error, ExecutionFailure, Pipeline, PtcBackend, RunOptions,
    Stage, TestCase, Variable,
};

// Writing an executable while another test forks can make exec fail with
// ETXTBSY, so tests that create and run scripts are serialised.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

const BDSIM_HEADER: &str =
    "PDGID E[GeV] x[m] y[m] Z[m] S[m] Xp[rad] Yp[rad] NEvent Weight ParentID TrackID Turn";

const DRIFT_MAP: &str = "x1 = x + L*px; px1 = px; y1 = y + L*py; py1 = py";

const QUADRUPOLE_MAP: &str = "\
k = sqrt(K); phi = k*L; c = cos(phi); s = sin(phi)
  ch = (exp(phi) + exp(-phi)) / 2; sh = (exp(phi) - exp(-phi)) / 2
  x1 = c*x + s/k*px; px1 = -k*s*x + c*px
  y1 = ch*y + sh/k*py; py1 = k*sh*y + ch*py";

const BDSIM_TEMPLATE: &str = r##"#!/bin/sh
out=""
file=""
for arg in "$@"; do
  case "$arg" in
    --outfile=*) out="${arg#--outfile=}" ;;
    --file=*) file="${arg#--file=}" ;;
  esac
done
[ -f "$file" ] || { echo "lattice '$file' not found" >&2; exit 2; }
mkdir -p "$out"
echo "tracking $file into $out"
awk -F'[=,;]' -v L=@LENGTH@ -v K=@K1@ -v hdr="@HEADER@" -v prim="$out/$out.primaries.txt" -v primaries=@PRIMARIES@ '
BEGIN { print hdr; if (primaries) print hdr > prim }
/^ptc_start/ {
  x = $3 + 0; px = $5 + 0; y = $7 + 0; py = $9 + 0
  if (primaries) printf "11 1.0 %.17g %.17g 0 0 %.17g %.17g 0 1 0 1 0\n", x, y, px, py > prim
  @MAP@
  printf "11 1.0 %.17g %.17g 0 %s %.17g %.17g 0 1 0 1 1\n", x1, y1, L, px1, py1
}' inrays.madx > "$out/$out.txt"
"##;

const MADX_TEMPLATE: &str = r##"#!/bin/sh
cat > /dev/null
echo "MAD-X stand-in"
awk -F'[=,;]' -v L=@LENGTH@ '
/^ptc_start/ { n++; x[n] = $3 + 0; px[n] = $5 + 0; y[n] = $7 + 0; py[n] = $9 + 0 }
END {
  print "@ NAME             %08s \"TRACKONE\""
  print "* NUMBER TURN X PX Y PY T PT S E"
  print "$ %d %d %le %le %le %le %le %le %le %le"
  printf "#segment 1 2 %d 0 start\n", n
  for (i = 1; i <= n; i++)
    printf "%d 0 %.17g %.17g %.17g %.17g 0 0 0 1\n", i, x[i], px[i], y[i], py[i]
  printf "#segment 2 2 %d 1 theend\n", n
  for (i = 1; i <= n; i++)
    printf "%d 1 %.17g %.17g %.17g %.17g 0 0 %s 1\n", i, x[i] + L*px[i], px[i], y[i] + L*py[i], py[i], L
}' inrays.madx > trackone
"##;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run_dir(&self) -> PathBuf {
        self.path().join("run")
    }

    fn script(&self, name: &str, body: &str) -> String {
        let bin = self.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn bdsim(&self, name: &str, length: f64, k1: f64, map: &str, primaries: bool) -> String {
        let body = BDSIM_TEMPLATE
            .replace("@LENGTH@", &length.to_string())
            .replace("@K1@", &k1.to_string())
            .replace("@HEADER@", BDSIM_HEADER)
            .replace("@PRIMARIES@", if primaries { "1" } else { "0" })
            .replace("@MAP@", map);
        self.script(name, &body)
    }

    fn madx(&self, name: &str, length: f64) -> String {
        self.script(name, &MADX_TEMPLATE.replace("@LENGTH@", &length.to_string()))
    }

    fn failing(&self, name: &str, code: i32) -> String {
        self.script(
            name,
            &format!("#!/bin/sh\necho 'fatal: geometry overlap' >&2\nexit {code}\n"),
        )
    }

    fn hanging(&self, name: &str) -> String {
        self.script(name, "#!/bin/sh\nexec sleep 5\n")
    }

    /// Full and tracking-only BDSIM stand-ins both applying `map`.
    fn bdsim_pair(&self, length: f64, k1: f64, map: &str) -> Vec<Box<dyn Backend>> {
        vec![
            Box::new(BdsimBackend::full().with_program(self.bdsim("bdsim", length, k1, map, true))),
            Box::new(BdsimBackend::tracking().with_program(self.bdsim(
                "bdsim-tracking",
                length,
                k1,
                map,
                false,
            ))),
        ]
    }
}

fn drift_case(ws: &Workspace, parameters: &[(&str, f64)]) -> TestCase {
    TestCase::new("drift", 1.0, &[])
        .unwrap()
        .with_working_dir(ws.run_dir())
        .with_distribution("flat", 10, parameters)
        .unwrap()
}

const FLAT_SPREAD: [(&str, f64); 4] = [
    ("widthx", 1e-5),
    ("widthpx", 1e-6),
    ("widthy", 2e-5),
    ("widthpy", 3e-6),
];

const ZERO_SPREAD: [(&str, f64); 4] = [
    ("widthx", 0.0),
    ("widthpx", 0.0),
    ("widthy", 0.0),
    ("widthpy", 0.0),
];

#[test]
fn zero_width_drift_gives_all_zero_residuals() {
    let _guard = serial();
    let ws = Workspace::new();
    let case = drift_case(&ws, &ZERO_SPREAD);
    let mut pipeline =
        Pipeline::new(case, ws.bdsim_pair(1.0, 0.0, DRIFT_MAP), RunOptions::default()).unwrap();

    let report = pipeline.clean_make_run().unwrap();

    assert!(!report.partial);
    assert_eq!(report.reference, "bdsim-tracking");
    assert_eq!(report.residuals.len(), 1);
    let residuals = &report.residuals[0];
    assert_eq!(residuals.candidate, "bdsim");
    assert_eq!(residuals.len(), 10);
    for variable in Variable::ALL {
        assert!(residuals.get(variable).iter().all(|r| *r == 0.0));
    }
}

#[test]
fn identical_drift_trackers_agree_and_write_optics() {
    let _guard = serial();
    let ws = Workspace::new();
    let case = drift_case(&ws, &FLAT_SPREAD);
    let mut pipeline =
        Pipeline::new(case, ws.bdsim_pair(1.0, 0.0, DRIFT_MAP), RunOptions::default()).unwrap();

    let report = pipeline.clean_make_run().unwrap();

    let residuals = &report.residuals[0];
    for variable in Variable::ALL {
        assert_eq!(residuals.summary(variable).max_abs, 0.0);
    }

    let bdsim = report.output("bdsim").unwrap();
    assert!(bdsim.has_primary());
    assert!(!report.output("bdsim-tracking").unwrap().has_primary());
    assert!(bdsim.tracked.rows.iter().any(|row| row.x != 0.0));

    assert_eq!(report.optics.len(), 1);
    assert_eq!(report.optics[0].backend, "bdsim");
    assert!(ws.run_dir().join("testBDS/optics.dat").is_file());

    assert!(report.figure("drift_xy").is_some());
    assert!(report.figure("drift_residuals").is_some());
    assert_eq!(pipeline.stage(), Stage::Compared);
    assert_eq!(pipeline.executions().len(), 2);
    assert!(pipeline.executions().iter().all(|r| r.succeeded()));
}

#[test]
fn linear_quadrupole_preserves_emittance() {
    let _guard = serial();
    let ws = Workspace::new();
    let case = TestCase::new("quadrupole", 0.5, &[("k1", 0.2)])
        .unwrap()
        .with_working_dir(ws.run_dir())
        .with_distribution(
            "gaussian",
            50,
            &[("emitx", 1e-10), ("betax", 0.1), ("alfy", 0.5)],
        )
        .unwrap();
    let mut pipeline = Pipeline::new(
        case,
        ws.bdsim_pair(0.5, 0.2, QUADRUPOLE_MAP),
        RunOptions::default(),
    )
    .unwrap();

    let report = pipeline.clean_make_run().unwrap();

    let optics = &report.optics[0].optics;
    for pair in [optics.horizontal, optics.vertical] {
        assert!(pair.before > 0.0);
        let ratio = pair.ratio().unwrap();
        assert!((ratio - 1.0).abs() < 1e-6, "emittance ratio {ratio}");
    }

    let bdsim = report.output("bdsim").unwrap();
    let primary = bdsim.primary.as_ref().unwrap();
    assert_ne!(primary.rows[0], bdsim.tracked.rows[0]);
}

#[test]
fn ptc_and_bdsim_agree_on_a_drift_from_a_case_file() {
    let _guard = serial();
    let ws = Workspace::new();
    let madx = ws.madx("madx", 1.0);
    let tracking = ws.bdsim("bdsim-tracking", 1.0, 0.0, DRIFT_MAP, false);
    let text = format!(
        r#"
[element]
kind = "drift"
length = 1.0

[distribution]
kind = "flat"
particles = 8
widthx = 1e-5
widthpx = 1e-6

[run]
working_dir = "{}"
backends = ["ptc", "bdsim-tracking"]

[programs]
ptc = "{madx}"
bdsim-tracking = "{tracking}"
"#,
        ws.run_dir().display()
    );

    let mut pipeline = CaseFile::parse(&text)
        .unwrap()
        .build()
        .unwrap()
        .into_pipeline()
        .unwrap();
    let report = pipeline.clean_make_run().unwrap();

    assert!(!report.partial);
    let ptc = report.output("ptc").unwrap();
    assert_eq!(ptc.tracked.len(), 8);
    assert!(ptc.has_primary());

    let residuals = report.residuals_for("ptc").unwrap();
    assert_eq!(residuals.reference, "bdsim-tracking");
    for variable in Variable::ALL {
        assert_eq!(residuals.summary(variable).max_abs, 0.0);
    }
    assert!(ws.run_dir().join("drift.ptc.madx").is_file());
    assert!(ws.run_dir().join("madx.log").is_file());
}

#[test]
fn failing_reference_yields_partial_report_with_log() {
    let _guard = serial();
    let ws = Workspace::new();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(BdsimBackend::full().with_program(ws.bdsim("bdsim", 1.0, 0.0, DRIFT_MAP, true))),
        Box::new(BdsimBackend::tracking().with_program(ws.failing("bdsim-tracking", 3))),
    ];
    let mut pipeline =
        Pipeline::new(drift_case(&ws, &FLAT_SPREAD), backends, RunOptions::default()).unwrap();

    pipeline.clean().unwrap();
    pipeline.make().unwrap();
    pipeline.execute().unwrap();

    let codes: Vec<_> = pipeline.executions().iter().map(|r| r.exit_code).collect();
    assert_eq!(codes, vec![Some(0), Some(3)]);

    let failure = &pipeline.failures()[0];
    assert_eq!(failure.backend, "bdsim-tracking");
    let log = failure.log.as_ref().unwrap();
    assert!(log.ends_with("test_trk.log"));
    assert!(fs::read_to_string(log).unwrap().contains("geometry overlap"));

    let report = pipeline.compare().unwrap();
    assert!(report.partial);
    assert!(report.residuals.is_empty());
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.failures.len(), 1);
}

#[test]
fn execute_fails_when_every_backend_fails() {
    let _guard = serial();
    let ws = Workspace::new();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(BdsimBackend::full().with_program(ws.failing("bdsim", 3))),
        Box::new(BdsimBackend::tracking().with_program(ws.failing("bdsim-tracking", 4))),
    ];
    let mut pipeline =
        Pipeline::new(drift_case(&ws, &FLAT_SPREAD), backends, RunOptions::default()).unwrap();
    pipeline.clean().unwrap();
    pipeline.make().unwrap();

    let err = pipeline.execute().unwrap_err();

    assert!(matches!(
        err.execution_failure(),
        Some(ExecutionFailure::NonZeroExit { code: Some(3) })
    ));
    assert!(matches!(&err, Error::Execution { backend, .. } if backend == "bdsim"));
    assert_eq!(pipeline.stage(), Stage::Generated);
    assert_eq!(pipeline.failures().len(), 2);
}

#[test]
fn missing_program_is_reported_by_name() {
    let _guard = serial();
    let ws = Workspace::new();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(PtcBackend::new().with_program("/nonexistent/madx")),
        Box::new(BdsimBackend::tracking().with_program("/nonexistent/bdsim")),
    ];
    let mut pipeline =
        Pipeline::new(drift_case(&ws, &FLAT_SPREAD), backends, RunOptions::default()).unwrap();
    pipeline.clean().unwrap();
    pipeline.make().unwrap();

    let err = pipeline.execute().unwrap_err();

    match err.execution_failure() {
        Some(ExecutionFailure::ProgramNotFound { program }) => {
            assert_eq!(program, "/nonexistent/madx");
        }
        other => panic!("expected ProgramNotFound, got {other:?}"),
    }
    assert!(pipeline.executions().is_empty());
}

#[test]
fn hung_backend_is_killed_after_timeout() {
    let _guard = serial();
    let ws = Workspace::new();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(BdsimBackend::full().with_program(ws.hanging("bdsim"))),
        Box::new(BdsimBackend::tracking().with_program(ws.bdsim(
            "bdsim-tracking",
            1.0,
            0.0,
            DRIFT_MAP,
            false,
        ))),
    ];
    let options = RunOptions {
        timeout: Duration::from_millis(300),
        parallel: true,
        ..RunOptions::default()
    };
    let mut pipeline = Pipeline::new(drift_case(&ws, &FLAT_SPREAD), backends, options).unwrap();
    pipeline.clean().unwrap();
    pipeline.make().unwrap();

    let started = Instant::now();
    pipeline.execute().unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(pipeline.executions().len(), 1);
    let failure = &pipeline.failures()[0];
    assert_eq!(failure.backend, "bdsim");
    assert!(failure.message.contains("timeout"));
}

#[test]
fn clean_removes_only_the_manifest_and_is_idempotent() {
    let _guard = serial();
    let ws = Workspace::new();
    let mut pipeline = Pipeline::new(
        drift_case(&ws, &FLAT_SPREAD),
        ws.bdsim_pair(1.0, 0.0, DRIFT_MAP),
        RunOptions::default(),
    )
    .unwrap();
    pipeline.clean_make_run().unwrap();

    let dir = ws.run_dir();
    fs::write(dir.join("notes.txt"), "keep me").unwrap();
    for produced in ["inrays.madx", "drift.bdsim.gmad", "testBDS", "test_trk.log"] {
        assert!(dir.join(produced).exists(), "{produced} should exist");
    }

    pipeline.clean().unwrap();
    for produced in ["inrays.madx", "drift.bdsim.gmad", "testBDS", "testTRK", "test_bds.log"] {
        assert!(!dir.join(produced).exists(), "{produced} should be gone");
    }
    assert!(dir.join("notes.txt").is_file());

    pipeline.clean().unwrap();
    assert_eq!(pipeline.stage(), Stage::Cleaned);
}

#[test]
fn stages_run_in_order() {
    let ws = Workspace::new();
    let mut pipeline = Pipeline::new(
        drift_case(&ws, &FLAT_SPREAD),
        vec![
            Box::new(BdsimBackend::full()),
            Box::new(BdsimBackend::tracking()),
        ],
        RunOptions::default(),
    )
    .unwrap();

    for err in [
        pipeline.make().unwrap_err(),
        pipeline.execute().unwrap_err(),
        pipeline.compare().map(|_| ()).unwrap_err(),
    ] {
        assert!(matches!(
            err,
            Error::InvalidTransition {
                stage: Stage::Uninitialized,
                ..
            }
        ));
    }
    assert!(!ws.run_dir().exists());
}

#[test]
fn changed_distribution_is_regenerated_from_scratch() {
    let _guard = serial();
    let ws = Workspace::new();
    let mut pipeline = Pipeline::new(
        drift_case(&ws, &FLAT_SPREAD),
        ws.bdsim_pair(1.0, 0.0, DRIFT_MAP),
        RunOptions::default(),
    )
    .unwrap();
    pipeline.clean_make_run().unwrap();

    pipeline
        .change_distribution("flat", 4, &[("widthx", 2e-5)])
        .unwrap();
    assert_eq!(pipeline.stage(), Stage::Cleaned);
    assert!(pipeline.report().is_none());

    pipeline.make().unwrap();
    let dir = ws.run_dir();
    assert!(!dir.join("testBDS").exists());
    let inrays = fs::read_to_string(dir.join("inrays.madx")).unwrap();
    assert_eq!(inrays.lines().count(), 4);

    pipeline.execute().unwrap();
    let report = pipeline.compare().unwrap();
    assert_eq!(report.residuals[0].len(), 4);
}

#[test]
fn rerun_that_writes_nothing_is_not_compared_on_old_tables() {
    let _guard = serial();
    let ws = Workspace::new();
    let tracker = ws.bdsim("bdsim-tracking-inner", 1.0, 0.0, DRIFT_MAP, false);
    let marker = ws.path().join("tracked-once");
    let once = ws.script(
        "bdsim-tracking",
        &format!(
            "#!/bin/sh\n[ -e '{m}' ] && exit 0\ntouch '{m}'\nexec '{t}' \"$@\"\n",
            m = marker.display(),
            t = tracker
        ),
    );
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(BdsimBackend::full().with_program(ws.bdsim("bdsim", 1.0, 0.0, DRIFT_MAP, true))),
        Box::new(BdsimBackend::tracking().with_program(once)),
    ];
    let mut pipeline =
        Pipeline::new(drift_case(&ws, &FLAT_SPREAD), backends, RunOptions::default()).unwrap();
    assert!(!pipeline.clean_make_run().unwrap().partial);
    assert!(ws.run_dir().join("testTRK").is_dir());

    pipeline.execute().unwrap();
    assert!(!ws.run_dir().join("testTRK").exists());
    assert!(ws.run_dir().join("test_trk.log").is_file());
    assert!(ws.run_dir().join("testBDS").is_dir());

    let report = pipeline.compare().unwrap();
    assert!(report.partial);
    assert!(report.residuals.is_empty());
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].backend, "bdsim-tracking");
}

#[test]
fn report_json_carries_figures_for_the_plotter() {
    let _guard = serial();
    let ws = Workspace::new();
    let mut pipeline = Pipeline::new(
        drift_case(&ws, &FLAT_SPREAD),
        ws.bdsim_pair(1.0, 0.0, DRIFT_MAP),
        RunOptions::default(),
    )
    .unwrap();
    pipeline.clean_make_run().unwrap();

    let path = ws.path().join("report.json");
    pipeline.report().unwrap().write_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["title"], "drift");
    assert_eq!(json["partial"], false);
    let names: Vec<&str> = json["figures"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"drift_xy"));
    assert!(names.contains(&"drift_residuals"));
    assert_eq!(json["outputs"].as_array().unwrap().len(), 2);
}
