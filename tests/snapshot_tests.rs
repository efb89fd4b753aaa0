use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a .bf file with the bfjit CLI and return (stdout, stderr, exit_code)
fn run_bf_file(path: &Path, stdin: &[u8]) -> (Vec<u8>, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_bfjit"))
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute bfjit");

    {
        let mut pipe = child.stdin.take().expect("stdin is piped");
        pipe.write_all(stdin).expect("failed to write stdin");
    }

    let output = child.wait_with_output().expect("failed to wait for bfjit");
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (output.stdout, stderr, exit_code)
}

/// Run a single snapshot test.
///
/// Next to `name.bf` may sit `name.stdin` (fed to the program), `name.stdout`
/// (exact bytes), `name.stderr` (substring) and `name.exitcode` (default 0).
fn run_snapshot_test(bf_path: &Path) {
    let base_path = bf_path.with_extension("");

    let stdin_path = base_path.with_extension("stdin");
    let stdin = if stdin_path.exists() {
        fs::read(&stdin_path).unwrap_or_else(|e| panic!("Failed to read {:?}: {}", stdin_path, e))
    } else {
        Vec::new()
    };

    let (actual_stdout, actual_stderr, actual_exitcode) = run_bf_file(bf_path, &stdin);

    // Check stdout (exact match)
    let stdout_path = base_path.with_extension("stdout");
    if stdout_path.exists() {
        let expected_stdout = fs::read(&stdout_path)
            .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", stdout_path, e));
        assert_eq!(
            actual_stdout, expected_stdout,
            "stdout mismatch for {:?}\n--- stderr ---\n{}",
            bf_path, actual_stderr
        );
    }

    // Check stderr (partial match - expected must be contained in actual)
    let stderr_path = base_path.with_extension("stderr");
    if stderr_path.exists() {
        let expected_stderr = fs::read_to_string(&stderr_path)
            .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", stderr_path, e));
        assert!(
            actual_stderr.contains(&expected_stderr),
            "stderr mismatch for {:?}\n--- expected (substring) ---\n{}\n--- actual ---\n{}",
            bf_path,
            expected_stderr,
            actual_stderr
        );
    }

    // Check exit code (default: 0)
    let exitcode_path = base_path.with_extension("exitcode");
    let expected_exitcode = if exitcode_path.exists() {
        fs::read_to_string(&exitcode_path)
            .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", exitcode_path, e))
            .trim()
            .parse::<i32>()
            .unwrap_or_else(|e| panic!("Invalid exitcode in {:?}: {}", exitcode_path, e))
    } else {
        0
    };

    assert_eq!(
        actual_exitcode, expected_exitcode,
        "exit code mismatch for {:?}: expected {}, got {}\n--- stderr ---\n{}",
        bf_path, expected_exitcode, actual_exitcode, actual_stderr
    );
}

/// Discover and run all .bf tests in a snapshot directory
fn run_snapshot_dir(dir: &str) {
    let dir_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
        .join(dir);

    let mut paths: Vec<_> = fs::read_dir(&dir_path)
        .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", dir_path, e))
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "bf"))
        .collect();
    paths.sort();

    assert!(!paths.is_empty(), "no snapshots in {:?}", dir_path);
    for path in paths {
        run_snapshot_test(&path);
    }
}

#[test]
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
fn snapshot_basic() {
    run_snapshot_dir("basic");
}

// Bracket errors are reported before any code is mapped, so these run on
// every host.
#[test]
fn snapshot_errors() {
    run_snapshot_dir("errors");
}
