//! Install-procedure and smoke-test execution.
//!
//! Both procedures are opaque command sequences run through `sh -c` with a
//! small controlled environment:
//!
//! | Variable | Value |
//! |---|---|
//! | `PREFIX` | Install destination (store prefix for this release) |
//! | `AN_VERSION` | The formula's declared version |
//! | `PATH` | AN's bin directory, then the system default |
//! | `TERM` | `dumb` |
//!
//! An install script that exits non-zero is a `BuildFailure`; a smoke test
//! passes only when it exits 0 and, when the formula declares an expected
//! substring, its output contains it.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

use an_schema::Version;

/// Default deadline for install procedures.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default deadline for smoke tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while executing formula procedures.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// A declared build-time dependency is not present on PATH.
    #[error("build dependency '{0}' not found on PATH")]
    MissingBuildDep(String),

    /// The install procedure exited non-zero or hit its deadline.
    #[error("build failure: {0}")]
    BuildFailure(String),

    /// The smoke test exited non-zero or its output missed the expected text.
    #[error("smoke test failure: {0}")]
    SmokeTestFailure(String),

    /// Process spawning or log I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Execution context shared by install and test runs.
#[derive(Debug)]
pub struct ExecEnv<'a> {
    /// Working directory for the command (source root or prefix).
    pub cwd: &'a Path,
    /// Install destination exposed as `$PREFIX`.
    pub prefix: &'a Path,
    /// Formula version exposed as `$AN_VERSION`.
    pub version: &'a Version,
    /// Hard deadline; the child is killed when it elapses.
    pub timeout: Duration,
}

/// Verify every declared build-time dependency is present on PATH.
///
/// # Errors
///
/// Returns [`ScriptError::MissingBuildDep`] naming the first absent tool.
pub fn check_build_deps(deps: &[String]) -> Result<(), ScriptError> {
    for dep in deps {
        which::which(dep).map_err(|_| ScriptError::MissingBuildDep(dep.clone()))?;
    }
    Ok(())
}

/// Run an install procedure, teeing its output to `log_path`.
///
/// # Errors
///
/// Returns [`ScriptError::BuildFailure`] with the exit status and the tail
/// of the build log on non-zero exit or deadline expiry.
pub fn run_install(script: &str, env: &ExecEnv<'_>, log_path: &Path) -> Result<(), ScriptError> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = std::fs::File::create(log_path)?;
    let log_err = log.try_clone()?;

    let mut child = command(script, env)
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()?;

    let status = match child.wait_timeout(env.timeout)? {
        Some(status) => status,
        None => {
            child.kill().ok();
            child.wait().ok();
            return Err(ScriptError::BuildFailure(format!(
                "install script exceeded {}s deadline (log: {})",
                env.timeout.as_secs(),
                log_path.display()
            )));
        }
    };

    if !status.success() {
        let tail = log_tail(log_path, 20);
        return Err(ScriptError::BuildFailure(format!(
            "install script exited with {status}\n{tail}"
        )));
    }

    Ok(())
}

/// Run a smoke test and apply the pass criteria.
///
/// Success is exit code 0 and, when `expect` is set, combined output
/// containing the substring. The captured output is returned for display.
///
/// # Errors
///
/// Returns [`ScriptError::SmokeTestFailure`] describing which criterion
/// failed.
pub fn run_smoke_test(
    script: &str,
    expect: Option<&str>,
    env: &ExecEnv<'_>,
) -> Result<String, ScriptError> {
    let mut child = command(script, env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let status = match child.wait_timeout(env.timeout)? {
        Some(status) => status,
        None => {
            child.kill().ok();
            child.wait().ok();
            return Err(ScriptError::SmokeTestFailure(format!(
                "test exceeded {}s deadline",
                env.timeout.as_secs()
            )));
        }
    };

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut output).ok();
    }
    if let Some(mut stderr) = child.stderr.take() {
        stderr.read_to_string(&mut output).ok();
    }

    if !status.success() {
        return Err(ScriptError::SmokeTestFailure(format!(
            "test exited with {status}: {}",
            output.trim()
        )));
    }

    if let Some(needle) = expect {
        if !output.contains(needle) {
            return Err(ScriptError::SmokeTestFailure(format!(
                "output did not contain '{needle}': {}",
                output.trim()
            )));
        }
    }

    Ok(output)
}

fn command(script: &str, env: &ExecEnv<'_>) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(script)
        .current_dir(env.cwd)
        .env("PREFIX", env.prefix)
        .env("AN_VERSION", env.version.as_str())
        .env("TERM", "dumb")
        .env("PATH", search_path());
    cmd
}

/// AN's bin directory first, then whatever the host session provides.
fn search_path() -> String {
    let host = std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string());
    format!("{}:{host}", crate::paths::bin_path().display())
}

fn log_tail(path: &Path, lines: usize) -> String {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(dir: &'a Path, version: &'a Version) -> ExecEnv<'a> {
        ExecEnv {
            cwd: dir,
            prefix: dir,
            version,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn missing_build_dep_is_named() {
        let err = check_build_deps(&["definitely-not-a-real-tool-xyz".to_string()]).unwrap_err();
        assert!(matches!(err, ScriptError::MissingBuildDep(name) if name.contains("xyz")));
    }

    #[test]
    fn present_build_deps_pass() {
        assert!(check_build_deps(&["sh".to_string()]).is_ok());
    }

    #[test]
    fn install_success_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");
        let log = dir.path().join("build.log");

        run_install("echo building", &env(dir.path(), &version), &log).unwrap();
        assert!(std::fs::read_to_string(&log).unwrap().contains("building"));
    }

    #[test]
    fn install_nonzero_exit_is_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");
        let log = dir.path().join("build.log");

        let err = run_install("echo boom >&2; exit 3", &env(dir.path(), &version), &log)
            .unwrap_err();
        match err {
            ScriptError::BuildFailure(detail) => assert!(detail.contains("boom")),
            other => panic!("expected BuildFailure, got {other:?}"),
        }
    }

    #[test]
    fn install_sees_prefix_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("2.3.4");
        let log = dir.path().join("build.log");

        run_install(
            "echo prefix=$PREFIX version=$AN_VERSION",
            &env(dir.path(), &version),
            &log,
        )
        .unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("version=2.3.4"));
        assert!(content.contains(&format!("prefix={}", dir.path().display())));
    }

    #[test]
    fn smoke_test_passes_on_exit_zero_and_substring() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");

        let output =
            run_smoke_test("echo AN 0.1.1", Some("AN"), &env(dir.path(), &version)).unwrap();
        assert!(output.contains("AN"));
    }

    #[test]
    fn smoke_test_fails_on_missing_substring() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");

        let err = run_smoke_test("echo something else", Some("AN"), &env(dir.path(), &version))
            .unwrap_err();
        assert!(matches!(err, ScriptError::SmokeTestFailure(_)));
    }

    #[test]
    fn smoke_test_fails_on_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");

        let err = run_smoke_test("exit 1", None, &env(dir.path(), &version)).unwrap_err();
        assert!(matches!(err, ScriptError::SmokeTestFailure(_)));
    }

    #[test]
    fn smoke_test_without_expectation_only_checks_exit() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");

        assert!(run_smoke_test("true", None, &env(dir.path(), &version)).is_ok());
    }

    #[test]
    fn deadline_kills_runaway_test() {
        let dir = tempfile::tempdir().unwrap();
        let version = Version::new("1.0.0");
        let short = ExecEnv {
            timeout: Duration::from_millis(200),
            ..env(dir.path(), &version)
        };

        let err = run_smoke_test("sleep 30", None, &short).unwrap_err();
        assert!(matches!(err, ScriptError::SmokeTestFailure(reason) if reason.contains("deadline")));
    }
}
