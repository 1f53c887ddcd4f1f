use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::snapshot::BuildOutcome;

pub fn parse_command(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    if parts.len() > 1 {
        (parts[0].to_string(), parts[1..].iter().map(|s| s.to_string()).collect())
    } else {
        (cmd.trim().to_string(), vec![])
    }
}

/// Runs `cmd` in `working_dir`, killing it once `timeout` has elapsed.
///
/// A non-zero exit or a timeout is a build failure carrying the command's
/// combined output; failing to start the command at all is an error.
pub fn run_build(cmd: &str, working_dir: &Path, timeout: Duration) -> Result<BuildOutcome> {
    let (program, args) = parse_command(cmd);
    if program.is_empty() {
        return Err(Error::IllegalConfig("empty build command".into()));
    }

    // stdout and stderr share a spooled file so a chatty build can't fill a pipe
    let mut log = tempfile::tempfile().map_err(|e| Error::unexpected("failed to create build log", e))?;
    let stdout = log.try_clone().map_err(|e| Error::unexpected("failed to create build log", e))?;
    let stderr = log.try_clone().map_err(|e| Error::unexpected("failed to create build log", e))?;

    let start = Instant::now();
    let mut child = Command::new(&program)
        .args(&args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| Error::unexpected(&format!("failed to run build command '{}'", cmd), e))?;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(Error::unexpected("failed to wait for build", e)),
        }
    };

    let mut raw = Vec::new();
    log.seek(SeekFrom::Start(0))
        .and_then(|_| log.read_to_end(&mut raw))
        .map_err(|e| Error::unexpected("failed to read build log", e))?;
    let mut output = String::from_utf8_lossy(&raw).into_owned();

    let duration_ms = start.elapsed().as_millis() as u64;
    match status {
        Some(status) if status.success() => {
            debug!(command = cmd, duration_ms, "build succeeded");
            Ok(BuildOutcome::Success)
        }
        Some(status) => {
            debug!(command = cmd, duration_ms, code = ?status.code(), "build failed");
            Ok(BuildOutcome::Failure { output })
        }
        None => {
            warn!(command = cmd, timeout_ms = timeout.as_millis() as u64, "build timed out");
            output.push_str(&format!("\nbuild timed out after {}ms\n", timeout.as_millis()));
            Ok(BuildOutcome::Failure { output })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_splits_arguments() {
        let (program, args) = parse_command("make -j4 all");
        assert_eq!(program, "make");
        assert_eq!(args, vec!["-j4", "all"]);
    }

    #[test]
    fn parse_command_single_word() {
        let (program, args) = parse_command("ninja");
        assert_eq!(program, "ninja");
        assert!(args.is_empty());
    }

    #[test]
    fn run_build_reports_success_and_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let timeout = Duration::from_secs(10);
        assert_eq!(run_build("true", dir.path(), timeout).unwrap(), BuildOutcome::Success);
        assert!(matches!(
            run_build("false", dir.path(), timeout).unwrap(),
            BuildOutcome::Failure { .. }
        ));
    }

    #[test]
    fn run_build_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = run_build("sleep 5", dir.path(), Duration::from_millis(50)).unwrap();
        match outcome {
            BuildOutcome::Failure { output } => assert!(output.contains("timed out")),
            BuildOutcome::Success => panic!("expected timeout"),
        }
    }

    #[test]
    fn run_build_missing_program_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_build("definitely-not-a-real-program-xyz", dir.path(), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), "UnexpectedServerError");
    }

    #[test]
    fn run_build_tolerates_non_utf8_output() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.sh"), "printf '\\377\\n'; exit 0\n").unwrap();
        std::fs::write(dir.path().join("fail.sh"), "printf 'bad \\377\\n'; exit 1\n").unwrap();
        let timeout = Duration::from_secs(10);

        assert_eq!(run_build("sh ok.sh", dir.path(), timeout).unwrap(), BuildOutcome::Success);
        match run_build("sh fail.sh", dir.path(), timeout).unwrap() {
            BuildOutcome::Failure { output } => assert!(output.starts_with("bad \u{fffd}")),
            BuildOutcome::Success => panic!("expected failure"),
        }
    }
}
