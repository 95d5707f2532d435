use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Output of a command that ran to completion, successful or not
#[derive(Debug)]
pub struct Captured {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Render a command line for messages
pub fn describe(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// Run a command and capture output; fails only if it could not be started
pub fn capture(cmd: &str, args: &[&str]) -> Result<Captured> {
    capture_env(cmd, args, &[])
}

/// Like [`capture`], with extra environment variables
pub fn capture_env(cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Captured> {
    log::trace!("exec: {}", describe(cmd, args));
    let output = Command::new(cmd)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    Ok(Captured {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run a command and return its stdout, failing on a non-zero exit
pub fn run_checked(cmd: &str, args: &[&str]) -> Result<String> {
    run_checked_env(cmd, args, &[])
}

/// Like [`run_checked`], with extra environment variables
pub fn run_checked_env(cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<String> {
    let captured = capture_env(cmd, args, env)?;
    if captured.success {
        Ok(captured.stdout)
    } else {
        let detail = if captured.stderr.is_empty() {
            captured.stdout
        } else {
            captured.stderr
        };
        match captured.code {
            Some(code) => anyhow::bail!("exit status {code}: {detail}"),
            None => anyhow::bail!("terminated by signal: {detail}"),
        }
    }
}

/// Run a shell command line through `sh -c`
pub fn shell(command: &str, cwd: Option<&Path>) -> Result<Output> {
    log::trace!("sh -c {command}");
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).stdin(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output()
        .with_context(|| format!("Failed to execute: sh -c {command}"))
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {cmd}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe("systemctl", &[]), "systemctl");
        assert_eq!(
            describe("systemctl", &["restart", "nginx"]),
            "systemctl restart nginx"
        );
    }

    #[test]
    fn test_run_checked_reports_exit_status() {
        assert_eq!(run_checked("sh", &["-c", "echo hi"]).unwrap(), "hi");
        let err = run_checked("sh", &["-c", "echo boom >&2; exit 3"]).unwrap_err();
        assert_eq!(err.to_string(), "exit status 3: boom");
    }

    #[test]
    fn test_capture_env() {
        let captured = capture_env("sh", &["-c", "echo $GREETING"], &[("GREETING", "hello")])
            .unwrap();
        assert!(captured.success);
        assert_eq!(captured.stdout, "hello");
    }

    #[test]
    fn test_shell_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let output = shell("pwd", Some(dir.path())).unwrap();
        let printed = String::from_utf8_lossy(&output.stdout);
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            Path::new(printed.trim()).canonicalize().unwrap(),
            expected
        );
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-command-xyz"));
    }
}
