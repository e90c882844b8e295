use color_eyre::eyre::WrapErr;
use color_eyre::{Help, Report, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::instrument;

/// Attempts to execute `program` with `args`.
/// If the command returns status 0,
/// the trimmed `stdout` is returned.
/// Otherwise, an `Err` variant
/// containing the `stderr` is returned.
#[instrument]
pub fn exec_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .wrap_err_with(|| format!("Failed to run `{program}`"))
        .suggestion(format!("Is `{program}` installed?"))?;

    if output.status.success() {
        let stdout = String::from_utf8(output.stdout)
            .map(|output| output.trim().to_string())
            .wrap_err("Command stdout not valid UTF-8")?;

        Ok(stdout)
    } else {
        let stderr = String::from_utf8(output.stderr)
            .map(|output| output.trim().to_string())
            .wrap_err("Command stderr not valid UTF-8")?;

        Err(Report::msg(stderr).wrap_err(format!("`{program}` returned non-zero error code")))
    }
}

/// Resolves `program` against `PATH`.
/// Paths containing a `/` are checked as-is.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        return Some(PathBuf::from(program)).filter(|path| path.is_file());
    }

    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|path| is_executable(path))
    })
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_command() {
        assert_eq!(exec_command("echo", &["hello", "world"]).unwrap(), "hello world");
    }

    #[test]
    fn failing_command_is_err() {
        assert!(exec_command("false", &[]).is_err());
        assert!(exec_command("definitely-not-a-real-program", &[]).is_err());
    }

    #[test]
    fn finds_programs_on_path() {
        assert!(find_program("sh").is_some());
        assert!(find_program("definitely-not-a-real-program").is_none());
        assert!(find_program("/nonexistent/bin/acpi_listen").is_none());
    }
}
