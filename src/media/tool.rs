use std::io::ErrorKind;
use std::process::Stdio;

use tokio::process::Command;

/// Result of asking whether an external executable can be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// The tool ran; carries the first line of its version output.
    Available(String),
    /// No such executable on the search path.
    Missing,
    /// The executable exists but the probe failed.
    Unknown(String),
}

/// Run `<program> <version_arg>` and classify the outcome.
pub async fn check_tool(program: &str, version_arg: &str) -> ToolStatus {
    let output = Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    let status = match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            ToolStatus::Available(stdout.lines().next().unwrap_or_default().trim().to_string())
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let reason = stderr.lines().next().unwrap_or_default().trim();
            if reason.is_empty() {
                ToolStatus::Unknown(format!("{program} exited with {}", out.status))
            } else {
                ToolStatus::Unknown(reason.to_string())
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => ToolStatus::Missing,
        Err(e) => ToolStatus::Unknown(format!("cannot run {program}: {e}")),
    };

    tracing::debug!(program, ?status, "tool check");
    status
}
