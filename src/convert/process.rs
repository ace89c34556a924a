/// External tool runner
///
/// Every conversion shells out through `run_tool`, which:
/// - spawns the child with `kill_on_drop`, so a timeout or a cancelled request
///   kills the process instead of leaking it
/// - bounds the run with a timeout
/// - maps spawn failures, non-zero exits and timeouts to typed errors

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ConvertError;

/// Captured output of a successful run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Longest stderr tail kept in a `ConversionFailed`
const STDERR_TAIL: usize = 2000;

/// Run a prepared command to completion within `timeout`
pub async fn run_tool(
    tool: &str,
    mut command: Command,
    timeout: Duration,
) -> Result<ToolOutput, ConvertError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("🔧 Running {:?}", command.as_std());

    let child = command.spawn().map_err(|source| ConvertError::ToolUnavailable {
        tool: tool.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            // The child future was dropped with the timeout, kill_on_drop reaps it
            warn!("⏱️  {} timed out after {:?}", tool, timeout);
            return Err(ConvertError::ToolTimeout {
                tool: tool.to_string(),
                after: timeout,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(ConvertError::ConversionFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: tail(&stderr, STDERR_TAIL),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim_end();
    if trimmed.len() <= max {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - max;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// Check that a tool answers a version query.
///
/// Used once at startup; request paths never call this.
pub async fn probe(tool: &str, program: &str, version_arg: &str, timeout: Duration) -> Result<(), ConvertError> {
    let mut command = Command::new(program);
    command.arg(version_arg);
    run_tool(tool, command, timeout).await.map(|_| ())
}
