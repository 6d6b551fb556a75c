// SPDX-License-Identifier: MIT

//! Collaborators backed by host command-line tools.

use std::process::{Command, Output};

use crate::error::{PrepError, PrepResult};

#[macro_use]
mod macros;
mod hivex;
mod vmware;

pub use hivex::HivexRegistry;
pub use vmware::VmwareMount;

pub trait HostTool {
    /// Collaborator name used in errors.
    const NAME: &'static str;

    fn required_binaries(&self) -> &'static [&'static str];

    fn validate_binaries(&self) -> PrepResult {
        let missing: Vec<_> = self
            .required_binaries()
            .iter()
            .copied()
            .filter(|b| which::which(b).is_err())
            .collect();

        if !missing.is_empty() {
            return Err(PrepError::collaborator(
                Self::NAME,
                format!("missing required tool(s): {}", missing.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Runs `cmd[0]` with the remaining arguments and captures its output.
pub(crate) fn run_captured(collaborator: &'static str, cmd: &[String]) -> PrepResult<Output> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| PrepError::collaborator(collaborator, "empty command line"))?;
    crate::log_verbose!("$ {}", cmd.join(" "));
    Command::new(program)
        .args(args)
        .output()
        .map_err(|e| PrepError::collaborator(collaborator, format!("{program}: {e}")))
}

/// Trimmed stderr, falling back to the exit status.
pub(crate) fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {:?}", output.status.code())
    } else {
        stderr
    }
}
