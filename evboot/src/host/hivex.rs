// SPDX-License-Identifier: MIT

use std::path::Path;
use std::process::Output;

use super::{HostTool, failure_message, run_captured};
use crate::error::{PrepError, PrepResult};
use crate::pipeline::Registry;

/// Reads hive values with `hivexget` (libhivex).
#[derive(Debug, Clone, Default)]
pub struct HivexRegistry;

impl HivexRegistry {
    fn query_command(hive: &Path, key: &str, value: &str) -> Vec<String> {
        let key = if key.starts_with('\\') {
            key.to_string()
        } else {
            format!("\\{key}")
        };
        crate::args!["hivexget", hive.display(), key, value]
    }

    /// Missing keys and values are `None`; other failures are errors.
    fn interpret(output: &Output) -> PrepResult<Option<String>> {
        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok((!text.is_empty()).then_some(text));
        }
        let message = failure_message(output);
        let lower = message.to_ascii_lowercase();
        if lower.contains("not found") || lower.contains("no such") {
            return Ok(None);
        }
        Err(PrepError::collaborator(Self::NAME, message))
    }
}

impl HostTool for HivexRegistry {
    const NAME: &'static str = "hivexget";

    fn required_binaries(&self) -> &'static [&'static str] {
        &["hivexget"]
    }
}

impl Registry for HivexRegistry {
    fn query(&mut self, hive: &Path, key: &str, value: &str) -> PrepResult<Option<String>> {
        let output = run_captured(Self::NAME, &Self::query_command(hive, key, value))?;
        Self::interpret(&output)
    }
}
