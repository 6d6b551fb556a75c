// SPDX-License-Identifier: MIT

pub mod config;
pub mod descriptor;
pub mod error;
pub mod guest;
#[cfg(feature = "host-tools")]
pub mod host;
pub mod pipeline;
pub mod utils;
pub mod vmx;

pub use config::Settings;
pub use descriptor::{VirtualDiskDescriptor, synthesize};
pub use error::{PrepError, PrepResult};
pub use pipeline::{BootPreparationContext, CancelFlag, Orchestrator, PrepReport, PrepState};
