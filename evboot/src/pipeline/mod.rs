// SPDX-License-Identifier: MIT

/// Mount and registry seams, hive lookup on a mounted guest volume.
pub mod collab;
mod context;
mod orchestrator;
mod state;

pub use collab::{Mount, MountHandle, Registry};
pub use context::BootPreparationContext;
pub use orchestrator::{CancelFlag, Orchestrator, PrepReport};
pub use state::PrepState;
