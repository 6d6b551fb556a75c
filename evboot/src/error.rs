// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use evio::errors::EvIOError;
use evpart::errors::PartError;

use crate::pipeline::PrepState;

/// Step of the preparation an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inspect,
    ReadSector,
    Template,
    Fabricate,
    Descriptor,
    PatchSerial,
    Vmx,
    Integrity,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Phase::Inspect => "inspecting evidence",
            Phase::ReadSector => "reading boot sector",
            Phase::Template => "loading MBR template",
            Phase::Fabricate => "writing fabricated MBR",
            Phase::Descriptor => "writing descriptor",
            Phase::PatchSerial => "patching disk serial",
            Phase::Vmx => "writing VMX",
            Phase::Integrity => "hashing evidence",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PrepError {
    /// Bad or missing boot sector signature, or a sector that cannot be used.
    #[error("boot sector format: {0}")]
    Format(PartError),

    #[error("{0}")]
    ClassificationAmbiguous(PartError),

    /// A partition-only branch found no fabricated MBR on disk.
    #[error("fabricated MBR missing: expected {}", expected.display())]
    MissingCustomMbr { expected: PathBuf },

    #[error("I/O error while {phase} ({}): {source}", path.display())]
    Io {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: EvIOError,
    },

    #[error("{collaborator} failed: {message}")]
    ExternalCollaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("preparation cancelled")]
    Cancelled,

    #[error("configuration: {0}")]
    Config(String),

    #[error("evidence changed during preparation (crc32 {before:08x} -> {after:08x})")]
    EvidenceModified { before: u32, after: u32 },

    #[error("state {from:?} cannot advance to {to:?}")]
    OutOfOrder { from: PrepState, to: PrepState },
}

impl PrepError {
    pub fn io(phase: Phase, path: &Path, source: impl Into<EvIOError>) -> Self {
        PrepError::Io {
            phase,
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        PrepError::ExternalCollaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// Maps a boot sector error to the taxonomy, keeping the path and phase
    /// for I/O failures.
    pub fn from_part(phase: Phase, path: &Path, e: PartError) -> Self {
        match e {
            PartError::IO(io) => PrepError::io(phase, path, io),
            e @ PartError::ClassificationAmbiguous(_) => PrepError::ClassificationAmbiguous(e),
            e => PrepError::Format(e),
        }
    }
}

pub type PrepResult<T = ()> = Result<T, PrepError>;
