// SPDX-License-Identifier: MIT

/// Steps of one preparation attempt, in the order they may be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepState {
    Unclassified,
    /// Signed sector; an ambiguous classification is returned from here.
    SignatureChecked,
    /// Terminal: the boot sector signature is missing. Nothing is written.
    Rejected,
    FullDiskClassified,
    PartitionClassified,
    GeometryFabricated,
    DescriptorSynthesized,
    MountRequested,
    OsClassified,
    SerialPatched,
    Finalized,
}

impl PrepState {
    pub fn can_advance_to(self, next: PrepState) -> bool {
        use PrepState::*;
        matches!(
            (self, next),
            (Unclassified, SignatureChecked)
                | (Unclassified, Rejected)
                | (SignatureChecked, FullDiskClassified)
                | (SignatureChecked, PartitionClassified)
                | (FullDiskClassified, DescriptorSynthesized)
                | (PartitionClassified, GeometryFabricated)
                | (GeometryFabricated, DescriptorSynthesized)
                | (DescriptorSynthesized, MountRequested)
                | (DescriptorSynthesized, Finalized)
                | (MountRequested, OsClassified)
                | (OsClassified, SerialPatched)
                | (OsClassified, Finalized)
                | (SerialPatched, Finalized)
        )
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, PrepState::Rejected | PrepState::Finalized)
    }
}

impl core::fmt::Display for PrepState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}
