//! State-change events fanned out through the broker

use serde::Serialize;

use super::Region;

/// A region state change, snapshotted at broadcast time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    /// `false` while replaying the startup backlog, `true` for live messages
    pub is_fresh: bool,
    pub region: Region,
}

impl Update {
    pub fn new(is_fresh: bool, region: Region) -> Self {
        Self { is_fresh, region }
    }

    /// Filter used by the streaming adapters: fresh events only,
    /// optionally narrowed to one region (`0` means every region)
    pub fn matches_live(&self, region_filter: u32) -> bool {
        self.is_fresh && (region_filter == 0 || region_filter == self.region.id)
    }
}
