//! Victim selection for eviction.

use super::frame_allocator::CoreMapEntry;

/// Chooses which resident page gives up its frame when memory runs out.
pub trait PageReplacementPolicy: Default {
    /// Returns the core map index of a frame that may be evicted, or `None`
    /// when every frame is kernel-owned, locked, or mid-transfer.
    fn select_victim(&mut self, core_map: &[CoreMapEntry]) -> Option<usize>;
}

/// Picks the lowest-numbered evictable frame.
#[derive(Default)]
pub struct FirstPageable;

impl PageReplacementPolicy for FirstPageable {
    fn select_victim(&mut self, core_map: &[CoreMapEntry]) -> Option<usize> {
        core_map.iter().position(CoreMapEntry::evictable)
    }
}
