//! Moving resident user pages out to the paging file to free frames.

use super::frame_allocator::{FrameAllocator, FrameOwner, OutOfFrames};
use crate::paging::hw::PagingHardware;
use crate::swapping::{paging_file::PagingFile, SwapError};
use core::error::Error;
use core::fmt::{self, Display, Formatter};
use kidneyos_vm_shared::{mem::Frame, paging::SwapSlot};
use log::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReclaimError {
    /// No free frame and nothing evictable.
    OutOfFrames,
    /// The victim could not be written out.
    Swap(SwapError),
}

impl From<OutOfFrames> for ReclaimError {
    fn from(_: OutOfFrames) -> Self {
        ReclaimError::OutOfFrames
    }
}

impl From<SwapError> for ReclaimError {
    fn from(err: SwapError) -> Self {
        ReclaimError::Swap(err)
    }
}

impl Display for ReclaimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReclaimError::OutOfFrames => write!(f, "no frame can be freed"),
            ReclaimError::Swap(err) => write!(f, "eviction failed: {err}"),
        }
    }
}

impl Error for ReclaimError {}

/// Write `victim` to a fresh slot, point its owning entry at the slot and
/// free the frame.
///
/// On failure the slot is released and the page stays resident.
pub fn page_out<H, F>(
    hw: &mut H,
    frames: &mut F,
    paging_file: &mut PagingFile,
    victim: Frame,
) -> Result<SwapSlot, SwapError>
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    let meta = frames.core_map_entry(victim);
    assert!(meta.evictable(), "{victim:?} cannot be evicted: {meta:?}");
    let Some(FrameOwner { pte, vaddr }) = frames.owner(victim) else {
        panic!("pageable {victim:?} has no owner");
    };

    let slot = paging_file.allocate_slot()?;
    let pinned = meta.with_pageable(false).with_locked(true);
    frames.set_core_map_entry(victim, pinned);

    if let Err(err) = paging_file.write_to_swap(hw.frame(victim), pinned, slot) {
        paging_file.free_slot(slot);
        frames.set_core_map_entry(victim, meta);
        return Err(err);
    }

    let entry = pte.read(&*hw);
    pte.write(&mut *hw, entry.swapped_out(slot));
    hw.flush(vaddr);

    frames.set_core_map_entry(victim, pinned.with_locked(false));
    frames.dealloc(victim);
    debug!("paged out {} from {:?} to slot {}", vaddr, victim, slot.index());
    Ok(slot)
}

/// Allocate a pageable frame for `owner`, evicting one resident page if
/// memory is full.
pub fn alloc_pageable_frame_or_evict<H, F>(
    hw: &mut H,
    frames: &mut F,
    paging_file: &mut PagingFile,
    owner: FrameOwner,
) -> Result<Frame, ReclaimError>
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    if let Ok(frame) = frames.alloc_pageable_frame(owner) {
        return Ok(frame);
    }

    let victim = frames.select_victim().ok_or(ReclaimError::OutOfFrames)?;
    page_out(&mut *hw, &mut *frames, paging_file, victim)?;
    Ok(frames.alloc_pageable_frame(owner)?)
}
