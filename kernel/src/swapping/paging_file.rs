//! The paging file: page-sized slots on a block device that hold evicted
//! pages, and the bitmap recording which of them are in use.
//!
//! The bitmap has no on-disk header. Its length follows from the device
//! geometry alone and it is rebuilt empty on every boot.

use super::SwapError;
use crate::block::block_core::{Block, BlockSector, BLOCK_SECTOR_SIZE};
use crate::mem::frame_allocator::CoreMapEntry;
use crate::sync::intr::transfer_window;
use bitvec::{order::Lsb0, vec::BitVec};
use kidneyos_vm_shared::{
    mem::PAGE_FRAME_SIZE,
    paging::{PageFrame, SwapSlot},
};
use log::{debug, trace};
use zerocopy::AsBytes;

/// Number of device sectors holding one page.
pub const SECTORS_PER_PAGE: usize = PAGE_FRAME_SIZE / BLOCK_SECTOR_SIZE;

/// Largest slot index a page table entry can carry.
const MAX_SLOTS: usize = 1 << 20;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SwapStats {
    /// Pages brought back from the paging file.
    pub page_ins: u32,
    /// Pages written out to the paging file.
    pub page_outs: u32,
}

pub struct PagingFile {
    device: Block,
    start_sector: BlockSector,
    slots: BitVec<u32, Lsb0>,
    stats: SwapStats,
}

impl PagingFile {
    /// Use `device` from `start_sector` to its end as the paging area.
    pub fn new(device: Block, start_sector: BlockSector) -> Result<Self, SwapError> {
        let usable = device.get_size().saturating_sub(start_sector) as usize;
        let slot_count = (usable / SECTORS_PER_PAGE).min(MAX_SLOTS);
        if slot_count == 0 {
            return Err(SwapError::NoPagingDevice);
        }

        Ok(PagingFile {
            device,
            start_sector,
            slots: BitVec::repeat(false, slot_count),
            stats: SwapStats::default(),
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.count_zeros()
    }

    pub fn is_slot_used(&self, slot: SwapSlot) -> bool {
        self.slots[slot.index()]
    }

    pub fn stats(&self) -> SwapStats {
        self.stats
    }

    pub fn device(&self) -> &Block {
        &self.device
    }

    /// Claim the first free slot.
    pub fn allocate_slot(&mut self) -> Result<SwapSlot, SwapError> {
        let index = self.slots.first_zero().ok_or(SwapError::NoSpace)?;
        self.slots.set(index, true);
        trace!("allocated swap slot {}", index);
        Ok(SwapSlot::new(index as u32))
    }

    /// Return `slot` to the free pool. The slot must be in range.
    pub fn free_slot(&mut self, slot: SwapSlot) {
        assert!(
            slot.index() < self.slots.len(),
            "{slot:?} is outside the paging file"
        );
        self.slots.set(slot.index(), false);
        trace!("freed swap slot {}", slot.index());
    }

    fn first_sector(&self, slot: SwapSlot) -> BlockSector {
        assert!(
            slot.index() < self.slots.len(),
            "{slot:?} is outside the paging file"
        );
        self.start_sector + (slot.index() * SECTORS_PER_PAGE) as BlockSector
    }

    /// Copy `page` into `slot`. `meta` describes the frame holding `page`,
    /// which must be pinned against eviction for the whole transfer.
    pub fn write_to_swap(
        &mut self,
        page: &PageFrame,
        meta: CoreMapEntry,
        slot: SwapSlot,
    ) -> Result<(), SwapError> {
        assert!(!meta.pageable(), "paging out a frame that is still pageable");
        let first = self.first_sector(slot);

        {
            let _window = transfer_window();
            for (sector, chunk) in (first..).zip(page.as_bytes().chunks_exact(BLOCK_SECTOR_SIZE)) {
                self.device.write(sector, chunk)?;
            }
        }

        self.slots.set(slot.index(), true);
        self.stats.page_outs += 1;
        debug!("wrote swap slot {} (sector {})", slot.index(), first);
        Ok(())
    }

    /// Fill `page` from `slot` and release the slot. The frame must be pinned
    /// as for [`Self::write_to_swap`].
    pub fn read_from_swap(
        &mut self,
        page: &mut PageFrame,
        meta: CoreMapEntry,
        slot: SwapSlot,
    ) -> Result<(), SwapError> {
        assert!(!meta.pageable(), "paging in to a frame that is still pageable");
        let first = self.first_sector(slot);

        {
            let _window = transfer_window();
            for (sector, chunk) in
                (first..).zip(page.as_bytes_mut().chunks_exact_mut(BLOCK_SECTOR_SIZE))
            {
                self.device.read(sector, chunk)?;
            }
        }

        self.slots.set(slot.index(), false);
        self.stats.page_ins += 1;
        debug!("read swap slot {} (sector {})", slot.index(), first);
        Ok(())
    }
}
