use super::page_replacement::{FirstPageable, PageReplacementPolicy};
use crate::paging::PteRef;
use alloc::{boxed::Box, vec};
use bitbybit::bitfield;
use core::error::Error;
use core::fmt::{self, Display, Formatter};
use core::ops::Range;
use kidneyos_vm_shared::mem::{Frame, VirtAddr};

#[bitfield(u8, default = 0)]
pub struct CoreMapEntry {
    #[bit(0, rw)]
    allocated: bool,
    /// May be chosen for eviction.
    #[bit(1, rw)]
    pageable: bool,
    /// Pinned while its content is being filled or transferred.
    #[bit(2, rw)]
    locked: bool,
    #[bit(3, rw)]
    is_kernel: bool,
}

impl CoreMapEntry {
    pub fn evictable(&self) -> bool {
        self.allocated() && self.pageable() && !self.locked() && !self.is_kernel()
    }
}

impl fmt::Debug for CoreMapEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreMapEntry")
            .field("allocated", &self.allocated())
            .field("pageable", &self.pageable())
            .field("locked", &self.locked())
            .field("is_kernel", &self.is_kernel())
            .finish()
    }
}

/// The page table entry and virtual page a pageable frame backs. Eviction
/// uses it to find the entry to repoint at the swap slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrameOwner {
    pub pte: PteRef,
    pub vaddr: VirtAddr,
}

/// Every frame managed by the allocator is in use.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OutOfFrames;

impl Display for OutOfFrames {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "out of physical frames")
    }
}

impl Error for OutOfFrames {}

pub trait FrameAllocator {
    /// Allocate a frame that is never evicted (page directories, page tables).
    fn alloc_kernel_frame(&mut self) -> Result<Frame, OutOfFrames>;

    /// Allocate a frame backing the user page described by `owner`. The frame
    /// starts out pageable and unlocked.
    fn alloc_pageable_frame(&mut self, owner: FrameOwner) -> Result<Frame, OutOfFrames>;

    fn dealloc(&mut self, frame: Frame);

    fn core_map_entry(&self, frame: Frame) -> CoreMapEntry;

    fn set_core_map_entry(&mut self, frame: Frame, entry: CoreMapEntry);

    fn owner(&self, frame: Frame) -> Option<FrameOwner>;

    fn free_frames(&self) -> usize;

    /// Pick a resident page to evict without changing any state.
    fn select_victim(&mut self) -> Option<Frame>;
}

/// Bookkeeping for a contiguous range of physical frames.
pub struct CoreMap<P: PageReplacementPolicy = FirstPageable> {
    first: u32,
    core_map: Box<[CoreMapEntry]>,
    owners: Box<[Option<FrameOwner>]>,
    frames_allocated: usize,
    policy: P,
}

impl<P: PageReplacementPolicy> CoreMap<P> {
    /// Manage the frames numbered `frames`.
    pub fn new_in(frames: Range<u32>) -> Self {
        let len = frames.len();
        CoreMap {
            first: frames.start,
            core_map: vec![CoreMapEntry::DEFAULT; len].into_boxed_slice(),
            owners: vec![None; len].into_boxed_slice(),
            frames_allocated: 0,
            policy: P::default(),
        }
    }

    pub fn total_frames(&self) -> usize {
        self.core_map.len()
    }

    fn index(&self, frame: Frame) -> usize {
        match frame.number().checked_sub(self.first) {
            Some(i) if (i as usize) < self.core_map.len() => i as usize,
            _ => panic!("{frame:?} is not managed by the core map"),
        }
    }

    fn frame_at(&self, index: usize) -> Frame {
        Frame::new(self.first + index as u32)
    }

    fn alloc(&mut self, entry: CoreMapEntry, owner: Option<FrameOwner>) -> Result<Frame, OutOfFrames> {
        let index = self
            .core_map
            .iter()
            .position(|e| !e.allocated())
            .ok_or(OutOfFrames)?;

        self.core_map[index] = entry.with_allocated(true);
        self.owners[index] = owner;
        self.frames_allocated += 1;
        Ok(self.frame_at(index))
    }
}

impl<P: PageReplacementPolicy> FrameAllocator for CoreMap<P> {
    fn alloc_kernel_frame(&mut self) -> Result<Frame, OutOfFrames> {
        self.alloc(CoreMapEntry::DEFAULT.with_is_kernel(true), None)
    }

    fn alloc_pageable_frame(&mut self, owner: FrameOwner) -> Result<Frame, OutOfFrames> {
        self.alloc(CoreMapEntry::DEFAULT.with_pageable(true), Some(owner))
    }

    fn dealloc(&mut self, frame: Frame) {
        let index = self.index(frame);
        assert!(self.core_map[index].allocated(), "double free of {frame:?}");
        assert!(!self.core_map[index].locked(), "freeing locked {frame:?}");

        self.core_map[index] = CoreMapEntry::DEFAULT;
        self.owners[index] = None;
        self.frames_allocated -= 1;
    }

    fn core_map_entry(&self, frame: Frame) -> CoreMapEntry {
        self.core_map[self.index(frame)]
    }

    fn set_core_map_entry(&mut self, frame: Frame, entry: CoreMapEntry) {
        let index = self.index(frame);
        assert_eq!(
            self.core_map[index].allocated(),
            entry.allocated(),
            "core map flags cannot allocate or free {frame:?}"
        );
        self.core_map[index] = entry;
    }

    fn owner(&self, frame: Frame) -> Option<FrameOwner> {
        self.owners[self.index(frame)]
    }

    fn free_frames(&self) -> usize {
        self.core_map.len() - self.frames_allocated
    }

    fn select_victim(&mut self) -> Option<Frame> {
        let index = self.policy.select_victim(&self.core_map)?;
        debug_assert!(self.owners[index].is_some());
        Some(self.frame_at(index))
    }
}
