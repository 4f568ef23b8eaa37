pub mod eviction;
pub mod frame_allocator;
pub mod page_replacement;

use crate::block::block_core::BLOCK_SECTOR_SIZE;
use crate::config::SwapDevice;
use core::{
    alloc::{GlobalAlloc, Layout},
    mem::size_of,
    ops::Range,
    ptr::null_mut,
    sync::atomic::{AtomicUsize, Ordering},
};
use frame_allocator::{CoreMapEntry, FrameOwner};
use kidneyos_vm_shared::{
    mem::{round_down_to_page, round_up_to_page, PAGE_FRAME_SIZE},
    sizes::KB,
};

/// Heap available while the boot line is parsed, before memory is planned.
pub const BOOT_HEAP_SIZE: usize = 64 * KB;

/// Heap kept for the device list, the paging-file bitmap and other small
/// boot-time structures.
pub const HEAP_HEADROOM: usize = 256 * KB;

/// Bytes of heap needed to manage `frames` frames with `swap` as the paging
/// device, or `None` if that does not fit the address space.
pub fn heap_demand(frames: usize, swap: &SwapDevice) -> Option<usize> {
    let per_frame = size_of::<CoreMapEntry>() + size_of::<Option<FrameOwner>>();
    let core_map = frames.checked_mul(per_frame)?;
    let ram_disk = match swap {
        SwapDevice::Ram(sectors) => usize::try_from(*sectors)
            .ok()?
            .checked_mul(BLOCK_SECTOR_SIZE)?,
        SwapDevice::Auto | SwapDevice::Named(_) => 0,
    };
    let total = core_map.checked_add(ram_disk)?.checked_add(HEAP_HEADROOM)?;
    total
        .checked_add(PAGE_FRAME_SIZE - 1)
        .map(round_down_to_page)
}

/// Where the kernel heap and the frames handed to the core map lie.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemoryLayout {
    pub heap: Range<usize>,
    pub frames: Range<u32>,
}

impl MemoryLayout {
    /// Put the heap right after the kernel image, large enough for the core
    /// map over all memory above it and for a RAM paging disk. Every frame
    /// after the heap goes to the core map.
    ///
    /// Returns `None` if no frames would be left.
    pub fn plan(kernel_end: usize, mem_size: usize, swap: &SwapDevice) -> Option<Self> {
        let heap_start = round_up_to_page(kernel_end);
        let frames_above = mem_size.saturating_sub(heap_start) / PAGE_FRAME_SIZE;
        let heap_end = heap_start.checked_add(heap_demand(frames_above, swap)?)?;

        let first = u32::try_from(heap_end / PAGE_FRAME_SIZE).ok()?;
        let last = u32::try_from(mem_size / PAGE_FRAME_SIZE).ok()?;
        (first < last).then_some(MemoryLayout {
            heap: heap_start..heap_end,
            frames: first..last,
        })
    }
}

/// Bump allocator for the kernel heap. Frees are ignored: the heap only holds
/// boot-time structures (the core map, the paging-file bitmap, the device
/// list) that live as long as the kernel.
pub struct KernelAllocator {
    next: AtomicUsize,
    end: AtomicUsize,
}

impl KernelAllocator {
    pub const fn new() -> Self {
        KernelAllocator {
            next: AtomicUsize::new(0),
            end: AtomicUsize::new(0),
        }
    }

    /// Hand `start..end` to the allocator. Nothing can be allocated before
    /// this is called.
    ///
    /// # Safety
    ///
    /// The range must be mapped, writable and otherwise unused.
    pub unsafe fn init(&self, start: usize, end: usize) {
        self.end.store(end, Ordering::Relaxed);
        self.next.store(start, Ordering::Release);
    }

    /// Move the end of the heap up to `end`. The heap never shrinks.
    ///
    /// # Safety
    ///
    /// Everything between the current end and `end` must be mapped, writable
    /// and otherwise unused.
    pub unsafe fn grow(&self, end: usize) {
        self.end.fetch_max(end, Ordering::AcqRel);
    }

    pub fn remaining(&self) -> usize {
        self.end
            .load(Ordering::Relaxed)
            .saturating_sub(self.next.load(Ordering::Acquire))
    }
}

unsafe impl GlobalAlloc for KernelAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let end = self.end.load(Ordering::Relaxed);
        let mut next = self.next.load(Ordering::Acquire);
        loop {
            if next == 0 {
                return null_mut();
            }
            let Some(start) = next.checked_next_multiple_of(layout.align()) else {
                return null_mut();
            };
            let new_next = match start.checked_add(layout.size()) {
                Some(new_next) if new_next <= end => new_next,
                _ => return null_mut(),
            };
            match self
                .next
                .compare_exchange(next, new_next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return start as *mut u8,
                Err(current) => next = current,
            }
        }
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
}

impl Default for KernelAllocator {
    fn default() -> Self {
        Self::new()
    }
}
