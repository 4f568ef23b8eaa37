//! Two-level i386 paging: building directories and walking them.
//!
//! The kernel identity maps all of physical memory, so a frame number is
//! also the kernel's address for that frame's content. Hardware access goes
//! through [`hw::PagingHardware`].

pub mod fault;
pub mod hw;

use crate::mem::frame_allocator::{FrameAllocator, OutOfFrames};
use crate::swapping::paging_file::PagingFile;
use core::ops::Range;
use hw::PagingHardware;
use kidneyos_vm_shared::{
    mem::{Frame, VirtAddr, HUGE_PAGE_SIZE, PAGE_FRAME_SIZE},
    paging::{Mapping, PageDirectoryEntry, PageTableEntry, PAGE_DIRECTORY_LEN, PAGE_TABLE_LEN},
};
use log::{debug, info};
use zerocopy::FromZeroes;

/// Lowest address handed to user processes.
pub const USER_BASE: VirtAddr = VirtAddr::new(0x8000_0000);

/// User addresses of a process: what one page table covers.
pub const USER_WINDOW: Range<VirtAddr> =
    USER_BASE..VirtAddr::new(USER_BASE.as_u32() + HUGE_PAGE_SIZE as u32);

/// Location of one page table entry: the frame holding the table and the
/// index within it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PteRef {
    pub table: Frame,
    pub index: usize,
}

impl PteRef {
    pub fn read<H: PagingHardware + ?Sized>(self, hw: &H) -> PageTableEntry {
        hw.frame(self.table).pte(self.index)
    }

    pub fn write<H: PagingHardware + ?Sized>(self, hw: &mut H, entry: PageTableEntry) {
        hw.frame_mut(self.table).set_pte(self.index, entry);
    }
}

/// Find the entry translating `vaddr` under `directory`, or `None` if the
/// directory has no page table for it.
pub fn walk<H: PagingHardware + ?Sized>(
    hw: &H,
    directory: Frame,
    vaddr: VirtAddr,
) -> Option<PteRef> {
    let table = hw.frame(directory).pde(vaddr.directory_index()).page_table()?;
    Some(PteRef {
        table,
        index: vaddr.table_index(),
    })
}

/// The frame `vaddr` is resident in, if any.
#[cfg(test)]
pub fn translate<H: PagingHardware + ?Sized>(
    hw: &H,
    directory: Frame,
    vaddr: VirtAddr,
) -> Option<Frame> {
    match walk(hw, directory, vaddr)?.read(hw).mapping() {
        Mapping::Frame(frame) => Some(frame),
        Mapping::Absent | Mapping::Swapped(_) => None,
    }
}

/// Directory slots needed to cover `range`.
fn directory_slots(range: &Range<VirtAddr>) -> Range<usize> {
    range.start.directory_index()..range.end.as_usize().div_ceil(HUGE_PAGE_SIZE)
}

/// Build a directory identity mapping the first `mem_size` bytes of physical
/// memory, read/write and supervisor only. Slots past the end of memory stay
/// absent.
pub fn build_kernel_directory<H, F>(
    hw: &mut H,
    frames: &mut F,
    mem_size: usize,
) -> Result<Frame, OutOfFrames>
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    let pages = mem_size / PAGE_FRAME_SIZE;
    let slots = pages.div_ceil(PAGE_TABLE_LEN);
    assert!(slots <= PAGE_DIRECTORY_LEN, "memory size exceeds 4 GiB");

    let directory = frames.alloc_kernel_frame()?;
    hw.frame_mut(directory).zero();

    for slot in 0..slots {
        let table = frames.alloc_kernel_frame()?;
        let first_page = slot * PAGE_TABLE_LEN;
        let count = (pages - first_page).min(PAGE_TABLE_LEN);

        let entries = hw.frame_mut(table);
        entries.zero();
        for index in 0..count {
            let frame = Frame::new((first_page + index) as u32);
            entries.set_pte(index, PageTableEntry::kernel_page(frame));
        }

        hw.frame_mut(directory)
            .set_pde(slot, PageDirectoryEntry::table(table, false));
    }

    debug!(
        "kernel directory {:?}: {} pages in {} tables",
        directory, pages, slots
    );
    Ok(directory)
}

/// Build the kernel's page tables, turn paging on and start taking page
/// faults. Returns the kernel directory.
///
/// # Panics
///
/// Panics if there are not enough frames for the tables.
///
/// # Safety
///
/// The running kernel and every frame `frames` hands out must lie within the
/// first `mem_size` bytes of physical memory.
pub unsafe fn init_page_tables<H, F>(hw: &mut H, frames: &mut F, mem_size: usize) -> Frame
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    let directory = match build_kernel_directory(&mut *hw, &mut *frames, mem_size) {
        Ok(directory) => directory,
        Err(err) => panic!("cannot map {mem_size:#X} bytes of memory: {err}"),
    };

    hw.load_directory(directory);
    hw.enable_paging();
    hw.install_fault_handler();

    info!(
        "paging enabled ({}), {} KiB mapped, {} frames free",
        hw.paging_enabled(),
        mem_size / 1024,
        frames.free_frames()
    );
    directory
}

/// Build a process directory that shares the kernel's mappings and has an
/// empty, present page table for every slot touching `user`, so any user
/// address faults into a table instead of an absent directory entry.
pub fn create_user_directory<H, F>(
    hw: &mut H,
    frames: &mut F,
    kernel_directory: Frame,
    user: Range<VirtAddr>,
) -> Result<Frame, OutOfFrames>
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    let user_slots = directory_slots(&user);
    let directory = frames.alloc_kernel_frame()?;

    let shared = hw.frame(kernel_directory).clone();
    hw.frame_mut(directory).zero();
    for slot in (0..PAGE_DIRECTORY_LEN).filter(|slot| !user_slots.contains(slot)) {
        hw.frame_mut(directory).set_pde(slot, shared.pde(slot));
    }

    for slot in user_slots.clone() {
        let table = match frames.alloc_kernel_frame() {
            Ok(table) => table,
            Err(err) => {
                release_tables(&mut *hw, &mut *frames, directory, user_slots.start..slot, None);
                frames.dealloc(directory);
                return Err(err);
            }
        };
        hw.frame_mut(table).zero();
        hw.frame_mut(directory)
            .set_pde(slot, PageDirectoryEntry::table(table, true));
    }

    Ok(directory)
}

/// Tear down a directory made by [`create_user_directory`] with the same
/// `user` range, returning its frames and paging-file slots.
///
/// # Panics
///
/// Panics if a page is in the paging file but `paging_file` is `None`.
pub fn release_user_directory<H, F>(
    hw: &mut H,
    frames: &mut F,
    paging_file: Option<&mut PagingFile>,
    directory: Frame,
    user: Range<VirtAddr>,
) where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    release_tables(
        &mut *hw,
        &mut *frames,
        directory,
        directory_slots(&user),
        paging_file,
    );
    frames.dealloc(directory);
}

fn release_tables<H, F>(
    hw: &mut H,
    frames: &mut F,
    directory: Frame,
    slots: Range<usize>,
    mut paging_file: Option<&mut PagingFile>,
) where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    for slot in slots {
        let Some(table) = hw.frame(directory).pde(slot).page_table() else {
            continue;
        };

        for index in 0..PAGE_TABLE_LEN {
            match hw.frame(table).pte(index).mapping() {
                Mapping::Frame(frame) => frames.dealloc(frame),
                Mapping::Swapped(swap_slot) => match paging_file.as_deref_mut() {
                    Some(file) => file.free_slot(swap_slot),
                    None => panic!("{swap_slot:?} released without a paging file"),
                },
                Mapping::Absent => {}
            }
        }

        hw.frame_mut(directory)
            .set_pde(slot, PageDirectoryEntry::DEFAULT);
        frames.dealloc(table);
    }
}
