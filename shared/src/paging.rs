// https://wiki.osdev.org/Paging
// https://wiki.osdev.org/Setting_Up_Paging

// Avoids lots of warnings about casting usize to u32 which cannot result in
// truncation on a 32-bit platform, which is all we support. It would be nice if
// you could tell clippy that you were only dealing with 32-bit usizes...
#![allow(clippy::cast_possible_truncation)]

use crate::mem::{Frame, PAGE_FRAME_SIZE};
use arbitrary_int::{u10, u12, u20, u3};
use bitbybit::bitfield;
use core::{fmt, mem::size_of};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const PAGE_DIRECTORY_LEN: usize = PAGE_FRAME_SIZE / size_of::<u32>();
pub const PAGE_TABLE_LEN: usize = PAGE_FRAME_SIZE / size_of::<u32>();

/// Value of the kernel-reserved bits marking a non-present entry whose page
/// lives in the paging file. The address field then holds the slot index.
pub const KERNEL_INFO_ON_DISK: u3 = u3::new(0b100);
pub const KERNEL_INFO_NONE: u3 = u3::new(0);

#[bitfield(u32, default = 0)]
pub struct PageDirectoryEntry {
    #[bit(0, rw)]
    present: bool,
    #[bit(1, rw)]
    read_write: bool,
    #[bit(2, rw)]
    user_supervisor: bool,
    #[bit(3, rw)]
    write_through: bool,
    #[bit(4, rw)]
    cache_disable: bool,
    #[bit(5, rw)]
    accessed: bool,
    #[bit(7, rw)]
    page_size: bool,
    #[bits(9..=11, rw)]
    kernel_info: u3,
    #[bits(12..=31, rw)]
    page_table_address: u20,
}

impl PageDirectoryEntry {
    /// A present entry pointing at the page table stored in `table`.
    pub fn table(table: Frame, user: bool) -> Self {
        Self::DEFAULT
            .with_present(true)
            .with_read_write(true)
            .with_user_supervisor(user)
            .with_page_table_address(table.as_u20())
    }

    /// The frame holding this entry's page table, if the entry is present.
    pub fn page_table(&self) -> Option<Frame> {
        self.present()
            .then(|| Frame::from_u20(self.page_table_address()))
    }
}

impl fmt::Debug for PageDirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page_table() {
            Some(table) => write!(f, "PageDirectoryEntry({table:?})"),
            None => write!(f, "PageDirectoryEntry(absent)"),
        }
    }
}

/// Index of a page-sized slot in the paging file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SwapSlot(u32);

impl SwapSlot {
    const MAX_INDEX: u32 = (1 << 20) - 1;

    /// # Panics
    ///
    /// Panics if `index` cannot be stored in a page table entry.
    pub const fn new(index: u32) -> Self {
        assert!(index <= Self::MAX_INDEX, "swap slot out of range");
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a page table entry refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mapping {
    /// Never touched, or released.
    Absent,
    /// Resident in the given frame.
    Frame(Frame),
    /// Evicted to the given paging-file slot.
    Swapped(SwapSlot),
}

#[bitfield(u32, default = 0)]
pub struct PageTableEntry {
    #[bit(0, rw)]
    present: bool,
    #[bit(1, rw)]
    read_write: bool,
    #[bit(2, rw)]
    user_supervisor: bool,
    #[bit(3, rw)]
    write_through: bool,
    #[bit(4, rw)]
    cache_disable: bool,
    #[bit(5, rw)]
    accessed: bool,
    #[bit(6, rw)]
    dirty: bool,
    #[bit(7, rw)]
    page_attribute_table: bool,
    #[bit(8, rw)]
    global: bool,
    #[bits(9..=11, rw)]
    kernel_info: u3,
    #[bits(12..=31, rw)]
    page_frame_address: u20,
}

impl PageTableEntry {
    /// A present, writable supervisor mapping of `frame`.
    pub fn kernel_page(frame: Frame) -> Self {
        Self::DEFAULT
            .with_present(true)
            .with_read_write(true)
            .with_page_frame_address(frame.as_u20())
    }

    /// A present, writable mapping of `frame` reachable from user mode.
    pub fn user_page(frame: Frame) -> Self {
        Self::kernel_page(frame).with_user_supervisor(true)
    }

    /// A non-present entry whose page is stored in `slot`. Permission bits are
    /// kept so the page comes back with the access it had.
    pub fn swapped_out(self, slot: SwapSlot) -> Self {
        self.with_present(false)
            .with_accessed(false)
            .with_dirty(false)
            .with_kernel_info(KERNEL_INFO_ON_DISK)
            .with_page_frame_address(u20::new(slot.0))
    }

    pub fn is_swapped(&self) -> bool {
        !self.present() && self.kernel_info() == KERNEL_INFO_ON_DISK
    }

    /// Decode the overloaded address field.
    pub fn mapping(&self) -> Mapping {
        if self.present() {
            Mapping::Frame(Frame::from_u20(self.page_frame_address()))
        } else if self.is_swapped() {
            Mapping::Swapped(SwapSlot(self.page_frame_address().value()))
        } else {
            Mapping::Absent
        }
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageTableEntry({:#010X}, {:?})", self.raw_value(), self.mapping())
    }
}

#[bitfield(u32)]
pub struct VirtualAddress {
    #[bits(22..=31, r)]
    page_directory_index: u10,
    #[bits(12..=21, r)]
    page_table_index: u10,
    #[bits(0..=11, r)]
    offset: u12,
}

/// One page of physical memory. Directories and tables are frames viewed as
/// 1024 32-bit entries; swap transfers view them as bytes.
#[derive(Clone, FromZeroes, FromBytes, AsBytes)]
#[repr(C, align(4096))]
pub struct PageFrame([u32; PAGE_TABLE_LEN]);

impl PageFrame {
    pub fn pde(&self, index: usize) -> PageDirectoryEntry {
        PageDirectoryEntry::new_with_raw_value(self.0[index])
    }

    pub fn set_pde(&mut self, index: usize, entry: PageDirectoryEntry) {
        self.0[index] = entry.raw_value();
    }

    pub fn pte(&self, index: usize) -> PageTableEntry {
        PageTableEntry::new_with_raw_value(self.0[index])
    }

    pub fn set_pte(&mut self, index: usize, entry: PageTableEntry) {
        self.0[index] = entry.raw_value();
    }

    /// Iterate over the frame as page table entries.
    pub fn ptes(&self) -> impl Iterator<Item = PageTableEntry> + '_ {
        self.0.iter().map(|raw| PageTableEntry::new_with_raw_value(*raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_use_hardware_bit_positions() {
        let pte = PageTableEntry::user_page(Frame::new(0x12345));
        assert_eq!(pte.raw_value(), 0x1234_5007);

        let pde = PageDirectoryEntry::table(Frame::new(0x00400), false);
        assert_eq!(pde.raw_value(), 0x0040_0003);
    }

    #[test]
    fn swapped_entry_carries_slot_in_address_field() {
        let pte = PageTableEntry::user_page(Frame::new(7)).swapped_out(SwapSlot::new(42));
        assert!(!pte.present());
        assert!(pte.user_supervisor());
        assert_eq!(pte.raw_value() >> 12, 42);
        assert_eq!((pte.raw_value() >> 9) & 0b111, 0b100);
        assert_eq!(pte.mapping(), Mapping::Swapped(SwapSlot::new(42)));
    }

    #[test]
    fn present_entry_ignores_stale_kernel_info() {
        let pte = PageTableEntry::user_page(Frame::new(9)).with_kernel_info(KERNEL_INFO_ON_DISK);
        assert_eq!(pte.mapping(), Mapping::Frame(Frame::new(9)));
    }

    #[test]
    fn zeroed_frame_is_all_absent() {
        let frame = PageFrame::new_zeroed();
        assert!(frame.ptes().all(|pte| pte.mapping() == Mapping::Absent));
        assert_eq!(frame.pde(0).page_table(), None);
        assert_eq!(frame.as_bytes().len(), PAGE_FRAME_SIZE);
    }

    #[test]
    fn frame_round_trips_entries() {
        let mut frame = PageFrame::new_zeroed();
        frame.set_pte(1023, PageTableEntry::kernel_page(Frame::new(3)));
        frame.set_pde(5, PageDirectoryEntry::table(Frame::new(4), true));
        assert_eq!(frame.pte(1023).mapping(), Mapping::Frame(Frame::new(3)));
        assert_eq!(frame.pde(5).page_table(), Some(Frame::new(4)));
        assert!(frame.pde(5).user_supervisor());
    }
}
