use super::PAGE_FRAME_SIZE;
use crate::paging::VirtualAddress;
use arbitrary_int::u20;
use core::fmt;

/// A physical frame, identified by its frame number.
///
/// Frame numbers always fit in the 20-bit address field of a page table
/// entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(u32);

impl Frame {
    const MAX_NUMBER: u32 = (1 << 20) - 1;

    /// # Panics
    ///
    /// Panics if `number` does not fit in 20 bits.
    pub const fn new(number: u32) -> Self {
        assert!(number <= Self::MAX_NUMBER, "frame number out of range");
        Self(number)
    }

    /// The frame containing physical address `addr`.
    pub const fn containing(addr: usize) -> Self {
        Self::new((addr / PAGE_FRAME_SIZE) as u32)
    }

    pub fn from_u20(number: u20) -> Self {
        Self(number.value())
    }

    pub const fn number(self) -> u32 {
        self.0
    }

    pub fn as_u20(self) -> u20 {
        u20::new(self.0)
    }

    pub const fn start_address(self) -> usize {
        self.0 as usize * PAGE_FRAME_SIZE
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#X})", self.start_address())
    }
}

/// A 32-bit linear address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtAddr(u32);

impl VirtAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// This address rounded down to the start of its page.
    pub const fn page_base(self) -> Self {
        Self(self.0 & !(PAGE_FRAME_SIZE as u32 - 1))
    }

    /// Index into the page directory (the high 10 bits).
    pub fn directory_index(self) -> usize {
        usize::from(VirtualAddress::new_with_raw_value(self.0).page_directory_index().value())
    }

    /// Index into the page table selected by [`Self::directory_index`].
    pub fn table_index(self) -> usize {
        usize::from(VirtualAddress::new_with_raw_value(self.0).page_table_index().value())
    }

    /// Address of the first byte covered by directory slot `dir` and table
    /// slot `table`.
    pub const fn from_indices(dir: usize, table: usize) -> Self {
        Self(((dir as u32) << 22) | ((table as u32) << 12))
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010X})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}
