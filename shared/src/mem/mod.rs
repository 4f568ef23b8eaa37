mod addr;

pub use addr::{Frame, VirtAddr};

use crate::sizes::{KB, MB};

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_FRAME_SIZE: usize = 4 * KB;
// Amount of address space covered by one page table.
pub const HUGE_PAGE_SIZE: usize = 4 * MB;

/// Round `addr` down to the start of its page.
pub const fn round_down_to_page(addr: usize) -> usize {
    addr & !(PAGE_FRAME_SIZE - 1)
}

/// Round `addr` up to the next page boundary.
pub const fn round_up_to_page(addr: usize) -> usize {
    round_down_to_page(addr + PAGE_FRAME_SIZE - 1)
}

#[cfg(target_os = "none")]
macro_rules! linker_offsets {
    ($($name:ident),*) => {
        $(
        #[inline]
        pub fn $name() -> usize {
            extern "C" {
                static $name: u8;
            }

            // SAFETY: The linker script will give this the correct address.
            unsafe { core::ptr::addr_of!($name) as usize }
        }
        )*
    }
}

/// Boundaries of the loaded kernel image. The kernel is identity mapped, so
/// these are physical and virtual addresses at the same time.
#[cfg(target_os = "none")]
pub mod image {
    linker_offsets!(kernel_start, kernel_end);
}
