//! The narrow boundary between paging logic and the machine.
//!
//! Everything above this module manipulates frames, directories and tables
//! through [`PagingHardware`]. Raw pointers and control registers live in
//! [`X86Paging`]; host builds use [`EmulatedPaging`].

use kidneyos_vm_shared::{
    mem::{Frame, VirtAddr},
    paging::PageFrame,
};

pub trait PagingHardware {
    /// View the content of a physical frame.
    fn frame(&self, frame: Frame) -> &PageFrame;

    fn frame_mut(&mut self, frame: Frame) -> &mut PageFrame;

    /// Make `directory` the active page directory.
    ///
    /// # Safety
    ///
    /// Once paging is on, `directory` must map everything the kernel touches.
    unsafe fn load_directory(&mut self, directory: Frame);

    /// Turn on translation.
    ///
    /// # Safety
    ///
    /// A directory identity-mapping the running kernel must be loaded.
    unsafe fn enable_paging(&mut self);

    fn paging_enabled(&self) -> bool;

    /// Point the page fault vector at the kernel's handler.
    fn install_fault_handler(&mut self);

    /// Drop any cached translation of `page`.
    fn flush(&mut self, page: VirtAddr);
}

#[cfg(target_os = "none")]
pub use x86::X86Paging;

#[cfg(target_os = "none")]
mod x86 {
    use super::PagingHardware;
    use crate::interrupts::{idt, intr_handler, PAGE_FAULT_VECTOR};
    use core::arch::asm;
    use kidneyos_vm_shared::{
        mem::{Frame, VirtAddr},
        paging::PageFrame,
    };

    const CR0_WP: u32 = 1 << 16;
    const CR0_PG: u32 = 1 << 31;

    /// Physical memory as seen by the kernel, which is identity mapped both
    /// before and after paging is turned on.
    pub struct X86Paging {
        _private: (),
    }

    impl X86Paging {
        /// # Safety
        ///
        /// Only one instance may be live at a time, and every frame passed to
        /// it must be identity mapped.
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl PagingHardware for X86Paging {
        fn frame(&self, frame: Frame) -> &PageFrame {
            // SAFETY: Identity mapped and page aligned, as promised to `new`.
            unsafe { &*(frame.start_address() as *const PageFrame) }
        }

        fn frame_mut(&mut self, frame: Frame) -> &mut PageFrame {
            // SAFETY: See `frame`. The unique `&mut self` rules out aliasing.
            unsafe { &mut *(frame.start_address() as *mut PageFrame) }
        }

        unsafe fn load_directory(&mut self, directory: Frame) {
            asm!(
                "mov cr3, {}",
                in(reg) directory.start_address(),
                options(nostack)
            );
        }

        unsafe fn enable_paging(&mut self) {
            asm!(
                "
                mov {0}, cr0
                or {0}, {1}
                mov cr0, {0}
                ",
                out(reg) _,
                in(reg) CR0_PG | CR0_WP,
                options(nostack)
            );
        }

        fn paging_enabled(&self) -> bool {
            let cr0: u32;
            // SAFETY: Reading CR0 has no side effects.
            unsafe { asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack)) };
            cr0 & CR0_PG != 0
        }

        fn install_fault_handler(&mut self) {
            // SAFETY: The stub saves the interrupted context and ends in iretd.
            unsafe { idt::install_handler(PAGE_FAULT_VECTOR, intr_handler::page_fault_stub_address()) };
        }

        fn flush(&mut self, page: VirtAddr) {
            // SAFETY: invlpg only drops a TLB entry.
            unsafe { asm!("invlpg [{}]", in(reg) page.as_usize(), options(nostack)) };
        }
    }
}

#[cfg(test)]
pub use emulated::{EmulatedPaging, POISON};

#[cfg(test)]
mod emulated {
    use super::PagingHardware;
    use alloc::vec::Vec;
    use kidneyos_vm_shared::{
        mem::{Frame, VirtAddr},
        paging::PageFrame,
    };
    use zerocopy::{AsBytes, FromZeroes};

    /// Byte stale frames are filled with, so missing zeroing shows up.
    pub const POISON: u8 = 0xA5;

    /// Physical memory and the paging registers emulated on the host.
    pub struct EmulatedPaging {
        memory: Vec<PageFrame>,
        pub directory: Option<Frame>,
        pub enabled: bool,
        pub fault_handler_installed: bool,
        /// Every page passed to [`PagingHardware::flush`], in order.
        pub flushed: Vec<VirtAddr>,
    }

    impl EmulatedPaging {
        /// `frames` frames of memory holding leftover garbage.
        pub fn new(frames: usize) -> Self {
            let mut poisoned = PageFrame::new_zeroed();
            poisoned.as_bytes_mut().fill(POISON);
            EmulatedPaging {
                memory: alloc::vec![poisoned; frames],
                directory: None,
                enabled: false,
                fault_handler_installed: false,
                flushed: Vec::new(),
            }
        }
    }

    impl PagingHardware for EmulatedPaging {
        fn frame(&self, frame: Frame) -> &PageFrame {
            &self.memory[frame.number() as usize]
        }

        fn frame_mut(&mut self, frame: Frame) -> &mut PageFrame {
            &mut self.memory[frame.number() as usize]
        }

        unsafe fn load_directory(&mut self, directory: Frame) {
            self.directory = Some(directory);
        }

        unsafe fn enable_paging(&mut self) {
            assert!(self.directory.is_some(), "paging enabled without a directory");
            self.enabled = true;
        }

        fn paging_enabled(&self) -> bool {
            self.enabled
        }

        fn install_fault_handler(&mut self) {
            self.fault_handler_installed = true;
        }

        fn flush(&mut self, page: VirtAddr) {
            self.flushed.push(page);
        }
    }
}
