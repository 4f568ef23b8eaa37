// https://wiki.osdev.org/Interrupt_Descriptor_Table
// https://wiki.osdev.org/Exceptions

use arbitrary_int::{u2, u4};
use bitbybit::bitfield;

/// 32-bit interrupt gate: interrupts stay disabled in the handler.
const INTERRUPT_GATE: u4 = u4::new(0xE);
const KERNEL_CODE_SELECTOR: u16 = 0x8;

#[repr(align(8))]
#[bitfield(u64, default = 0)]
pub struct GateDescriptor {
    #[bits([0..=15, 48..=63], rw)]
    offset: u32,
    #[bits(16..=31, rw)]
    segment_selector: u16,
    #[bits(40..=43, rw)]
    gate_type: u4,
    #[bits(45..=46, rw)]
    descriptor_privilege_level: u2,
    #[bit(47, rw)]
    present: bool,
}

impl GateDescriptor {
    /// A present interrupt gate into kernel code at `handler`, reachable from
    /// hardware only.
    pub fn interrupt_gate(handler: u32) -> Self {
        Self::DEFAULT
            .with_offset(handler)
            .with_segment_selector(KERNEL_CODE_SELECTOR)
            .with_gate_type(INTERRUPT_GATE)
            .with_descriptor_privilege_level(u2::new(0))
            .with_present(true)
    }
}

pub const IDT_LEN: usize = 256;

#[cfg(target_os = "none")]
pub use table::{install_handler, load};

#[cfg(target_os = "none")]
mod table {
    // u32 is wide enough since we're writing 32-bit code.
    #![allow(clippy::cast_possible_truncation)]

    use super::{GateDescriptor, IDT_LEN};
    use crate::interrupts::intr_handler;
    use core::{arch::asm, mem::size_of, ptr::addr_of_mut};

    #[repr(packed)]
    struct IDTDescriptor {
        #[allow(unused)]
        size: u16,
        offset: u32,
    }

    static mut IDT: [GateDescriptor; IDT_LEN] = [GateDescriptor::DEFAULT; IDT_LEN];

    static mut IDT_DESCRIPTOR: IDTDescriptor = IDTDescriptor {
        size: size_of::<[GateDescriptor; IDT_LEN]>() as u16 - 1,
        offset: 0, // Will fetch pointer and set at runtime below.
    };

    /// Point every vector at the unhandled-interrupt stub and load the table.
    ///
    /// # Safety
    ///
    /// Must run once, with interrupts disabled, before any gate is installed.
    pub unsafe fn load() {
        let idt = &mut *addr_of_mut!(IDT);
        let unhandled = intr_handler::unhandled_stub_address() as u32;
        for gate in idt.iter_mut() {
            *gate = GateDescriptor::interrupt_gate(unhandled);
        }

        let descriptor = &mut *addr_of_mut!(IDT_DESCRIPTOR);
        descriptor.offset = idt.as_ptr() as u32;
        asm!("lidt [{}]", in(reg) descriptor as *const IDTDescriptor, options(nostack));
    }

    /// Route `vector` to the code at `handler`.
    ///
    /// # Safety
    ///
    /// `handler` must be an interrupt entry stub that ends in `iretd`.
    pub unsafe fn install_handler(vector: u8, handler: usize) {
        let idt = &mut *addr_of_mut!(IDT);
        idt[usize::from(vector)] = GateDescriptor::interrupt_gate(handler as u32);
    }
}
