pub mod idt;
#[cfg(target_os = "none")]
pub mod intr_handler;

/// Hardware vector of the page fault exception (#PF).
pub const PAGE_FAULT_VECTOR: u8 = 0xE;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IntrLevel {
    IntrOn,
    IntrOff,
}

#[cfg(target_os = "none")]
mod level {
    use super::IntrLevel;
    use core::{
        arch::asm,
        sync::atomic::{compiler_fence, Ordering},
    };

    pub fn intr_get_level() -> IntrLevel {
        let flags: u32;
        unsafe {
            asm!(
            "pushfd",
            "mov {}, [esp]",
            "popfd",
            out(reg) flags
            );
        }

        if flags & (1 << 9) != 0 {
            IntrLevel::IntrOn
        } else {
            IntrLevel::IntrOff
        }
    }

    #[inline(always)]
    pub fn intr_enable() {
        compiler_fence(Ordering::SeqCst);
        unsafe {
            asm!("sti", options(nomem, nostack));
        }
    }

    #[inline(always)]
    pub fn intr_disable() {
        unsafe {
            asm!("cli", options(nomem, nostack));
        }
        compiler_fence(Ordering::SeqCst);
    }
}

// Host builds keep a per-thread interrupt flag so the critical-section
// discipline can be exercised by unit tests running in parallel.
#[cfg(not(target_os = "none"))]
mod level {
    use super::IntrLevel;
    use std::cell::Cell;

    std::thread_local! {
        static INTERRUPTS_ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    pub fn intr_get_level() -> IntrLevel {
        if INTERRUPTS_ENABLED.with(Cell::get) {
            IntrLevel::IntrOn
        } else {
            IntrLevel::IntrOff
        }
    }

    pub fn intr_enable() {
        INTERRUPTS_ENABLED.with(|flag| flag.set(true));
    }

    pub fn intr_disable() {
        INTERRUPTS_ENABLED.with(|flag| flag.set(false));
    }
}

pub use level::{intr_disable, intr_enable, intr_get_level};
