//! Entry stubs installed in the IDT.

use crate::paging::fault::{resolve_fault, ExitStatus, FaultCause, FaultOutcome, PageFault, Pid};
use crate::paging::hw::{PagingHardware, X86Paging};
use crate::paging::{release_user_directory, USER_WINDOW};
use crate::swapping::PAGING_FILE;
use crate::system::unwrap_system;
use core::arch::{asm, global_asm};
use kidneyos_vm_shared::mem::VirtAddr;
use log::error;

extern "C" {
    fn page_fault_stub();
    fn unhandled_stub();
}

// The processor pushes an error code for #PF. The stub saves the general
// registers, passes CR2 and the error code to Rust, then discards the error
// code before returning to the faulting instruction.
global_asm!(
    "
    .global page_fault_stub
page_fault_stub:
    pushad
    mov eax, [esp + 32]
    push eax
    mov eax, cr2
    push eax
    call {entry}
    add esp, 8
    popad
    add esp, 4
    iretd

    .global unhandled_stub
unhandled_stub:
    call {unhandled}
    ",
    entry = sym page_fault_entry,
    unhandled = sym unhandled_interrupt,
);

pub fn page_fault_stub_address() -> usize {
    page_fault_stub as usize
}

pub fn unhandled_stub_address() -> usize {
    unhandled_stub as usize
}

extern "C" fn unhandled_interrupt() -> ! {
    panic!("unhandled interrupt");
}

extern "C" fn page_fault_entry(address: u32, error_code: u32) {
    let fault = PageFault {
        address: VirtAddr::new(address),
        cause: FaultCause::new_with_raw_value(error_code),
    };

    let system = unwrap_system();
    let Some(process) = system.running() else {
        panic!("page fault at {} ({}) with no process", fault.address, fault.cause);
    };

    let outcome = {
        // SAFETY: The kernel is identity mapped, and frames are only touched
        // through this instance while `resolve_fault` holds them.
        let mut hw = unsafe { X86Paging::new() };
        resolve_fault(&mut hw, &system.frames, &PAGING_FILE, fault, &process)
    };

    match outcome {
        FaultOutcome::Resolved | FaultOutcome::Retry => {}
        FaultOutcome::Terminate(status) => (system.exit_hook)(process.pid, status),
    }
}

/// Exit hook installed at boot. Switches back to the kernel directory,
/// returns the address space of `pid` and halts, as nothing else can run.
pub fn terminate_process(pid: Pid, status: ExitStatus) -> ! {
    let system = unwrap_system();
    if let Some(process) = system.running().filter(|process| process.pid == pid) {
        // SAFETY: The only instance while the frames are held below.
        let mut hw = unsafe { X86Paging::new() };
        // SAFETY: The kernel directory maps everything the kernel uses.
        unsafe { hw.load_directory(system.kernel_directory) };
        system.set_running(None);

        let mut frames = system.frames.lock();
        let mut paging_file = PAGING_FILE.try_lock().ok();
        release_user_directory(
            &mut hw,
            &mut *frames,
            paging_file.as_deref_mut(),
            process.page_directory,
            USER_WINDOW,
        );
    }

    error!("pid {}: exited with status {}, nothing left to run", pid, status.0);
    loop {
        // SAFETY: Halting with interrupts off stops the machine.
        unsafe { asm!("cli", "hlt") };
    }
}
