#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

mod block;
mod config;
mod drivers;
mod interrupts;
mod logger;
mod mem;
mod paging;
mod swapping;
mod sync;
mod system;

extern crate alloc;

use config::{BootConfig, MAX_BOOT_LINE};
use kidneyos_vm_shared::println;

/// Process owning the address space set up at boot.
#[cfg(target_os = "none")]
const INIT_PID: paging::fault::Pid = 1;

#[cfg(target_os = "none")]
#[global_allocator]
pub static KERNEL_ALLOCATOR: mem::KernelAllocator = mem::KernelAllocator::new();

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(args: &core::panic::PanicInfo) -> ! {
    kidneyos_vm_shared::eprintln!("{}", args);
    loop {}
}

/// Read the boot line handed over by the loader.
///
/// # Safety
///
/// `cmdline` must be null or point to `cmdline_len` readable bytes.
unsafe fn boot_config(cmdline: *const u8, cmdline_len: usize) -> BootConfig {
    if cmdline.is_null() {
        return BootConfig::default();
    }
    if cmdline_len > MAX_BOOT_LINE {
        println!("boot line longer than {MAX_BOOT_LINE} bytes, ignoring the rest");
    }
    let bytes = core::slice::from_raw_parts(cmdline, cmdline_len.min(MAX_BOOT_LINE));
    let Ok(line) = core::str::from_utf8(bytes) else {
        println!("boot line is not UTF-8, using defaults");
        return BootConfig::default();
    };
    match BootConfig::parse(line) {
        Ok(config) => config,
        Err(err) => {
            println!("{err}, using defaults");
            BootConfig::default()
        }
    }
}

#[cfg(target_os = "none")]
#[no_mangle]
extern "C" fn main(mem_upper_kb: usize, cmdline: *const u8, cmdline_len: usize) -> ! {
    use block::block_core::BlockManager;
    use interrupts::{idt, intr_handler::terminate_process};
    use kidneyos_vm_shared::{
        mem::{image, round_up_to_page},
        sizes::{KB, MB},
    };
    use log::{info, warn};
    use mem::{frame_allocator::CoreMap, MemoryLayout, BOOT_HEAP_SIZE};
    use paging::{
        create_user_directory,
        fault::FaultingProcess,
        hw::{PagingHardware, X86Paging},
        init_page_tables, USER_WINDOW,
    };
    use swapping::{init_paging_file, PAGING_FILE};
    use system::{init_system, SystemState};

    let heap_start = round_up_to_page(image::kernel_end());
    // SAFETY: Single core, interrupts disabled. The heap lies right after the
    // kernel image and nothing else uses it.
    unsafe { KERNEL_ALLOCATOR.init(heap_start, heap_start + BOOT_HEAP_SIZE) };

    // SAFETY: The loader passes a valid boot line.
    let config = unsafe { boot_config(cmdline, cmdline_len) };
    if logger::init(config.log_level, config.debug_faults).is_err() {
        println!("logger already installed");
    }

    // Upper memory starts at 1 MiB.
    let mem_size = config.mem_size.unwrap_or(MB + mem_upper_kb * KB);

    let Some(layout) = MemoryLayout::plan(image::kernel_end(), mem_size, &config.swap) else {
        panic!("{mem_size:#X} bytes of memory leave no frames after the kernel heap");
    };
    // SAFETY: The planned heap starts where the boot heap does and ends below
    // the first managed frame.
    unsafe { KERNEL_ALLOCATOR.grow(layout.heap.end) };

    let mut frames: CoreMap = CoreMap::new_in(layout.frames.clone());
    info!(
        "{} KiB of kernel heap, {} frames available to the core map",
        layout.heap.len() / KB,
        frames.total_frames()
    );

    // SAFETY: Single core, interrupts disabled. The kernel and every managed
    // frame lie below `mem_size`.
    let kernel_directory = unsafe {
        idt::load();
        let mut hw = X86Paging::new();
        init_page_tables(&mut hw, &mut frames, mem_size)
    };

    let mut block_manager = BlockManager::new();
    match init_paging_file(
        &PAGING_FILE,
        &mut block_manager,
        &config.swap,
        config.swap_start,
    ) {
        Ok(()) => {}
        Err(err) => warn!("running without a paging file: {err}"),
    }

    let system = init_system(SystemState::new(
        kernel_directory,
        frames,
        block_manager,
        terminate_process,
    ));

    let page_directory = {
        let mut frames = system.frames.lock();
        // SAFETY: The only instance while the frames are held.
        let mut hw = unsafe { X86Paging::new() };
        match create_user_directory(&mut hw, &mut *frames, kernel_directory, USER_WINDOW) {
            Ok(directory) => directory,
            Err(err) => panic!("no frames for the first address space: {err}"),
        }
    };
    let init = FaultingProcess {
        pid: INIT_PID,
        page_directory,
    };
    // SAFETY: The new directory shares every kernel mapping.
    unsafe { X86Paging::new().load_directory(page_directory) };
    system.set_running(Some(init));
    info!(
        "virtual memory ready, pid {} owns {}..{}",
        init.pid, USER_WINDOW.start, USER_WINDOW.end
    );

    loop {
        // SAFETY: Nothing left to do until an interrupt arrives.
        unsafe { core::arch::asm!("hlt") };
    }
}

#[cfg(all(not(target_os = "none"), not(test)))]
fn main() {
    println!("the kernel only runs on bare metal");
}
