use crate::block::block_core::BlockManager;
use crate::mem::frame_allocator::CoreMap;
use crate::paging::fault::{ExitStatus, FaultingProcess, Pid};
use crate::sync::intr::InterruptLock;
use alloc::boxed::Box;
use kidneyos_vm_shared::mem::Frame;
use once_cell::race::OnceBox;

/// Called when the fault handler kills a process. Does not return to it.
pub type ExitHook = fn(Pid, ExitStatus) -> !;

pub struct SystemState {
    pub kernel_directory: Frame,
    pub frames: InterruptLock<CoreMap>,
    pub block_manager: InterruptLock<BlockManager>,
    running: InterruptLock<Option<FaultingProcess>>,
    pub exit_hook: ExitHook,
}

static SYSTEM: OnceBox<SystemState> = OnceBox::new();

impl SystemState {
    pub fn new(
        kernel_directory: Frame,
        frames: CoreMap,
        block_manager: BlockManager,
        exit_hook: ExitHook,
    ) -> Self {
        SystemState {
            kernel_directory,
            frames: InterruptLock::new(frames),
            block_manager: InterruptLock::new(block_manager),
            running: InterruptLock::new(None),
            exit_hook,
        }
    }

    /// The process whose address space is loaded, if any.
    pub fn running(&self) -> Option<FaultingProcess> {
        self.running.try_lock().and_then(|process| *process)
    }

    pub fn set_running(&self, process: Option<FaultingProcess>) {
        *self.running.lock() = process;
    }
}

/// # Panics
///
/// Panics if called twice.
pub fn init_system(state: SystemState) -> &'static SystemState {
    if SYSTEM.set(Box::new(state)).is_err() {
        panic!("System initialized twice.");
    }
    unwrap_system()
}

pub fn unwrap_system() -> &'static SystemState {
    match SYSTEM.get() {
        Some(system) => system,
        None => panic!("System not initialized."),
    }
}
