//! Page fault resolution: demand-zero pages and pages coming back from the
//! paging file.

use super::hw::PagingHardware;
use super::{walk, PteRef};
use crate::interrupts::{intr_get_level, IntrLevel};
use crate::mem::eviction::{alloc_pageable_frame_or_evict, ReclaimError};
use crate::mem::frame_allocator::{FrameAllocator, FrameOwner, OutOfFrames};
use crate::swapping::{paging_file::PagingFile, PagingFileCell, SwapError};
use crate::sync::intr::InterruptLock;
use bitbybit::bitfield;
use core::fmt;
use kidneyos_vm_shared::{
    mem::{Frame, VirtAddr},
    paging::{Mapping, PageTableEntry, SwapSlot},
};
use log::{debug, warn};
use zerocopy::FromZeroes;

/// The error code the processor pushes for a page fault.
#[bitfield(u32, default = 0)]
pub struct FaultCause {
    /// Set for a protection violation, clear for a non-present page.
    #[bit(0, rw)]
    protection_violation: bool,
    #[bit(1, rw)]
    write: bool,
    #[bit(2, rw)]
    user: bool,
    #[bit(3, rw)]
    reserved_bit: bool,
    #[bit(4, rw)]
    instruction_fetch: bool,
}

impl fmt::Debug for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultCause({:#b})", self.raw_value())
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} fault, in {} mode",
            if self.protection_violation() {
                "protection violation"
            } else {
                "non-present page"
            },
            if self.write() { "write" } else { "read" },
            if self.user() { "user" } else { "supervisor" },
        )?;
        if self.reserved_bit() {
            write!(f, ", reserved bit set")?;
        }
        if self.instruction_fetch() {
            write!(f, ", instruction fetch")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PageFault {
    pub address: VirtAddr,
    pub cause: FaultCause,
}

pub type Pid = u16;

/// What the fault handler needs to know about the running process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FaultingProcess {
    pub pid: Pid,
    pub page_directory: Frame,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const ACCESS_VIOLATION: ExitStatus = ExitStatus(-1);
    pub const UNHANDLED_FAULT: ExitStatus = ExitStatus(-2);
    pub const OUT_OF_MEMORY: ExitStatus = ExitStatus(-3);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FaultOutcome {
    /// The page is mapped; restart the faulting instruction.
    Resolved,
    /// Paging state is in use further up the stack. Nothing was changed and
    /// the instruction should simply run again.
    Retry,
    /// Kill the faulting process with this status.
    Terminate(ExitStatus),
}

/// Resolve `fault` for the running `process`, unless the frames are already
/// held further up the stack, in which case the instruction is retried.
///
/// # Panics
///
/// Panics on a fault in supervisor mode before looking at the frames, so a
/// kernel fault inside a transfer window is not retried forever.
pub fn resolve_fault<H, F>(
    hw: &mut H,
    frames: &InterruptLock<F>,
    paging_file: &PagingFileCell,
    fault: PageFault,
    process: &FaultingProcess,
) -> FaultOutcome
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator,
{
    if !fault.cause.user() {
        panic!("page fault in kernel at {}: {}", fault.address, fault.cause);
    }

    let Some(mut frames) = frames.try_lock() else {
        debug!("pid {}: frames busy, retrying {}", process.pid, fault.address);
        return FaultOutcome::Retry;
    };
    Pager::new(hw, &mut *frames, paging_file).handle_fault(fault, process)
}

/// Resolves page faults against one set of paging hardware, frames and
/// paging file. Must be driven with interrupts disabled.
pub struct Pager<'a, H: ?Sized, F: ?Sized> {
    hw: &'a mut H,
    frames: &'a mut F,
    paging_file: &'a PagingFileCell,
}

impl<'a, H, F> Pager<'a, H, F>
where
    H: PagingHardware + ?Sized,
    F: FrameAllocator + ?Sized,
{
    pub fn new(hw: &'a mut H, frames: &'a mut F, paging_file: &'a PagingFileCell) -> Self {
        Pager {
            hw,
            frames,
            paging_file,
        }
    }

    /// # Panics
    ///
    /// Panics on faults that mean the kernel itself is broken: a fault in
    /// supervisor mode, a user address with no page table, or a paging
    /// device failure.
    pub fn handle_fault(&mut self, fault: PageFault, process: &FaultingProcess) -> FaultOutcome {
        assert_eq!(
            intr_get_level(),
            IntrLevel::IntrOff,
            "page fault handled with interrupts enabled"
        );

        debug!(
            "pid {}: page fault at {} ({}), {} frames free",
            process.pid,
            fault.address,
            fault.cause,
            self.frames.free_frames()
        );

        if !fault.cause.user() {
            panic!("page fault in kernel at {}: {}", fault.address, fault.cause);
        }

        let Some(pte) = walk(&*self.hw, process.page_directory, fault.address) else {
            panic!(
                "pid {}: no page table for {} in {:?}",
                process.pid, fault.address, process.page_directory
            );
        };

        if fault.cause.protection_violation() {
            warn!(
                "pid {}: access violation at {} ({})",
                process.pid, fault.address, fault.cause
            );
            return FaultOutcome::Terminate(ExitStatus::ACCESS_VIOLATION);
        }

        let page = fault.address.page_base();
        let outcome = match pte.read(&*self.hw).mapping() {
            Mapping::Swapped(slot) => self.page_in(pte, page, slot),
            Mapping::Absent => self.zero_fill(pte, page),
            Mapping::Frame(frame) => {
                warn!(
                    "pid {}: not-present fault on {} mapped to {:?}",
                    process.pid, page, frame
                );
                FaultOutcome::Terminate(ExitStatus::UNHANDLED_FAULT)
            }
        };

        if let FaultOutcome::Terminate(status) = outcome {
            warn!("pid {}: terminated with status {}", process.pid, status.0);
        }
        outcome
    }

    /// Allocate the frame for `owner`, evicting if needed. Exhaustion kills
    /// the process; a failing paging device is fatal.
    fn alloc_frame(
        &mut self,
        owner: FrameOwner,
        paging_file: &mut PagingFile,
    ) -> Result<Frame, FaultOutcome> {
        alloc_pageable_frame_or_evict(&mut *self.hw, &mut *self.frames, paging_file, owner)
            .map_err(|err| {
                if let ReclaimError::Swap(SwapError::Io(io)) = err {
                    panic!("paging device failed while evicting: {io}");
                }
                warn!("out of memory paging in {}: {}", owner.vaddr, err);
                FaultOutcome::Terminate(ExitStatus::OUT_OF_MEMORY)
            })
    }

    fn page_in(&mut self, pte: PteRef, page: VirtAddr, slot: SwapSlot) -> FaultOutcome {
        let cell = self.paging_file;
        let mut file = match cell.try_lock() {
            Ok(file) => file,
            Err(SwapError::Busy) => return FaultOutcome::Retry,
            Err(err) => panic!("{page} is in {slot:?} but the paging file is unusable: {err}"),
        };

        let frame = match self.alloc_frame(FrameOwner { pte, vaddr: page }, &mut file) {
            Ok(frame) => frame,
            Err(outcome) => return outcome,
        };

        let pinned = self
            .frames
            .core_map_entry(frame)
            .with_pageable(false)
            .with_locked(true);
        self.frames.set_core_map_entry(frame, pinned);
        self.hw.frame_mut(frame).zero();

        if let Err(err) = file.read_from_swap(self.hw.frame_mut(frame), pinned, slot) {
            panic!("cannot read {slot:?} back into {page}: {err}");
        }

        self.frames
            .set_core_map_entry(frame, pinned.with_locked(false).with_pageable(true));
        pte.write(&mut *self.hw, PageTableEntry::user_page(frame));

        debug!("paged in {} from slot {} to {:?}", page, slot.index(), frame);
        FaultOutcome::Resolved
    }

    fn zero_fill(&mut self, pte: PteRef, page: VirtAddr) -> FaultOutcome {
        let owner = FrameOwner { pte, vaddr: page };
        let frame = match self.frames.alloc_pageable_frame(owner) {
            Ok(frame) => frame,
            Err(OutOfFrames) => {
                let cell = self.paging_file;
                let mut file = match cell.try_lock() {
                    Ok(file) => file,
                    Err(SwapError::Busy) => return FaultOutcome::Retry,
                    Err(err) => {
                        warn!("out of memory mapping {}: {}", page, err);
                        return FaultOutcome::Terminate(ExitStatus::OUT_OF_MEMORY);
                    }
                };
                match self.alloc_frame(owner, &mut file) {
                    Ok(frame) => frame,
                    Err(outcome) => return outcome,
                }
            }
        };

        self.hw.frame_mut(frame).zero();
        pte.write(&mut *self.hw, PageTableEntry::user_page(frame).with_accessed(true));

        debug!("zero-filled {} in {:?}", page, frame);
        FaultOutcome::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::block_core::{BlockManager, BlockOp, BlockSector, BlockType};
    use crate::block::block_error::BlockError;
    use crate::drivers::ram_disk::RamDisk;
    use crate::mem::frame_allocator::CoreMap;
    use crate::paging::hw::{EmulatedPaging, POISON};
    use crate::paging::testing::Machine;
    use crate::paging::USER_BASE;
    use crate::swapping::paging_file::SECTORS_PER_PAGE;
    use crate::sync::intr::hold_interrupts;
    use alloc::{boxed::Box, vec, vec::Vec};
    use kidneyos_vm_shared::paging::{KERNEL_INFO_NONE, PAGE_TABLE_LEN};
    use std::sync::{Arc, Mutex};
    use zerocopy::AsBytes;

    fn user_fault(address: VirtAddr) -> PageFault {
        PageFault {
            address,
            cause: FaultCause::DEFAULT.with_user(true).with_write(true),
        }
    }

    fn fault(machine: &mut Machine, fault: PageFault) -> FaultOutcome {
        let _irq = hold_interrupts(IntrLevel::IntrOff);
        let process = machine.process;
        machine.pager().handle_fault(fault, &process)
    }

    fn page_bytes(machine: &Machine, vaddr: VirtAddr) -> &[u8] {
        let frame = machine.resident(vaddr).unwrap();
        machine.hw.frame(frame).as_bytes()
    }

    #[test]
    fn untouched_page_is_zero_filled() {
        let mut machine = Machine::new(8, 4);
        let free = machine.frames.free_frames();
        let address = VirtAddr::new(Machine::page(5).as_u32() + 0x123);

        assert_eq!(fault(&mut machine, user_fault(address)), FaultOutcome::Resolved);

        let pte = machine.pte(address);
        assert!(pte.present() && pte.read_write() && pte.user_supervisor() && pte.accessed());
        assert!(page_bytes(&machine, address).iter().all(|b| *b == 0));
        assert_eq!(machine.frames.free_frames(), free - 1);

        let file = machine.paging_file.try_lock().unwrap();
        assert_eq!(file.device().get_read_count(), 0);
        assert_eq!(file.stats().page_ins, 0);
    }

    #[test]
    fn zero_filled_frame_is_owned_by_the_faulting_entry() {
        let mut machine = Machine::new(8, 0);
        let page = Machine::page(1);
        assert_eq!(fault(&mut machine, user_fault(page)), FaultOutcome::Resolved);

        let frame = machine.resident(page).unwrap();
        let owner = machine.frames.owner(frame).unwrap();
        assert_eq!(owner.vaddr, page);
        assert_eq!(owner.pte.index, 1);
        assert!(machine.frames.core_map_entry(frame).evictable());
    }

    #[test]
    fn swapped_page_comes_back_intact() {
        // Two user frames: touching a third page evicts the first.
        let mut machine = Machine::new(6, 4);
        for n in 0..3 {
            assert_eq!(fault(&mut machine, user_fault(Machine::page(n))), FaultOutcome::Resolved);
            machine.fill(Machine::page(n), 0x40 + n as u8);
        }
        let slot = match machine.pte(Machine::page(0)).mapping() {
            Mapping::Swapped(slot) => slot,
            other => panic!("page 0 not evicted: {other:?}"),
        };

        // Page 2 reused page 0's frame, so bringing page 0 back evicts it.
        let reads_before = machine.paging_file.try_lock().unwrap().device().get_read_count();
        assert_eq!(fault(&mut machine, user_fault(Machine::page(0))), FaultOutcome::Resolved);

        let pte = machine.pte(Machine::page(0));
        assert!(pte.present() && pte.user_supervisor() && pte.read_write());
        assert_eq!(pte.kernel_info(), KERNEL_INFO_NONE);
        assert!(page_bytes(&machine, Machine::page(0)).iter().all(|b| *b == 0x40));
        assert_eq!(
            machine.pte(Machine::page(2)).mapping(),
            Mapping::Swapped(SwapSlot::new(1))
        );
        assert!(machine.resident(Machine::page(1)).is_some());

        let file = machine.paging_file.try_lock().unwrap();
        assert_eq!(file.stats().page_ins, 1);
        assert_eq!(file.device().get_read_count() - reads_before, 8);
        assert!(!file.is_slot_used(slot));
    }

    #[test]
    fn swap_in_allocates_one_frame_and_frees_the_slot() {
        let mut machine = Machine::new(8, 4);
        assert_eq!(fault(&mut machine, user_fault(Machine::page(2))), FaultOutcome::Resolved);
        machine.fill(Machine::page(2), 0x77);

        let frame = machine.resident(Machine::page(2)).unwrap();
        let slot = {
            let mut file = machine.paging_file.try_lock().unwrap();
            crate::mem::eviction::page_out(&mut machine.hw, &mut machine.frames, &mut file, frame)
                .unwrap()
        };
        let free = machine.frames.free_frames();

        assert_eq!(fault(&mut machine, user_fault(Machine::page(2))), FaultOutcome::Resolved);

        assert_eq!(machine.frames.free_frames(), free - 1);
        assert!(page_bytes(&machine, Machine::page(2)).iter().all(|b| *b == 0x77));
        let file = machine.paging_file.try_lock().unwrap();
        assert!(!file.is_slot_used(slot));
        assert_eq!(file.stats(), crate::swapping::paging_file::SwapStats { page_ins: 1, page_outs: 1 });
        drop(file);

        let frame = machine.resident(Machine::page(2)).unwrap();
        assert!(machine.frames.core_map_entry(frame).evictable());
    }

    #[test]
    fn protection_violation_only_terminates() {
        let mut machine = Machine::new(8, 4);
        assert_eq!(fault(&mut machine, user_fault(Machine::page(0))), FaultOutcome::Resolved);
        let free = machine.frames.free_frames();
        let before = machine.pte(Machine::page(0)).raw_value();

        let violation = PageFault {
            address: Machine::page(0),
            cause: FaultCause::DEFAULT
                .with_user(true)
                .with_write(true)
                .with_protection_violation(true),
        };
        assert_eq!(
            fault(&mut machine, violation),
            FaultOutcome::Terminate(ExitStatus::ACCESS_VIOLATION)
        );

        assert_eq!(machine.frames.free_frames(), free);
        assert_eq!(machine.pte(Machine::page(0)).raw_value(), before);
        let file = machine.paging_file.try_lock().unwrap();
        assert_eq!(file.free_slots(), 4);
        assert_eq!(file.device().get_read_count() + file.device().get_write_count(), 0);
    }

    #[test]
    fn present_entry_with_not_present_fault_is_unhandled() {
        let mut machine = Machine::new(8, 4);
        let page = Machine::page(3);
        assert_eq!(fault(&mut machine, user_fault(page)), FaultOutcome::Resolved);
        assert_eq!(
            fault(&mut machine, user_fault(page)),
            FaultOutcome::Terminate(ExitStatus::UNHANDLED_FAULT)
        );
    }

    #[test]
    fn exhaustion_terminates_cleanly() {
        // No user frames, nothing evictable.
        let mut machine = Machine::new(4, 4);
        assert_eq!(
            fault(&mut machine, user_fault(Machine::page(0))),
            FaultOutcome::Terminate(ExitStatus::OUT_OF_MEMORY)
        );
        assert_eq!(machine.pte(Machine::page(0)).mapping(), Mapping::Absent);
    }

    #[test]
    fn full_paging_file_terminates_cleanly() {
        // One user frame and one slot.
        let mut machine = Machine::new(5, 1);
        assert_eq!(fault(&mut machine, user_fault(Machine::page(0))), FaultOutcome::Resolved);
        assert_eq!(fault(&mut machine, user_fault(Machine::page(1))), FaultOutcome::Resolved);
        assert_eq!(
            fault(&mut machine, user_fault(Machine::page(2))),
            FaultOutcome::Terminate(ExitStatus::OUT_OF_MEMORY)
        );
        assert!(machine.resident(Machine::page(1)).is_some());
        assert_eq!(machine.pte(Machine::page(2)).mapping(), Mapping::Absent);
    }

    #[test]
    fn missing_paging_file_means_out_of_memory() {
        let mut machine = Machine::new(5, 0);
        assert_eq!(fault(&mut machine, user_fault(Machine::page(0))), FaultOutcome::Resolved);
        assert_eq!(
            fault(&mut machine, user_fault(Machine::page(1))),
            FaultOutcome::Terminate(ExitStatus::OUT_OF_MEMORY)
        );
        assert!(machine.resident(Machine::page(0)).is_some());
    }

    #[test]
    fn busy_paging_file_means_retry() {
        let mut machine = Machine::new(6, 4);
        for n in 0..3 {
            fault(&mut machine, user_fault(Machine::page(n)));
        }
        let before = machine.pte(Machine::page(0));
        assert!(before.is_swapped());

        let _irq = hold_interrupts(IntrLevel::IntrOff);
        let held = machine.paging_file.try_lock().unwrap();
        let process = machine.process;
        let mut pager = Pager::new(&mut machine.hw, &mut machine.frames, &machine.paging_file);
        assert_eq!(
            pager.handle_fault(user_fault(Machine::page(0)), &process),
            FaultOutcome::Retry
        );
        drop(held);

        assert_eq!(machine.pte(Machine::page(0)).raw_value(), before.raw_value());
    }

    #[test]
    fn interrupts_stay_disabled_after_swap_in() {
        let mut machine = Machine::new(6, 4);
        for n in 0..3 {
            fault(&mut machine, user_fault(Machine::page(n)));
        }
        let _irq = hold_interrupts(IntrLevel::IntrOff);
        let process = machine.process;
        machine.pager().handle_fault(user_fault(Machine::page(0)), &process);
        assert_eq!(intr_get_level(), IntrLevel::IntrOff);
    }

    #[test]
    fn reused_frames_do_not_leak_old_content() {
        let mut machine = Machine::new(6, 4);
        fault(&mut machine, user_fault(Machine::page(0)));
        fault(&mut machine, user_fault(Machine::page(1)));
        machine.fill(Machine::page(0), POISON);

        // Evicts page 0 and reuses its frame for page 2.
        fault(&mut machine, user_fault(Machine::page(2)));
        assert!(page_bytes(&machine, Machine::page(2)).iter().all(|b| *b == 0));
    }

    #[test]
    #[should_panic(expected = "page fault in kernel")]
    fn supervisor_fault_is_fatal() {
        let mut machine = Machine::new(8, 4);
        let kernel_fault = PageFault {
            address: Machine::page(0),
            cause: FaultCause::DEFAULT.with_write(true),
        };
        fault(&mut machine, kernel_fault);
    }

    #[test]
    #[should_panic(expected = "no page table")]
    fn address_without_page_table_is_fatal() {
        let mut machine = Machine::new(8, 4);
        let outside = VirtAddr::from_indices(Machine::page(0).directory_index() + 1, 0);
        fault(&mut machine, user_fault(outside));
    }

    #[test]
    #[should_panic(expected = "interrupts enabled")]
    fn must_run_with_interrupts_disabled() {
        let mut machine = Machine::new(8, 4);
        let process = machine.process;
        let _irq = hold_interrupts(IntrLevel::IntrOn);
        machine.pager().handle_fault(user_fault(Machine::page(0)), &process);
    }

    #[test]
    fn every_user_page_in_the_table_can_fault_in() {
        let mut machine = Machine::new(8, 0);
        let last = Machine::page(PAGE_TABLE_LEN - 1);
        assert_eq!(fault(&mut machine, user_fault(last)), FaultOutcome::Resolved);
        assert_eq!(machine.pte(last).mapping(), Mapping::Frame(machine.resident(last).unwrap()));
    }

    #[test]
    fn cause_reads_like_the_error_code() {
        let cause = FaultCause::new_with_raw_value(0b111);
        assert_eq!(
            alloc::format!("{cause}"),
            "protection violation, write fault, in user mode"
        );
        assert_eq!(
            alloc::format!("{}", FaultCause::new_with_raw_value(0b10000)),
            "non-present page, read fault, in supervisor mode, instruction fetch"
        );
    }

    /// Paging device noting the interrupt level at every sector read.
    struct LevelRecordingDisk {
        disk: RamDisk,
        reads: Arc<Mutex<Vec<IntrLevel>>>,
    }

    impl BlockOp for LevelRecordingDisk {
        unsafe fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
            self.reads.lock().unwrap().push(intr_get_level());
            self.disk.read(sector, buf)
        }

        unsafe fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
            self.disk.write(sector, buf)
        }
    }

    #[test]
    fn swap_in_reads_with_interrupts_on_and_returns_with_them_off() {
        let mut machine = Machine::new(8, 0);
        let sectors = (4 * SECTORS_PER_PAGE) as BlockSector;
        let reads = Arc::new(Mutex::new(Vec::new()));
        let mut manager = BlockManager::new();
        manager.register_block(
            BlockType::Swap,
            "swap",
            sectors,
            Box::new(LevelRecordingDisk {
                disk: RamDisk::new(sectors),
                reads: Arc::clone(&reads),
            }),
        );
        let device = manager.take_by_name("swap").unwrap();
        machine
            .paging_file
            .init(PagingFile::new(device, 0).unwrap());

        let page = Machine::page(1);
        assert_eq!(fault(&mut machine, user_fault(page)), FaultOutcome::Resolved);
        machine.fill(page, 0x3C);
        let frame = machine.resident(page).unwrap();
        {
            let mut file = machine.paging_file.try_lock().unwrap();
            crate::mem::eviction::page_out(&mut machine.hw, &mut machine.frames, &mut file, frame)
                .unwrap();
        }
        assert!(reads.lock().unwrap().is_empty());

        let _irq = hold_interrupts(IntrLevel::IntrOff);
        let process = machine.process;
        let outcome = machine.pager().handle_fault(user_fault(page), &process);

        assert_eq!(outcome, FaultOutcome::Resolved);
        assert_eq!(intr_get_level(), IntrLevel::IntrOff);
        assert_eq!(*reads.lock().unwrap(), vec![IntrLevel::IntrOn; SECTORS_PER_PAGE]);
        assert!(page_bytes(&machine, page).iter().all(|b| *b == 0x3C));
    }

    fn idle_process() -> FaultingProcess {
        FaultingProcess {
            pid: 3,
            page_directory: Frame::new(1),
        }
    }

    #[test]
    fn held_frames_make_user_faults_retry() {
        let mut hw = EmulatedPaging::new(4);
        let frames: InterruptLock<CoreMap> = InterruptLock::new(CoreMap::new_in(2..4));
        let cell = PagingFileCell::new();
        let _held = frames.lock();

        assert_eq!(
            resolve_fault(&mut hw, &frames, &cell, user_fault(USER_BASE), &idle_process()),
            FaultOutcome::Retry
        );
        assert_eq!(hw.frame(Frame::new(2)).as_bytes()[0], POISON);
    }

    #[test]
    #[should_panic(expected = "page fault in kernel")]
    fn kernel_fault_with_frames_held_is_fatal() {
        let mut hw = EmulatedPaging::new(4);
        let frames: InterruptLock<CoreMap> = InterruptLock::new(CoreMap::new_in(2..4));
        let cell = PagingFileCell::new();
        let _held = frames.lock();

        let kernel_fault = PageFault {
            address: VirtAddr::new(0x0010_0000),
            cause: FaultCause::DEFAULT.with_write(true),
        };
        resolve_fault(&mut hw, &frames, &cell, kernel_fault, &idle_process());
    }

    #[test]
    fn free_frames_resolve_through_the_lock() {
        let mut machine = Machine::new(8, 4);
        let frames = InterruptLock::new(core::mem::replace(
            &mut machine.frames,
            CoreMap::new_in(0..0),
        ));
        let page = Machine::page(6);

        let outcome = resolve_fault(
            &mut machine.hw,
            &frames,
            &machine.paging_file,
            user_fault(page),
            &machine.process,
        );

        assert_eq!(outcome, FaultOutcome::Resolved);
        assert!(!frames.is_locked());
        assert!(machine.resident(page).is_some());
    }
}
