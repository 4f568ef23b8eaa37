pub mod paging_file;

use crate::block::block_core::{BlockManager, BlockSector, BlockType};
use crate::block::block_error::BlockError;
use crate::config::SwapDevice;
use crate::drivers::ram_disk::RamDisk;
use crate::sync::intr::{InterruptLock, InterruptLockGuard};
use alloc::boxed::Box;
use core::error::Error;
use core::fmt::{self, Display, Formatter};
use log::{debug, info};
use once_cell::race::OnceBox;
use paging_file::PagingFile;

/// Name under which a RAM-backed paging device is registered.
pub const RAM_SWAP_NAME: &str = "ramswap";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwapError {
    /// Every slot of the paging file is in use.
    NoSpace,
    /// The paging file is in the middle of a transfer further up the stack.
    Busy,
    /// Accessed before [`init_paging_file`] ran.
    Uninitialized,
    /// The paging device failed.
    Io(BlockError),
    /// No usable paging device is registered.
    NoPagingDevice,
}

impl From<BlockError> for SwapError {
    fn from(err: BlockError) -> Self {
        SwapError::Io(err)
    }
}

impl Display for SwapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SwapError::NoSpace => write!(f, "paging file is full"),
            SwapError::Busy => write!(f, "paging file is busy"),
            SwapError::Uninitialized => write!(f, "paging file is not initialized"),
            SwapError::Io(err) => write!(f, "paging device error: {err}"),
            SwapError::NoPagingDevice => write!(f, "no usable paging device"),
        }
    }
}

impl Error for SwapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SwapError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Checked handle to the paging file. Empty until boot sets it up once.
pub struct PagingFileCell(OnceBox<InterruptLock<PagingFile>>);

impl PagingFileCell {
    pub const fn new() -> Self {
        Self(OnceBox::new())
    }

    /// # Panics
    ///
    /// Panics if the paging file was already set up.
    pub fn init(&self, file: PagingFile) {
        if self.0.set(Box::new(InterruptLock::new(file))).is_err() {
            panic!("paging file initialized twice");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.0.get().is_some()
    }

    /// Take exclusive access with interrupts disabled.
    pub fn try_lock(&self) -> Result<InterruptLockGuard<'_, PagingFile>, SwapError> {
        self.0
            .get()
            .ok_or(SwapError::Uninitialized)?
            .try_lock()
            .ok_or(SwapError::Busy)
    }
}

impl Default for PagingFileCell {
    fn default() -> Self {
        Self::new()
    }
}

pub static PAGING_FILE: PagingFileCell = PagingFileCell::new();

/// Open the paging device chosen by `device` and set up `cell` over it,
/// starting at `start_sector`.
pub fn init_paging_file(
    cell: &PagingFileCell,
    block_manager: &mut BlockManager,
    device: &SwapDevice,
    start_sector: BlockSector,
) -> Result<(), SwapError> {
    if let SwapDevice::Ram(sectors) = device {
        block_manager.register_block(
            BlockType::Swap,
            RAM_SWAP_NAME,
            *sectors,
            Box::new(RamDisk::new(*sectors)),
        );
    }
    debug!("{block_manager}");

    let block = match device {
        SwapDevice::Ram(_) => block_manager.take_by_name(RAM_SWAP_NAME),
        SwapDevice::Named(name) => block_manager.take_by_name(name),
        SwapDevice::Auto => block_manager.take_by_type(BlockType::Swap),
    }
    .ok_or(SwapError::NoPagingDevice)?;

    let file = PagingFile::new(block, start_sector)?;
    info!(
        "paging file: {} slots from sector {}\n{}",
        file.slot_count(),
        start_sector,
        file.device()
    );
    cell.init(file);
    Ok(())
}
