use crate::block::block_core::{BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
use crate::block::block_error::BlockError;
use alloc::{vec, vec::Vec};

/// A block device whose sectors live in kernel memory.
///
/// Serves as the paging device when the boot line asks for `swap=ram:<n>`.
pub struct RamDisk {
    sectors: Vec<[u8; BLOCK_SECTOR_SIZE]>,
}

impl RamDisk {
    pub fn new(sectors: BlockSector) -> Self {
        Self {
            sectors: vec![[0; BLOCK_SECTOR_SIZE]; sectors as usize],
        }
    }

    fn sector(&self, sector: BlockSector) -> Result<&[u8; BLOCK_SECTOR_SIZE], BlockError> {
        self.sectors
            .get(sector as usize)
            .ok_or(BlockError::SectorOutOfBounds)
    }
}

impl BlockOp for RamDisk {
    unsafe fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        let data = self.sector(sector)?;
        buf.get_mut(..BLOCK_SECTOR_SIZE)
            .ok_or(BlockError::BufferInvalid)?
            .copy_from_slice(data);
        Ok(())
    }

    unsafe fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        let src = buf
            .get(..BLOCK_SECTOR_SIZE)
            .ok_or(BlockError::BufferInvalid)?;
        self.sectors
            .get_mut(sector as usize)
            .ok_or(BlockError::SectorOutOfBounds)?
            .copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_and_keeps_writes() {
        let mut disk = RamDisk::new(2);
        let mut buf = [0xFFu8; BLOCK_SECTOR_SIZE];
        unsafe { disk.read(1, &mut buf) }.unwrap();
        assert!(buf.iter().all(|b| *b == 0));

        buf[0] = 0xAB;
        unsafe { disk.write(1, &buf) }.unwrap();
        let mut back = [0u8; BLOCK_SECTOR_SIZE];
        unsafe { disk.read(1, &mut back) }.unwrap();
        assert_eq!(back[0], 0xAB);
    }

    #[test]
    fn driver_bounds_are_checked() {
        let mut disk = RamDisk::new(1);
        let mut buf = [0u8; BLOCK_SECTOR_SIZE];
        assert_eq!(unsafe { disk.read(1, &mut buf) }, Err(BlockError::SectorOutOfBounds));
    }
}
