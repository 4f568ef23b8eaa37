pub const KB: usize = 1024;
pub const MB: usize = KB * KB;

/// Sector size of every block device we talk to.
pub const SECTOR_SIZE: usize = 512;
/// Size of the paging area when the boot line asks for a RAM disk without
/// giving a sector count.
pub const DEFAULT_SWAP_SECTORS: u32 = 8192;
