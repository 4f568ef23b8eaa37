//! Boot command line options, e.g. `mem=64M swap=ram:8192 loglevel=debug`.

use crate::block::block_core::BlockSector;
use alloc::string::{String, ToString};
use core::error::Error;
use core::fmt::{self, Display, Formatter};
use core::str::FromStr;
use kidneyos_vm_shared::sizes::{DEFAULT_SWAP_SECTORS, KB, MB};
use log::LevelFilter;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, digit1, one_of},
    combinator::{all_consuming, map, map_opt, map_res, opt, value},
    sequence::{pair, preceded},
    IResult,
};

/// Longest boot line read; the rest is ignored.
pub const MAX_BOOT_LINE: usize = 4096;

/// Where the paging file lives.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SwapDevice {
    /// The first registered device of swap type.
    Auto,
    /// A registered device, by name.
    Named(String),
    /// A RAM disk of the given number of sectors, created at boot.
    Ram(BlockSector),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BootConfig {
    /// Overrides the memory size reported by the boot loader, in bytes.
    pub mem_size: Option<usize>,
    pub swap: SwapDevice,
    /// First sector of the paging area on the swap device.
    pub swap_start: BlockSector,
    pub log_level: LevelFilter,
    /// Log every page fault.
    pub debug_faults: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            mem_size: None,
            swap: SwapDevice::Ram(DEFAULT_SWAP_SECTORS),
            swap_start: 0,
            log_level: LevelFilter::Info,
            debug_faults: false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConfigError {
    UnknownOption(String),
    InvalidValue(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownOption(option) => write!(f, "unknown boot option \"{option}\""),
            ConfigError::InvalidValue(option) => write!(f, "invalid value in \"{option}\""),
        }
    }
}

impl Error for ConfigError {}

const KEYS: [&str; 5] = ["mem", "swap", "swapstart", "loglevel", "debugfaults"];

#[derive(Clone)]
enum BootOption {
    Mem(usize),
    Swap(SwapDevice),
    SwapStart(BlockSector),
    LogLevel(LevelFilter),
    DebugFaults,
}

fn number<T: FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, str::parse)(input)
}

/// A byte count with an optional `K` or `M` suffix.
fn size(input: &str) -> IResult<&str, usize> {
    map_opt(pair(number::<usize>, opt(one_of("KkMm"))), |(n, unit)| {
        match unit {
            None => Some(n),
            Some('K' | 'k') => n.checked_mul(KB),
            Some(_) => n.checked_mul(MB),
        }
    })(input)
}

fn swap_device(input: &str) -> IResult<&str, SwapDevice> {
    alt((
        map(preceded(tag("ram:"), number), SwapDevice::Ram),
        map(take_while1(|c: char| !c.is_whitespace()), |name: &str| {
            if name == "auto" {
                SwapDevice::Auto
            } else {
                SwapDevice::Named(name.to_string())
            }
        }),
    ))(input)
}

fn boot_option(input: &str) -> IResult<&str, BootOption> {
    alt((
        map(preceded(tag("mem="), size), BootOption::Mem),
        map(preceded(tag("swapstart="), number), BootOption::SwapStart),
        map(preceded(tag("swap="), swap_device), BootOption::Swap),
        map(
            preceded(tag("loglevel="), map_res(alpha1, LevelFilter::from_str)),
            BootOption::LogLevel,
        ),
        value(BootOption::DebugFaults, tag("debugfaults")),
    ))(input)
}

impl BootConfig {
    /// Parse a whitespace-separated list of options. Options not given keep
    /// their defaults; later options override earlier ones.
    pub fn parse(cmdline: &str) -> Result<Self, ConfigError> {
        let mut config = BootConfig::default();

        for token in cmdline.split_ascii_whitespace() {
            let option = match all_consuming(boot_option)(token) {
                Ok((_, option)) => option,
                Err(_) => {
                    let key = token.split('=').next().unwrap_or(token);
                    return Err(if KEYS.contains(&key) {
                        ConfigError::InvalidValue(token.to_string())
                    } else {
                        ConfigError::UnknownOption(token.to_string())
                    });
                }
            };

            match option {
                BootOption::Mem(bytes) => config.mem_size = Some(bytes),
                BootOption::Swap(device) => config.swap = device,
                BootOption::SwapStart(sector) => config.swap_start = sector,
                BootOption::LogLevel(level) => config.log_level = level,
                BootOption::DebugFaults => config.debug_faults = true,
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_gives_defaults() {
        assert_eq!(BootConfig::parse("  "), Ok(BootConfig::default()));
    }

    #[test]
    fn all_options() {
        let config =
            BootConfig::parse("mem=64M swap=hdb swapstart=1024 loglevel=debug debugfaults").unwrap();
        assert_eq!(
            config,
            BootConfig {
                mem_size: Some(64 * MB),
                swap: SwapDevice::Named("hdb".to_string()),
                swap_start: 1024,
                log_level: LevelFilter::Debug,
                debug_faults: true,
            }
        );
    }

    #[test]
    fn sizes_and_devices() {
        assert_eq!(BootConfig::parse("mem=512K").unwrap().mem_size, Some(512 * KB));
        assert_eq!(BootConfig::parse("mem=8192").unwrap().mem_size, Some(8192));
        assert_eq!(
            BootConfig::parse("swap=ram:256").unwrap().swap,
            SwapDevice::Ram(256)
        );
        assert_eq!(BootConfig::parse("swap=auto").unwrap().swap, SwapDevice::Auto);
        assert_eq!(
            BootConfig::parse("loglevel=TRACE").unwrap().log_level,
            LevelFilter::Trace
        );
    }

    #[test]
    fn later_options_win() {
        let config = BootConfig::parse("swap=hda swap=ram:16").unwrap();
        assert_eq!(config.swap, SwapDevice::Ram(16));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            BootConfig::parse("quiet"),
            Err(ConfigError::UnknownOption("quiet".to_string()))
        );
        assert_eq!(
            BootConfig::parse("mem=12G"),
            Err(ConfigError::InvalidValue("mem=12G".to_string()))
        );
        assert_eq!(
            BootConfig::parse("loglevel=loud"),
            Err(ConfigError::InvalidValue("loglevel=loud".to_string()))
        );
        assert_eq!(
            BootConfig::parse("swapstart=-1"),
            Err(ConfigError::InvalidValue("swapstart=-1".to_string()))
        );
    }
}
