//! `log` backend writing to the serial console.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use kidneyos_vm_shared::println;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Target prefix of the paging code, traced in full with `debugfaults`.
const FAULT_TARGET: &str = "kidneyos_vm::paging";

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::Off,
    LevelFilter::Error,
    LevelFilter::Warn,
    LevelFilter::Info,
    LevelFilter::Debug,
    LevelFilter::Trace,
];

pub struct KernelLogger {
    level: AtomicUsize,
    debug_faults: AtomicBool,
}

static LOGGER: KernelLogger = KernelLogger::new();

impl KernelLogger {
    const fn new() -> Self {
        KernelLogger {
            level: AtomicUsize::new(LevelFilter::Info as usize),
            debug_faults: AtomicBool::new(false),
        }
    }

    fn configure(&self, level: LevelFilter, debug_faults: bool) {
        self.level.store(level as usize, Ordering::Relaxed);
        self.debug_faults.store(debug_faults, Ordering::Relaxed);
    }

    fn level(&self) -> LevelFilter {
        LEVELS[self.level.load(Ordering::Relaxed)]
    }

    /// The most verbose level any record may pass at.
    fn max_level(&self) -> LevelFilter {
        if self.debug_faults.load(Ordering::Relaxed) {
            self.level().max(LevelFilter::Debug)
        } else {
            self.level()
        }
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() <= self.level() {
            return true;
        }
        self.debug_faults.load(Ordering::Relaxed)
            && metadata.level() <= LevelFilter::Debug
            && metadata.target().starts_with(FAULT_TARGET)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the console logger. `debug_faults` lets paging debug records
/// through even when `level` is quieter.
pub fn init(level: LevelFilter, debug_faults: bool) -> Result<(), SetLoggerError> {
    LOGGER.configure(level, debug_faults);
    log::set_logger(&LOGGER)?;
    log::set_max_level(LOGGER.max_level());
    Ok(())
}
