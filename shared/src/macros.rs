#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::serial::_print(format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[macro_export]
macro_rules! eprintln {
    () => {
        $crate::serial::_eprint(format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::serial::_eprint(format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bochs_break {
    () => {
        // This is safe to use anywhere since it's a noop. The Bochs emulator
        // will break upon encountering it when magic_break: enabled=1 is
        // enabled.
        #[cfg(all(debug_assertions, target_os = "none"))]
        unsafe {
            core::arch::asm!("xchg bx, bx")
        }
    };
}
