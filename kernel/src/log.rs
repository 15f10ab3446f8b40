//! Kernel debug logging.
//!
//! Compiled out unless the `debug-log` feature is enabled, in the same
//! spirit as a serial console `dbgio` channel.

/// Logs a line to the debug channel.
#[macro_export]
macro_rules! kernel_dbg {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug-log")]
        {
            eprintln!("[okos] {}", format_args!($($arg)*));
        }
        #[cfg(not(feature = "debug-log"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
