//! Log macros that respect a module-level `ENABLE_LOGS` switch. Background
//! threads (bell, chime) use these so they can be muted per module without
//! touching `RUST_LOG`.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_info!("bell ringing");
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! log_gated {
    ($level:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::log!($level, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log_gated!(log::Level::Error, $($arg)*) };
}
