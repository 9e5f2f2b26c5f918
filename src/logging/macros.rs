//! Leveled logging macros over anything with a `log(level, module, position)`
//! method, i.e. [`Logger`](crate::Logger) and [`LoggerHandle`](crate::LoggerHandle).
//!
//! The caller's module path and `file:line` are captured automatically. The
//! format arguments are only evaluated when the level passes the threshold.

#[macro_export]
macro_rules! log_at {
    ($target:expr, $lvl:expr, $($arg:tt)*) => {
        match &$target {
            __target => {
                let mut __stream = __target.log($lvl, module_path!(), concat!(file!(), ":", line!()));
                if __stream.is_enabled() {
                    __stream.push(format_args!($($arg)*));
                }
            }
        }
    };
}

#[macro_export]
macro_rules! log_fatal  { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::FatalError, $($arg)*) } }
#[macro_export]
macro_rules! log_error  { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::Error, $($arg)*) } }
#[macro_export]
macro_rules! log_warn   { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::Warning, $($arg)*) } }
#[macro_export]
macro_rules! log_info   { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::Info, $($arg)*) } }
#[macro_export]
macro_rules! log_debug  { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::Debug, $($arg)*) } }
#[macro_export]
macro_rules! log_debug2 { ($target:expr, $($arg:tt)*) => { $crate::log_at!($target, $crate::LogLevel::Debug2, $($arg)*) } }
