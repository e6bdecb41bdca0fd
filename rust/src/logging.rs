//! Logging macros for the duty planner with verbosity level control.
//!
//! Nothing is formatted when the level is disabled.
//! Verbosity levels:
//! - 0: SILENT (nothing, errors are returned to the caller)
//! - 1: CHANGES (generated assignments, staffing gaps)
//! - 2: CHECKS (reuse and month-skip decisions, fallback picks)
//! - 3: DEBUG (queue fronts, cursor movement)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log a warning (verbosity >= 1), prefixed with `warning:`.
///
/// Used for: days that could not be staffed.
#[macro_export]
macro_rules! log_warn {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!("warning: {}", format_args!($($arg)*));
        }
    };
}

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: new assignments, batch writes.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: reused days, month skips, fallback selections.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            eprintln!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            eprintln!($($arg)*);
        }
    };
}
