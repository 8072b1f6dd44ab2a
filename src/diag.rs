//! Diagnostic macros for internal invariant violations.
//!
//! The core has no recoverable errors (see [`crate::error`]); a violated
//! invariant — an operand-bit count outside {0,2,3,6}, a malformed decode
//! template, a scratch register accessed in a state that cannot produce one
//! — is a programming error, and aborts with a diagnostic dump of the
//! machine rather than being threaded through as a `Result`.

#[macro_export]
macro_rules! panic_gb {
    ($machine:expr, $fmt:expr $(, $arg:tt)*) => {
        {
            eprintln!("{}", $machine.describe_diagnostics());
            panic!($fmt $(, $arg)*);
        }
    };
}

#[macro_export]
macro_rules! assert_gb {
    ($cond:expr, $machine:expr, $fmt:expr $(, $arg:tt)*) => {
        if !$cond {
            $crate::panic_gb!($machine, $fmt $(, $arg)*);
        }
    };
}
