//! Logging and fatal-error macros shared across the core.
//!
//! Call sites use these short names rather than `log::*` directly so
//! that instrumentation reads the same whether or not the `debug`
//! feature (extra-chatty tracing) is enabled; the actual sink is
//! whatever the embedding application installs for the `log` facade.

#[cfg(feature = "debug")]
#[macro_export]
macro_rules! debugln {
    ($($rest:tt)*) => {
        log::debug!($($rest)*)
    };
}

#[cfg(not(feature = "debug"))]
#[macro_export]
macro_rules! debugln {
    ($($rest:tt)*) => {
        ()
    };
}

#[macro_export]
macro_rules! warnln {
    ($($rest:tt)*) => {
        log::warn!($($rest)*)
    };
}

#[macro_export]
macro_rules! infoln {
    ($($rest:tt)*) => {
        log::info!($($rest)*)
    };
}

/// Logs a final diagnostic line and aborts. Used only for conditions
/// the executor contract calls fatal (`UNDEFINED` opcode, a missing
/// required buffer) - there is no well-defined recovery.
#[macro_export]
macro_rules! panic_gb {
    ($($rest:tt)*) => {
        {
            log::error!($($rest)*);
            panic!($($rest)*);
        }
    };
}

#[macro_export]
macro_rules! assert_gb {
    ($cond:expr, $($rest:tt)*) => {
        if !$cond {
            $crate::panic_gb!($($rest)*);
        }
    };
    ($cond:expr) => {
        $crate::assert_gb!($cond, stringify!($cond));
    };
}
