//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `ztlink_core::defaults`.

use ztlink_core::defaults;

/// Generate default value functions that forward to ztlink_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_connect_timeout_secs  => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_shutdown_timeout_secs => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_max_header_bytes      => DEFAULT_MAX_HEADER_BYTES: usize,
    default_relay_buffer_size     => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
}

default_string_fns! {
    default_listen_host => DEFAULT_LISTEN_HOST,
}

/// Smallest head limit that still fits a certificate and a chain.
pub(crate) const MIN_HEADER_BYTES: usize = 4096;
