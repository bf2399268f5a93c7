pub mod progress;
pub use progress::Progress;
pub mod counters;
pub use counters::{Counter, DetailCounter};

use std::fmt::Display;
#[inline]
pub fn unwrap_or_exit<T, E: Display>(res: Result<T, E>) -> T {
    match res {
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1)
        }
        Ok(t) => t,
    }
}

/// Log to stderr at `info` level unless `RUST_LOG` says
/// otherwise.
pub fn init_logging() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}

#[macro_export]
macro_rules! sync_main {
    ($name:expr) => {
        fn main() {
            $crate::cli::init_logging();
            $crate::cli::unwrap_or_exit({ $name });
        }
    };
}
