//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default level used when `RUST_LOG` is unset
pub fn init_with_level(level: log::LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Log level used for per-frame messages.
///
/// The first two frames always log at `debug`; later ones only while verbose.
pub fn frame_level(frame_number: u64, verbose: bool) -> log::Level {
    if verbose || frame_number <= 2 {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frames_are_louder() {
        assert_eq!(frame_level(1, true), log::Level::Debug);
        assert_eq!(frame_level(2, true), log::Level::Debug);
        assert_eq!(frame_level(1, false), log::Level::Debug);
        assert_eq!(frame_level(3, false), log::Level::Trace);
        assert_eq!(frame_level(300, true), log::Level::Debug);
    }
}
