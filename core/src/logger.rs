//! Logging capability handed to a [`Runner`](../runner/struct.Runner.html).
//!
//! The runner never calls the `log` macros directly. It writes through the
//! `Log` it was constructed with, which by default forwards to the logger the
//! process installed.

use ::std::fmt;
use ::std::sync::Arc;
use ::log::{self, Level, Log, Metadata, Record};

pub const LOG_TARGET: &'static str = "cgmount";

/// Forwards every record to the process-wide logger installed via `log`.
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log::logger().log(record)
        }
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

pub type SharedLogger = Arc<dyn Log + Send + Sync>;

pub fn global_logger() -> SharedLogger {
    Arc::new(GlobalLogger)
}

/// Writes a record to an injected logger, tagged with the caller's location.
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $crate::logger::emit(&*$logger, $level, module_path!(), file!(), line!(),
                             format_args!($($arg)+))
    };
}

pub fn emit(logger: &dyn Log, level: Level, module_path: &str, file: &str, line: u32,
            args: fmt::Arguments) {
    let metadata = Metadata::builder()
        .level(level)
        .target(LOG_TARGET)
        .build();
    if !logger.enabled(&metadata) {
        return;
    }
    logger.log(&Record::builder()
        .metadata(metadata)
        .args(args)
        .module_path(Some(module_path))
        .file(Some(file))
        .line(Some(line))
        .build());
}
