//! Defines the console logger that writes to standard error.

use std::io::{Stderr, Write};

use log::{LevelFilter, SetLoggerError};
use spin::{Mutex, Once};

pub struct Console {
    stderr: Mutex<Stderr>,
}

static SHARED: Once<Console> = Once::new();

impl Console {
    pub fn init(level: LevelFilter) -> Result<&'static Self, SetLoggerError> {
        let console = Self::shared();
        console.install(level)?;
        Ok(console)
    }

    pub fn shared() -> &'static Self {
        SHARED.call_once(|| Console {
            stderr: Mutex::new(std::io::stderr()),
        })
    }

    pub fn install(&'static self, level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl log::Log for Console {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // A closed stderr leaves nowhere to report the failure
        let _ = write_log_entry_to(&mut *self.stderr.lock(), record);
    }

    fn flush(&self) {
        let _ = self.stderr.lock().flush();
    }
}

/// The default level: everything in debug builds, informational and above otherwise.
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    }
}

fn write_log_entry_to(writer: &mut impl Write, record: &log::Record) -> std::io::Result<()> {
    #[cfg(any(debug_assertions, feature = "detailed-logging"))]
    return writeln!(
        writer,
        "[{} {}:{} {}] {}",
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.target(),
        record.args()
    );
    #[cfg(not(any(debug_assertions, feature = "detailed-logging")))]
    return writeln!(writer, "[{:5}] {}", record.level(), record.args());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(record: &log::Record) -> String {
        let mut buffer = Vec::new();
        write_log_entry_to(&mut buffer, record).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn entries_end_with_the_message() {
        let line = render(
            &log::Record::builder()
                .level(log::Level::Info)
                .target("vmm")
                .args(format_args!("page {} loaded", 3))
                .build(),
        );
        assert!(line.starts_with("[INFO"));
        assert!(line.ends_with("page 3 loaded\n"));
    }
}
