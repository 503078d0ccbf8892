//! Log sinks for per-query log lines.

use crate::scope::Scope;
use chrono::Local;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for accessor log lines.
///
/// Implementations receive the call scope so they can attach the bound
/// transaction to the record.
pub trait Logger: Send + Sync {
    fn debug(&self, scope: &Scope, args: fmt::Arguments<'_>);
    fn info(&self, scope: &Scope, args: fmt::Arguments<'_>);
    fn warn(&self, scope: &Scope, args: fmt::Arguments<'_>);
    fn error(&self, scope: &Scope, args: fmt::Arguments<'_>);

    fn log(&self, level: Level, scope: &Scope, args: fmt::Arguments<'_>) {
        match level {
            Level::Debug => self.debug(scope, args),
            Level::Info => self.info(scope, args),
            Level::Warn => self.warn(scope, args),
            Level::Error => self.error(scope, args),
        }
    }
}

/// Forwards log lines to `tracing` under the `db_accessor::query` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, scope: &Scope, args: fmt::Arguments<'_>) {
        tracing::debug!(
            target: "db_accessor::query",
            transaction_id = scope.transaction_id(),
            "{}",
            args
        );
    }

    fn info(&self, scope: &Scope, args: fmt::Arguments<'_>) {
        tracing::info!(
            target: "db_accessor::query",
            transaction_id = scope.transaction_id(),
            "{}",
            args
        );
    }

    fn warn(&self, scope: &Scope, args: fmt::Arguments<'_>) {
        tracing::warn!(
            target: "db_accessor::query",
            transaction_id = scope.transaction_id(),
            "{}",
            args
        );
    }

    fn error(&self, scope: &Scope, args: fmt::Arguments<'_>) {
        tracing::error!(
            target: "db_accessor::query",
            transaction_id = scope.transaction_id(),
            "{}",
            args
        );
    }
}

/// Writes `[LEVEL] YYYY/MM/DD HH:MM:SS message` lines to any writer.
pub struct WriterLogger {
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterLogger {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    fn write_line(&self, level: Level, args: fmt::Arguments<'_>) {
        // A poisoned lock or a failed write drops the line.
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(
                out,
                "[{}] {} {}",
                level,
                Local::now().format("%Y/%m/%d %H:%M:%S"),
                args
            );
        }
    }
}

impl fmt::Debug for WriterLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLogger").finish_non_exhaustive()
    }
}

impl Logger for WriterLogger {
    fn debug(&self, _scope: &Scope, args: fmt::Arguments<'_>) {
        self.write_line(Level::Debug, args);
    }

    fn info(&self, _scope: &Scope, args: fmt::Arguments<'_>) {
        self.write_line(Level::Info, args);
    }

    fn warn(&self, _scope: &Scope, args: fmt::Arguments<'_>) {
        self.write_line(Level::Warn, args);
    }

    fn error(&self, _scope: &Scope, args: fmt::Arguments<'_>) {
        self.write_line(Level::Error, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_writer_logger_line_format() {
        let buf = SharedBuf::default();
        let logger = WriterLogger::new(buf.clone());
        let scope = Scope::new();

        logger.warn(&scope, format_args!("[EXEC] [1.00 ms] [1 rows] {}", "SELECT 1"));
        logger.log(Level::Debug, &scope, format_args!("second"));

        let contents = buf.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[WARN] "));
        assert!(lines[0].ends_with(" [EXEC] [1.00 ms] [1 rows] SELECT 1"));
        assert!(lines[1].starts_with("[DEBUG] "));

        // "[WARN] " + "YYYY/MM/DD HH:MM:SS" + " "
        let stamp = &lines[0][7..26];
        assert_eq!(stamp.as_bytes()[4], b'/');
        assert_eq!(stamp.as_bytes()[13], b':');
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Warn);
        assert_eq!(Level::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_tracing_logger_does_not_require_subscriber() {
        let logger = TracingLogger;
        logger.info(&Scope::new(), format_args!("no subscriber installed"));
    }
}
