//! Query log line construction and severity selection.
//!
//! A line reads `[COMMAND] <error> [<ms> ms] [<n> rows] <query> [<args>]`.
//! The error text appears only on failure and the argument list is dropped
//! when parameters are hidden.

use crate::config::AccessorOptions;
use crate::error::DbError;
use crate::logger::Level;
use crate::models::QueryParam;
use std::fmt::{self, Write as _};
use std::time::Duration;

/// Accessor operation that produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Get,
    Select,
    Exec,
    NamedExec,
    Query,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Select => "SELECT",
            Command::Exec => "EXEC",
            Command::NamedExec => "NAMED_EXEC",
            Command::Query => "QUERY",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything measured for one accessor call.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub command: Command,
    pub query: &'a str,
    pub args: &'a [QueryParam],
    pub rows: usize,
    pub error: Option<&'a DbError>,
    pub elapsed: Duration,
}

/// Build the log line for `record`.
pub fn make_log_msg(record: &LogRecord<'_>, hide_params: bool) -> String {
    let mut msg = String::with_capacity(64 + record.query.len());
    let _ = write!(msg, "[{}] ", record.command);
    if let Some(err) = record.error {
        let _ = write!(msg, "{} ", err);
    }
    let _ = write!(
        msg,
        "[{:.2} ms] [{} rows] {}",
        to_millis(record.elapsed),
        record.rows,
        record.query
    );
    if !hide_params {
        msg.push(' ');
        write_args(&mut msg, record.args);
    }
    msg
}

/// Pick the severity for `record`; the first matching rule wins.
///
/// 1. an error other than `NotFound` is a warning
/// 2. more than `warn_rows` rows is a warning
/// 3. taking longer than `slow_duration` is a warning
/// 4. anything else is debug
pub fn choose_level(record: &LogRecord<'_>, options: &AccessorOptions) -> Level {
    match record.error {
        Some(err) if !err.is_not_found() => Level::Warn,
        _ if record.rows > options.warn_rows => Level::Warn,
        _ if record.elapsed > options.slow_duration => Level::Warn,
        _ => Level::Debug,
    }
}

fn write_args(out: &mut String, args: &[QueryParam]) {
    out.push('[');
    for (i, arg) in args.iter().enumerate() {
        if i != 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", arg);
    }
    out.push(']');
}

fn to_millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}
